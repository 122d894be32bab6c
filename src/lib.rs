//! Setu listing client.
//!
//! Capture product photos and an optional spoken description, send them to
//! the Setu analysis backend, and turn the answer into a ready-to-post
//! listing with a market-position gauge.
//!
//! # Modules
//!
//! | Module         | Role                                                  |
//! |----------------|-------------------------------------------------------|
//! | [`media`]      | image batch and preview lifecycles                    |
//! | [`voice`]      | recording state machine, transcript merging           |
//! | [`submission`] | request snapshot and result state machine             |
//! | [`session`]    | event loop tying the three together                   |
//! | [`service`]    | HTTP clients for `/analyze` and `/analyze-voice`      |
//! | [`audio`]      | cpal microphone and WAV packaging                     |
//! | [`gauge`]      | market-position calculation                           |
//! | [`config`]     | `settings.toml` and environment overrides             |

pub mod audio;
pub mod config;
pub mod gauge;
pub mod media;
pub mod service;
pub mod session;
pub mod submission;
pub mod voice;
