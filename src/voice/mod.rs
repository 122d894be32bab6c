//! Voice description capture: record, upload, merge into the features field.
//!
//! [`VoiceCaptureController`] is a synchronous state machine.  It never
//! performs I/O beyond the microphone handshake; the session spawns the
//! upload and feeds the outcome back through
//! [`VoiceCaptureController::resolve`].

pub mod controller;
pub mod microphone;

pub use controller::{
    merge_transcript, PendingTranscription, StartOutcome, TranscriptionResolution,
    VoiceCaptureController, VoiceState, VoiceTicket,
};
pub use microphone::{Microphone, MicrophoneStream, VoiceError};

// test-only re-export so session tests can share the microphone double
#[cfg(test)]
pub use microphone::MockMicrophone;
