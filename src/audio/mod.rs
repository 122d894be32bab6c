//! Voice-note audio: microphone capture, downmix/resample and WAV packaging.
//!
//! # Pipeline
//!
//! ```text
//! Microphone → cpal callback → AudioChunk (accumulated on the capture thread)
//!           → downmix_to_mono → resample → encode_wav → AudioPayload
//! ```

pub mod capture;
pub mod resample;
pub mod wav;

pub use capture::{AudioChunk, CpalMicrophone};
pub use resample::{downmix_to_mono, resample};
pub use wav::{
    encode_wav, package_voice_note, AudioPayload, VOICE_NOTE_FILE_NAME, VOICE_NOTE_MIME,
};
