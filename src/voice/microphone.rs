//! Microphone seam and the voice error taxonomy.
//!
//! [`Microphone`] hands out exclusive [`MicrophoneStream`]s.  A stream holds
//! the device until [`MicrophoneStream::finish`] is called or the box is
//! dropped, whichever happens first; implementations must release exactly
//! once.

use thiserror::Error;

use crate::audio::AudioChunk;
use crate::service::ServiceError;

// ---------------------------------------------------------------------------
// VoiceError
// ---------------------------------------------------------------------------

/// Errors from the voice capture / transcription round trip.
///
/// None of these are fatal: the controller always returns to `Idle`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum VoiceError {
    /// The OS refused microphone access.
    #[error("microphone permission denied: {0}")]
    PermissionDenied(String),

    /// No usable input device.
    #[error("microphone unavailable: {0}")]
    DeviceUnavailable(String),

    /// The backend could not turn the recording into text.
    #[error("transcription failed: {0}")]
    TranscriptionFailure(String),

    /// The transcription backend could not be reached.
    #[error("transcription backend unreachable: {0}")]
    Network(String),

    /// The recording could not be packaged as WAV.
    #[error("could not encode voice note: {0}")]
    Encode(String),
}

impl From<ServiceError> for VoiceError {
    fn from(e: ServiceError) -> Self {
        if e.is_connectivity() {
            VoiceError::Network(e.to_string())
        } else {
            VoiceError::TranscriptionFailure(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Microphone traits
// ---------------------------------------------------------------------------

/// Source of exclusive microphone sessions.
pub trait Microphone: Send + Sync {
    /// Acquire the device and start accumulating audio.
    fn open(&self) -> Result<Box<dyn MicrophoneStream>, VoiceError>;
}

/// A live, exclusive recording.
pub trait MicrophoneStream: Send {
    /// Release the device and hand back everything captured so far.
    fn finish(self: Box<Self>) -> Vec<AudioChunk>;
}

// ---------------------------------------------------------------------------
// MockMicrophone  (test-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
pub use mock::MockMicrophone;


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
