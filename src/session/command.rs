//! Messages into and out of the session loop.

use crate::media::ImagePayload;
use crate::submission::SubmissionState;

/// User actions, delivered to [`Session::run`](super::Session::run) over a
/// `tokio::sync::mpsc` channel.
#[derive(Debug, Clone)]
pub enum SessionCommand {
    /// Append images to the batch, in order.
    AddFiles(Vec<ImagePayload>),
    /// Remove the image at this index.
    RemoveFile(usize),
    /// Drop every selected image.
    ClearImages,
    /// Replace the free-text features field.
    SetFeatures(String),
    SetExpectedPrice(Option<u64>),
    StartRecording,
    StopRecording,
    Submit,
    /// Leave a result or error screen and go back to editing ("try again").
    Acknowledge,
    /// Full reset ("scan another item").
    Reset,
}

/// Notifications published by the session after each step.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    ImagesChanged { count: usize },
    RecordingStarted,
    RecordingStopped { duration_secs: f32 },
    /// `merged` is `None` when the backend heard nothing.
    TranscriptionFinished { merged: Option<String> },
    VoiceFailed { message: String },
    SubmissionStarted { images: usize },
    AnalysisFinished(SubmissionState),
    /// The command was ignored or failed validation.
    CommandRejected { message: String },
    SessionReset,
}
