//! Submission state machine states.

use crate::service::AnalysisPayload;

/// States of one analysis round trip.
///
/// ```text
/// Empty ──add images──▶ Ready ──submit()──▶ Submitting ──response──▶ Success
///   ▲                     ▲                     │                   Error
///   │                     └──── acknowledge() / batch change ────────┘
///   └──────────────────────────── reset() ─────────────────────────────
/// ```
///
/// `Empty` holds exactly when the image batch is empty, outside of the
/// terminal states.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SubmissionState {
    /// No images selected.
    #[default]
    Empty,

    /// At least one image; a submission may start.
    Ready,

    /// One request is in flight.  Further submits are ignored.
    Submitting,

    /// The backend returned a listing.
    Success(Box<AnalysisPayload>),

    /// The backend declined or could not be reached.
    Error {
        message: String,
        details: Option<String>,
    },
}

impl SubmissionState {
    /// `true` while a request is in flight.
    ///
    /// ```
    /// use setu_client::submission::SubmissionState;
    ///
    /// assert!(SubmissionState::Submitting.is_busy());
    /// assert!(!SubmissionState::Ready.is_busy());
    /// ```
    pub fn is_busy(&self) -> bool {
        matches!(self, SubmissionState::Submitting)
    }

    /// `true` for `Success` and `Error`.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SubmissionState::Success(_) | SubmissionState::Error { .. }
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            SubmissionState::Empty => "Empty",
            SubmissionState::Ready => "Ready",
            SubmissionState::Submitting => "Analyzing",
            SubmissionState::Success(_) => "Done",
            SubmissionState::Error { .. } => "Error",
        }
    }

    pub fn result(&self) -> Option<&AnalysisPayload> {
        match self {
            SubmissionState::Success(payload) => Some(&**payload),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            SubmissionState::Error { message, .. } => Some(message.as_str()),
            _ => None,
        }
    }
}
