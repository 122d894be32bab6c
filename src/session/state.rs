//! Read-only session snapshot for the view layer.
//!
//! The session loop is the only writer.  It republishes a fresh
//! [`SessionView`] after every command and every network completion, so a
//! reader always sees a consistent picture of all three controllers.

use std::sync::{Arc, Mutex};

use crate::media::PreviewId;
use crate::submission::SubmissionState;
use crate::voice::VoiceState;

// ---------------------------------------------------------------------------
// SessionView
// ---------------------------------------------------------------------------

/// One selected image as the view layer sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageSummary {
    pub file_name: String,
    pub mime_type: String,
    pub size: usize,
    pub preview: PreviewId,
}

/// Everything needed to render the current screen.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionView {
    /// Selected images, in batch order.
    pub images: Vec<ImageSummary>,

    /// Free-text features, including merged voice transcripts.
    pub features: String,

    pub expected_price: Option<u64>,

    pub voice: VoiceState,

    pub submission: SubmissionState,

    /// Message of the most recent voice failure, cleared when a new
    /// recording starts.
    pub last_voice_error: Option<String>,
}

impl SessionView {
    /// Gauge position of the suggested price, when a result with market
    /// data is showing.
    pub fn market_position(&self) -> Option<f64> {
        self.submission
            .result()
            .and_then(|payload| payload.market_position())
    }
}

// ---------------------------------------------------------------------------
// SharedState
// ---------------------------------------------------------------------------

/// Thread-safe handle to [`SessionView`].
///
/// Cheap to clone.  Hold the lock only briefly and never across `.await`.
pub type SharedState = Arc<Mutex<SessionView>>;

pub fn new_shared_state() -> SharedState {
    Arc::new(Mutex::new(SessionView::default()))
}
