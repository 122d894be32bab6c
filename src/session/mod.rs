//! Session orchestration for one listing.
//!
//! # Architecture
//!
//! ```text
//! SessionCommand (mpsc)
//!        │
//!        ▼
//! Session::run()  ← async tokio task, one event at a time
//!        │
//!        ├─ MediaCaptureManager          image batch + previews
//!        ├─ VoiceCaptureController       mic → voice note → features field
//!        └─ AnalysisSubmissionController request snapshot → result
//!
//! spawned uploads ──Completion──▶ Session::run()
//!
//! SharedState (Arc<Mutex<SessionView>>) ←── read by the view layer
//! ```

pub mod command;
pub mod runner;
pub mod state;

pub use command::{SessionCommand, SessionEvent};
pub use runner::{Session, SessionServices};
pub use state::{new_shared_state, ImageSummary, SessionView, SharedState};
