//! Analysis submission: request snapshotting and the result state machine.

pub mod controller;
pub mod state;

pub use controller::{AnalysisSubmissionController, PendingSubmission, Resolution, SubmissionTicket};
pub use state::SubmissionState;
