//! Transport-level errors shared by both backend clients.

use thiserror::Error;

/// Message shown for any failure to reach the backend.
pub const CONNECTIVITY_MESSAGE: &str = "Failed to connect to backend.";

/// Errors that can occur while talking to the analysis / transcription
/// backend.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ServiceError {
    /// HTTP transport or connection error.
    #[error("HTTP request failed: {0}")]
    Network(String),

    /// The request did not complete within the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// The request could not be assembled (e.g. an invalid MIME type).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The response was not the JSON envelope we expect.
    #[error("failed to parse backend response: {0}")]
    Parse(String),

    /// The backend answered with `status = "error"`.
    #[error("{message}")]
    Rejected {
        message: String,
        details: Option<String>,
    },
}

impl ServiceError {
    /// `true` for failures where the backend was never reached.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, ServiceError::Network(_) | ServiceError::Timeout)
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ServiceError::Timeout
        } else if e.is_decode() {
            ServiceError::Parse(e.to_string())
        } else {
            ServiceError::Network(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connectivity_classification() {
        assert!(ServiceError::Timeout.is_connectivity());
        assert!(ServiceError::Network("refused".into()).is_connectivity());
        assert!(!ServiceError::Parse("bad json".into()).is_connectivity());
        assert!(!ServiceError::Rejected {
            message: "nope".into(),
            details: None
        }
        .is_connectivity());
    }

    #[test]
    fn rejected_displays_backend_message_verbatim() {
        let e = ServiceError::Rejected {
            message: "Audio unreadable".into(),
            details: Some("codec".into()),
        };
        assert_eq!(e.to_string(), "Audio unreadable");
    }
}
