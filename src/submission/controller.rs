//! Analysis submission controller.
//!
//! Owns [`SubmissionState`] and serializes requests: `submit()` only acts
//! from `Ready`, so at most one request is ever in flight.  Like the voice
//! controller it performs no I/O itself; [`submit`](AnalysisSubmissionController::submit)
//! returns a [`PendingSubmission`] for the caller to send, and the outcome
//! comes back through [`resolve`](AnalysisSubmissionController::resolve).
//!
//! Each submission gets a [`SubmissionTicket`] and a `CancellationToken`.
//! `reset()` cancels the token, and any outcome for a ticket that is no
//! longer in flight is dropped.

use tokio_util::sync::CancellationToken;

use super::state::SubmissionState;
use crate::config::{ResetPolicy, SessionConfig};
use crate::media::MediaCaptureManager;
use crate::service::{AnalysisRequest, AnalysisResult, ServiceError, CONNECTIVITY_MESSAGE};

const PARSE_FAILURE_MESSAGE: &str = "Unexpected response from backend.";
const INVALID_REQUEST_MESSAGE: &str = "Could not prepare the request.";

/// Identifies one submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmissionTicket(u64);

/// A request snapshot ready to be sent.
#[derive(Debug, Clone)]
pub struct PendingSubmission {
    pub ticket: SubmissionTicket,
    pub request: AnalysisRequest,
    /// Cancelled when the session resets before the response arrives.
    pub cancel: CancellationToken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Applied,
    /// The ticket was no longer in flight; the outcome was dropped.
    Stale,
}

// ---------------------------------------------------------------------------
// AnalysisSubmissionController
// ---------------------------------------------------------------------------

pub struct AnalysisSubmissionController {
    config: SessionConfig,
    state: SubmissionState,
    next_ticket: u64,
    in_flight: Option<(SubmissionTicket, CancellationToken)>,
}

impl AnalysisSubmissionController {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            state: SubmissionState::Empty,
            next_ticket: 0,
            in_flight: None,
        }
    }

    pub fn state(&self) -> &SubmissionState {
        &self.state
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Re-derive the state after the image batch changed to `len` images.
    ///
    /// Emptying the batch mid-flight cancels the request.
    pub fn sync_batch(&mut self, len: usize) {
        if self.state.is_busy() {
            if len == 0 {
                log::info!("submission: batch emptied while submitting, cancelling");
                self.cancel_in_flight();
                self.set_state(SubmissionState::Empty);
            }
            return;
        }
        self.set_state(Self::idle_state(len));
    }

    /// Snapshot the batch and fields into a request and enter `Submitting`.
    ///
    /// Returns `None` unless the controller is `Ready`.  The batch is only
    /// read.
    pub fn submit(
        &mut self,
        media: &MediaCaptureManager,
        features: &str,
        price: Option<u64>,
    ) -> Option<PendingSubmission> {
        if self.state != SubmissionState::Ready {
            log::debug!("submission: submit ignored while {}", self.state.label());
            return None;
        }
        if media.is_empty() {
            self.set_state(SubmissionState::Empty);
            return None;
        }

        let request = AnalysisRequest::new(media.payloads(), features, price);

        self.next_ticket += 1;
        let ticket = SubmissionTicket(self.next_ticket);
        let cancel = CancellationToken::new();
        self.in_flight = Some((ticket, cancel.clone()));
        self.set_state(SubmissionState::Submitting);

        log::info!(
            "submission: sending {} image(s) as {ticket:?}",
            request.files().len()
        );

        Some(PendingSubmission {
            ticket,
            request,
            cancel,
        })
    }

    /// Apply the outcome of the submission identified by `ticket`.
    pub fn resolve(
        &mut self,
        ticket: SubmissionTicket,
        outcome: Result<AnalysisResult, ServiceError>,
    ) -> Resolution {
        match &self.in_flight {
            Some((current, _)) if *current == ticket => {}
            _ => {
                log::debug!("submission: dropping stale response for {ticket:?}");
                return Resolution::Stale;
            }
        }
        self.in_flight = None;

        let next = match outcome {
            Ok(AnalysisResult::Success(payload)) => {
                log::info!("submission: analysis succeeded ({})", payload.product_name);
                SubmissionState::Success(Box::new(payload))
            }
            Ok(AnalysisResult::Error { message, details }) => {
                log::warn!("submission: backend reported error: {message}");
                SubmissionState::Error { message, details }
            }
            Err(e) => {
                log::warn!("submission: request failed: {e}");
                error_state(e)
            }
        };
        self.set_state(next);
        Resolution::Applied
    }

    /// Leave a terminal state ("try again").
    ///
    /// Dismissing an error clears the photos when `clear_images_on_error` is
    /// set.  No-op outside `Success` / `Error`.
    pub fn acknowledge(&mut self, media: &mut MediaCaptureManager) {
        if !self.state.is_terminal() {
            return;
        }
        if matches!(self.state, SubmissionState::Error { .. }) && self.config.clear_images_on_error
        {
            media.reset();
        }
        self.set_state(Self::idle_state(media.len()));
    }

    /// Discard any result or in-flight request.
    ///
    /// Under [`ResetPolicy::ClearImages`] the batch is emptied too; returns
    /// whether that happened.
    pub fn reset(&mut self, media: &mut MediaCaptureManager) -> bool {
        self.cancel_in_flight();

        let clear = self.config.reset_policy == ResetPolicy::ClearImages;
        if clear {
            media.reset();
        }
        // Kept photos go straight back to Ready so Empty still means no images.
        self.set_state(Self::idle_state(media.len()));
        clear
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn idle_state(len: usize) -> SubmissionState {
        if len == 0 {
            SubmissionState::Empty
        } else {
            SubmissionState::Ready
        }
    }

    fn cancel_in_flight(&mut self) {
        if let Some((ticket, cancel)) = self.in_flight.take() {
            log::debug!("submission: cancelling {ticket:?}");
            cancel.cancel();
        }
    }

    fn set_state(&mut self, next: SubmissionState) {
        if self.state.label() != next.label() {
            log::debug!("submission: {} → {}", self.state.label(), next.label());
        }
        self.state = next;
    }
}

/// Map a transport failure onto the user-facing error state.
fn error_state(e: ServiceError) -> SubmissionState {
    match e {
        ServiceError::Rejected { message, details } => SubmissionState::Error { message, details },
        e if e.is_connectivity() => SubmissionState::Error {
            message: CONNECTIVITY_MESSAGE.to_string(),
            details: Some(e.to_string()),
        },
        ServiceError::InvalidRequest(details) => SubmissionState::Error {
            message: INVALID_REQUEST_MESSAGE.to_string(),
            details: Some(details),
        },
        e => SubmissionState::Error {
            message: PARSE_FAILURE_MESSAGE.to_string(),
            details: Some(e.to_string()),
        },
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::media::{ImagePayload, MemoryPreviewStore};
    use crate::service::{AmazonListing, AnalysisPayload, Listings};

    fn img(name: &str) -> ImagePayload {
        ImagePayload::from_bytes(name, vec![7u8; 3])
    }

    fn media_with(names: &[&str]) -> MediaCaptureManager {
        let mut media = MediaCaptureManager::new(Arc::new(MemoryPreviewStore::new()));
        media.add_files(names.iter().map(|n| img(n)));
        media
    }

    fn ready(config: SessionConfig, media: &MediaCaptureManager) -> AnalysisSubmissionController {
        let mut ctl = AnalysisSubmissionController::new(config);
        ctl.sync_batch(media.len());
        ctl
    }

    fn payload() -> AnalysisPayload {
        AnalysisPayload {
            product_name: "Shawl".into(),
            brand: None,
            material: "wool".into(),
            suggested_price: "₹ 4500".into(),
            raw_price: 4500.0,
            price_uplift: None,
            unique_tags: vec!["handwoven".into()],
            pricing_reason: None,
            photo_advice: None,
            market_stats: None,
            listings: Listings {
                whatsapp: "Selling this shawl.".into(),
                amazon: AmazonListing {
                    title: "Premium Shawl".into(),
                    features: Vec::new(),
                },
                instagram: None,
            },
        }
    }

    // ---- batch sync ---

    #[test]
    fn empty_iff_no_images() {
        let mut ctl = AnalysisSubmissionController::new(SessionConfig::default());
        assert_eq!(*ctl.state(), SubmissionState::Empty);
        ctl.sync_batch(2);
        assert_eq!(*ctl.state(), SubmissionState::Ready);
        ctl.sync_batch(0);
        assert_eq!(*ctl.state(), SubmissionState::Empty);
    }

    // ---- submit ---

    #[test]
    fn submit_snapshots_request_without_touching_batch() {
        let media = media_with(&["img1.jpg", "img2.jpg"]);
        let mut ctl = ready(SessionConfig::default(), &media);

        let pending = ctl.submit(&media, "soft cotton", Some(500)).expect("submitted");

        let names: Vec<_> = pending
            .request
            .files()
            .iter()
            .map(|f| f.file_name().to_string())
            .collect();
        assert_eq!(names, ["img1.jpg", "img2.jpg"]);
        assert_eq!(pending.request.user_features(), "soft cotton");
        assert_eq!(pending.request.user_price_field().as_deref(), Some("500"));
        assert_eq!(media.len(), 2);
        assert_eq!(*ctl.state(), SubmissionState::Submitting);
    }

    #[test]
    fn second_submit_while_pending_is_ignored() {
        let media = media_with(&["a.jpg"]);
        let mut ctl = ready(SessionConfig::default(), &media);

        assert!(ctl.submit(&media, "", None).is_some());
        assert!(ctl.submit(&media, "", None).is_none());
        assert_eq!(*ctl.state(), SubmissionState::Submitting);
    }

    #[test]
    fn submit_from_empty_is_noop() {
        let media = media_with(&[]);
        let mut ctl = ready(SessionConfig::default(), &media);
        assert!(ctl.submit(&media, "", None).is_none());
        assert_eq!(*ctl.state(), SubmissionState::Empty);
    }

    // ---- resolve ---

    #[test]
    fn success_response_becomes_success_state() {
        let media = media_with(&["a.jpg"]);
        let mut ctl = ready(SessionConfig::default(), &media);
        let pending = ctl.submit(&media, "", None).unwrap();

        let r = ctl.resolve(pending.ticket, Ok(AnalysisResult::Success(payload())));
        assert_eq!(r, Resolution::Applied);
        assert_eq!(ctl.state().result().map(|p| p.product_name.as_str()), Some("Shawl"));
    }

    #[test]
    fn backend_error_then_retry_sends_fresh_request() {
        let mut media = media_with(&["a.jpg"]);
        let mut ctl = ready(SessionConfig::default(), &media);
        let first = ctl.submit(&media, "", None).unwrap();

        ctl.resolve(
            first.ticket,
            Ok(AnalysisResult::Error {
                message: "Failed to connect to backend.".into(),
                details: None,
            }),
        );
        assert_eq!(
            ctl.state().error_message(),
            Some("Failed to connect to backend.")
        );

        ctl.acknowledge(&mut media);
        assert_eq!(*ctl.state(), SubmissionState::Ready);
        assert_eq!(media.len(), 1);

        let second = ctl.submit(&media, "", None).expect("fresh request");
        assert_ne!(first.ticket, second.ticket);
    }

    #[test]
    fn network_failure_uses_connectivity_message() {
        let media = media_with(&["a.jpg"]);
        let mut ctl = ready(SessionConfig::default(), &media);
        let pending = ctl.submit(&media, "", None).unwrap();

        ctl.resolve(pending.ticket, Err(ServiceError::Timeout));
        assert_eq!(ctl.state().error_message(), Some(CONNECTIVITY_MESSAGE));
    }

    #[test]
    fn parse_failure_is_distinct_from_connectivity() {
        let media = media_with(&["a.jpg"]);
        let mut ctl = ready(SessionConfig::default(), &media);
        let pending = ctl.submit(&media, "", None).unwrap();

        ctl.resolve(pending.ticket, Err(ServiceError::Parse("HTTP 502".into())));
        assert_eq!(ctl.state().error_message(), Some(PARSE_FAILURE_MESSAGE));
    }

    #[test]
    fn stale_response_after_reset_is_discarded() {
        let mut media = media_with(&["a.jpg"]);
        let mut ctl = ready(SessionConfig::default(), &media);
        let pending = ctl.submit(&media, "", None).unwrap();

        ctl.reset(&mut media);
        assert!(pending.cancel.is_cancelled());

        let r = ctl.resolve(pending.ticket, Ok(AnalysisResult::Success(payload())));
        assert_eq!(r, Resolution::Stale);
        assert_eq!(*ctl.state(), SubmissionState::Empty);
    }

    // ---- acknowledge / reset policies ---

    #[test]
    fn acknowledge_error_can_clear_images() {
        let config = SessionConfig {
            clear_images_on_error: true,
            ..SessionConfig::default()
        };
        let mut media = media_with(&["a.jpg"]);
        let mut ctl = ready(config, &media);
        let pending = ctl.submit(&media, "", None).unwrap();
        ctl.resolve(pending.ticket, Err(ServiceError::Network("refused".into())));

        ctl.acknowledge(&mut media);
        assert!(media.is_empty());
        assert_eq!(*ctl.state(), SubmissionState::Empty);
    }

    #[test]
    fn acknowledge_outside_terminal_state_is_noop() {
        let mut media = media_with(&["a.jpg"]);
        let mut ctl = ready(SessionConfig::default(), &media);
        ctl.submit(&media, "", None).unwrap();

        ctl.acknowledge(&mut media);
        assert_eq!(*ctl.state(), SubmissionState::Submitting);
    }

    #[test]
    fn reset_clear_images_empties_batch() {
        let mut media = media_with(&["a.jpg", "b.jpg"]);
        let mut ctl = ready(SessionConfig::default(), &media);
        let pending = ctl.submit(&media, "", None).unwrap();
        ctl.resolve(pending.ticket, Ok(AnalysisResult::Success(payload())));

        assert!(ctl.reset(&mut media));
        assert!(media.is_empty());
        assert_eq!(*ctl.state(), SubmissionState::Empty);
    }

    #[test]
    fn reset_keep_images_returns_to_ready() {
        let config = SessionConfig {
            reset_policy: ResetPolicy::KeepImages,
            ..SessionConfig::default()
        };
        let mut media = media_with(&["a.jpg"]);
        let mut ctl = ready(config, &media);
        let pending = ctl.submit(&media, "", None).unwrap();
        ctl.resolve(pending.ticket, Ok(AnalysisResult::Success(payload())));

        assert!(!ctl.reset(&mut media));
        assert_eq!(media.len(), 1);
        assert_eq!(*ctl.state(), SubmissionState::Ready);
    }

    #[test]
    fn emptying_batch_mid_flight_cancels() {
        let media = media_with(&["a.jpg"]);
        let mut ctl = ready(SessionConfig::default(), &media);
        let pending = ctl.submit(&media, "", None).unwrap();

        ctl.sync_batch(0);
        assert!(pending.cancel.is_cancelled());
        assert_eq!(*ctl.state(), SubmissionState::Empty);
        assert_eq!(
            ctl.resolve(pending.ticket, Err(ServiceError::Timeout)),
            Resolution::Stale
        );
    }
}
