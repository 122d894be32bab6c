//! Session loop: owns the controllers and applies one event at a time.
//!
//! [`Session`] receives [`SessionCommand`]s over a `tokio::sync::mpsc`
//! channel and network completions over an internal channel.  Uploads run
//! as spawned tasks so the loop never waits on the backend.
//!
//! # Flow
//!
//! ```text
//! SessionCommand::StopRecording
//!   └─▶ voice.stop()            [mic released, Processing]
//!         └─▶ spawn transcribe ──▶ Completion::Transcription
//!               └─▶ voice.resolve() merges text into features   [Idle]
//!
//! SessionCommand::Submit
//!   └─▶ submission.submit()     [Submitting]
//!         └─▶ spawn analyze (cancellable) ──▶ Completion::Analysis
//!               └─▶ submission.resolve()                [Success | Error]
//! ```
//!
//! When the command channel closes, the loop keeps applying completions
//! until every spawned task has finished, then releases the microphone.

use std::sync::{Arc, PoisonError};

use tokio::sync::mpsc;

use super::command::{SessionCommand, SessionEvent};
use super::state::{ImageSummary, SessionView, SharedState};
use crate::config::AppConfig;
use crate::media::{MediaCaptureManager, PreviewStore};
use crate::service::{AnalysisResult, AnalysisService, ServiceError, TranscriptionService};
use crate::submission::{
    AnalysisSubmissionController, PendingSubmission, Resolution, SubmissionTicket,
};
use crate::voice::{
    Microphone, PendingTranscription, StartOutcome, TranscriptionResolution,
    VoiceCaptureController, VoiceError, VoiceTicket,
};

// ---------------------------------------------------------------------------
// SessionServices
// ---------------------------------------------------------------------------

/// External collaborators of a session.
#[derive(Clone)]
pub struct SessionServices {
    pub analysis: Arc<dyn AnalysisService>,
    pub transcription: Arc<dyn TranscriptionService>,
    pub microphone: Arc<dyn Microphone>,
    pub previews: Arc<dyn PreviewStore>,
}

enum Completion {
    Analysis {
        ticket: SubmissionTicket,
        outcome: Result<AnalysisResult, ServiceError>,
    },
    Transcription {
        ticket: VoiceTicket,
        outcome: Result<String, ServiceError>,
    },
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Drives one listing session.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use setu_client::audio::CpalMicrophone;
/// use setu_client::config::AppConfig;
/// use setu_client::media::MemoryPreviewStore;
/// use setu_client::service::{HttpAnalysisService, HttpTranscriptionService};
/// use setu_client::session::{new_shared_state, Session, SessionCommand, SessionServices};
///
/// # async fn example() {
/// let config = AppConfig::default();
/// let services = SessionServices {
///     analysis: Arc::new(HttpAnalysisService::from_config(&config.backend)),
///     transcription: Arc::new(HttpTranscriptionService::from_config(&config.backend)),
///     microphone: Arc::new(CpalMicrophone::from_config(&config.audio)),
///     previews: Arc::new(MemoryPreviewStore::new()),
/// };
/// let state = new_shared_state();
/// let session = Session::new(state.clone(), services, &config);
///
/// let (tx, rx) = tokio::sync::mpsc::channel(16);
/// let task = tokio::spawn(session.run(rx));
/// tx.send(SessionCommand::Submit).await.unwrap();
/// drop(tx);
/// task.await.unwrap();
/// # }
/// ```
pub struct Session {
    state: SharedState,
    events: Option<mpsc::UnboundedSender<SessionEvent>>,
    services: SessionServices,
    media: MediaCaptureManager,
    voice: VoiceCaptureController,
    submission: AnalysisSubmissionController,
    features: String,
    expected_price: Option<u64>,
    last_voice_error: Option<String>,
    completions_tx: Option<mpsc::UnboundedSender<Completion>>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
}

impl Session {
    pub fn new(state: SharedState, services: SessionServices, config: &AppConfig) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            state,
            events: None,
            media: MediaCaptureManager::new(Arc::clone(&services.previews)),
            voice: VoiceCaptureController::new(
                Arc::clone(&services.microphone),
                config.audio.sample_rate,
            ),
            submission: AnalysisSubmissionController::new(config.session.clone()),
            services,
            features: String::new(),
            expected_price: None,
            last_voice_error: None,
            completions_tx: Some(completions_tx),
            completions_rx,
        }
    }

    /// Publish [`SessionEvent`]s on `events` as well as updating the shared
    /// snapshot.
    pub fn with_events(mut self, events: mpsc::UnboundedSender<SessionEvent>) -> Self {
        self.events = Some(events);
        self
    }

    // -----------------------------------------------------------------------
    // Main async loop
    // -----------------------------------------------------------------------

    /// Run until `commands` is closed and all in-flight work has settled.
    pub async fn run(mut self, mut commands: mpsc::Receiver<SessionCommand>) {
        self.publish();
        let mut commands_open = true;

        loop {
            tokio::select! {
                command = commands.recv(), if commands_open => match command {
                    Some(command) => self.handle_command(command),
                    None => {
                        log::debug!("session: command channel closed, draining in-flight work");
                        commands_open = false;
                        // Only spawned tasks hold senders now.
                        self.completions_tx = None;
                    }
                },
                completion = self.completions_rx.recv() => match completion {
                    Some(completion) => self.handle_completion(completion),
                    None => break,
                },
            }
            self.publish();
        }

        self.voice.reset();
        self.publish();
        log::info!("session: shut down");
    }

    // -----------------------------------------------------------------------
    // Command handlers
    // -----------------------------------------------------------------------

    fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::AddFiles(files) => {
                self.media.add_files(files);
                self.images_changed();
            }
            SessionCommand::RemoveFile(index) => match self.media.remove_file(index) {
                Ok(_) => self.images_changed(),
                Err(e) => {
                    log::warn!("session: {e}");
                    self.reject(e.to_string());
                }
            },
            SessionCommand::ClearImages => {
                self.media.reset();
                self.images_changed();
            }
            SessionCommand::SetFeatures(features) => self.features = features,
            SessionCommand::SetExpectedPrice(price) => self.expected_price = price,
            SessionCommand::StartRecording => self.handle_start_recording(),
            SessionCommand::StopRecording => self.handle_stop_recording(),
            SessionCommand::Submit => self.handle_submit(),
            SessionCommand::Acknowledge => {
                let before = self.media.len();
                self.submission.acknowledge(&mut self.media);
                if self.media.len() != before {
                    self.emit(SessionEvent::ImagesChanged {
                        count: self.media.len(),
                    });
                }
            }
            SessionCommand::Reset => self.handle_reset(),
        }
    }

    fn handle_start_recording(&mut self) {
        match self.voice.start() {
            Ok(StartOutcome::Started) => {
                self.last_voice_error = None;
                self.emit(SessionEvent::RecordingStarted);
            }
            Ok(StartOutcome::AlreadyActive) => {}
            Err(e) => self.voice_failed(e),
        }
    }

    fn handle_stop_recording(&mut self) {
        match self.voice.stop() {
            Ok(Some(pending)) => {
                self.emit(SessionEvent::RecordingStopped {
                    duration_secs: pending.audio.duration_secs,
                });
                self.spawn_transcription(pending);
            }
            Ok(None) => self.reject("not recording".to_string()),
            Err(e) => self.voice_failed(e),
        }
    }

    fn handle_submit(&mut self) {
        let pending = self
            .submission
            .submit(&self.media, &self.features, self.expected_price);

        match pending {
            Some(pending) => {
                self.emit(SessionEvent::SubmissionStarted {
                    images: pending.request.files().len(),
                });
                self.spawn_analysis(pending);
            }
            None => {
                let message = format!(
                    "cannot submit while {}",
                    self.submission.state().label().to_lowercase()
                );
                self.reject(message);
            }
        }
    }

    fn handle_reset(&mut self) {
        self.voice.reset();
        if self.submission.reset(&mut self.media) {
            self.features.clear();
            self.expected_price = None;
        }
        self.last_voice_error = None;
        log::info!("session: reset");
        self.emit(SessionEvent::SessionReset);
    }

    // -----------------------------------------------------------------------
    // Completions
    // -----------------------------------------------------------------------

    fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Analysis { ticket, outcome } => {
                if self.submission.resolve(ticket, outcome) == Resolution::Applied {
                    self.emit(SessionEvent::AnalysisFinished(
                        self.submission.state().clone(),
                    ));
                }
            }
            Completion::Transcription { ticket, outcome } => {
                match self.voice.resolve(ticket, outcome, &mut self.features) {
                    Ok(TranscriptionResolution::Merged(text)) => {
                        self.emit(SessionEvent::TranscriptionFinished { merged: Some(text) })
                    }
                    Ok(TranscriptionResolution::Blank) => {
                        log::info!("session: transcription was blank");
                        self.emit(SessionEvent::TranscriptionFinished { merged: None })
                    }
                    Ok(TranscriptionResolution::Stale) => {}
                    Err(e) => self.voice_failed(e),
                }
            }
        }
    }

    fn spawn_analysis(&self, pending: PendingSubmission) {
        let Some(tx) = self.completions_tx.clone() else {
            return;
        };
        let service = Arc::clone(&self.services.analysis);

        tokio::spawn(async move {
            let PendingSubmission {
                ticket,
                request,
                cancel,
            } = pending;

            tokio::select! {
                _ = cancel.cancelled() => {
                    log::debug!("session: analysis {ticket:?} cancelled");
                }
                outcome = service.analyze(&request) => {
                    let _ = tx.send(Completion::Analysis { ticket, outcome });
                }
            }
        });
    }

    fn spawn_transcription(&self, pending: PendingTranscription) {
        let Some(tx) = self.completions_tx.clone() else {
            return;
        };
        let service = Arc::clone(&self.services.transcription);

        tokio::spawn(async move {
            let outcome = service.transcribe(&pending.audio).await;
            let _ = tx.send(Completion::Transcription {
                ticket: pending.ticket,
                outcome,
            });
        });
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn images_changed(&mut self) {
        self.submission.sync_batch(self.media.len());
        self.emit(SessionEvent::ImagesChanged {
            count: self.media.len(),
        });
    }

    fn voice_failed(&mut self, e: VoiceError) {
        log::warn!("session: voice capture failed: {e}");
        let message = e.to_string();
        self.last_voice_error = Some(message.clone());
        self.emit(SessionEvent::VoiceFailed { message });
    }

    fn reject(&self, message: String) {
        log::debug!("session: rejected command: {message}");
        self.emit(SessionEvent::CommandRejected { message });
    }

    fn emit(&self, event: SessionEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }

    fn publish(&self) {
        let view = SessionView {
            images: self
                .media
                .iter()
                .map(|image| ImageSummary {
                    file_name: image.payload().file_name().to_string(),
                    mime_type: image.payload().mime_type().to_string(),
                    size: image.payload().len(),
                    preview: image.preview_id().clone(),
                })
                .collect(),
            features: self.features.clone(),
            expected_price: self.expected_price,
            voice: self.voice.state(),
            submission: self.submission.state().clone(),
            last_voice_error: self.last_voice_error.clone(),
        };
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = view;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
