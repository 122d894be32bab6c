//! Voice capture state machine.
//!
//! ```text
//! Idle ──start()──▶ Recording ──stop()──▶ Processing ──resolve()──▶ Idle
//!   ▲                   │                     │
//!   └──── reset() ──────┴─────────────────────┘
//! ```
//!
//! The controller owns the microphone stream for exactly the `Recording`
//! interval.  `stop()` releases it before handing the packaged voice note
//! back to the caller, who performs the upload and later feeds the outcome
//! into [`VoiceCaptureController::resolve`].  Every upload carries a
//! [`VoiceTicket`]; outcomes for any ticket other than the outstanding one
//! are discarded.

use std::sync::Arc;

use super::microphone::{Microphone, MicrophoneStream, VoiceError};
use crate::audio::{package_voice_note, AudioPayload};
use crate::service::ServiceError;

// ---------------------------------------------------------------------------
// VoiceState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VoiceState {
    /// No microphone held, nothing in flight.
    #[default]
    Idle,
    /// Microphone held; audio is accumulating.
    Recording,
    /// Microphone released; transcription in flight.
    Processing,
}

impl VoiceState {
    /// `true` while a new recording cannot be started.
    pub fn is_busy(&self) -> bool {
        !matches!(self, VoiceState::Idle)
    }

    pub fn label(&self) -> &'static str {
        match self {
            VoiceState::Idle => "Idle",
            VoiceState::Recording => "Recording",
            VoiceState::Processing => "Transcribing",
        }
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Identifies one transcription round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceTicket(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    /// A recording or transcription is already under way; nothing changed.
    AlreadyActive,
}

/// A packaged voice note waiting to be uploaded.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingTranscription {
    pub ticket: VoiceTicket,
    pub audio: AudioPayload,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptionResolution {
    /// The trimmed text that was merged into the features field.
    Merged(String),
    /// The backend heard nothing; the field is untouched.
    Blank,
    /// The ticket was no longer current; the outcome was dropped.
    Stale,
}

// ---------------------------------------------------------------------------
// VoiceCaptureController
// ---------------------------------------------------------------------------

pub struct VoiceCaptureController {
    microphone: Arc<dyn Microphone>,
    sample_rate: u32,
    state: VoiceState,
    stream: Option<Box<dyn MicrophoneStream>>,
    next_ticket: u64,
    outstanding: Option<VoiceTicket>,
}

impl VoiceCaptureController {
    /// `sample_rate` is the rate of the packaged voice note, not of the device.
    pub fn new(microphone: Arc<dyn Microphone>, sample_rate: u32) -> Self {
        Self {
            microphone,
            sample_rate,
            state: VoiceState::Idle,
            stream: None,
            next_ticket: 0,
            outstanding: None,
        }
    }

    pub fn state(&self) -> VoiceState {
        self.state
    }

    /// Acquire the microphone and begin recording.
    ///
    /// On failure the controller stays `Idle` and nothing is held.
    pub fn start(&mut self) -> Result<StartOutcome, VoiceError> {
        if self.state.is_busy() {
            log::debug!("voice: start ignored while {}", self.state.label());
            return Ok(StartOutcome::AlreadyActive);
        }

        match self.microphone.open() {
            Ok(stream) => {
                self.stream = Some(stream);
                self.state = VoiceState::Recording;
                log::debug!("voice: Idle → Recording");
                Ok(StartOutcome::Started)
            }
            Err(e) => {
                log::warn!("voice: could not start recording: {e}");
                Err(e)
            }
        }
    }

    /// Release the microphone and package what was captured.
    ///
    /// Returns `Ok(None)` when not recording.  The microphone is released
    /// even if packaging fails, in which case the controller returns to
    /// `Idle`.
    pub fn stop(&mut self) -> Result<Option<PendingTranscription>, VoiceError> {
        if self.state != VoiceState::Recording {
            log::debug!("voice: stop ignored while {}", self.state.label());
            return Ok(None);
        }

        let chunks = match self.stream.take() {
            Some(stream) => stream.finish(),
            None => Vec::new(),
        };

        let audio = match package_voice_note(&chunks, self.sample_rate) {
            Ok(audio) => audio,
            Err(e) => {
                self.state = VoiceState::Idle;
                log::warn!("voice: packaging failed: {e}");
                return Err(VoiceError::Encode(e.to_string()));
            }
        };

        self.next_ticket += 1;
        let ticket = VoiceTicket(self.next_ticket);
        self.outstanding = Some(ticket);
        self.state = VoiceState::Processing;
        log::debug!(
            "voice: Recording → Processing ({} chunks, {:.2}s)",
            chunks.len(),
            audio.duration_secs
        );

        Ok(Some(PendingTranscription { ticket, audio }))
    }

    /// Apply a transcription outcome.
    ///
    /// Successful text is merged into `features`; failures are returned
    /// without touching it.  Either way the controller is `Idle` afterwards,
    /// unless the ticket is stale, in which case nothing changes.
    pub fn resolve(
        &mut self,
        ticket: VoiceTicket,
        outcome: Result<String, ServiceError>,
        features: &mut String,
    ) -> Result<TranscriptionResolution, VoiceError> {
        if self.outstanding != Some(ticket) {
            log::debug!("voice: dropping stale transcription {ticket:?}");
            return Ok(TranscriptionResolution::Stale);
        }

        self.outstanding = None;
        self.state = VoiceState::Idle;
        log::debug!("voice: Processing → Idle");

        let text = outcome.map_err(VoiceError::from)?;
        if merge_transcript(features, &text) {
            Ok(TranscriptionResolution::Merged(text.trim().to_string()))
        } else {
            Ok(TranscriptionResolution::Blank)
        }
    }

    /// Release any held microphone and forget the outstanding upload.
    pub fn reset(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            log::debug!("voice: recording abandoned by reset");
        }
        self.outstanding = None;
        self.state = VoiceState::Idle;
    }
}

/// Merge transcribed text into the features field.
///
/// Appends after a single space when the field already has content,
/// otherwise replaces it.  Whitespace-only text is ignored; returns whether
/// the field changed.
pub fn merge_transcript(field: &mut String, text: &str) -> bool {
    let text = text.trim();
    if text.is_empty() {
        return false;
    }
    if field.is_empty() {
        field.push_str(text);
    } else {
        field.push(' ');
        field.push_str(text);
    }
    true
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioChunk;
    use crate::voice::MockMicrophone;

    fn controller(mic: &Arc<MockMicrophone>) -> VoiceCaptureController {
        let mic: Arc<dyn Microphone> = Arc::clone(mic) as Arc<dyn Microphone>;
        VoiceCaptureController::new(mic, 16_000)
    }

    fn tone_chunk() -> AudioChunk {
        AudioChunk {
            samples: vec![0.25; 1_600],
            sample_rate: 16_000,
            channels: 1,
        }
    }

    // ---- merge_transcript ---

    #[test]
    fn merge_into_empty_field_replaces() {
        let mut field = String::new();
        assert!(merge_transcript(&mut field, "hand embroidered"));
        assert_eq!(field, "hand embroidered");
    }

    #[test]
    fn merge_appends_with_single_space() {
        let mut field = "soft cotton".to_string();
        assert!(merge_transcript(&mut field, "  blue dye "));
        assert_eq!(field, "soft cotton blue dye");
    }

    #[test]
    fn blank_transcript_is_ignored() {
        let mut field = "soft cotton".to_string();
        assert!(!merge_transcript(&mut field, "   "));
        assert_eq!(field, "soft cotton");
    }

    // ---- start / stop ---

    #[test]
    fn start_stop_with_zero_chunks_releases_once() {
        let mic = Arc::new(MockMicrophone::silent());
        let mut voice = controller(&mic);

        assert_eq!(voice.start().unwrap(), StartOutcome::Started);
        assert_eq!(voice.state(), VoiceState::Recording);

        let pending = voice.stop().unwrap().expect("pending upload");
        assert_eq!(voice.state(), VoiceState::Processing);
        assert_eq!(mic.released(), 1);
        assert_eq!(pending.audio.duration_secs, 0.0);
        assert_eq!(pending.audio.file_name, "voice_note.wav");

        let mut features = String::new();
        let resolution = voice
            .resolve(pending.ticket, Ok(String::new()), &mut features)
            .unwrap();
        assert_eq!(resolution, TranscriptionResolution::Blank);
        assert_eq!(voice.state(), VoiceState::Idle);
        assert_eq!(mic.released(), 1);
    }

    #[test]
    fn stop_releases_before_upload() {
        let mic = Arc::new(MockMicrophone::with_chunks(vec![tone_chunk()]));
        let mut voice = controller(&mic);
        voice.start().unwrap();

        let pending = voice.stop().unwrap().expect("pending upload");
        // Still Processing, but the device is already free.
        assert_eq!(voice.state(), VoiceState::Processing);
        assert_eq!(mic.released(), 1);
        assert!((pending.audio.duration_secs - 0.1).abs() < 1e-6);
    }

    #[test]
    fn start_while_busy_is_noop() {
        let mic = Arc::new(MockMicrophone::silent());
        let mut voice = controller(&mic);
        voice.start().unwrap();
        assert_eq!(voice.start().unwrap(), StartOutcome::AlreadyActive);

        voice.stop().unwrap();
        assert_eq!(voice.start().unwrap(), StartOutcome::AlreadyActive);
        assert_eq!(mic.opened(), 1);
    }

    #[test]
    fn stop_when_idle_is_noop() {
        let mic = Arc::new(MockMicrophone::silent());
        let mut voice = controller(&mic);
        assert!(voice.stop().unwrap().is_none());
        assert_eq!(voice.state(), VoiceState::Idle);
    }

    #[test]
    fn permission_denied_leaves_idle() {
        let mic = Arc::new(MockMicrophone::failing(VoiceError::PermissionDenied(
            "blocked".into(),
        )));
        let mut voice = controller(&mic);

        assert!(matches!(voice.start(), Err(VoiceError::PermissionDenied(_))));
        assert_eq!(voice.state(), VoiceState::Idle);
        assert_eq!(mic.released(), 0);
    }

    // ---- resolve ---

    #[test]
    fn success_merges_into_features() {
        let mic = Arc::new(MockMicrophone::with_chunks(vec![tone_chunk()]));
        let mut voice = controller(&mic);
        voice.start().unwrap();
        let pending = voice.stop().unwrap().unwrap();

        let mut features = "soft cotton".to_string();
        let resolution = voice
            .resolve(pending.ticket, Ok("blue dye".into()), &mut features)
            .unwrap();

        assert_eq!(resolution, TranscriptionResolution::Merged("blue dye".into()));
        assert_eq!(features, "soft cotton blue dye");
    }

    #[test]
    fn failure_leaves_features_and_returns_idle() {
        let mic = Arc::new(MockMicrophone::silent());
        let mut voice = controller(&mic);
        voice.start().unwrap();
        let pending = voice.stop().unwrap().unwrap();

        let mut features = "soft cotton".to_string();
        let err = voice
            .resolve(
                pending.ticket,
                Err(ServiceError::Network("refused".into())),
                &mut features,
            )
            .unwrap_err();

        assert!(matches!(err, VoiceError::Network(_)));
        assert_eq!(features, "soft cotton");
        assert_eq!(voice.state(), VoiceState::Idle);
    }

    #[test]
    fn late_transcription_after_reset_is_stale() {
        let mic = Arc::new(MockMicrophone::silent());
        let mut voice = controller(&mic);
        voice.start().unwrap();
        let pending = voice.stop().unwrap().unwrap();

        voice.reset();

        let mut features = String::new();
        let resolution = voice
            .resolve(pending.ticket, Ok("too late".into()), &mut features)
            .unwrap();
        assert_eq!(resolution, TranscriptionResolution::Stale);
        assert!(features.is_empty());
    }

    #[test]
    fn old_ticket_is_stale_after_new_recording() {
        let mic = Arc::new(MockMicrophone::silent());
        let mut voice = controller(&mic);

        voice.start().unwrap();
        let first = voice.stop().unwrap().unwrap();
        voice.reset();
        voice.start().unwrap();
        let second = voice.stop().unwrap().unwrap();
        assert_ne!(first.ticket, second.ticket);

        let mut features = String::new();
        assert_eq!(
            voice
                .resolve(first.ticket, Ok("old".into()), &mut features)
                .unwrap(),
            TranscriptionResolution::Stale
        );
        assert_eq!(voice.state(), VoiceState::Processing);
    }

    #[test]
    fn reset_while_recording_releases_microphone() {
        let mic = Arc::new(MockMicrophone::silent());
        let mut voice = controller(&mic);
        voice.start().unwrap();

        voice.reset();
        assert_eq!(mic.released(), 1);
        assert_eq!(voice.state(), VoiceState::Idle);
    }

    #[test]
    fn drop_while_recording_releases_microphone() {
        let mic = Arc::new(MockMicrophone::silent());
        {
            let mut voice = controller(&mic);
            voice.start().unwrap();
        }
        assert_eq!(mic.released(), 1);
    }
}
