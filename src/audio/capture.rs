//! Microphone capture via `cpal`.
//!
//! [`CpalMicrophone`] implements [`Microphone`]: each `open()` call claims
//! the input device on a dedicated `mic-capture` thread and accumulates
//! [`AudioChunk`]s until the returned stream is finished or dropped.  The
//! cpal stream never leaves that thread, so the handle the voice controller
//! holds is `Send` on every platform.

use std::sync::mpsc as std_mpsc;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::config::AudioConfig;
use crate::voice::{Microphone, MicrophoneStream, VoiceError};

// ---------------------------------------------------------------------------
// AudioChunk
// ---------------------------------------------------------------------------

/// A single buffer of raw audio as delivered by the capture callback.
///
/// Samples are interleaved `f32` in the range `[-1.0, 1.0]`.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    /// Interleaved PCM samples in `[-1.0, 1.0]`.
    pub samples: Vec<f32>,
    /// Sample rate of this chunk in Hz (e.g. 44100, 48000).
    pub sample_rate: u32,
    /// Number of interleaved channels (1 = mono, 2 = stereo, …).
    pub channels: u16,
}

type ChunkSink = Arc<Mutex<Vec<AudioChunk>>>;

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

/// Map a cpal error onto the microphone taxonomy.
///
/// cpal reports OS permission refusals as backend-specific errors, so the
/// message text is the only signal available.
fn classify(err: impl std::fmt::Display) -> VoiceError {
    let message = err.to_string();
    let lower = message.to_lowercase();
    if lower.contains("permission") || lower.contains("denied") || lower.contains("not authorized")
    {
        VoiceError::PermissionDenied(message)
    } else {
        VoiceError::DeviceUnavailable(message)
    }
}

// ---------------------------------------------------------------------------
// CpalMicrophone
// ---------------------------------------------------------------------------

/// Microphone backed by the default cpal host.
#[derive(Debug, Clone)]
pub struct CpalMicrophone {
    device_name: Option<String>,
    max_recording_secs: f32,
}

impl CpalMicrophone {
    pub fn from_config(config: &AudioConfig) -> Self {
        Self {
            device_name: config.input_device.clone(),
            max_recording_secs: config.max_recording_secs,
        }
    }
}

impl Microphone for CpalMicrophone {
    fn open(&self) -> Result<Box<dyn MicrophoneStream>, VoiceError> {
        let chunks: ChunkSink = Arc::new(Mutex::new(Vec::new()));
        let (ready_tx, ready_rx) = std_mpsc::channel::<Result<(), VoiceError>>();
        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();

        let device_name = self.device_name.clone();
        let max_secs = self.max_recording_secs;
        let sink = Arc::clone(&chunks);

        let thread = std::thread::Builder::new()
            .name("mic-capture".into())
            .spawn(move || {
                let stream = match build_stream(device_name.as_deref(), max_secs, sink) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));

                // Blocks until stop is requested or the handle is dropped.
                let _ = stop_rx.recv();
                drop(stream);
            })
            .map_err(|e| VoiceError::DeviceUnavailable(format!("capture thread: {e}")))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                log::info!("voice: microphone acquired");
                Ok(Box::new(CpalStream {
                    stop_tx: Some(stop_tx),
                    thread: Some(thread),
                    chunks,
                }))
            }
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(VoiceError::DeviceUnavailable(
                    "capture thread exited before the stream started".into(),
                ))
            }
        }
    }
}

fn select_device(host: &cpal::Host, name: Option<&str>) -> Result<cpal::Device, VoiceError> {
    let Some(wanted) = name else {
        return host
            .default_input_device()
            .ok_or_else(|| VoiceError::DeviceUnavailable("no input device found".into()));
    };

    let devices = host.input_devices().map_err(classify)?;
    for device in devices {
        if device.name().map(|n| n == wanted).unwrap_or(false) {
            return Ok(device);
        }
    }
    Err(VoiceError::DeviceUnavailable(format!(
        "input device {wanted:?} not found"
    )))
}

fn build_stream(
    device_name: Option<&str>,
    max_recording_secs: f32,
    sink: ChunkSink,
) -> Result<cpal::Stream, VoiceError> {
    let host = cpal::default_host();
    let device = select_device(&host, device_name)?;

    let supported = device.default_input_config().map_err(classify)?;
    let channels = supported.channels();
    let sample_rate = supported.sample_rate().0;
    let config: cpal::StreamConfig = supported.into();

    let max_samples =
        (max_recording_secs.max(0.0) * sample_rate as f32) as usize * channels as usize;
    let mut captured = 0usize;
    let mut truncated = false;

    let stream = device
        .build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                if data.is_empty() {
                    return;
                }
                if captured >= max_samples {
                    if !truncated {
                        truncated = true;
                        log::warn!("voice: recording limit reached, dropping further audio");
                    }
                    return;
                }
                let take = data.len().min(max_samples - captured);
                captured += take;
                sink.lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(AudioChunk {
                        samples: data[..take].to_vec(),
                        sample_rate,
                        channels,
                    });
            },
            |err: cpal::StreamError| {
                log::error!("cpal stream error: {err}");
            },
            None,
        )
        .map_err(classify)?;

    stream.play().map_err(classify)?;
    log::debug!("voice: capture stream running ({sample_rate} Hz, {channels} ch)");
    Ok(stream)
}

// ---------------------------------------------------------------------------
// CpalStream
// ---------------------------------------------------------------------------

/// Live capture.  Finishing or dropping it stops the cpal stream and joins
/// the capture thread; the second of the two is a no-op.
struct CpalStream {
    stop_tx: Option<std_mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
    chunks: ChunkSink,
}

impl CpalStream {
    fn release(&mut self) {
        let Some(stop_tx) = self.stop_tx.take() else {
            return;
        };
        let _ = stop_tx.send(());
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("voice: capture thread panicked");
            }
        }
        log::info!("voice: microphone released");
    }
}

impl MicrophoneStream for CpalStream {
    fn finish(mut self: Box<Self>) -> Vec<AudioChunk> {
        self.release();
        let mut chunks = self.chunks.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *chunks)
    }
}

impl Drop for CpalStream {
    fn drop(&mut self) {
        self.release();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
