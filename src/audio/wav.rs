//! Voice-note packaging: accumulated chunks → one mono 16-bit WAV payload.

use std::io::Cursor;

use super::capture::AudioChunk;
use super::resample::{downmix_to_mono, resample};

/// File name the transcription endpoint receives for every voice note.
pub const VOICE_NOTE_FILE_NAME: &str = "voice_note.wav";
/// MIME type of [`VOICE_NOTE_FILE_NAME`].
pub const VOICE_NOTE_MIME: &str = "audio/wav";

/// A finished recording, ready for upload.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioPayload {
    pub file_name: String,
    pub mime_type: String,
    /// Complete WAV file bytes.
    pub data: Vec<u8>,
    /// Length of the recording in seconds.
    pub duration_secs: f32,
}

/// Downmix, resample and encode `chunks` into a single WAV voice note.
///
/// Empty chunks are skipped.  Consecutive chunks at the same rate are
/// joined before resampling, so chunk boundaries neither add samples nor
/// break the interpolation.  No chunks at all still produce a valid,
/// zero-length WAV file.
pub fn package_voice_note(
    chunks: &[AudioChunk],
    target_rate: u32,
) -> Result<AudioPayload, hound::Error> {
    let mut samples = Vec::new();
    let mut run: Vec<f32> = Vec::new();
    let mut run_rate: Option<u32> = None;

    for chunk in chunks.iter().filter(|c| !c.samples.is_empty()) {
        if let Some(rate) = run_rate.filter(|&rate| rate != chunk.sample_rate) {
            samples.extend(resample(&run, rate, target_rate));
            run.clear();
        }
        run_rate = Some(chunk.sample_rate);
        run.extend(downmix_to_mono(&chunk.samples, chunk.channels));
    }
    if let Some(rate) = run_rate {
        samples.extend(resample(&run, rate, target_rate));
    }

    let data = encode_wav(&samples, target_rate)?;
    let duration_secs = if target_rate == 0 {
        0.0
    } else {
        samples.len() as f32 / target_rate as f32
    };

    Ok(AudioPayload {
        file_name: VOICE_NOTE_FILE_NAME.to_string(),
        mime_type: VOICE_NOTE_MIME.to_string(),
        data,
        duration_secs,
    })
}

/// Encode mono `f32` samples in `[-1.0, 1.0]` as 16-bit PCM WAV.
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>, hound::Error> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for &s in samples {
            let pcm = (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            writer.write_sample(pcm)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}
