//! Audio playback to speakers
//!
//! One shared output sink for the whole process. Playback requests are not
//! queued: the latest clip wins and interrupts whatever is playing.

use std::io::Cursor;
use std::sync::mpsc::{Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex, mpsc};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};

use super::AudioClip;
use crate::{Error, Result};

/// Sample rate for playback (matches common TTS output)
const PLAYBACK_SAMPLE_RATE: u32 = 24000;

/// Poll interval while waiting for a clip to finish
const POLL_INTERVAL: std::time::Duration = std::time::Duration::from_millis(50);

/// Audio output abstraction
///
/// `play` hands the sink a new active clip; a clip already playing is
/// interrupted, not queued behind.
pub trait PlaybackSink: Send + Sync {
    /// Start playing the clip, replacing any current playback
    ///
    /// # Errors
    ///
    /// Returns error if the clip cannot be decoded or the sink is gone
    fn play(&self, clip: AudioClip) -> Result<()>;
}

/// Plays clips on the default output device via a resident playback thread
pub struct AudioPlayback {
    jobs: Sender<Vec<f32>>,
}

impl AudioPlayback {
    /// Create the playback sink and spawn its thread
    ///
    /// # Errors
    ///
    /// Returns error if no usable output device is present
    pub fn new() -> Result<Self> {
        let config = resolve_output_config()?;
        let (jobs, rx) = mpsc::channel::<Vec<f32>>();

        std::thread::Builder::new()
            .name("audio-playback".to_string())
            .spawn(move || run_playback_thread(&rx, &config))
            .map_err(|e| Error::Playback(e.to_string()))?;

        Ok(Self { jobs })
    }
}

impl PlaybackSink for AudioPlayback {
    fn play(&self, clip: AudioClip) -> Result<()> {
        let samples = decode_clip(&clip)?;
        if samples.is_empty() {
            return Ok(());
        }

        self.jobs
            .send(samples)
            .map_err(|_| Error::Playback("playback thread is gone".to_string()))
    }
}

/// Find a mono (or stereo fallback) output config at the playback rate
fn resolve_output_config() -> Result<StreamConfig> {
    let host = cpal::default_host();

    let device = host
        .default_output_device()
        .ok_or_else(|| Error::Playback("no output device available".to_string()))?;

    let supported_config = device
        .supported_output_configs()
        .map_err(|e| Error::Playback(e.to_string()))?
        .find(|c| {
            c.channels() == 1
                && c.min_sample_rate() <= SampleRate(PLAYBACK_SAMPLE_RATE)
                && c.max_sample_rate() >= SampleRate(PLAYBACK_SAMPLE_RATE)
        })
        .or_else(|| {
            // Fallback: try stereo
            device.supported_output_configs().ok()?.find(|c| {
                c.channels() == 2
                    && c.min_sample_rate() <= SampleRate(PLAYBACK_SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(PLAYBACK_SAMPLE_RATE)
            })
        })
        .ok_or_else(|| Error::Playback("no suitable output config found".to_string()))?;

    let config = supported_config
        .with_sample_rate(SampleRate(PLAYBACK_SAMPLE_RATE))
        .config();

    tracing::debug!(
        device = device.name().unwrap_or_default(),
        sample_rate = PLAYBACK_SAMPLE_RATE,
        channels = config.channels,
        "audio playback initialized"
    );

    Ok(config)
}

/// Drain jobs forever; each new job preempts the one playing
fn run_playback_thread(rx: &Receiver<Vec<f32>>, config: &StreamConfig) {
    let mut pending: Option<Vec<f32>> = None;

    loop {
        let samples = match pending.take() {
            Some(s) => s,
            None => match rx.recv() {
                Ok(s) => s,
                Err(_) => return,
            },
        };

        match play_until_done_or_preempted(&samples, config, rx) {
            Ok(next) => pending = next,
            Err(e) => tracing::error!(error = %e, "playback failed"),
        }
    }
}

/// Play samples to completion, returning early with the preempting job if one
/// arrives
fn play_until_done_or_preempted(
    samples: &[f32],
    config: &StreamConfig,
    rx: &Receiver<Vec<f32>>,
) -> Result<Option<Vec<f32>>> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| Error::Playback("no output device".to_string()))?;

    let channels = config.channels as usize;

    let source = Arc::new(samples.to_vec());
    let position = Arc::new(Mutex::new(0usize));
    let finished = Arc::new(Mutex::new(false));

    let source_cb = Arc::clone(&source);
    let position_cb = Arc::clone(&position);
    let finished_cb = Arc::clone(&finished);

    let stream = device
        .build_output_stream(
            config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let Ok(mut pos) = position_cb.lock() else {
                    return;
                };

                for frame in data.chunks_mut(channels) {
                    let sample = if *pos < source_cb.len() {
                        source_cb[*pos]
                    } else {
                        if let Ok(mut done) = finished_cb.lock() {
                            *done = true;
                        }
                        0.0
                    };

                    for out in frame.iter_mut() {
                        *out = sample;
                    }

                    if *pos < source_cb.len() {
                        *pos += 1;
                    }
                }
            },
            |err| {
                tracing::error!(error = %err, "output stream error");
            },
            None,
        )
        .map_err(|e| Error::Playback(e.to_string()))?;

    stream.play().map_err(|e| Error::Playback(e.to_string()))?;

    let duration_ms = (source.len() as u64 * 1000) / u64::from(PLAYBACK_SAMPLE_RATE);
    let start = std::time::Instant::now();
    let timeout = std::time::Duration::from_millis(duration_ms + 500);

    loop {
        match rx.try_recv() {
            // Latest request wins: drop the stream mid-clip
            Ok(next) => {
                tracing::debug!("playback preempted by new clip");
                return Ok(Some(next));
            }
            Err(TryRecvError::Disconnected) => return Ok(None),
            Err(TryRecvError::Empty) => {}
        }

        if finished.lock().map(|done| *done).unwrap_or(true) || start.elapsed() > timeout {
            break;
        }

        std::thread::sleep(POLL_INTERVAL);
    }

    // Small delay to let the device drain
    std::thread::sleep(std::time::Duration::from_millis(100));

    drop(stream);
    tracing::debug!(samples = source.len(), "playback complete");

    Ok(None)
}

/// Decode an encoded clip to f32 samples by MIME type
fn decode_clip(clip: &AudioClip) -> Result<Vec<f32>> {
    match clip.mime.as_str() {
        "audio/mpeg" | "audio/mp3" => decode_mp3(&clip.bytes),
        "audio/wav" | "audio/x-wav" => decode_wav(&clip.bytes),
        other => Err(Error::Playback(format!("unsupported clip format: {other}"))),
    }
}

/// Decode MP3 bytes to f32 samples
fn decode_mp3(mp3_data: &[u8]) -> Result<Vec<f32>> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut samples = Vec::new();

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                // Convert i16 samples to f32 and handle stereo to mono
                let frame_samples: Vec<f32> = if frame.channels == 2 {
                    // Stereo: average channels
                    frame
                        .data
                        .chunks(2)
                        .map(|chunk| {
                            let left = f32::from(chunk[0]) / 32768.0;
                            let right =
                                f32::from(chunk.get(1).copied().unwrap_or(chunk[0])) / 32768.0;
                            f32::midpoint(left, right)
                        })
                        .collect()
                } else {
                    // Mono
                    frame.data.iter().map(|&s| f32::from(s) / 32768.0).collect()
                };

                samples.extend(frame_samples);
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Playback(format!("MP3 decode error: {e}"))),
        }
    }

    Ok(samples)
}

/// Decode 16-bit WAV bytes to f32 samples
fn decode_wav(wav_data: &[u8]) -> Result<Vec<f32>> {
    let mut reader = hound::WavReader::new(Cursor::new(wav_data))
        .map_err(|e| Error::Playback(format!("WAV decode error: {e}")))?;

    reader
        .samples::<i16>()
        .map(|s| {
            s.map(|v| f32::from(v) / 32768.0)
                .map_err(|e| Error::Playback(format!("WAV decode error: {e}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::samples_to_wav;

    #[test]
    fn wav_decode_round_trips_samples() {
        let original = vec![0.0f32, 0.5, -0.5, 0.25];
        let wav = samples_to_wav(&original, PLAYBACK_SAMPLE_RATE).unwrap();
        let decoded = decode_wav(&wav).unwrap();

        assert_eq!(decoded.len(), original.len());
        for (a, b) in decoded.iter().zip(&original) {
            assert!((a - b).abs() < 0.001);
        }
    }

    #[test]
    fn unknown_mime_is_rejected() {
        let clip = AudioClip {
            bytes: vec![0, 1, 2],
            mime: "audio/flac".to_string(),
        };
        assert!(decode_clip(&clip).is_err());
    }
}
