//! Shared test doubles for the voice pipeline
//!
//! Scriptable service mocks so orchestrator behavior can be exercised
//! without audio hardware or network access.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use aura_voice::audio::{AudioClip, PlaybackSink, samples_to_wav};
use aura_voice::services::{
    IntentChunk, IntentChunkStream, IntentReply, IntentService, SpeechSynthesizer, Transcriber,
};
use aura_voice::{Error, Result, SAMPLE_RATE};

/// A small valid WAV clip, as the capture controller would emit
pub fn sample_clip() -> AudioClip {
    let samples: Vec<f32> = (0..800)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            0.3 * (2.0 * std::f32::consts::PI * 440.0 * t).sin()
        })
        .collect();
    AudioClip::wav(samples_to_wav(&samples, SAMPLE_RATE).unwrap())
}

/// Scripted transcription service
pub struct MockTranscriber {
    transcript: Option<String>,
    delay: Duration,
    pub calls: Arc<AtomicUsize>,
}

impl MockTranscriber {
    pub fn ok(transcript: &str) -> Self {
        Self {
            transcript: Some(transcript.to_string()),
            delay: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing() -> Self {
        Self {
            transcript: None,
            delay: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl Transcriber for MockTranscriber {
    async fn transcribe(&self, audio_data_uri: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        // The orchestrator always hands us a well-formed data URI
        AudioClip::from_data_uri(audio_data_uri)?;

        tokio::time::sleep(self.delay).await;
        self.transcript
            .clone()
            .ok_or_else(|| Error::Stt("transcription unavailable".to_string()))
    }
}

/// Scripted interpretation service (batch reply and/or chunk sequence)
pub struct MockIntent {
    reply: Option<IntentReply>,
    chunks: Vec<IntentChunk>,
    fail_stream: bool,
    delay: Duration,
    pub calls: Arc<AtomicUsize>,
}

impl MockIntent {
    pub fn replying(response_text: &str, understood: bool) -> Self {
        Self {
            reply: Some(IntentReply {
                response_text: response_text.to_string(),
                understood,
            }),
            chunks: Vec::new(),
            fail_stream: false,
            delay: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            chunks: Vec::new(),
            fail_stream: true,
            delay: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn streaming(chunks: Vec<IntentChunk>) -> Self {
        Self {
            reply: None,
            chunks,
            fail_stream: false,
            delay: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Scripted chunks: cumulative snapshots, the last one marked final
    pub fn snapshots(transcript: &str, parts: &[&str]) -> Vec<IntentChunk> {
        let mut chunks: Vec<IntentChunk> = parts
            .iter()
            .map(|part| IntentChunk {
                transcript: transcript.to_string(),
                response_snapshot: (*part).to_string(),
                is_final: false,
            })
            .collect();

        if let Some(last) = parts.last() {
            chunks.push(IntentChunk {
                transcript: transcript.to_string(),
                response_snapshot: (*last).to_string(),
                is_final: true,
            });
        }
        chunks
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl IntentService for MockIntent {
    async fn interpret(&self, _transcript: &str) -> Result<IntentReply> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.reply
            .clone()
            .ok_or_else(|| Error::Intent("interpretation unavailable".to_string()))
    }

    async fn interpret_stream(&self, _transcript: &str) -> Result<IntentChunkStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;

        if self.fail_stream && self.chunks.is_empty() {
            return Err(Error::Intent("interpretation unavailable".to_string()));
        }

        let mut items: Vec<Result<IntentChunk>> =
            self.chunks.iter().cloned().map(Ok).collect();
        if self.fail_stream {
            items.push(Err(Error::Intent("stream broke mid-flight".to_string())));
        }

        Ok(Box::pin(futures::stream::iter(items)))
    }
}

/// Scripted synthesis service
pub struct MockSynthesizer {
    fail: bool,
    delay: Duration,
    pub calls: Arc<AtomicUsize>,
}

impl MockSynthesizer {
    pub fn ok() -> Self {
        Self {
            fail: false,
            delay: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            delay: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl SpeechSynthesizer for MockSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<AudioClip> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;

        if self.fail {
            return Err(Error::Tts("synthesis unavailable".to_string()));
        }
        Ok(AudioClip::mp3(text.as_bytes().to_vec()))
    }
}

/// Playback sink that records what it was asked to play
pub struct RecordingPlayback {
    fail: bool,
    pub played: Mutex<Vec<AudioClip>>,
}

impl RecordingPlayback {
    pub fn ok() -> Self {
        Self {
            fail: false,
            played: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            played: Mutex::new(Vec::new()),
        }
    }

    pub fn play_count(&self) -> usize {
        self.played.lock().unwrap().len()
    }
}

impl PlaybackSink for RecordingPlayback {
    fn play(&self, clip: AudioClip) -> Result<()> {
        if self.fail {
            return Err(Error::Playback("sink rejected the clip".to_string()));
        }
        self.played.lock().unwrap().push(clip);
        Ok(())
    }
}
