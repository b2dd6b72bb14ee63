//! External AI service contracts
//!
//! Transcription, intent interpretation, and speech synthesis are opaque
//! network collaborators. Each concern is a trait so the pipeline can be
//! exercised against mocks; the provider implementations live in the
//! per-vendor submodules.

mod deepgram;
mod elevenlabs;
mod openai;
pub mod sse;

pub use deepgram::DeepgramTranscriber;
pub use elevenlabs::ElevenLabsSynthesizer;
pub use openai::{ChatIntent, OpenAiSynthesizer, WhisperTranscriber};

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::Result;
use crate::audio::AudioClip;

/// Interpreted reply for one utterance (batch contract)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentReply {
    /// Assistant response, phrased for speech
    pub response_text: String,
    /// False when the command was unclear or out of capability
    pub understood: bool,
}

/// One incremental record from a streamed interpretation
///
/// Snapshots are cumulative: each `response_snapshot` contains everything
/// delivered so far. The `transcript` is constant across one call's sequence,
/// and exactly one record carries `is_final`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentChunk {
    /// Transcript the interpretation was run against
    pub transcript: String,
    /// Cumulative response text so far
    pub response_snapshot: String,
    /// True on the terminating record
    pub is_final: bool,
}

/// Ordered stream of interpretation snapshots
pub type IntentChunkStream = Pin<Box<dyn Stream<Item = Result<IntentChunk>> + Send>>;

/// Transcribes a captured clip to text
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe audio given as a base64 data URI with MIME type
    ///
    /// # Errors
    ///
    /// Returns error if the URI is malformed or transcription fails
    async fn transcribe(&self, audio_data_uri: &str) -> Result<String>;
}

/// Interprets a transcript into an assistant reply
#[async_trait]
pub trait IntentService: Send + Sync {
    /// Interpret in one shot
    ///
    /// # Errors
    ///
    /// Returns error if interpretation fails
    async fn interpret(&self, transcript: &str) -> Result<IntentReply>;

    /// Interpret incrementally, yielding cumulative snapshots
    ///
    /// # Errors
    ///
    /// Returns error if the stream cannot be opened
    async fn interpret_stream(&self, transcript: &str) -> Result<IntentChunkStream>;
}

/// Synthesizes a spoken clip from response text
///
/// Container concerns (channel count, sample rate, bit depth) are the
/// provider's responsibility; the returned clip is playable as tagged.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize speech for the given text
    ///
    /// # Errors
    ///
    /// Returns error if synthesis fails
    async fn synthesize(&self, text: &str) -> Result<AudioClip>;
}
