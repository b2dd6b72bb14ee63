//! ElevenLabs TTS provider

use async_trait::async_trait;

use super::SpeechSynthesizer;
use crate::audio::AudioClip;
use crate::{Error, Result};

/// Synthesizes speech via ElevenLabs
pub struct ElevenLabsSynthesizer {
    client: reqwest::Client,
    api_key: String,
    voice_id: String,
    model: String,
}

impl ElevenLabsSynthesizer {
    /// Create a new ElevenLabs synthesizer
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new(api_key: String, voice_id: String, model: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config(
                "ElevenLabs API key required for TTS".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            voice_id,
            model,
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<AudioClip> {
        #[derive(serde::Serialize)]
        struct ElevenLabsRequest<'a> {
            text: &'a str,
            model_id: &'a str,
        }

        let url = format!(
            "https://api.elevenlabs.io/v1/text-to-speech/{}",
            self.voice_id
        );

        let request = ElevenLabsRequest {
            text,
            model_id: &self.model,
        };

        let response = self
            .client
            .post(&url)
            .header("xi-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("ElevenLabs TTS error {status}: {body}")));
        }

        let audio = response.bytes().await?;
        tracing::debug!(audio_bytes = audio.len(), "speech synthesized");
        Ok(AudioClip::mp3(audio.to_vec()))
    }
}
