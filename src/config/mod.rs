//! Configuration management for the aura voice pipeline

pub mod file;

use std::str::FromStr;

use crate::{Error, Result};

/// Which STT provider to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SttBackend {
    /// OpenAI Whisper
    #[default]
    Whisper,
    /// Deepgram
    Deepgram,
}

impl FromStr for SttBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "whisper" => Ok(Self::Whisper),
            "deepgram" => Ok(Self::Deepgram),
            other => Err(Error::Config(format!("unknown STT backend: {other}"))),
        }
    }
}

/// Which TTS provider to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TtsBackend {
    /// OpenAI TTS
    #[default]
    OpenAi,
    /// ElevenLabs
    ElevenLabs,
}

impl FromStr for TtsBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "openai" => Ok(Self::OpenAi),
            "elevenlabs" => Ok(Self::ElevenLabs),
            other => Err(Error::Config(format!("unknown TTS backend: {other}"))),
        }
    }
}

/// Voice pipeline configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// STT provider backend
    pub stt_backend: SttBackend,

    /// STT model (e.g. "whisper-1", "nova-2")
    pub stt_model: String,

    /// Chat model for intent interpretation (e.g. "gpt-4o-mini")
    pub intent_model: String,

    /// Max tokens per interpreted reply
    pub intent_max_tokens: u32,

    /// Stream interpretation snapshots instead of one batch reply
    pub streaming: bool,

    /// TTS provider backend
    pub tts_backend: TtsBackend,

    /// TTS model (e.g. "tts-1", "eleven_monolingual_v1")
    pub tts_model: String,

    /// TTS voice identifier (OpenAI voice name or ElevenLabs voice id)
    pub tts_voice: String,

    /// TTS speed multiplier (0.25 to 4.0)
    pub tts_speed: f64,

    /// Bound on each external-service call, in seconds
    pub stage_timeout_secs: u64,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            stt_backend: SttBackend::Whisper,
            stt_model: "whisper-1".to_string(),
            intent_model: "gpt-4o-mini".to_string(),
            intent_max_tokens: 256,
            streaming: false,
            tts_backend: TtsBackend::OpenAi,
            tts_model: "tts-1".to_string(),
            tts_voice: "alloy".to_string(),
            tts_speed: 1.0,
            stage_timeout_secs: 30,
        }
    }
}

/// API keys for external services
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    /// `OpenAI` API key (Whisper, chat completions, TTS)
    pub openai: Option<String>,

    /// `Deepgram` API key (optional STT)
    pub deepgram: Option<String>,

    /// `ElevenLabs` API key (optional TTS)
    pub elevenlabs: Option<String>,
}

/// Aura configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Voice pipeline configuration
    pub voice: VoiceConfig,

    /// API keys
    pub api_keys: ApiKeys,
}

impl Config {
    /// Load configuration: env > TOML file > defaults
    ///
    /// # Errors
    ///
    /// Returns error if a backend name in the file or environment is unknown
    pub fn load() -> Result<Self> {
        let fc = file::load_config_file();
        let defaults = VoiceConfig::default();

        let stt_backend = match env_or("AURA_STT_BACKEND", fc.voice.stt_backend) {
            Some(name) => name.parse()?,
            None => defaults.stt_backend,
        };
        let tts_backend = match env_or("AURA_TTS_BACKEND", fc.voice.tts_backend) {
            Some(name) => name.parse()?,
            None => defaults.tts_backend,
        };

        let voice = VoiceConfig {
            stt_backend,
            stt_model: env_or("AURA_STT_MODEL", fc.voice.stt_model)
                .unwrap_or(defaults.stt_model),
            intent_model: env_or("AURA_INTENT_MODEL", fc.voice.intent_model)
                .unwrap_or(defaults.intent_model),
            intent_max_tokens: fc
                .voice
                .intent_max_tokens
                .unwrap_or(defaults.intent_max_tokens),
            streaming: std::env::var("AURA_STREAMING")
                .ok()
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .or(fc.voice.streaming)
                .unwrap_or(defaults.streaming),
            tts_backend,
            tts_model: env_or("AURA_TTS_MODEL", fc.voice.tts_model)
                .unwrap_or(defaults.tts_model),
            tts_voice: env_or("AURA_TTS_VOICE", fc.voice.tts_voice)
                .unwrap_or(defaults.tts_voice),
            tts_speed: fc.voice.tts_speed.unwrap_or(defaults.tts_speed),
            stage_timeout_secs: fc
                .voice
                .stage_timeout_secs
                .unwrap_or(defaults.stage_timeout_secs),
        };

        let api_keys = ApiKeys {
            openai: std::env::var("OPENAI_API_KEY").ok().or(fc.api_keys.openai),
            deepgram: std::env::var("DEEPGRAM_API_KEY")
                .ok()
                .or(fc.api_keys.deepgram),
            elevenlabs: std::env::var("ELEVENLABS_API_KEY")
                .ok()
                .or(fc.api_keys.elevenlabs),
        };

        Ok(Self { voice, api_keys })
    }
}

/// Environment variable, falling back to the TOML value
fn env_or(var: &str, file_value: Option<String>) -> Option<String> {
    std::env::var(var).ok().or(file_value)
}
