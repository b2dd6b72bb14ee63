//! TOML configuration file loading
//!
//! Supports `~/.config/omni/aura/config.toml` as a persistent config source.
//! All fields are optional — the file is a partial overlay on top of defaults.

use std::path::PathBuf;

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct AuraConfigFile {
    /// Voice pipeline configuration
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,
}

/// Voice pipeline configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// STT backend ("whisper" or "deepgram")
    pub stt_backend: Option<String>,

    /// STT model (e.g. "whisper-1")
    pub stt_model: Option<String>,

    /// Chat model for intent interpretation
    pub intent_model: Option<String>,

    /// Max tokens per interpreted reply
    pub intent_max_tokens: Option<u32>,

    /// Stream interpretation snapshots
    pub streaming: Option<bool>,

    /// TTS backend ("openai" or "elevenlabs")
    pub tts_backend: Option<String>,

    /// TTS model (e.g. "tts-1")
    pub tts_model: Option<String>,

    /// TTS voice identifier
    pub tts_voice: Option<String>,

    /// TTS speed multiplier
    pub tts_speed: Option<f64>,

    /// Bound on each external-service call, in seconds
    pub stage_timeout_secs: Option<u64>,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub openai: Option<String>,
    pub deepgram: Option<String>,
    pub elevenlabs: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `AuraConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> AuraConfigFile {
    let Some(path) = config_file_path() else {
        return AuraConfigFile::default();
    };

    if !path.exists() {
        return AuraConfigFile::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                AuraConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            AuraConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/omni/aura/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| {
        d.config_dir()
            .join("omni")
            .join("aura")
            .join("config.toml")
    })
}
