//! Error types for the aura voice pipeline

use thiserror::Error;

/// Result type alias for aura operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the voice pipeline
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Capture lifecycle violation (e.g. starting while already recording)
    #[error("capture error: {0}")]
    Capture(String),

    /// Microphone access denied or device unavailable at acquisition
    #[error("microphone permission denied: {0}")]
    PermissionDenied(String),

    /// Input device failed mid-recording
    #[error("capture device failure: {0}")]
    CaptureDevice(String),

    /// Audio encoding/decoding error
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Intent interpretation error
    #[error("intent error: {0}")]
    Intent(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Audio output error
    #[error("playback error: {0}")]
    Playback(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
