//! Aura - push-to-talk voice assistant pipeline
//!
//! This library provides the core functionality for the aura assistant:
//! - Microphone capture lifecycle (one session at a time, push-to-talk)
//! - Turn orchestration: transcription → intent interpretation → synthesis → playback
//! - Live transcript state safe under overlapping async updates
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    Capture                           │
//! │   CaptureController  │  InputBackend (cpal / mock)  │
//! └────────────────────┬────────────────────────────────┘
//!                      │ AudioClip
//! ┌────────────────────▼────────────────────────────────┐
//! │                TurnOrchestrator                      │
//! │   Transcript  │  batch / streaming interpretation   │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │              External services                       │
//! │   STT  │  Intent (chat)  │  TTS  │  PlaybackSink   │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod audio;
pub mod config;
pub mod daemon;
pub mod error;
pub mod pipeline;
pub mod services;

pub use audio::{AudioClip, SAMPLE_RATE};
pub use config::Config;
pub use daemon::Daemon;
pub use error::{Error, Result};
pub use pipeline::{InterpretMode, Transcript, Turn, TurnId, TurnOrchestrator};
pub use services::{IntentChunk, IntentReply};
