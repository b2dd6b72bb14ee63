//! Voice turn pipeline
//!
//! The transcript is the single owned state object; the orchestrator drives
//! each captured clip through the external services and mutates the
//! transcript only through its transition methods.

mod orchestrator;
mod transcript;

pub use orchestrator::{APOLOGY_TEXT, InterpretMode, TurnOrchestrator};
pub use transcript::{PROCESSING_PLACEHOLDER, Transcript, Turn, TurnId};
