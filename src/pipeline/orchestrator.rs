//! Turn orchestration
//!
//! Drives one captured clip through transcription, intent interpretation,
//! synthesis, and playback, publishing transcript state fit for live
//! display. Every stage failure is normalized here, never at call sites.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_stream::StreamExt;

use super::transcript::{Transcript, TurnId};
use crate::audio::{AudioClip, PlaybackSink};
use crate::services::{IntentService, SpeechSynthesizer, Transcriber};
use crate::{Error, Result};

/// Fixed response a failed turn is normalized to
pub const APOLOGY_TEXT: &str =
    "Apologies, sir. I seem to be experiencing a technical difficulty.";

/// Default bound on each external-service call
const DEFAULT_STAGE_TIMEOUT: Duration = Duration::from_secs(30);

/// How intent interpretation is invoked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpretMode {
    /// Single request/response per turn
    Batch,
    /// Incremental snapshots applied to the transcript as they arrive
    Streaming,
}

/// Sequences one turn at a time through the external services
///
/// Owns the transcript and the processing flag; both change only through
/// this type's methods, so display state stays consistent however the
/// underlying futures interleave.
pub struct TurnOrchestrator {
    transcriber: Arc<dyn Transcriber>,
    intent: Arc<dyn IntentService>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    playback: Arc<dyn PlaybackSink>,
    mode: InterpretMode,
    stage_timeout: Duration,
    transcript: Transcript,
    processing: bool,
    notices: Option<mpsc::UnboundedSender<String>>,
}

/// Bound an external call; a timeout maps to the failing stage's error
async fn bounded<T>(
    limit: Duration,
    what: &str,
    to_err: fn(String) -> Error,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(to_err(format!("{what} timed out after {limit:?}"))),
    }
}

impl TurnOrchestrator {
    /// Create an orchestrator over the given services
    pub fn new(
        transcriber: Arc<dyn Transcriber>,
        intent: Arc<dyn IntentService>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        playback: Arc<dyn PlaybackSink>,
        mode: InterpretMode,
    ) -> Self {
        Self {
            transcriber,
            intent,
            synthesizer,
            playback,
            mode,
            stage_timeout: DEFAULT_STAGE_TIMEOUT,
            transcript: Transcript::new(),
            processing: false,
            notices: None,
        }
    }

    /// Override the per-stage timeout
    #[must_use]
    pub const fn with_stage_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout = timeout;
        self
    }

    /// Attach a channel for user-visible notices
    #[must_use]
    pub fn with_notices(mut self, notices: mpsc::UnboundedSender<String>) -> Self {
        self.notices = Some(notices);
        self
    }

    /// True while a turn is between capture completion and its terminal state
    #[must_use]
    pub const fn is_processing(&self) -> bool {
        self.processing
    }

    /// The transcript, for display
    #[must_use]
    pub const fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Run one captured clip through the full pipeline
    ///
    /// Appends a turn immediately and returns its id once the pipeline has
    /// reached a terminal state. Failures never escape: the turn is
    /// normalized to the apology text (unless already finalized, in which
    /// case its text is preserved), a notice fires, and the processing flag
    /// clears on every exit path.
    pub async fn process_clip(&mut self, clip: AudioClip) -> TurnId {
        self.processing = true;
        let id = self.transcript.begin_turn();

        let outcome = match self.mode {
            InterpretMode::Batch => self.run_batch(id, clip).await,
            InterpretMode::Streaming => self.run_streaming(id, clip).await,
        };

        if let Err(e) = outcome {
            tracing::error!(turn = %id, error = %e, "voice turn failed");
            self.notify(&format!("Failed to process voice command: {e}"));
            self.transcript.finalize(id, APOLOGY_TEXT, false);
        }

        self.processing = false;
        id
    }

    async fn run_batch(&mut self, id: TurnId, clip: AudioClip) -> Result<()> {
        let user_text = self.transcribe(&clip).await?;
        self.transcript.apply_user_text(id, &user_text);

        let reply = bounded(
            self.stage_timeout,
            "interpretation",
            Error::Intent,
            self.intent.interpret(&user_text),
        )
        .await?;

        self.transcript
            .finalize(id, &reply.response_text, reply.understood);
        self.processing = false;

        if reply.understood {
            self.speak(id, &reply.response_text).await?;
        }

        Ok(())
    }

    async fn run_streaming(&mut self, id: TurnId, clip: AudioClip) -> Result<()> {
        let user_text = self.transcribe(&clip).await?;

        let mut chunks = bounded(
            self.stage_timeout,
            "interpretation",
            Error::Intent,
            self.intent.interpret_stream(&user_text),
        )
        .await?;

        let mut final_text = None;

        loop {
            let next = tokio::time::timeout(self.stage_timeout, chunks.next())
                .await
                .map_err(|_| Error::Intent("interpretation stream stalled".to_string()))?;

            let Some(chunk) = next else { break };
            let chunk = chunk?;

            // The transcript rides along on every chunk; only the first
            // arrival lands
            self.transcript.apply_user_text(id, &chunk.transcript);

            if chunk.is_final {
                self.transcript.finalize(id, &chunk.response_snapshot, true);
                self.processing = false;
                final_text = Some(chunk.response_snapshot);
                break;
            }

            self.transcript.apply_snapshot(id, &chunk.response_snapshot);
        }

        let final_text = final_text.ok_or_else(|| {
            Error::Intent("interpretation stream ended without a final record".to_string())
        })?;

        // No understood verdict exists mid-stream; always voice the reply
        self.speak(id, &final_text).await?;

        Ok(())
    }

    async fn transcribe(&self, clip: &AudioClip) -> Result<String> {
        let data_uri = clip.to_data_uri();
        bounded(
            self.stage_timeout,
            "transcription",
            Error::Stt,
            self.transcriber.transcribe(&data_uri),
        )
        .await
    }

    /// Synthesize and hand off to playback; playback failure is non-fatal
    async fn speak(&self, id: TurnId, text: &str) -> Result<()> {
        let speech = bounded(
            self.stage_timeout,
            "speech synthesis",
            Error::Tts,
            self.synthesizer.synthesize(text),
        )
        .await?;

        if let Err(e) = self.playback.play(speech) {
            tracing::warn!(turn = %id, error = %e, "playback failed");
        }

        Ok(())
    }

    fn notify(&self, message: &str) {
        if let Some(notices) = &self.notices {
            let _ = notices.send(message.to_string());
        }
    }
}
