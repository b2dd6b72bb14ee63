//! Daemon - the interactive voice session
//!
//! Push-to-talk loop: Enter toggles recording, the finalized clip runs
//! through the turn pipeline, and the transcript renders as log lines.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::audio::{AudioPlayback, CaptureController, CpalInput, PlaybackSink};
use crate::config::{SttBackend, TtsBackend};
use crate::pipeline::{InterpretMode, TurnOrchestrator};
use crate::services::{
    ChatIntent, DeepgramTranscriber, ElevenLabsSynthesizer, IntentService, OpenAiSynthesizer,
    SpeechSynthesizer, Transcriber, WhisperTranscriber,
};
use crate::{Config, Error, Result};

/// How often the live session is checked for device faults
const FAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// The aura daemon - one interactive push-to-talk voice session
pub struct Daemon {
    config: Config,
}

impl Daemon {
    /// Create a new daemon instance
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }

    fn build_transcriber(&self) -> Result<Arc<dyn Transcriber>> {
        match self.config.voice.stt_backend {
            SttBackend::Whisper => {
                let key = self.require_key(self.config.api_keys.openai.as_deref(), "OpenAI")?;
                Ok(Arc::new(WhisperTranscriber::new(
                    key,
                    self.config.voice.stt_model.clone(),
                )?))
            }
            SttBackend::Deepgram => {
                let key = self.require_key(self.config.api_keys.deepgram.as_deref(), "Deepgram")?;
                Ok(Arc::new(DeepgramTranscriber::new(
                    key,
                    self.config.voice.stt_model.clone(),
                )?))
            }
        }
    }

    fn build_intent(&self) -> Result<Arc<dyn IntentService>> {
        let key = self.require_key(self.config.api_keys.openai.as_deref(), "OpenAI")?;
        Ok(Arc::new(ChatIntent::new(
            key,
            self.config.voice.intent_model.clone(),
            self.config.voice.intent_max_tokens,
        )?))
    }

    fn build_synthesizer(&self) -> Result<Arc<dyn SpeechSynthesizer>> {
        match self.config.voice.tts_backend {
            TtsBackend::OpenAi => {
                let key = self.require_key(self.config.api_keys.openai.as_deref(), "OpenAI")?;
                Ok(Arc::new(OpenAiSynthesizer::new(
                    key,
                    self.config.voice.tts_model.clone(),
                    self.config.voice.tts_voice.clone(),
                    self.config.voice.tts_speed,
                )?))
            }
            TtsBackend::ElevenLabs => {
                let key =
                    self.require_key(self.config.api_keys.elevenlabs.as_deref(), "ElevenLabs")?;
                Ok(Arc::new(ElevenLabsSynthesizer::new(
                    key,
                    self.config.voice.tts_voice.clone(),
                    self.config.voice.tts_model.clone(),
                )?))
            }
        }
    }

    #[allow(clippy::unused_self)]
    fn require_key(&self, key: Option<&str>, provider: &str) -> Result<String> {
        key.map(ToString::to_string)
            .ok_or_else(|| Error::Config(format!("{provider} API key not configured")))
    }

    /// Run the session until interrupted
    ///
    /// # Errors
    ///
    /// Returns error if a required service cannot be constructed or the
    /// audio output device is unusable
    #[allow(clippy::future_not_send)] // cpal streams aren't Send; runs on the main task
    pub async fn run(self) -> Result<()> {
        let transcriber = self.build_transcriber()?;
        let intent = self.build_intent()?;
        let synthesizer = self.build_synthesizer()?;
        let playback: Arc<dyn PlaybackSink> = Arc::new(AudioPlayback::new()?);

        let mode = if self.config.voice.streaming {
            InterpretMode::Streaming
        } else {
            InterpretMode::Batch
        };

        let (notice_tx, mut notice_rx) = mpsc::unbounded_channel();
        let mut orchestrator = TurnOrchestrator::new(transcriber, intent, synthesizer, playback, mode)
            .with_stage_timeout(Duration::from_secs(self.config.voice.stage_timeout_secs))
            .with_notices(notice_tx);

        let mut capture = CaptureController::new(CpalInput::new());

        // Set up shutdown signal
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = shutdown_tx.send(()).await;
            }
        });

        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        tracing::info!(?mode, "session ready - press Enter to talk, Enter again to stop, ctrl-c to quit");

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("shutdown requested");
                    break;
                }
                Some(notice) = notice_rx.recv() => {
                    tracing::warn!(notice, "pipeline notice");
                }
                line = lines.next_line() => {
                    match line {
                        Ok(Some(_)) => toggle(&mut capture, &mut orchestrator).await,
                        Ok(None) => break,
                        Err(e) => {
                            tracing::error!(error = %e, "stdin read failed");
                            break;
                        }
                    }
                }
                () = tokio::time::sleep(FAULT_POLL_INTERVAL), if capture.is_recording() => {
                    if let Some(fault) = capture.take_fault() {
                        tracing::error!(error = %fault, "recording aborted - ready to retry");
                    }
                }
            }
        }

        // Release the microphone on the way out; the abandoned clip is not processed
        if capture.is_recording() {
            let _ = capture.stop();
        }

        tracing::info!("session ended");
        Ok(())
    }
}

/// Enter pressed: stop-and-process a live recording, or start a new one
async fn toggle(capture: &mut CaptureController<CpalInput>, orchestrator: &mut TurnOrchestrator) {
    if capture.is_recording() {
        match capture.stop() {
            Some(Ok(clip)) => {
                tracing::info!(bytes = clip.bytes.len(), "recording complete - processing");
                let id = orchestrator.process_clip(clip).await;

                if let Some(turn) = orchestrator.transcript().turn(id) {
                    tracing::info!(
                        user = %turn.user_text,
                        assistant = %turn.assistant_text,
                        understood = turn.understood,
                        "turn complete"
                    );
                }
            }
            Some(Err(e)) => tracing::error!(error = %e, "recording failed"),
            None => {}
        }
    } else {
        // New recordings wait for the previous turn to settle
        if orchestrator.is_processing() {
            tracing::warn!("still processing the previous command");
            return;
        }

        match capture.start().await {
            Ok(session) => {
                tracing::info!(session = %session, "recording - press Enter to stop");
            }
            Err(e) => tracing::error!(error = %e, "could not start recording"),
        }
    }
}
