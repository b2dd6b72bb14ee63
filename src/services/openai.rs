//! OpenAI providers: Whisper STT, chat-completion intent, and TTS

use async_trait::async_trait;
use serde::Deserialize;
use tokio_stream::StreamExt;

use super::sse;
use super::{
    IntentChunk, IntentChunkStream, IntentReply, IntentService, SpeechSynthesizer, Transcriber,
};
use crate::audio::AudioClip;
use crate::{Error, Result};

const OPENAI_BASE_URL: &str = "https://api.openai.com";

/// Assistant persona applied to every interpretation call
const INTENT_SYSTEM_PROMPT: &str = "You are a refined voice assistant in the manner of a \
    personal butler. Address the user as \"sir\" and stay in character. Interpret the user's \
    spoken command: for smart-home requests, information requests, or simple tasks, confirm \
    the action or provide the information in one or two concise sentences suitable for being \
    read aloud. If the command is unclear, ambiguous, or beyond your capabilities, apologize \
    politely and ask for clarification.";

/// Extra instruction for the batch contract, which needs a structured verdict
const INTENT_JSON_INSTRUCTION: &str = "Respond with a JSON object of the form \
    {\"response\": string, \"understood\": boolean}. Set \"understood\" to false when the \
    command was unclear or out of capability, true otherwise.";

/// Response from the Whisper transcription API
#[derive(Deserialize)]
struct WhisperResponse {
    text: String,
}

/// Transcribes speech via OpenAI Whisper
pub struct WhisperTranscriber {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl WhisperTranscriber {
    /// Create a new Whisper transcriber
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new(api_key: String, model: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config(
                "OpenAI API key required for Whisper".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model,
        })
    }
}

/// File extension Whisper expects for a given MIME type
fn extension_for_mime(mime_type: &str) -> &'static str {
    match mime_type {
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/mp4" | "audio/m4a" => "m4a",
        "audio/webm" => "webm",
        "audio/ogg" => "ogg",
        "audio/flac" => "flac",
        _ => "wav",
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, audio_data_uri: &str) -> Result<String> {
        let clip = AudioClip::from_data_uri(audio_data_uri)
            .map_err(|e| Error::Stt(format!("unreadable audio artifact: {e}")))?;

        tracing::debug!(
            audio_bytes = clip.bytes.len(),
            mime = %clip.mime,
            "starting Whisper transcription"
        );

        let filename = format!("audio.{}", extension_for_mime(&clip.mime));
        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(clip.bytes)
                    .file_name(filename)
                    .mime_str(&clip.mime)
                    .map_err(|e| Error::Stt(e.to_string()))?,
            )
            .text("model", self.model.clone());

        let response = self
            .client
            .post(format!("{OPENAI_BASE_URL}/v1/audio/transcriptions"))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Whisper request failed");
                e
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Whisper API error");
            return Err(Error::Stt(format!("Whisper API error {status}: {body}")));
        }

        let result: WhisperResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse Whisper response");
            e
        })?;

        tracing::info!(transcript = %result.text, "transcription complete");
        Ok(result.text)
    }
}

/// One streamed chunk of a chat completion
#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Non-streamed chat completion response
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: String,
}

/// Structured verdict the batch prompt asks the model for
#[derive(Debug, Deserialize)]
struct IntentVerdict {
    response: String,
    understood: bool,
}

/// Interprets transcripts via OpenAI chat completions
pub struct ChatIntent {
    client: reqwest::Client,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl ChatIntent {
    /// Create a new chat-completion intent service
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new(api_key: String, model: String, max_tokens: u32) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config(
                "OpenAI API key required for intent interpretation".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            max_tokens,
        })
    }

    async fn post_chat(&self, body: &serde_json::Value) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(format!("{OPENAI_BASE_URL}/v1/chat/completions"))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "chat completion request failed");
                e
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "chat completion API error");
            return Err(Error::Intent(format!("chat API error {status}: {body}")));
        }

        Ok(response)
    }
}

/// Extract the content delta, if any, from one SSE payload
fn parse_delta(payload: &str) -> Result<Option<String>> {
    let chunk: ChatCompletionChunk = serde_json::from_str(payload)
        .map_err(|e| Error::Intent(format!("malformed stream chunk: {e}")))?;

    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
        .filter(|s| !s.is_empty()))
}

#[async_trait]
impl IntentService for ChatIntent {
    async fn interpret(&self, transcript: &str) -> Result<IntentReply> {
        tracing::debug!(transcript, "interpreting command");

        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "response_format": {"type": "json_object"},
            "messages": [
                {"role": "system", "content": format!("{INTENT_SYSTEM_PROMPT}\n\n{INTENT_JSON_INSTRUCTION}")},
                {"role": "user", "content": transcript},
            ],
        });

        let response = self.post_chat(&body).await?;
        let completion: ChatCompletionResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse chat response");
            e
        })?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| Error::Intent("chat response had no choices".to_string()))?;

        let verdict: IntentVerdict = serde_json::from_str(&content)
            .map_err(|e| Error::Intent(format!("unparseable intent verdict: {e}")))?;

        tracing::info!(understood = verdict.understood, "interpretation complete");
        Ok(IntentReply {
            response_text: verdict.response,
            understood: verdict.understood,
        })
    }

    async fn interpret_stream(&self, transcript: &str) -> Result<IntentChunkStream> {
        tracing::debug!(transcript, "interpreting command (streaming)");

        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "stream": true,
            "messages": [
                {"role": "system", "content": INTENT_SYSTEM_PROMPT},
                {"role": "user", "content": transcript},
            ],
        });

        let response = self.post_chat(&body).await?;
        let lines = sse::data_lines(response);

        struct SnapshotState {
            lines: std::pin::Pin<Box<dyn futures::Stream<Item = Result<String>> + Send>>,
            transcript: String,
            snapshot: String,
            done: bool,
        }

        let stream = futures::stream::unfold(
            SnapshotState {
                lines: Box::pin(lines),
                transcript: transcript.to_string(),
                snapshot: String::new(),
                done: false,
            },
            |mut state| async move {
                if state.done {
                    return None;
                }

                loop {
                    match state.lines.next().await {
                        Some(Ok(payload)) => {
                            if payload == sse::DONE_MARKER {
                                state.done = true;
                                return Some((
                                    Ok(IntentChunk {
                                        transcript: state.transcript.clone(),
                                        response_snapshot: state.snapshot.clone(),
                                        is_final: true,
                                    }),
                                    state,
                                ));
                            }

                            let delta = match parse_delta(&payload) {
                                Ok(d) => d,
                                Err(e) => {
                                    state.done = true;
                                    return Some((Err(e), state));
                                }
                            };

                            // Role-only and empty deltas carry no new text
                            let Some(text) = delta else { continue };
                            state.snapshot.push_str(&text);

                            return Some((
                                Ok(IntentChunk {
                                    transcript: state.transcript.clone(),
                                    response_snapshot: state.snapshot.clone(),
                                    is_final: false,
                                }),
                                state,
                            ));
                        }
                        Some(Err(e)) => {
                            state.done = true;
                            return Some((Err(e), state));
                        }
                        // Body closed without [DONE]: surface no final record
                        // and let the consumer decide
                        None => return None,
                    }
                }
            },
        );

        Ok(Box::pin(stream))
    }
}

/// Synthesizes speech via OpenAI TTS
pub struct OpenAiSynthesizer {
    client: reqwest::Client,
    api_key: String,
    model: String,
    voice: String,
    speed: f64,
}

impl OpenAiSynthesizer {
    /// Create a new OpenAI TTS synthesizer
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new(api_key: String, model: String, voice: String, speed: f64) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config("OpenAI API key required for TTS".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            voice,
            speed,
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for OpenAiSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<AudioClip> {
        #[derive(serde::Serialize)]
        struct TtsRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            speed: f64,
        }

        let request = TtsRequest {
            model: &self.model,
            input: text,
            voice: &self.voice,
            speed: self.speed,
        };

        let response = self
            .client
            .post(format!("{OPENAI_BASE_URL}/v1/audio/speech"))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("OpenAI TTS error {status}: {body}")));
        }

        let audio = response.bytes().await?;
        tracing::debug!(audio_bytes = audio.len(), "speech synthesized");
        Ok(AudioClip::mp3(audio.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_parsing_extracts_content() {
        let payload = r#"{"choices":[{"delta":{"content":"Hel"}}]}"#;
        assert_eq!(parse_delta(payload).unwrap(), Some("Hel".to_string()));
    }

    #[test]
    fn delta_parsing_skips_role_only_chunks() {
        let payload = r#"{"choices":[{"delta":{"role":"assistant"}}]}"#;
        assert_eq!(parse_delta(payload).unwrap(), None);
    }

    #[test]
    fn delta_parsing_rejects_garbage() {
        assert!(parse_delta("not json").is_err());
    }

    #[test]
    fn extension_follows_mime() {
        assert_eq!(extension_for_mime("audio/wav"), "wav");
        assert_eq!(extension_for_mime("audio/webm"), "webm");
        assert_eq!(extension_for_mime("application/octet-stream"), "wav");
    }

    #[test]
    fn missing_api_key_is_a_config_error() {
        assert!(WhisperTranscriber::new(String::new(), "whisper-1".to_string()).is_err());
        assert!(ChatIntent::new(String::new(), "gpt-4o-mini".to_string(), 256).is_err());
        assert!(
            OpenAiSynthesizer::new(String::new(), "tts-1".to_string(), "alloy".to_string(), 1.0)
                .is_err()
        );
    }
}
