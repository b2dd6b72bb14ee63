//! SSE data-line decoding for streamed chat completions
//!
//! Chat-completion streams only ever use `data:` lines (one JSON payload per
//! event, `[DONE]` as the terminator), so this decoder handles exactly that
//! subset of the protocol.

use futures::Stream;
use tokio_stream::StreamExt;

use crate::{Error, Result};

/// Terminator payload closing an OpenAI-style stream
pub const DONE_MARKER: &str = "[DONE]";

/// Decode a response body into the `data:` payloads of its SSE events
pub fn data_lines(response: reqwest::Response) -> impl Stream<Item = Result<String>> {
    decode(response.bytes_stream())
}

/// Decode any chunked byte stream into `data:` payloads
///
/// Lines may be split arbitrarily across chunks; partial lines are buffered
/// until their newline arrives. Comment lines and non-`data:` fields are
/// skipped.
fn decode<S, E>(body: S) -> impl Stream<Item = Result<String>>
where
    S: Stream<Item = std::result::Result<bytes::Bytes, E>> + Send + 'static,
    E: std::fmt::Display,
{
    futures::stream::unfold(
        (Box::pin(body), String::new()),
        |(mut body, mut buffer)| async move {
            loop {
                if let Some(newline) = buffer.find('\n') {
                    let line = buffer[..newline].trim_end_matches('\r').to_string();
                    buffer.drain(..=newline);

                    if let Some(payload) = line.strip_prefix("data:") {
                        return Some((Ok(payload.trim_start().to_string()), (body, buffer)));
                    }
                    continue;
                }

                match body.next().await {
                    Some(Ok(chunk)) => {
                        buffer.push_str(&String::from_utf8_lossy(&chunk));
                    }
                    Some(Err(e)) => {
                        return Some((
                            Err(Error::Intent(format!("stream error: {e}"))),
                            (body, buffer),
                        ));
                    }
                    None => {
                        // Body closed; a dangling unterminated data line still counts
                        let tail = std::mem::take(&mut buffer);
                        let line = tail.trim_end_matches('\r');
                        if let Some(payload) = line.strip_prefix("data:") {
                            return Some((
                                Ok(payload.trim_start().to_string()),
                                (body, buffer),
                            ));
                        }
                        return None;
                    }
                }
            }
        },
    )
}
