//! # SSE Parser
//!
//! Server-Sent Events parser for the provider's streaming responses.
//! Handles:
//! - Line buffering from chunked responses
//! - `data: ` prefix extraction
//! - `[DONE]` marker filtering
//! - A trailing unterminated line when the body ends

use bytes::{Bytes, BytesMut};
use futures::Stream;
use relay_core::errors::GatewayError;
use tokio_stream::StreamExt;
use tracing::warn;

/// Parse SSE lines from a byte stream and yield JSON data strings.
///
/// A transport error while reading the body is yielded once as
/// [`GatewayError::StreamInterrupted`], after which the stream ends.
pub fn parse_sse_lines<S, E>(byte_stream: S) -> impl Stream<Item = Result<String, GatewayError>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + Unpin + 'static,
    E: std::fmt::Display + Send + 'static,
{
    futures::stream::unfold(
        (byte_stream, BytesMut::with_capacity(8192), false),
        move |(mut stream, mut buffer, done)| async move {
            if done {
                return None;
            }

            loop {
                if let Some(newline_pos) = buffer.iter().position(|&b| b == b'\n') {
                    let mut line_bytes = buffer.split_to(newline_pos + 1);
                    line_bytes.truncate(line_bytes.len() - 1);
                    if line_bytes.last() == Some(&b'\r') {
                        line_bytes.truncate(line_bytes.len() - 1);
                    }

                    let Ok(line) = std::str::from_utf8(&line_bytes) else {
                        warn!("skipping SSE line with invalid UTF-8");
                        continue;
                    };

                    if let Some(data) = extract_sse_data(line) {
                        return Some((Ok(data), (stream, buffer, false)));
                    }
                    continue;
                }

                match stream.next().await {
                    Some(Ok(chunk)) => {
                        buffer.extend_from_slice(&chunk);
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "SSE stream read error");
                        let err = GatewayError::StreamInterrupted(e.to_string());
                        return Some((Err(err), (stream, buffer, true)));
                    }
                    None => {
                        if !buffer.is_empty() {
                            let data = std::str::from_utf8(&buffer)
                                .ok()
                                .and_then(|s| extract_sse_data(s.trim()));
                            buffer.clear();
                            if let Some(data) = data {
                                return Some((Ok(data), (stream, buffer, true)));
                            }
                        }
                        return None;
                    }
                }
            }
        },
    )
}

/// Extract data payload from an SSE line.
///
/// Returns `Some(data)` for valid data lines, `None` for comments,
/// empty lines, and `[DONE]` markers.
fn extract_sse_data(line: &str) -> Option<String> {
    let trimmed = line.trim();

    if trimmed.is_empty() || trimmed.starts_with(':') {
        return None;
    }

    let data = trimmed
        .strip_prefix("data: ")
        .or_else(|| trimmed.strip_prefix("data:"))?
        .trim();

    if data.is_empty() || data == "[DONE]" {
        return None;
    }

    Some(data.to_string())
}
