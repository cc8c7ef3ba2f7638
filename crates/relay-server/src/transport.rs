//! Frame-level view of a client connection.
//!
//! Text frames pass through unchanged. Binary frames are accepted when their
//! payload is valid UTF-8; anything else is handed to the relay loop as a
//! [`FrameError::InvalidUtf8`] so the client gets an `error` frame.

use async_trait::async_trait;
use axum::extract::ws::{Message as WsMessage, WebSocket};
use relay_core::protocol::{FrameError, OutboundFrame};

/// Failure to deliver an outbound frame.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("socket error: {0}")]
    Socket(String),
}

/// The duplex channel a relay loop runs over.
#[async_trait]
pub trait FrameTransport: Send {
    /// Next inbound frame, or `None` once the peer has gone away.
    async fn next_frame(&mut self) -> Option<Result<String, FrameError>>;

    async fn send_frame(&mut self, frame: &OutboundFrame) -> Result<(), TransportError>;
}

#[async_trait]
impl FrameTransport for WebSocket {
    async fn next_frame(&mut self) -> Option<Result<String, FrameError>> {
        loop {
            match self.recv().await? {
                Ok(WsMessage::Text(text)) => return Some(Ok(text.to_string())),
                Ok(WsMessage::Binary(bytes)) => return Some(decode_binary(&bytes)),
                Ok(WsMessage::Close(_)) => return None,
                Ok(WsMessage::Ping(_) | WsMessage::Pong(_)) => {} // axum answers pings
                Err(e) => {
                    tracing::debug!(error = %e, "WebSocket receive error");
                    return None;
                }
            }
        }
    }

    async fn send_frame(&mut self, frame: &OutboundFrame) -> Result<(), TransportError> {
        let json = frame.to_json()?;
        self.send(WsMessage::Text(json.into()))
            .await
            .map_err(|e| TransportError::Socket(e.to_string()))
    }
}

fn decode_binary(bytes: &[u8]) -> Result<String, FrameError> {
    std::str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(FrameError::InvalidUtf8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = TransportError::Socket("broken pipe".into());
        assert_eq!(err.to_string(), "socket error: broken pipe");
    }

    #[test]
    fn binary_utf8_is_decoded() {
        assert_eq!(
            decode_binary(br#"{"content":"hi"}"#).unwrap(),
            r#"{"content":"hi"}"#
        );
    }

    #[test]
    fn binary_invalid_utf8_is_rejected() {
        let err = decode_binary(b"{\"content\":\"\xff\"}").unwrap_err();
        assert!(matches!(err, FrameError::InvalidUtf8(_)));
    }
}
