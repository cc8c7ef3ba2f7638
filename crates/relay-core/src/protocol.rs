//! Client-facing WebSocket frame protocol.
//!
//! Inbound frames come in two shapes, picked by which fields are present:
//!
//! - `{"content": "..."}` continues the connection's conversation.
//! - `{"message": "...", "system": "..."}` is a one-shot prompt primed with a
//!   system instruction; it neither reads nor extends the history.
//!
//! Outbound frames are tagged by `type`: `start`, `token`, `done`, `turn_end`
//! and `error`.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Why an inbound frame could not be turned into a request.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("frame is not valid UTF-8: {0}")]
    InvalidUtf8(#[source] std::str::Utf8Error),
    #[error("invalid JSON frame: {0}")]
    InvalidJson(#[source] serde_json::Error),
    #[error("frame must be a JSON object")]
    NotAnObject,
    #[error("frame must carry `content` or `message`")]
    MissingMessage,
    #[error("invalid frame field: {0}")]
    InvalidField(#[source] serde_json::Error),
}

#[derive(Deserialize)]
struct ChatFrame {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct OneShotFrame {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    system: Option<String>,
}

/// A parsed inbound frame with a non-empty message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClientRequest {
    /// Multi-turn: the content is sent along with the session history.
    Chat { content: String },
    /// One-shot: `system` (or the default instruction) prefixes `message`.
    OneShot {
        message: String,
        system: Option<String>,
    },
}

impl ClientRequest {
    /// Parse a raw text frame. `Ok(None)` means the frame carried an empty or
    /// absent message and must be ignored.
    pub fn parse(raw: &str) -> Result<Option<Self>, FrameError> {
        let value: Value = serde_json::from_str(raw).map_err(FrameError::InvalidJson)?;
        let Value::Object(map) = &value else {
            return Err(FrameError::NotAnObject);
        };

        if map.contains_key("content") {
            let frame: ChatFrame =
                serde_json::from_value(value).map_err(FrameError::InvalidField)?;
            return Ok(frame
                .content
                .filter(|c| !c.is_empty())
                .map(|content| Self::Chat { content }));
        }

        if map.contains_key("message") || map.contains_key("system") {
            let frame: OneShotFrame =
                serde_json::from_value(value).map_err(FrameError::InvalidField)?;
            return Ok(frame
                .message
                .filter(|m| !m.is_empty())
                .map(|message| Self::OneShot {
                    message,
                    system: frame.system,
                }));
        }

        Err(FrameError::MissingMessage)
    }

    /// Whether this request reads and extends the session history.
    pub fn keeps_history(&self) -> bool {
        matches!(self, Self::Chat { .. })
    }

    /// The prompt handed to the provider.
    pub fn prompt<'a>(&'a self, default_system: &str) -> Cow<'a, str> {
        match self {
            Self::Chat { content } => Cow::Borrowed(content),
            Self::OneShot { message, system } => {
                let system = system.as_deref().unwrap_or(default_system);
                Cow::Owned(format!("{system}\n\n{message}"))
            }
        }
    }
}

/// Server → client frame.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundFrame {
    Start,
    Token { delta: String },
    Done,
    TurnEnd,
    Error { error: String },
}

impl OutboundFrame {
    pub fn token(delta: impl Into<String>) -> Self {
        Self::Token {
            delta: delta.into(),
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        Self::Error {
            error: error.into(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
