//! The per-connection relay loop.
//!
//! Each inbound frame becomes one turn: `start`, zero or more `token`
//! frames, then `done` and `turn_end`. Any failure inside a turn is
//! reported with a single `error` frame and the loop moves on to the next
//! inbound frame. Only a disconnect ends the loop.

use std::sync::Arc;

use futures::StreamExt;
use relay_core::errors::GatewayError;
use relay_core::messages::Turn;
use relay_core::protocol::{ClientRequest, FrameError, OutboundFrame};
use relay_core::provider::{GenerateOptions, LlmProvider};
use tracing::{debug, info, instrument, warn};

use crate::session::Session;
use crate::transport::{FrameTransport, TransportError};

/// Anything that aborts a single turn.
#[derive(Debug, thiserror::Error)]
pub enum TurnError {
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Provider(#[from] GatewayError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl TurnError {
    /// Short category for structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Frame(_) => "malformed_frame",
            Self::Provider(e) => e.error_kind(),
            Self::Transport(_) => "transport",
        }
    }
}

/// Result of a turn that did not fail.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The frame carried an empty message; nothing was sent.
    Ignored,
    Completed { fragments: usize, reply_len: usize },
}

/// Shared across connections; all mutable state lives in [`Session`].
pub struct RelayHandler {
    provider: Arc<dyn LlmProvider>,
    default_system_prompt: String,
    options: GenerateOptions,
}

impl RelayHandler {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        default_system_prompt: impl Into<String>,
        options: GenerateOptions,
    ) -> Self {
        Self {
            provider,
            default_system_prompt: default_system_prompt.into(),
            options,
        }
    }

    /// Fresh session for a newly accepted connection.
    pub fn open_session(&self) -> Session {
        Session::new(self.options.clone())
    }

    /// Serve frames until the peer disconnects, then close the session.
    #[instrument(skip_all, fields(conn_id = %session.id()))]
    pub async fn run<T: FrameTransport>(&self, transport: &mut T, session: &mut Session) {
        info!(
            provider = self.provider.name(),
            model = self.provider.model(),
            "client connected"
        );

        while let Some(frame) = transport.next_frame().await {
            let outcome = match frame {
                Ok(raw) => self.run_turn(transport, session, &raw).await,
                Err(err) => Err(TurnError::Frame(err)),
            };
            match outcome {
                Ok(TurnOutcome::Ignored) => debug!("empty message, frame ignored"),
                Ok(TurnOutcome::Completed {
                    fragments,
                    reply_len,
                }) => info!(
                    fragments,
                    reply_len,
                    turns = session.turn_count(),
                    "turn complete"
                ),
                Err(err) => report_failure(transport, &err).await,
            }
        }

        session.close();
        info!(turns = session.turn_count(), "client disconnected");
    }

    /// Handle one inbound frame end to end.
    ///
    /// History is only extended after `turn_end` went out, so a failed turn
    /// leaves the session exactly as it was.
    pub async fn run_turn<T: FrameTransport>(
        &self,
        transport: &mut T,
        session: &mut Session,
        raw: &str,
    ) -> Result<TurnOutcome, TurnError> {
        let Some(request) = ClientRequest::parse(raw)? else {
            return Ok(TurnOutcome::Ignored);
        };

        transport.send_frame(&OutboundFrame::Start).await?;

        let prompt = request.prompt(&self.default_system_prompt);
        let history: &[Turn] = if request.keeps_history() {
            session.history()
        } else {
            &[]
        };
        debug!(
            one_shot = !request.keeps_history(),
            history_len = history.len(),
            "calling provider"
        );

        let mut stream = self
            .provider
            .stream_generate(&prompt, history, session.options())
            .await?;

        let mut reply = String::new();
        let mut fragments = 0usize;
        while let Some(item) = stream.next().await {
            let fragment = item?;
            if fragment.is_empty() {
                continue;
            }
            transport
                .send_frame(&OutboundFrame::token(fragment.text.as_str()))
                .await?;
            reply.push_str(&fragment.text);
            fragments += 1;
        }

        transport.send_frame(&OutboundFrame::Done).await?;
        transport.send_frame(&OutboundFrame::TurnEnd).await?;

        let reply_len = reply.len();
        if let ClientRequest::Chat { content } = request {
            session.record_turn(content, reply);
        }

        Ok(TurnOutcome::Completed {
            fragments,
            reply_len,
        })
    }
}

async fn report_failure<T: FrameTransport>(transport: &mut T, err: &TurnError) {
    warn!(error = %err, kind = err.kind(), "turn failed");
    if let Err(send_err) = transport
        .send_frame(&OutboundFrame::error(err.to_string()))
        .await
    {
        debug!(error = %send_err, "could not deliver error frame");
    }
}
