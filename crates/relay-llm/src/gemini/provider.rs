//! Google Gemini provider implementing [`LlmProvider`].
//!
//! Uses the key-authenticated `streamGenerateContent` endpoint with
//! `alt=sse`. Each SSE chunk becomes one [`Fragment`]: the concatenated text
//! of the first candidate's non-thought parts.

use std::time::Duration;

use async_trait::async_trait;
use relay_core::errors::GatewayError;
use relay_core::messages::{Role, Turn};
use relay_core::provider::{GenerateOptions, LlmProvider};
use relay_core::stream::{Fragment, FragmentStream};
use reqwest::Client;
use tokio_stream::StreamExt;
use tracing::{debug, error, info, instrument, warn};

use super::types::{
    GeminiContent, GeminiErrorEnvelope, GeminiPart, GeminiStreamChunk, GenerateContentRequest,
    GenerationConfig, GeminiConfig, BLOCKING_FINISH_REASONS, DEFAULT_BASE_URL,
};
use crate::sse::parse_sse_lines;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Google Gemini LLM provider.
pub struct GeminiProvider {
    config: GeminiConfig,
    /// HTTP client (reused across requests and connections).
    client: Client,
}

impl GeminiProvider {
    pub fn new(config: GeminiConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| GatewayError::NetworkError(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::with_client(config, client))
    }

    /// Create a provider with a shared HTTP client.
    pub fn with_client(config: GeminiConfig, client: Client) -> Self {
        info!(
            model = %config.model,
            has_api_key = config.api_key.as_ref().is_some_and(|k| !k.is_blank()),
            base_url = config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL),
            "Gemini provider initialized"
        );
        Self { config, client }
    }

    fn api_url(&self) -> String {
        let base = self
            .config
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/');
        format!(
            "{base}/models/{}:streamGenerateContent?alt=sse",
            self.config.model
        )
    }

    /// History turns in order, then the prompt as the final user turn.
    fn build_request(
        prompt: &str,
        history: &[Turn],
        options: &GenerateOptions,
    ) -> GenerateContentRequest {
        let contents = history
            .iter()
            .map(|turn| content(turn.role, &turn.text))
            .chain(std::iter::once(content(Role::User, prompt)))
            .collect();

        let generation_config = GenerationConfig {
            temperature: options.temperature,
            max_output_tokens: options.max_output_tokens,
        };

        GenerateContentRequest {
            contents,
            generation_config: (!generation_config.is_empty()).then_some(generation_config),
        }
    }
}

fn content(role: Role, text: &str) -> GeminiContent {
    GeminiContent {
        role: Some(role.as_str().to_string()),
        parts: vec![GeminiPart::text(text)],
    }
}

/// Turn one decoded chunk into a fragment, or the failure it reports.
fn chunk_to_fragment(chunk: &GeminiStreamChunk) -> Result<Fragment, GatewayError> {
    if let Some(err) = &chunk.error {
        return Err(if err.code == 0 {
            GatewayError::StreamInterrupted(err.message.clone())
        } else {
            GatewayError::from_status(err.code, err.message.clone())
        });
    }

    if let Some(reason) = chunk
        .prompt_feedback
        .as_ref()
        .and_then(|f| f.block_reason.as_deref())
    {
        return Err(GatewayError::ContentBlocked(format!("prompt blocked: {reason}")));
    }

    let Some(candidate) = chunk.candidates.first() else {
        return Ok(Fragment::default());
    };

    let text: String = candidate
        .content
        .iter()
        .flat_map(|c| c.parts.iter())
        .filter(|p| p.thought != Some(true))
        .filter_map(|p| p.text.as_deref())
        .collect();

    if text.is_empty() {
        if let Some(reason) = candidate
            .finish_reason
            .as_deref()
            .filter(|r| BLOCKING_FINISH_REASONS.contains(r))
        {
            return Err(GatewayError::ContentBlocked(format!(
                "response blocked: {reason}"
            )));
        }
    }

    Ok(Fragment::new(text))
}

/// Parse a non-2xx response body into a classified error.
fn error_from_response(status: u16, body: &str, retry_after: Option<Duration>) -> GatewayError {
    let message = serde_json::from_str::<GeminiErrorEnvelope>(body)
        .map(|env| env.error.message)
        .unwrap_or_else(|_| format!("HTTP {status}: {body}"));

    if status == 429 {
        return GatewayError::RateLimited {
            message,
            retry_after,
        };
    }
    GatewayError::from_status(status, message)
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    #[instrument(skip_all, fields(provider = "gemini", model = %self.config.model))]
    async fn stream_generate(
        &self,
        prompt: &str,
        history: &[Turn],
        options: &GenerateOptions,
    ) -> Result<FragmentStream, GatewayError> {
        let api_key = self
            .config
            .api_key
            .as_ref()
            .filter(|k| !k.is_blank())
            .ok_or_else(|| {
                GatewayError::AuthenticationFailed("no Gemini API key configured".into())
            })?;

        let body = Self::build_request(prompt, history, options);
        debug!(
            history_len = history.len(),
            temperature = ?options.temperature,
            "starting Gemini stream"
        );

        let response = self
            .client
            .post(self.api_url())
            .header(API_KEY_HEADER, api_key.expose())
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            let body_text = response.text().await.unwrap_or_default();
            let err = error_from_response(status.as_u16(), &body_text, retry_after);
            error!(
                status = status.as_u16(),
                kind = err.error_kind(),
                "Gemini API error"
            );
            return Err(err);
        }

        let fragments = parse_sse_lines(response.bytes_stream()).filter_map(|line| match line {
            Err(e) => Some(Err(e)),
            Ok(data) => match serde_json::from_str::<GeminiStreamChunk>(&data) {
                Ok(chunk) => Some(chunk_to_fragment(&chunk)),
                Err(e) => {
                    warn!(error = %e, "failed to parse Gemini SSE chunk, skipping");
                    None
                }
            },
        });

        Ok(Box::pin(fragments))
    }
}
