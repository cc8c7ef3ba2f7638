use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream;
use parking_lot::Mutex;

use relay_core::errors::GatewayError;
use relay_core::messages::Turn;
use relay_core::provider::{GenerateOptions, LlmProvider};
use relay_core::stream::{Fragment, FragmentStream};

/// Pre-programmed responses for deterministic testing without API calls.
pub enum MockResponse {
    /// Yield a sequence of fragment results.
    Stream(Vec<Result<Fragment, GatewayError>>),
    /// Return an error from the stream_generate() call itself.
    Error(GatewayError),
    /// Wait a duration, then yield the inner response.
    Delay(Duration, Box<MockResponse>),
}

impl MockResponse {
    /// Convenience: a stream that yields each text as one fragment.
    pub fn fragments(texts: &[&str]) -> Self {
        Self::Stream(texts.iter().map(|t| Ok(Fragment::new(*t))).collect())
    }

    /// Convenience: yield `texts`, then fail mid-stream with `error`.
    pub fn fail_after(texts: &[&str], error: GatewayError) -> Self {
        let mut items: Vec<_> = texts.iter().map(|t| Ok(Fragment::new(*t))).collect();
        items.push(Err(error));
        Self::Stream(items)
    }

    /// Convenience: wrap any response with a delay.
    pub fn delayed(delay: Duration, inner: MockResponse) -> Self {
        Self::Delay(delay, Box::new(inner))
    }
}

/// What the provider was asked for on one call.
#[derive(Clone, Debug)]
pub struct RecordedCall {
    pub prompt: String,
    pub history: Vec<Turn>,
    pub options: GenerateOptions,
}

/// Mock provider that returns pre-programmed responses in sequence and
/// records every call it receives.
pub struct MockProvider {
    responses: Mutex<VecDeque<MockResponse>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockProvider {
    pub fn new(responses: Vec<MockResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Snapshot of all calls so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    async fn stream_generate(
        &self,
        prompt: &str,
        history: &[Turn],
        options: &GenerateOptions,
    ) -> Result<FragmentStream, GatewayError> {
        let idx = {
            let mut calls = self.calls.lock();
            calls.push(RecordedCall {
                prompt: prompt.to_string(),
                history: history.to_vec(),
                options: options.clone(),
            });
            calls.len() - 1
        };

        let next = self.responses.lock().pop_front();
        let Some(response) = next else {
            return Err(GatewayError::InvalidRequest(format!(
                "MockProvider: no response configured for call {idx}"
            )));
        };

        resolve_response(response).await
    }
}

/// Resolve a MockResponse, handling Delay by sleeping first.
/// Unrolls nested delays iteratively to avoid recursive async.
async fn resolve_response(response: MockResponse) -> Result<FragmentStream, GatewayError> {
    let mut current = response;
    loop {
        match current {
            MockResponse::Stream(items) => return Ok(Box::pin(stream::iter(items))),
            MockResponse::Error(e) => return Err(e),
            MockResponse::Delay(duration, inner) => {
                tokio::time::sleep(duration).await;
                current = *inner;
            }
        }
    }
}
