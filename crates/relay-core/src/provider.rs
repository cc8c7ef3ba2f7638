use async_trait::async_trait;

use crate::errors::GatewayError;
use crate::messages::Turn;
use crate::stream::FragmentStream;

/// Options controlling generation. Fixed per session and sent on every call.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GenerateOptions {
    pub temperature: Option<f64>,
    pub max_output_tokens: Option<u32>,
}

impl GenerateOptions {
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// A hosted text-generation model that can stream its reply.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;
    fn model(&self) -> &str;

    /// Start generating a reply to `prompt`, continuing the conversation in
    /// `history`. An `Err` here means the call never started streaming.
    async fn stream_generate(
        &self,
        prompt: &str,
        history: &[Turn],
        options: &GenerateOptions,
    ) -> Result<FragmentStream, GatewayError>;
}
