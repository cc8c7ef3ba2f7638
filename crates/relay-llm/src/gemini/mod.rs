//! Google Gemini provider (API key authentication, SSE streaming).

pub mod provider;
pub mod types;

pub use provider::GeminiProvider;
pub use types::GeminiConfig;
