//! Settings schema with compiled defaults.

use relay_core::provider::GenerateOptions;
use relay_core::security::ApiKey;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Default Gemini model.
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
/// Default instruction for one-shot frames that carry no `system` field.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful and direct assistant.";

/// Root settings object.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RelaySettings {
    pub server: ServerSettings,
    pub provider: ProviderSettings,
    pub logging: LoggingSettings,
}

/// Listener and relay behaviour.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub default_system_prompt: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            default_system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

/// Model provider configuration. The API key only ever comes from the
/// environment and is never serialized.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProviderSettings {
    #[serde(skip)]
    pub api_key: Option<ApiKey>,
    pub model: String,
    pub temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_output_tokens: None,
            base_url: None,
        }
    }
}

impl ProviderSettings {
    /// Generation options every session starts with.
    pub fn generate_options(&self) -> GenerateOptions {
        GenerateOptions {
            temperature: Some(self.temperature),
            max_output_tokens: self.max_output_tokens,
        }
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.as_ref().is_some_and(|k| !k.is_blank())
    }
}

/// Log output configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: true,
        }
    }
}

impl RelaySettings {
    /// Reject values the relay cannot run with.
    pub fn validate(&self) -> Result<()> {
        let temp = self.provider.temperature;
        if !(0.0..=2.0).contains(&temp) {
            return Err(SettingsError::InvalidValue(format!(
                "temperature {temp} outside 0.0..=2.0"
            )));
        }
        if self.provider.model.trim().is_empty() {
            return Err(SettingsError::InvalidValue("model must not be empty".into()));
        }
        if self.provider.max_output_tokens == Some(0) {
            return Err(SettingsError::InvalidValue(
                "maxOutputTokens must be positive".into(),
            ));
        }
        Ok(())
    }
}
