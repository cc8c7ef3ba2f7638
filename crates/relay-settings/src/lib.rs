//! Relay configuration: compiled defaults, an optional JSON settings file and
//! environment overrides, read once at startup and never mutated afterwards.

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{load_settings, load_settings_from_path, settings_path};
pub use types::{LoggingSettings, ProviderSettings, RelaySettings, ServerSettings};
