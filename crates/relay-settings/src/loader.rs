//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`RelaySettings::default()`]
//! 2. If the settings file exists, deep-merge its values over defaults
//! 3. Apply environment variable overrides (highest priority). Variables
//!    from a `.env` file in the working directory fill in for any that the
//!    process environment does not set.
//! 4. Validate
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use relay_core::security::ApiKey;
use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{Result, SettingsError};
use crate::types::RelaySettings;

/// Resolve the path to the settings file (`~/.relay/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".relay").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<RelaySettings> {
    load_settings_from_path(&settings_path())
}

/// Dotenv file consulted on every load, relative to the working directory.
pub const ENV_FILE: &str = ".env";

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON, returns an error. An unreadable `.env` is logged and skipped.
pub fn load_settings_from_path(path: &Path) -> Result<RelaySettings> {
    let env_file = read_env_file(Path::new(ENV_FILE)).unwrap_or_else(|e| {
        warn!(error = %e, "ignoring .env file");
        HashMap::new()
    });
    load_with_env(path, layered_env(|name| std::env::var(name).ok(), env_file))
}

/// Read `KEY=value` pairs from a dotenv file without touching the process
/// environment. A missing file yields no variables.
pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    match dotenvy::from_path_iter(path) {
        Ok(iter) => {
            let vars = iter.collect::<std::result::Result<HashMap<_, _>, _>>()?;
            debug!(?path, count = vars.len(), "loaded .env file");
            Ok(vars)
        }
        Err(e) if e.not_found() => Ok(HashMap::new()),
        Err(e) => Err(SettingsError::EnvFile(e)),
    }
}

/// Process variables first, then the dotenv file. Matches dotenv's rule of
/// never overriding a variable that is already set.
fn layered_env<F>(
    process: F,
    env_file: HashMap<String, String>,
) -> impl Fn(&str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    move |name| process(name).or_else(|| env_file.get(name).cloned())
}

fn load_with_env<F>(path: &Path, lookup: F) -> Result<RelaySettings>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = serde_json::to_value(RelaySettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: RelaySettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings, lookup);
    settings.validate()?;
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply environment variable overrides to loaded settings.
///
/// Invalid values are ignored with a warning (fall back to file/default).
pub fn apply_env_overrides<F>(settings: &mut RelaySettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let env = EnvReader { lookup };

    // ── Provider settings ───────────────────────────────────────────
    if let Some(v) = env.string("GEMINI_API_KEY") {
        settings.provider.api_key = Some(ApiKey::new(v));
    }
    if let Some(v) = env.string("GEMINI_MODEL") {
        settings.provider.model = v;
    }
    if let Some(v) = env.f64_range("GEMINI_TEMPERATURE", 0.0, 2.0) {
        settings.provider.temperature = v;
    }
    if let Some(v) = env.u32_range("GEMINI_MAX_OUTPUT_TOKENS", 1, 1_000_000) {
        settings.provider.max_output_tokens = Some(v);
    }
    if let Some(v) = env.string("GEMINI_BASE_URL") {
        settings.provider.base_url = Some(v);
    }

    // ── Server settings ─────────────────────────────────────────────
    if let Some(v) = env.string("RELAY_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = env.u16_range("RELAY_PORT", 0, 65535) {
        settings.server.port = v;
    }
    if let Some(v) = env.string("RELAY_SYSTEM_PROMPT") {
        settings.server.default_system_prompt = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = env.bool("RELAY_LOG_JSON") {
        settings.logging.json = v;
    }
}

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }

    fn bool(&self, name: &str) -> Option<bool> {
        let val = (self.lookup)(name)?;
        let result = parse_bool(&val);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid boolean env var, ignoring");
        }
        result
    }

    fn u16_range(&self, name: &str, min: u16, max: u16) -> Option<u16> {
        let val = (self.lookup)(name)?;
        let result = val.trim().parse::<u16>().ok().filter(|v| (min..=max).contains(v));
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid u16 env var, ignoring");
        }
        result
    }

    fn u32_range(&self, name: &str, min: u32, max: u32) -> Option<u32> {
        let val = (self.lookup)(name)?;
        let result = val.trim().parse::<u32>().ok().filter(|v| (min..=max).contains(v));
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid u32 env var, ignoring");
        }
        result
    }

    fn f64_range(&self, name: &str, min: f64, max: f64) -> Option<f64> {
        let val = (self.lookup)(name)?;
        let result = val
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && (min..=max).contains(v));
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid float env var, ignoring");
        }
        result
    }
}

fn parse_bool(val: &str) -> Option<bool> {
    match val.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use super::*;
    use crate::errors::SettingsError;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    fn no_env() -> impl Fn(&str) -> Option<String> {
        |_| None
    }

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_simple_override() {
        let target = serde_json::json!({"a": 1, "b": 2});
        let source = serde_json::json!({"b": 3});
        assert_eq!(deep_merge(target, source), serde_json::json!({"a": 1, "b": 3}));
    }

    #[test]
    fn merge_nested_objects() {
        let target = serde_json::json!({"server": {"host": "0.0.0.0", "port": 8000}});
        let source = serde_json::json!({"server": {"port": 9000}});
        assert_eq!(
            deep_merge(target, source),
            serde_json::json!({"server": {"host": "0.0.0.0", "port": 9000}})
        );
    }

    #[test]
    fn merge_skips_null() {
        let target = serde_json::json!({"a": 1});
        let source = serde_json::json!({"a": null});
        assert_eq!(deep_merge(target, source), serde_json::json!({"a": 1}));
    }

    #[test]
    fn merge_replaces_arrays() {
        let target = serde_json::json!({"a": [1, 2]});
        let source = serde_json::json!({"a": [3]});
        assert_eq!(deep_merge(target, source), serde_json::json!({"a": [3]}));
    }

    // ── file loading ────────────────────────────────────────────────

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_with_env(&dir.path().join("absent.json"), no_env()).unwrap();
        assert_eq!(settings.server.port, 8000);
        assert_eq!(settings.provider.model, "gemini-1.5-flash");
    }

    #[test]
    fn file_values_merge_over_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"server": {{"port": 9100}}, "provider": {{"model": "gemini-2.0-flash", "temperature": 0.3}}}}"#
        )
        .unwrap();

        let settings = load_with_env(file.path(), no_env()).unwrap();
        assert_eq!(settings.server.port, 9100);
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.provider.model, "gemini-2.0-flash");
        assert!((settings.provider.temperature - 0.3).abs() < f64::EPSILON);
    }

    #[test]
    fn invalid_json_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let err = load_with_env(file.path(), no_env()).unwrap_err();
        assert!(matches!(err, SettingsError::Json(_)));
    }

    #[test]
    fn out_of_range_file_value_fails_validation() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"provider": {{"temperature": 3.5}}}}"#).unwrap();
        let err = load_with_env(file.path(), no_env()).unwrap_err();
        assert!(matches!(err, SettingsError::InvalidValue(_)));
    }

    // ── env overrides ───────────────────────────────────────────────

    #[test]
    fn env_overrides_provider_settings() {
        let mut settings = RelaySettings::default();
        apply_env_overrides(
            &mut settings,
            env(&[
                ("GEMINI_API_KEY", "AIza-env"),
                ("GEMINI_MODEL", "gemini-2.5-flash"),
                ("GEMINI_TEMPERATURE", "1.1"),
                ("GEMINI_MAX_OUTPUT_TOKENS", "2048"),
            ]),
        );
        assert_eq!(settings.provider.api_key.unwrap().expose(), "AIza-env");
        assert_eq!(settings.provider.model, "gemini-2.5-flash");
        assert!((settings.provider.temperature - 1.1).abs() < f64::EPSILON);
        assert_eq!(settings.provider.max_output_tokens, Some(2048));
    }

    #[test]
    fn env_overrides_server_settings() {
        let mut settings = RelaySettings::default();
        apply_env_overrides(
            &mut settings,
            env(&[
                ("RELAY_HOST", "127.0.0.1"),
                ("RELAY_PORT", "9001"),
                ("RELAY_SYSTEM_PROMPT", "Answer in one line."),
                ("RELAY_LOG_JSON", "off"),
            ]),
        );
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.server.port, 9001);
        assert_eq!(settings.server.default_system_prompt, "Answer in one line.");
        assert!(!settings.logging.json);
    }

    #[test]
    fn invalid_env_values_are_ignored() {
        let mut settings = RelaySettings::default();
        apply_env_overrides(
            &mut settings,
            env(&[
                ("GEMINI_TEMPERATURE", "hot"),
                ("RELAY_PORT", "70000"),
                ("RELAY_LOG_JSON", "maybe"),
                ("GEMINI_MODEL", ""),
            ]),
        );
        assert!((settings.provider.temperature - 0.7).abs() < f64::EPSILON);
        assert_eq!(settings.server.port, 8000);
        assert!(settings.logging.json);
        assert_eq!(settings.provider.model, "gemini-1.5-flash");
    }

    #[test]
    fn env_temperature_out_of_range_is_ignored() {
        let mut settings = RelaySettings::default();
        apply_env_overrides(&mut settings, env(&[("GEMINI_TEMPERATURE", "2.5")]));
        assert!((settings.provider.temperature - 0.7).abs() < f64::EPSILON);
    }

    #[test]
    fn env_wins_over_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"provider": {{"model": "from-file"}}}}"#).unwrap();
        let settings =
            load_with_env(file.path(), env(&[("GEMINI_MODEL", "from-env")])).unwrap();
        assert_eq!(settings.provider.model, "from-env");
    }

    // ── .env file ───────────────────────────────────────────────────

    fn write_env_file(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        let path = dir.path().join(".env");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn env_file_supplies_provider_settings() {
        let dir = tempfile::tempdir().unwrap();
        let env_path = write_env_file(
            &dir,
            "# deployment secrets\nGEMINI_API_KEY=AIza-dotenv\nGEMINI_MODEL=\"gemini-2.0-flash\"\nGEMINI_TEMPERATURE=0.2\n",
        );
        let vars = read_env_file(&env_path).unwrap();

        let settings =
            load_with_env(&dir.path().join("settings.json"), layered_env(no_env(), vars)).unwrap();

        assert_eq!(settings.provider.api_key.unwrap().expose(), "AIza-dotenv");
        assert_eq!(settings.provider.model, "gemini-2.0-flash");
        assert!((settings.provider.temperature - 0.2).abs() < f64::EPSILON);
    }

    #[test]
    fn process_env_wins_over_env_file() {
        let dir = tempfile::tempdir().unwrap();
        let env_path = write_env_file(&dir, "GEMINI_MODEL=from-dotenv\nRELAY_PORT=9200\n");
        let vars = read_env_file(&env_path).unwrap();

        let settings = load_with_env(
            &dir.path().join("settings.json"),
            layered_env(env(&[("GEMINI_MODEL", "from-process")]), vars),
        )
        .unwrap();

        assert_eq!(settings.provider.model, "from-process");
        assert_eq!(settings.server.port, 9200);
    }

    #[test]
    fn missing_env_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let vars = read_env_file(&dir.path().join(".env")).unwrap();
        assert!(vars.is_empty());
    }

    #[test]
    fn malformed_env_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let env_path = write_env_file(&dir, "GEMINI_MODEL='unterminated\n");
        let err = read_env_file(&env_path).unwrap_err();
        assert!(matches!(err, SettingsError::EnvFile(_)));
    }

    #[test]
    fn parse_bool_variants() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("1"), Some(true));
        assert_eq!(parse_bool("no"), Some(false));
        assert_eq!(parse_bool("nah"), None);
    }
}
