//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`RelaySettings::default()`]
//! 2. If `~/.relay/settings.json` exists, deep-merge user values over defaults
//! 3. Apply `RELAY_*` environment variable overrides
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::{RelaySettings, ServerSettings};

/// Resolve the path to the settings file (`~/.relay/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".relay").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<RelaySettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with process env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<RelaySettings> {
    load_settings_with_env(path, |name| std::env::var(name).ok())
}

/// Load settings from `path`, resolving overrides through `env`.
pub fn load_settings_with_env<F>(path: &Path, env: F) -> Result<RelaySettings>
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
    clamp_file_values(&mut settings);
    apply_env_overrides(&mut settings, env);
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

/// Accepted range for the poll timeout, from any source.
pub const POLL_TIMEOUT_SECS_RANGE: (u64, u64) = (1, 3600);

/// Reset file values that fall outside their accepted range to the default.
fn clamp_file_values(settings: &mut RelaySettings) {
    let (min, max) = POLL_TIMEOUT_SECS_RANGE;
    let secs = settings.server.poll_timeout_secs;
    if !(min..=max).contains(&secs) {
        let fallback = ServerSettings::default().poll_timeout_secs;
        warn!(key = "pollTimeoutSecs", value = secs, fallback, "poll timeout out of range, using default");
        settings.server.poll_timeout_secs = fallback;
    }
}

/// Apply `RELAY_*` overrides. Invalid values are logged and ignored.
pub fn apply_env_overrides<F>(settings: &mut RelaySettings, env: F)
where
    F: Fn(&str) -> Option<String>,
{
    let string = |name: &str| env(name).filter(|v| !v.is_empty());

    if let Some(v) = string("RELAY_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = string("RELAY_PORT") {
        match parse_u16_range(&v, 0, u16::MAX) {
            Some(port) => settings.server.port = port,
            None => warn!(key = "RELAY_PORT", value = %v, "invalid port env var, ignoring"),
        }
    }
    if let Some(v) = string("RELAY_POLL_TIMEOUT_SECS") {
        let (min, max) = POLL_TIMEOUT_SECS_RANGE;
        match parse_u64_range(&v, min, max) {
            Some(secs) => settings.server.poll_timeout_secs = secs,
            None => {
                warn!(key = "RELAY_POLL_TIMEOUT_SECS", value = %v, "invalid timeout env var, ignoring");
            }
        }
    }
    if let Some(v) = string("RELAY_STATIC_DIR") {
        settings.server.static_dir = Some(v);
    }
    if let Some(v) = string("RELAY_LOG_LEVEL") {
        settings.logging.level = v;
    }
}

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SettingsError;
    use std::collections::HashMap;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({"server": {"port": 8080, "host": "localhost"}});
        let source = serde_json::json!({"server": {"port": 9090}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["server"]["port"], 9090);
        assert_eq!(merged["server"]["host"], "localhost");
    }

    #[test]
    fn merge_null_preserves_target() {
        let target = serde_json::json!({"a": 1, "b": 2});
        let source = serde_json::json!({"a": null});
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], 2);
    }

    #[test]
    fn merge_primitive_replaces_object() {
        let target = serde_json::json!({"a": {"nested": true}});
        let source = serde_json::json!({"a": 42});
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"], 42);
    }

    #[test]
    fn load_missing_file_returns_defaults() {
        let settings =
            load_settings_with_env(Path::new("/nonexistent/settings.json"), no_env).unwrap();
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.server.poll_timeout_secs, 30);
    }

    #[test]
    fn load_partial_json_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"server": {"pollTimeoutSecs": 5}, "logging": {"level": "debug"}}"#)
            .unwrap();

        let settings = load_settings_with_env(&path, no_env).unwrap();
        assert_eq!(settings.server.poll_timeout_secs, 5);
        assert_eq!(settings.logging.level, "debug");
        assert_eq!(settings.server.port, 8080);
    }

    #[test]
    fn out_of_range_poll_timeout_in_file_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        for body in [
            r#"{"server": {"pollTimeoutSecs": 18446744073709551615}}"#,
            r#"{"server": {"pollTimeoutSecs": 0}}"#,
            r#"{"server": {"pollTimeoutSecs": 3601}}"#,
        ] {
            std::fs::write(&path, body).unwrap();
            let settings = load_settings_with_env(&path, no_env).unwrap();
            assert_eq!(settings.server.poll_timeout_secs, 30, "body: {body}");
        }
    }

    #[test]
    fn poll_timeout_bounds_in_file_are_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        for secs in [1, 3600] {
            std::fs::write(&path, format!(r#"{{"server": {{"pollTimeoutSecs": {secs}}}}}"#)).unwrap();
            let settings = load_settings_with_env(&path, no_env).unwrap();
            assert_eq!(settings.server.poll_timeout_secs, secs);
        }
    }

    #[test]
    fn load_invalid_json_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not valid json").unwrap();

        let result = load_settings_with_env(&path, no_env);
        assert!(matches!(result.unwrap_err(), SettingsError::Json(_)));
    }

    #[test]
    fn env_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"server": {"port": 9000}}"#).unwrap();

        let env = env_from(&[
            ("RELAY_PORT", "9100"),
            ("RELAY_HOST", "127.0.0.1"),
            ("RELAY_STATIC_DIR", "./static"),
            ("RELAY_LOG_LEVEL", "warn"),
        ]);
        let settings = load_settings_with_env(&path, env).unwrap();
        assert_eq!(settings.server.port, 9100);
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.server.static_dir.as_deref(), Some("./static"));
        assert_eq!(settings.logging.level, "warn");
    }

    #[test]
    fn invalid_env_values_are_ignored() {
        let mut settings = RelaySettings::default();
        let env = env_from(&[
            ("RELAY_PORT", "not-a-port"),
            ("RELAY_POLL_TIMEOUT_SECS", "0"),
            ("RELAY_HOST", ""),
        ]);
        apply_env_overrides(&mut settings, env);
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.server.poll_timeout_secs, 30);
        assert_eq!(settings.server.host, "0.0.0.0");
    }

    #[test]
    fn parse_ranges() {
        assert_eq!(parse_u16_range("80", 1, 100), Some(80));
        assert_eq!(parse_u16_range("0", 1, 100), None);
        assert_eq!(parse_u64_range("3601", 1, 3600), None);
        assert_eq!(parse_u64_range("x", 1, 3600), None);
    }
}
