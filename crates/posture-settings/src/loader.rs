//! Settings loading: defaults, then the settings file, then `POSTURE_*`
//! environment variables.
//!
//! The file is merged over the serialized defaults as JSON before being
//! deserialized, so a partial file never resets sibling keys. Objects merge
//! per key; arrays and scalars are replaced; `null` leaves the default alone.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::{ClassifierKind, PostureSettings};

/// `~/.posture/settings.json`, or under `/tmp` when `HOME` is unset.
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".posture").join("settings.json")
}

/// Load settings from [`settings_path`] with environment overrides.
pub fn load_settings() -> Result<PostureSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from `path` with environment overrides.
///
/// A missing file yields the defaults. A file that is not valid JSON, or
/// a merged result that fails [`PostureSettings::validate`], is an error.
pub fn load_settings_from_path(path: &Path) -> Result<PostureSettings> {
    let defaults = serde_json::to_value(PostureSettings::default())?;

    let merged = if path.exists() {
        debug!(path = %path.display(), "loading settings file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(path = %path.display(), "no settings file, using defaults");
        defaults
    };

    let mut settings: PostureSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    settings.validate()?;
    Ok(settings)
}

/// Merge `source` over `target`.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = match target_map.remove(&key) {
                    Some(target_val) => deep_merge(target_val, source_val),
                    None => source_val,
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `POSTURE_*` variables from the process environment.
pub fn apply_env_overrides(settings: &mut PostureSettings) {
    apply_overrides_from(settings, |name| std::env::var(name).ok());
}

/// Apply overrides read through `lookup`.
///
/// Values that fail to parse or fall outside their range are logged and
/// ignored; the file or default value stays in effect.
pub fn apply_overrides_from<F>(settings: &mut PostureSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let env = EnvReader { lookup };

    // server
    if let Some(v) = env.string("POSTURE_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = env.parsed("POSTURE_PORT", |s| parse_u16_range(s, 0, u16::MAX)) {
        settings.server.port = v;
    }
    if let Some(v) = env.parsed("POSTURE_MAX_CONNECTIONS", |s| parse_usize_range(s, 1, 1_000_000)) {
        settings.server.max_connections = v;
    }
    if let Some(v) = env.parsed("POSTURE_QUEUE_CAPACITY", |s| parse_usize_range(s, 1, 65_536)) {
        settings.server.outbound_queue_capacity = v;
    }
    if let Some(v) = env.parsed("POSTURE_MAX_OBSERVER_DROPS", |s| parse_u64_range(s, 1, 1_000_000)) {
        settings.server.max_observer_drops = v;
    }
    if let Some(v) = env.parsed("POSTURE_PING_INTERVAL_SECS", |s| parse_u64_range(s, 1, 3600)) {
        settings.server.ping_interval_secs = v;
    }
    if let Some(v) = env.parsed("POSTURE_PONG_TIMEOUT_SECS", |s| parse_u64_range(s, 1, 86_400)) {
        settings.server.pong_timeout_secs = v;
    }

    // classifier
    if let Some(v) = env.parsed("POSTURE_CLASSIFIER", |s| s.parse::<ClassifierKind>().ok()) {
        settings.classifier.kind = v;
    }
    if let Some(v) = env.string("POSTURE_MODEL_PATH") {
        settings.classifier.model_path = Some(v);
    }

    // logging
    if let Some(v) = env.string("POSTURE_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = env.parsed("POSTURE_LOG_JSON", parse_bool) {
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

    fn parsed<T>(&self, name: &str, parse: impl FnOnce(&str) -> Option<T>) -> Option<T> {
        let raw = self.string(name)?;
        let value = parse(&raw);
        if value.is_none() {
            warn!(key = name, value = %raw, "invalid env var, ignoring");
        }
        value
    }
}

/// Parse a boolean flag.
///
/// Accepts `true`/`1`/`yes`/`on` and `false`/`0`/`no`/`off`, any case.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a `u16` in `min..=max`.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.trim().parse().ok()?;
    (min..=max).contains(&n).then_some(n)
}

/// Parse a `u64` in `min..=max`.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.trim().parse().ok()?;
    (min..=max).contains(&n).then_some(n)
}

/// Parse a `usize` in `min..=max`.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.trim().parse().ok()?;
    (min..=max).contains(&n).then_some(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SettingsError;
    use assert_matches::assert_matches;
    use serde_json::json;
    use std::collections::HashMap;

    fn overrides(pairs: &[(&str, &str)]) -> PostureSettings {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        let mut settings = PostureSettings::default();
        apply_overrides_from(&mut settings, |name| vars.get(name).cloned());
        settings
    }

    fn write_settings(content: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn settings_path_ends_in_posture_dir() {
        let path = settings_path();
        assert!(path.ends_with(".posture/settings.json"));
    }

    // deep_merge

    #[test]
    fn merge_nested_keeps_siblings() {
        let merged = deep_merge(
            json!({"server": {"port": 8000, "host": "0.0.0.0"}}),
            json!({"server": {"port": 9000}}),
        );
        assert_eq!(merged["server"]["port"], 9000);
        assert_eq!(merged["server"]["host"], "0.0.0.0");
    }

    #[test]
    fn merge_null_keeps_target() {
        let merged = deep_merge(json!({"a": 1}), json!({"a": null}));
        assert_eq!(merged["a"], 1);
    }

    #[test]
    fn merge_replaces_arrays_and_scalars() {
        let merged = deep_merge(
            json!({"list": [1, 2, 3], "obj": {"x": 1}}),
            json!({"list": [4], "obj": 7}),
        );
        assert_eq!(merged["list"], json!([4]));
        assert_eq!(merged["obj"], 7);
    }

    #[test]
    fn merge_adds_new_keys() {
        let merged = deep_merge(json!({"a": 1}), json!({"b": 2}));
        assert_eq!(merged, json!({"a": 1, "b": 2}));
    }

    // load_settings_from_path

    #[test]
    fn missing_file_gives_defaults() {
        let settings = load_settings_from_path(Path::new("/nonexistent/posture.json")).unwrap();
        assert_eq!(settings.server.port, PostureSettings::default().server.port);
    }

    #[test]
    fn partial_file_overrides_only_named_keys() {
        let (_dir, path) = write_settings(
            r#"{"server": {"port": 9100, "maxObserverDrops": 4}, "classifier": {"thresholds": {"sittingHipMin": 0.7}}}"#,
        );
        let settings = load_settings_from_path(&path).unwrap();
        assert_eq!(settings.server.port, 9100);
        assert_eq!(settings.server.max_observer_drops, 4);
        assert_eq!(settings.server.outbound_queue_capacity, 64);
        assert!((settings.classifier.thresholds.sitting_hip_min - 0.7).abs() < f64::EPSILON);
        assert!((settings.classifier.thresholds.standing_hip_max - 0.4).abs() < f64::EPSILON);
    }

    #[test]
    fn model_kind_from_file() {
        let (_dir, path) =
            write_settings(r#"{"classifier": {"kind": "model", "modelPath": "/models/forest.json"}}"#);
        let settings = load_settings_from_path(&path).unwrap();
        assert_eq!(settings.classifier.kind, ClassifierKind::Model);
        assert_eq!(settings.classifier.model_path.as_deref(), Some("/models/forest.json"));
    }

    #[test]
    fn invalid_json_is_error() {
        let (_dir, path) = write_settings("not json");
        assert_matches!(load_settings_from_path(&path), Err(SettingsError::Json(_)));
    }

    #[test]
    fn wrong_type_is_error() {
        let (_dir, path) = write_settings(r#"{"server": {"port": "eight thousand"}}"#);
        assert_matches!(load_settings_from_path(&path), Err(SettingsError::Json(_)));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let (_dir, path) = write_settings(r#"{"server": {"outboundQueueCapacity": 0}}"#);
        assert_matches!(
            load_settings_from_path(&path),
            Err(SettingsError::InvalidValue(_))
        );
    }

    // overrides

    #[test]
    fn env_overrides_apply() {
        let settings = overrides(&[
            ("POSTURE_HOST", "127.0.0.1"),
            ("POSTURE_PORT", "9001"),
            ("POSTURE_QUEUE_CAPACITY", "8"),
            ("POSTURE_MAX_OBSERVER_DROPS", "3"),
            ("POSTURE_CLASSIFIER", "model"),
            ("POSTURE_MODEL_PATH", "/tmp/forest.json"),
            ("POSTURE_LOG_JSON", "yes"),
        ]);
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.server.port, 9001);
        assert_eq!(settings.server.outbound_queue_capacity, 8);
        assert_eq!(settings.server.max_observer_drops, 3);
        assert_eq!(settings.classifier.kind, ClassifierKind::Model);
        assert_eq!(settings.classifier.model_path.as_deref(), Some("/tmp/forest.json"));
        assert!(settings.logging.json);
    }

    #[test]
    fn invalid_env_values_are_ignored() {
        let settings = overrides(&[
            ("POSTURE_PORT", "not-a-port"),
            ("POSTURE_QUEUE_CAPACITY", "0"),
            ("POSTURE_CLASSIFIER", "svm"),
            ("POSTURE_LOG_JSON", "maybe"),
        ]);
        let defaults = PostureSettings::default();
        assert_eq!(settings.server.port, defaults.server.port);
        assert_eq!(settings.server.outbound_queue_capacity, defaults.server.outbound_queue_capacity);
        assert_eq!(settings.classifier.kind, ClassifierKind::Rules);
        assert!(!settings.logging.json);
    }

    #[test]
    fn invalid_env_value_is_logged() {
        let (logs, _guard) = posture_core::logging::test_utils::capture_logs();
        let _ = overrides(&[("POSTURE_PORT", "70000")]);
        let warning = logs
            .find(tracing::Level::WARN, "invalid env var")
            .expect("no warning logged");
        assert_eq!(warning.field("key"), Some("POSTURE_PORT"));
        assert_eq!(warning.field("value"), Some("70000"));
    }

    #[test]
    fn empty_env_values_are_ignored() {
        let settings = overrides(&[("POSTURE_HOST", ""), ("POSTURE_LOG_LEVEL", "")]);
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.logging.level, "info");
    }

    #[test]
    fn port_zero_is_allowed() {
        assert_eq!(overrides(&[("POSTURE_PORT", "0")]).server.port, 0);
    }

    // parsers

    #[test]
    fn parse_bool_variants() {
        for val in ["true", "1", "YES", "On"] {
            assert_eq!(parse_bool(val), Some(true), "{val}");
        }
        for val in ["false", "0", "no", "OFF"] {
            assert_eq!(parse_bool(val), Some(false), "{val}");
        }
        assert_eq!(parse_bool("2"), None);
        assert_eq!(parse_bool(""), None);
    }

    #[test]
    fn parse_ranges() {
        assert_eq!(parse_u16_range("8000", 1, u16::MAX), Some(8000));
        assert_eq!(parse_u16_range("70000", 1, u16::MAX), None);
        assert_eq!(parse_u64_range(" 30 ", 1, 3600), Some(30));
        assert_eq!(parse_u64_range("0", 1, 3600), None);
        assert_eq!(parse_usize_range("64", 1, 65_536), Some(64));
        assert_eq!(parse_usize_range("-1", 1, 65_536), None);
    }
}
