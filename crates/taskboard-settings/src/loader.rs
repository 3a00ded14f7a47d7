//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`TaskboardSettings::default()`]
//! 2. If the settings file exists, deep-merge user values over defaults
//! 3. Apply `TASKBOARD_*` environment overrides (highest priority)
//! 4. [`TaskboardSettings::validate`]
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use taskboard_core::logging::LogFormat;
use tracing::debug;

use crate::errors::Result;
use crate::types::TaskboardSettings;

/// Resolve the settings file path.
///
/// `$TASKBOARD_HOME/settings.json` when set, otherwise
/// `~/.taskboard/settings.json`.
pub fn settings_path() -> PathBuf {
    resolve_settings_path(
        std::env::var("TASKBOARD_HOME").ok().as_deref(),
        std::env::var("HOME").ok().as_deref(),
    )
}

fn resolve_settings_path(taskboard_home: Option<&str>, home: Option<&str>) -> PathBuf {
    match taskboard_home.filter(|v| !v.is_empty()) {
        Some(dir) => PathBuf::from(dir).join("settings.json"),
        None => PathBuf::from(home.unwrap_or("/tmp"))
            .join(".taskboard")
            .join("settings.json"),
    }
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<TaskboardSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<TaskboardSettings> {
    let mut settings = load_file_layer(path)?;
    apply_env_overrides(&mut settings);
    settings.validate();
    Ok(settings)
}

fn load_file_layer(path: &Path) -> Result<TaskboardSettings> {
    let defaults = serde_json::to_value(TaskboardSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
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

/// Apply `TASKBOARD_*` process environment overrides.
pub fn apply_env_overrides(settings: &mut TaskboardSettings) {
    apply_overrides_from(settings, |name| std::env::var(name).ok());
}

/// Apply overrides read through `lookup`.
///
/// Integers must parse and fall within range; invalid values are ignored
/// with a warning.
pub fn apply_overrides_from(settings: &mut TaskboardSettings, lookup: impl Fn(&str) -> Option<String>) {
    let env = EnvReader { lookup };

    // ── Channel ─────────────────────────────────────────────────────
    if let Some(v) = env.u64("TASKBOARD_HANDSHAKE_LATENCY_MS", 0, 600_000) {
        settings.channel.handshake_latency_ms = v;
    }
    if let Some(v) = env.u64("TASKBOARD_HANDSHAKE_TIMEOUT_MS", 1, 600_000) {
        settings.channel.handshake_timeout_ms = v;
    }
    if let Some(v) = env.u64("TASKBOARD_ECHO_DELAY_MS", 0, 60_000) {
        settings.channel.echo_delay_ms = v;
    }
    if let Some(v) = env.u64("TASKBOARD_PRESENCE_INTERVAL_MS", 0, 3_600_000) {
        settings.channel.presence_interval_ms = (v > 0).then_some(v);
    }

    // ── Reconnect ───────────────────────────────────────────────────
    if let Some(v) = env.u64("TASKBOARD_RECONNECT_BASE_MS", 1, 600_000) {
        settings.reconnect.base_delay_ms = v;
    }
    if let Some(v) = env.u64("TASKBOARD_RECONNECT_MAX_MS", 1, 3_600_000) {
        settings.reconnect.max_delay_ms = v;
    }
    if let Some(v) = env.u64("TASKBOARD_RECONNECT_MAX_ATTEMPTS", 1, 100) {
        settings.reconnect.max_attempts = v as u32;
    }

    // ── Feed ────────────────────────────────────────────────────────
    if let Some(v) = env.usize("TASKBOARD_ACTIVITY_CAPACITY", 1, 10_000) {
        settings.feed.activity_capacity = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = env.string("TASKBOARD_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = env.string("TASKBOARD_LOG_FORMAT") {
        match v.parse::<LogFormat>() {
            Ok(format) => settings.logging.format = format,
            Err(_) => tracing::warn!(key = "TASKBOARD_LOG_FORMAT", value = %v, "invalid log format, ignoring"),
        }
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ── Env var readers (thin wrappers) ─────────────────────────────────────────

struct EnvReader<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> EnvReader<F> {
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }

    fn u64(&self, name: &str, min: u64, max: u64) -> Option<u64> {
        let val = (self.lookup)(name)?;
        let result = parse_u64_range(&val, min, max);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid u64 env var, ignoring");
        }
        result
    }

    fn usize(&self, name: &str, min: usize, max: usize) -> Option<usize> {
        let val = (self.lookup)(name)?;
        let result = parse_usize_range(&val, min, max);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid usize env var, ignoring");
        }
        result
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
