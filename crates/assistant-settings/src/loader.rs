//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`AssistantSettings::default()`]
//! 2. If `~/.moblin-assistant/settings.json` exists, deep-merge user values over defaults
//! 3. Apply `ASSISTANT_*` environment overrides (highest priority)
//! 4. Validate the result
//!
//! Each step fails with its own [`SettingsError`] variant, so the message
//! says whether the file, an override or the merged values were at fault.
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::{Result, SettingsError};
use crate::types::AssistantSettings;

/// Resolve the path to the settings file (`~/.moblin-assistant/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".moblin-assistant").join("settings.json")
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file means defaults. An unreadable or malformed file, a bad
/// override or an unservable result is an error.
pub fn load_settings_from_path(path: &Path) -> Result<AssistantSettings> {
    let mut settings = load_file_layer(path)?;
    apply_env_overrides(&mut settings)?;
    settings.validate()?;
    Ok(settings)
}

fn load_file_layer(path: &Path) -> Result<AssistantSettings> {
    if !path.exists() {
        debug!(?path, "settings file not found, using defaults");
        return Ok(AssistantSettings::default());
    }
    debug!(?path, "loading settings from file");

    let malformed = |source| SettingsError::Malformed {
        path: path.to_path_buf(),
        source,
    };
    let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;
    let user: Value = serde_json::from_str(&content).map_err(malformed)?;
    let defaults = serde_json::to_value(AssistantSettings::default()).map_err(malformed)?;
    serde_json::from_value(deep_merge(defaults, user)).map_err(malformed)
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

/// Apply `ASSISTANT_*` environment variable overrides to loaded settings.
///
/// Empty variables count as unset. A value that does not parse, or falls
/// outside its range, fails with [`SettingsError::BadOverride`].
pub fn apply_env_overrides(settings: &mut AssistantSettings) -> Result<()> {
    apply_overrides_from(settings, |name| std::env::var(name).ok())
}

/// Apply overrides read through `lookup`, keyed by env var name.
pub fn apply_overrides_from(
    settings: &mut AssistantSettings,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<()> {
    let env = EnvReader { lookup };

    // ── Server settings ─────────────────────────────────────────────
    if let Some(v) = env.string("ASSISTANT_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = env.u16("ASSISTANT_PORT", 1, 65535)? {
        settings.server.port = v;
    }
    if let Some(v) = env.usize("ASSISTANT_MAX_MESSAGE_SIZE", 1024, 1_073_741_824)? {
        settings.server.max_message_size = v;
    }

    // ── Relay settings ──────────────────────────────────────────────
    if let Some(v) = env.u64("ASSISTANT_REQUEST_TIMEOUT_MS", 0, 3_600_000)? {
        settings.relay.request_timeout_ms = v;
    }

    // ── Logging settings ────────────────────────────────────────────
    if let Some(v) = env.string("ASSISTANT_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = env.bool("ASSISTANT_LOG_JSON")? {
        settings.logging.json = v;
    }
    Ok(())
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
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

    fn parsed<T>(
        &self,
        var: &'static str,
        expected: impl FnOnce() -> String,
        parse: impl Fn(&str) -> Option<T>,
    ) -> Result<Option<T>> {
        let Some(value) = self.string(var) else {
            return Ok(None);
        };
        match parse(&value) {
            Some(parsed) => Ok(Some(parsed)),
            None => Err(SettingsError::BadOverride {
                var,
                value,
                expected: expected(),
            }),
        }
    }

    fn bool(&self, var: &'static str) -> Result<Option<bool>> {
        self.parsed(var, || "true/false, 1/0, yes/no or on/off".into(), parse_bool)
    }

    fn u16(&self, var: &'static str, min: u16, max: u16) -> Result<Option<u16>> {
        self.parsed(var, || format!("an integer in {min}..={max}"), |v| {
            parse_u16_range(v, min, max)
        })
    }

    fn u64(&self, var: &'static str, min: u64, max: u64) -> Result<Option<u64>> {
        self.parsed(var, || format!("an integer in {min}..={max}"), |v| {
            parse_u64_range(v, min, max)
        })
    }

    fn usize(&self, var: &'static str, min: usize, max: usize) -> Result<Option<usize>> {
        self.parsed(var, || format!("an integer in {min}..={max}"), |v| {
            parse_usize_range(v, min, max)
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
