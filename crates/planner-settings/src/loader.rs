//! Settings loading with deep merge and environment variable overrides.
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::PlannerSettings;

/// Resolve the settings file path: `PLANNER_SETTINGS`, else
/// `~/.event-planner/settings.json`.
pub fn settings_path() -> PathBuf {
    if let Some(explicit) = read_env_string("PLANNER_SETTINGS") {
        return PathBuf::from(explicit);
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".event-planner").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<PlannerSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. A file with invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<PlannerSettings> {
    let mut settings = load_file(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

fn load_file(path: &Path) -> Result<PlannerSettings> {
    let defaults = serde_json::to_value(PlannerSettings::default())?;

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
                let merged = match target_map.remove(&key) {
                    Some(target_val) => deep_merge(target_val, source_val),
                    None => source_val,
                };
                target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply process environment overrides.
pub fn apply_env_overrides(settings: &mut PlannerSettings) {
    apply_overrides(settings, |name| std::env::var(name).ok());
}

/// Apply overrides from `lookup`, which maps a variable name to its value.
///
/// Invalid values are ignored with a warning and the file/default value stays.
pub fn apply_overrides<F>(settings: &mut PlannerSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let string = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    // ── Telegram ────────────────────────────────────────────────────
    if let Some(v) = string("PLANNER_TELEGRAM_TOKEN").or_else(|| string("TELEGRAM_BOT_TOKEN")) {
        settings.telegram.token = v;
    }
    if let Some(v) = string("PLANNER_TELEGRAM_API_URL") {
        settings.telegram.api_url = v;
    }
    if let Some(v) = checked(&lookup, "PLANNER_POLL_TIMEOUT_SECS", |v| parse_u64_range(v, 1, 600)) {
        settings.telegram.poll_timeout_secs = v;
    }

    // ── Storage ─────────────────────────────────────────────────────
    if let Some(v) = string("PLANNER_DB_PATH").or_else(|| string("DB_PATH")) {
        settings.database.path = v;
    }

    // ── Admins ──────────────────────────────────────────────────────
    if let Some(v) = checked(&lookup, "PLANNER_ADMIN_IDS", parse_id_list) {
        settings.admins.platform_ids = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = string("PLANNER_LOG_LEVEL") {
        settings.logging.level = v;
    } else if checked(&lookup, "DEBUG", parse_bool) == Some(true) {
        settings.logging.level = "debug".to_string();
    }
    if let Some(v) = checked(&lookup, "PLANNER_LOG_JSON", parse_bool) {
        settings.logging.json = v;
    }

    // ── Runtime ─────────────────────────────────────────────────────
    if let Some(v) = checked(&lookup, "PLANNER_SHUTDOWN_GRACE_SECS", |v| parse_u64_range(v, 0, 3600)) {
        settings.runtime.shutdown_grace_secs = v;
    }
}

fn checked<F, P, T>(lookup: &F, name: &str, parse: P) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    P: Fn(&str) -> Option<T>,
{
    let val = lookup(name)?;
    let result = parse(&val);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid env var, ignoring");
    }
    result
}

// ── Pure parsing functions ──────────────────────────────────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a comma-separated list of platform ids. One bad entry rejects the list.
pub fn parse_id_list(val: &str) -> Option<Vec<i64>> {
    val.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse().ok())
        .collect()
}

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}
