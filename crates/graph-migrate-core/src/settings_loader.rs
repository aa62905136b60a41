//! Settings loading from configuration files.
//!
//! This module provides functions to load [`Settings`] from TOML files, JSON
//! files, and to apply environment variable overrides.
//!
//! ## Loading Order
//!
//! 1. Start with default settings.
//! 2. Load from a TOML or JSON file (overriding defaults).
//! 3. Apply environment variable overrides (highest priority).
//!
//! ## Environment Variable Mapping
//!
//! | Env Var | Setting |
//! |---|---|
//! | `GRAPH_MIGRATE_ROOT` | `root` |
//! | `GRAPH_MIGRATE_PATTERNS` | `patterns` (comma-separated) |
//! | `GRAPH_MIGRATE_EXTENSION` | `extension` |
//! | `GRAPH_MIGRATE_LEDGER_LABEL` | `ledger_label` |
//! | `GRAPH_MIGRATE_DB_URL` | `database.url` |
//! | `GRAPH_MIGRATE_DB_NAME` | `database.name` |
//! | `GRAPH_MIGRATE_DB_USER` | `database.user` |
//! | `GRAPH_MIGRATE_DB_PASSWORD` | `database.password` |
//! | `GRAPH_MIGRATE_STATEMENT_TIMEOUT` | `statement_timeout_secs` |
//! | `GRAPH_MIGRATE_RUN_TIMEOUT` | `run_timeout_secs` |
//! | `GRAPH_MIGRATE_LOG_LEVEL` | `log_level` |
//! | `GRAPH_MIGRATE_DEBUG` | `debug` |
//!
//! ## Examples
//!
//! ```rust,no_run
//! use graph_migrate_core::settings_loader;
//!
//! // Load from TOML
//! let settings = settings_loader::from_toml_file("graph-migrate.toml").unwrap();
//!
//! // Load from TOML with environment overrides
//! let settings = settings_loader::from_toml_file_with_env("graph-migrate.toml").unwrap();
//! ```

use std::path::{Path, PathBuf};

use crate::error::MigrateError;
use crate::settings::Settings;

/// Loads settings from a TOML string.
///
/// Any fields not present in the TOML keep their default values.
pub fn from_toml_str(toml_str: &str) -> Result<Settings, MigrateError> {
    // Deserialize into a generic value first and merge it over the serialized
    // defaults, so partial documents are accepted.
    let toml_value: toml::Value = toml::from_str(toml_str)
        .map_err(|e| MigrateError::Configuration(format!("Failed to parse TOML: {e}")))?;

    let json_value = toml_to_json(toml_value);
    let default_json = serde_json::to_value(Settings::default()).map_err(|e| {
        MigrateError::Configuration(format!("Failed to serialize default settings: {e}"))
    })?;

    let merged = merge_json(default_json, json_value);
    serde_json::from_value(merged).map_err(|e| {
        MigrateError::Configuration(format!("Failed to deserialize settings from TOML: {e}"))
    })
}

/// Loads settings from a TOML file.
pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Settings, MigrateError> {
    let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
        MigrateError::Configuration(format!(
            "Failed to read TOML file '{}': {e}",
            path.as_ref().display()
        ))
    })?;
    from_toml_str(&content)
}

/// Loads settings from a TOML file and then applies environment variable overrides.
pub fn from_toml_file_with_env(path: impl AsRef<Path>) -> Result<Settings, MigrateError> {
    let mut settings = from_toml_file(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Loads settings from a JSON string.
pub fn from_json_str(json_str: &str) -> Result<Settings, MigrateError> {
    let json_value: serde_json::Value = serde_json::from_str(json_str)
        .map_err(|e| MigrateError::Configuration(format!("Failed to parse JSON: {e}")))?;

    let default_json = serde_json::to_value(Settings::default()).map_err(|e| {
        MigrateError::Configuration(format!("Failed to serialize default settings: {e}"))
    })?;

    let merged = merge_json(default_json, json_value);
    serde_json::from_value(merged).map_err(|e| {
        MigrateError::Configuration(format!("Failed to deserialize settings from JSON: {e}"))
    })
}

/// Loads settings from a JSON file.
pub fn from_json_file(path: impl AsRef<Path>) -> Result<Settings, MigrateError> {
    let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
        MigrateError::Configuration(format!(
            "Failed to read JSON file '{}': {e}",
            path.as_ref().display()
        ))
    })?;
    from_json_str(&content)
}

/// Loads settings from a file, choosing the format from its extension.
///
/// `.json` files are read as JSON; anything else is read as TOML. Environment
/// overrides are applied afterwards.
pub fn from_file_with_env(path: impl AsRef<Path>) -> Result<Settings, MigrateError> {
    let path = path.as_ref();
    let mut settings = if path.extension().and_then(|e| e.to_str()) == Some("json") {
        from_json_file(path)?
    } else {
        from_toml_file(path)?
    };
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Loads settings from just environment variables (starting from defaults).
pub fn from_env() -> Settings {
    let mut settings = Settings::default();
    apply_env_overrides(&mut settings);
    settings
}

/// Applies `GRAPH_MIGRATE_*` environment variable overrides to a settings struct.
pub fn apply_env_overrides(settings: &mut Settings) {
    apply_overrides_from(settings, |key| std::env::var(key).ok());
}

/// Applies overrides using an arbitrary variable lookup.
///
/// Unparseable numeric values are ignored and leave the setting unchanged.
pub fn apply_overrides_from(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(val) = lookup("GRAPH_MIGRATE_ROOT") {
        settings.root = PathBuf::from(val);
    }

    if let Some(val) = lookup("GRAPH_MIGRATE_PATTERNS") {
        let patterns: Vec<String> = val
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if !patterns.is_empty() {
            settings.patterns = patterns;
        }
    }

    if let Some(val) = lookup("GRAPH_MIGRATE_EXTENSION") {
        settings.extension = val.trim_start_matches('.').to_string();
    }

    if let Some(val) = lookup("GRAPH_MIGRATE_LEDGER_LABEL") {
        settings.ledger_label = val;
    }

    if let Some(val) = lookup("GRAPH_MIGRATE_DB_URL") {
        settings.database.url = val;
    }

    if let Some(val) = lookup("GRAPH_MIGRATE_DB_NAME") {
        settings.database.name = val;
    }

    if let Some(val) = lookup("GRAPH_MIGRATE_DB_USER") {
        settings.database.user = val;
    }

    if let Some(val) = lookup("GRAPH_MIGRATE_DB_PASSWORD") {
        settings.database.password = val;
    }

    if let Some(val) = lookup("GRAPH_MIGRATE_STATEMENT_TIMEOUT") {
        if let Ok(secs) = val.parse::<u64>() {
            settings.statement_timeout_secs = Some(secs);
        }
    }

    if let Some(val) = lookup("GRAPH_MIGRATE_RUN_TIMEOUT") {
        if let Ok(secs) = val.parse::<u64>() {
            settings.run_timeout_secs = Some(secs);
        }
    }

    if let Some(val) = lookup("GRAPH_MIGRATE_LOG_LEVEL") {
        settings.log_level = val;
    }

    if let Some(val) = lookup("GRAPH_MIGRATE_DEBUG") {
        settings.debug = matches!(val.to_lowercase().as_str(), "true" | "1" | "yes");
    }
}

// ============================================================
// Helpers
// ============================================================

/// Converts a TOML value to a `serde_json::Value`.
fn toml_to_json(value: toml::Value) -> serde_json::Value {
    match value {
        toml::Value::String(s) => serde_json::Value::String(s),
        toml::Value::Integer(i) => serde_json::json!(i),
        toml::Value::Float(f) => serde_json::json!(f),
        toml::Value::Boolean(b) => serde_json::Value::Bool(b),
        toml::Value::Datetime(dt) => serde_json::Value::String(dt.to_string()),
        toml::Value::Array(arr) => {
            serde_json::Value::Array(arr.into_iter().map(toml_to_json).collect())
        }
        toml::Value::Table(table) => {
            let map: serde_json::Map<String, serde_json::Value> = table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect();
            serde_json::Value::Object(map)
        }
    }
}

/// Deep-merges two JSON values. The `override_val` takes precedence.
fn merge_json(base: serde_json::Value, override_val: serde_json::Value) -> serde_json::Value {
    match (base, override_val) {
        (serde_json::Value::Object(mut base_map), serde_json::Value::Object(override_map)) => {
            for (key, override_v) in override_map {
                let merged = if let Some(base_v) = base_map.remove(&key) {
                    merge_json(base_v, override_v)
                } else {
                    override_v
                };
                base_map.insert(key, merged);
            }
            serde_json::Value::Object(base_map)
        }
        (_, override_val) => override_val,
    }
}
