//! Settings for graph-migrate.
//!
//! This module provides the [`Settings`] struct, which holds the configuration
//! the CLI host hands to the engine: where migrations live, how to reach the
//! graph database, and logging/timeout knobs. Every field has a sensible default.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Graph database connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// Base URL of the database's HTTP endpoint (e.g. `http://localhost:7474`).
    pub url: String,
    /// The database name.
    pub name: String,
    /// The database user.
    pub user: String,
    /// The database password.
    pub password: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:7474".to_string(),
            name: "neo4j".to_string(),
            user: "neo4j".to_string(),
            password: String::new(),
        }
    }
}

/// The complete set of graph-migrate settings.
///
/// # Examples
///
/// ```
/// use graph_migrate_core::settings::Settings;
///
/// let settings = Settings::default();
/// assert_eq!(settings.extension, "cypher");
/// assert_eq!(settings.ledger_label, "SchemaMigration");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    // ── Discovery ────────────────────────────────────────────────────

    /// Root of the source tree that migration patterns are resolved against.
    pub root: PathBuf,
    /// Glob patterns, relative to `root`, that select migration files.
    pub patterns: Vec<String>,
    /// File extension used when creating new migrations.
    pub extension: String,

    // ── Ledger ───────────────────────────────────────────────────────

    /// Node label of ledger records in the graph.
    pub ledger_label: String,

    // ── Database ─────────────────────────────────────────────────────

    /// Connection settings for the target graph database.
    pub database: DatabaseSettings,

    // ── Timeouts ─────────────────────────────────────────────────────

    /// Upper bound for a single statement, in seconds. `None` disables it.
    pub statement_timeout_secs: Option<u64>,
    /// Upper bound for a whole `up`/`down` run, in seconds. `None` disables it.
    pub run_timeout_secs: Option<u64>,

    // ── Logging ──────────────────────────────────────────────────────

    /// The log level or filter directive (e.g. "info", "graph_migrate_engine=debug").
    pub log_level: String,
    /// Human-readable log output instead of JSON.
    pub debug: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            patterns: vec!["**/migrations/*.cypher".to_string()],
            extension: "cypher".to_string(),
            ledger_label: "SchemaMigration".to_string(),
            database: DatabaseSettings::default(),
            statement_timeout_secs: None,
            run_timeout_secs: None,
            log_level: "info".to_string(),
            debug: true,
        }
    }
}

impl Settings {
    /// Returns the per-statement timeout, if configured.
    pub fn statement_timeout(&self) -> Option<Duration> {
        self.statement_timeout_secs.map(Duration::from_secs)
    }

    /// Returns the whole-run timeout, if configured.
    pub fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.root, PathBuf::from("."));
        assert_eq!(settings.patterns, vec!["**/migrations/*.cypher".to_string()]);
        assert_eq!(settings.log_level, "info");
        assert!(settings.statement_timeout().is_none());
        assert!(settings.run_timeout().is_none());
    }

    #[test]
    fn test_default_database_settings() {
        let db = DatabaseSettings::default();
        assert_eq!(db.url, "http://localhost:7474");
        assert_eq!(db.name, "neo4j");
        assert!(db.password.is_empty());
    }

    #[test]
    fn test_timeouts_convert_to_durations() {
        let settings = Settings {
            statement_timeout_secs: Some(30),
            run_timeout_secs: Some(600),
            ..Settings::default()
        };
        assert_eq!(settings.statement_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(settings.run_timeout(), Some(Duration::from_secs(600)));
    }

    #[test]
    fn test_settings_serde_round_trip_keeps_patterns() {
        let settings = Settings::default();
        let json = serde_json::to_string(&settings).unwrap();
        let back: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(back.patterns, settings.patterns);
        assert_eq!(back.database.url, settings.database.url);
    }
}
