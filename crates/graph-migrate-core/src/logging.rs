//! Logging integration for graph-migrate.
//!
//! Provides helpers for configuring [`tracing`]-based logging from
//! [`Settings`](crate::settings::Settings) and for creating per-migration spans.

use crate::settings::Settings;

/// Sets up the global tracing subscriber based on the given settings.
///
/// The filter is read from `settings.log_level` (e.g. "debug", "info",
/// "graph_migrate_engine=trace"). In debug mode a pretty, human-readable format
/// is used; otherwise a structured JSON format is used. Installing a second
/// subscriber is a no-op.
pub fn setup_logging(settings: &Settings) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&settings.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    if settings.debug {
        fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init()
            .ok();
    } else {
        fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .json()
            .try_init()
            .ok();
    }
}

/// Creates a tracing span for applying a single migration.
///
/// Every log entry emitted while the migration's statements run carries its
/// identity.
///
/// # Examples
///
/// ```
/// use graph_migrate_core::logging::migration_span;
///
/// let span = migration_span("core/identity/001_user_schema");
/// let _guard = span.enter();
/// tracing::info!("executing statements");
/// ```
pub fn migration_span(identity: &str) -> tracing::Span {
    tracing::info_span!("migration", identity = identity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_logging_twice_does_not_panic() {
        let settings = Settings {
            log_level: "not a valid filter [".to_string(),
            ..Settings::default()
        };
        setup_logging(&settings);
        setup_logging(&Settings::default());
    }

    #[test]
    fn test_migration_span_enter() {
        let span = migration_span("twitter/tweet/001_schema");
        let _guard = span.enter();
        tracing::info!("inside span");
    }
}
