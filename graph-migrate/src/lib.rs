//! # graph-migrate
//!
//! Checksum-tracked schema migrations for graph databases.
//!
//! This is the meta-crate that re-exports all sub-crates for convenient access.
//! You can depend on `graph-migrate` to get everything, or depend on
//! individual crates for finer-grained control.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use graph_migrate::prelude::*;
//!
//! # async fn run() -> Result<(), MigrateError> {
//! let settings = Settings::default();
//! let backend: Arc<dyn GraphBackend> = Arc::new(MemoryBackend::new());
//! let ledger = Arc::new(GraphLedger::with_default_label(Arc::clone(&backend)));
//! let migrator = Migrator::from_settings(&settings, backend, ledger);
//!
//! let summary = migrator.up(None, false).await?;
//! println!("applied {} migration(s)", summary.count());
//! # Ok(())
//! # }
//! ```

/// Error type, settings, and logging setup.
pub use graph_migrate_core as core;

/// Graph database backends: HTTP transactional endpoint and in-memory.
pub use graph_migrate_backends as backends;

/// Discovery, ledger, executor, status, and rollback.
pub use graph_migrate_engine as engine;

/// Command-line interface.
#[cfg(feature = "cli")]
pub use graph_migrate_cli as cli;

// Third-party crates that appear in the public API.
pub use async_trait;
pub use chrono;
pub use serde;
pub use serde_json;
pub use tokio;
pub use tracing;
pub use tracing_subscriber;

/// Commonly used types in one import.
pub mod prelude {
    pub use graph_migrate_backends::{GraphBackend, GraphTransaction, MemoryBackend, Value};
    #[cfg(feature = "http")]
    pub use graph_migrate_backends::HttpBackend;
    pub use graph_migrate_core::{MigrateError, Settings};
    pub use graph_migrate_engine::{
        ApplyOptions, GraphLedger, LedgerStore, MemoryLedger, MigrationLoader, Migrator,
        RollbackOutcome, StatusReport,
    };
}
