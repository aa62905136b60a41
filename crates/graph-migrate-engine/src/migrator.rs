//! The [`Migrator`] ties discovery, the ledger, and the executor together.
//!
//! It owns the backend and ledger handles it was given; nothing is global, so
//! several migrators (for several databases) can live in one process.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use graph_migrate_backends::GraphBackend;
use graph_migrate_core::{MigrateError, Settings};

use crate::executor::{ApplyOptions, ApplySummary, MigrationExecutor};
use crate::ledger::LedgerStore;
use crate::loader::{Discovery, MigrationLoader};
use crate::report::{self, RollbackOutcome, StatusReport};
use crate::skeleton;

/// Entry point for running migrations against one database.
pub struct Migrator {
    loader: MigrationLoader,
    ledger: Arc<dyn LedgerStore>,
    executor: MigrationExecutor,
    extension: String,
    statement_timeout: Option<Duration>,
}

impl Migrator {
    /// Creates a migrator discovering files with `loader`.
    pub fn new(
        loader: MigrationLoader,
        backend: Arc<dyn GraphBackend>,
        ledger: Arc<dyn LedgerStore>,
    ) -> Self {
        Self {
            loader,
            executor: MigrationExecutor::new(backend, Arc::clone(&ledger)),
            ledger,
            extension: "cypher".to_string(),
            statement_timeout: None,
        }
    }

    /// Creates a migrator configured from [`Settings`].
    pub fn from_settings(
        settings: &Settings,
        backend: Arc<dyn GraphBackend>,
        ledger: Arc<dyn LedgerStore>,
    ) -> Self {
        Self::new(MigrationLoader::from_settings(settings), backend, ledger)
            .with_extension(settings.extension.clone())
            .with_statement_timeout(settings.statement_timeout())
    }

    /// Sets the file extension used by [`Migrator::create_skeleton`].
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Bounds the execution time of each statement.
    pub fn with_statement_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.statement_timeout = timeout;
        self
    }

    /// Returns the loader.
    pub fn loader(&self) -> &MigrationLoader {
        &self.loader
    }

    /// Discovers migration files.
    pub fn discover(&self) -> Result<Discovery, MigrateError> {
        self.loader.discover()
    }

    /// Reports which discovered migrations are applied or pending.
    pub async fn status(&self, scope: Option<&str>) -> Result<StatusReport, MigrateError> {
        let discovery = self.discover()?;
        let applied = self.ledger.list_applied().await?;
        Ok(report::status(&discovery.descriptors, &applied, scope))
    }

    /// Applies pending migrations with explicit options.
    ///
    /// The ledger constraint is ensured first unless this is a dry run.
    pub async fn apply_pending(&self, options: &ApplyOptions) -> Result<ApplySummary, MigrateError> {
        let discovery = self.discover()?;
        if !options.dry_run {
            self.ledger.ensure_schema().await?;
        }
        let applied = self.ledger.list_applied().await?;
        self.executor
            .apply_pending(&discovery.descriptors, &applied, options)
            .await
    }

    /// Applies every pending migration in `scope`.
    pub async fn up(&self, scope: Option<&str>, dry_run: bool) -> Result<ApplySummary, MigrateError> {
        let options = ApplyOptions {
            scope: scope.map(str::to_string),
            dry_run,
            statement_timeout: self.statement_timeout,
        };
        self.apply_pending(&options).await
    }

    /// Removes the most recent ledger record in `scope`.
    pub async fn rollback_last(&self, scope: Option<&str>) -> Result<RollbackOutcome, MigrateError> {
        let applied = self.ledger.list_applied().await?;
        report::rollback_last(self.ledger.as_ref(), &applied, scope).await
    }

    /// Writes a new empty migration for `app` and returns its path.
    pub fn create_skeleton(&self, app: &str, name: &str) -> Result<PathBuf, MigrateError> {
        skeleton::create_skeleton(self.loader.root(), app, name, &self.extension)
    }
}
