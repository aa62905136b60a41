//! Migration execution engine.
//!
//! The [`MigrationExecutor`] computes a [`MigrationPlan`] (discovered minus
//! applied, in discovery order) and applies it one migration at a time. Its
//! ledger record is written only after its last transaction commits, so a
//! failed migration leaves no record and is retried in full on the next run.
//!
//! ## Transactions
//!
//! A graph transaction may not mix schema commands (index and constraint
//! changes) with data statements. A migration is therefore split into
//! [`batches`]: maximal runs of consecutive statements of one
//! [`StatementKind`], each committed in its own transaction. A migration made
//! of one kind runs in a single transaction. When a later batch fails, earlier
//! batches of the same migration stay committed and run again on retry, so
//! migrations must be re-runnable (`IF NOT EXISTS`, `MERGE`).
//!
//! ## Cancellation
//!
//! Every backend call is an await point. Dropping the future returned by
//! [`MigrationExecutor::apply_pending`] abandons the open transaction without
//! committing it, and nothing is recorded for that migration.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use graph_migrate_backends::{GraphBackend, GraphTransaction, StatementKind};
use graph_migrate_core::logging::migration_span;
use graph_migrate_core::MigrateError;
use serde::Serialize;
use tracing::Instrument;

use crate::descriptor::{checksum, MigrationDescriptor};
use crate::ledger::{AppliedRecord, LedgerStore};
use crate::parser::parse_statements;

/// A single step in a migration plan.
#[derive(Debug, Clone)]
pub struct MigrationStep {
    /// The migration to apply.
    pub migration: MigrationDescriptor,
}

impl MigrationStep {
    /// Creates a step applying `migration`.
    pub fn forward(migration: MigrationDescriptor) -> Self {
        Self { migration }
    }
}

/// An applied migration whose file no longer matches its recorded checksum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Drift {
    /// The migration identity.
    pub identity: String,
    /// Checksum stored in the ledger.
    pub recorded: String,
    /// Checksum of the file on disk.
    pub current: String,
}

/// A plan describing which migrations to apply.
///
/// The plan is an ordered list of [`MigrationStep`]s that should be executed
/// sequentially, plus the drift noticed among already-applied migrations.
#[derive(Debug, Clone, Default)]
pub struct MigrationPlan {
    /// The ordered steps to execute.
    pub steps: Vec<MigrationStep>,
    /// Applied migrations whose files changed since they were applied.
    pub drift: Vec<Drift>,
}

impl MigrationPlan {
    /// Creates a new empty migration plan.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a step to the plan.
    pub fn add_step(&mut self, step: MigrationStep) {
        self.steps.push(step);
    }

    /// Returns whether the plan is empty.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Returns the number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns the identities of the planned migrations, in order.
    pub fn identities(&self) -> Vec<String> {
        self.steps.iter().map(|s| s.migration.identity.clone()).collect()
    }
}

/// Options for [`MigrationExecutor::apply_pending`].
#[derive(Debug, Clone, Default)]
pub struct ApplyOptions {
    /// Only consider migrations of this `domain_app`.
    pub scope: Option<String>,
    /// Plan and parse, but execute and record nothing.
    pub dry_run: bool,
    /// Upper bound on each statement's execution time.
    pub statement_timeout: Option<Duration>,
}

/// A migration that a dry run would apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedMigration {
    /// The migration identity.
    pub identity: String,
    /// The statements that would run, in order.
    pub statements: Vec<String>,
}

/// What an [`MigrationExecutor::apply_pending`] call did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplySummary {
    /// Identities applied by this invocation, in order.
    pub applied: Vec<String>,
    /// What a dry run would have applied; empty on real runs.
    pub planned: Vec<PlannedMigration>,
    /// Whether this was a dry run.
    pub dry_run: bool,
}

impl ApplySummary {
    /// Returns the number of migrations applied.
    pub fn count(&self) -> usize {
        self.applied.len()
    }

    /// Returns `true` if there was nothing to do.
    pub fn is_up_to_date(&self) -> bool {
        self.applied.is_empty() && self.planned.is_empty()
    }
}

/// Applies pending migrations against a graph backend and records them in a
/// ledger.
pub struct MigrationExecutor {
    backend: Arc<dyn GraphBackend>,
    ledger: Arc<dyn LedgerStore>,
}

impl MigrationExecutor {
    /// Creates a new executor.
    pub fn new(backend: Arc<dyn GraphBackend>, ledger: Arc<dyn LedgerStore>) -> Self {
        Self { backend, ledger }
    }

    /// Creates a plan of every discovered migration in `scope` that has no
    /// ledger record, keeping discovery order.
    ///
    /// Applied migrations whose checksum differs from the ledger are logged at
    /// `warn` and listed in [`MigrationPlan::drift`]; they are never re-applied.
    pub fn make_plan(
        descriptors: &[MigrationDescriptor],
        applied: &BTreeMap<String, AppliedRecord>,
        scope: Option<&str>,
    ) -> MigrationPlan {
        let mut plan = MigrationPlan::new();

        for descriptor in descriptors.iter().filter(|d| d.in_scope(scope)) {
            match applied.get(&descriptor.identity) {
                None => plan.add_step(MigrationStep::forward(descriptor.clone())),
                Some(record) if record.checksum != descriptor.checksum => {
                    tracing::warn!(
                        identity = %descriptor.identity,
                        recorded = %record.checksum,
                        current = %descriptor.checksum,
                        "Applied migration changed on disk; it will not be re-applied"
                    );
                    plan.drift.push(Drift {
                        identity: descriptor.identity.clone(),
                        recorded: record.checksum.clone(),
                        current: descriptor.checksum.clone(),
                    });
                }
                Some(_) => {}
            }
        }

        plan
    }

    /// Applies every pending migration in order.
    ///
    /// Stops at the first failure. Migrations applied before the failure stay
    /// applied and recorded.
    pub async fn apply_pending(
        &self,
        descriptors: &[MigrationDescriptor],
        applied: &BTreeMap<String, AppliedRecord>,
        options: &ApplyOptions,
    ) -> Result<ApplySummary, MigrateError> {
        let plan = Self::make_plan(descriptors, applied, options.scope.as_deref());
        let mut summary = ApplySummary {
            dry_run: options.dry_run,
            ..ApplySummary::default()
        };

        if plan.is_empty() {
            tracing::info!("No migrations to apply; up to date");
            return Ok(summary);
        }
        tracing::info!(pending = plan.len(), dry_run = options.dry_run, "Applying migrations");

        for step in &plan.steps {
            let migration = &step.migration;
            let span = migration_span(&migration.identity);

            if options.dry_run {
                let statements = read_statements(migration)?;
                span.in_scope(|| {
                    tracing::info!(statements = statements.len(), "Would apply migration");
                });
                summary.planned.push(PlannedMigration {
                    identity: migration.identity.clone(),
                    statements,
                });
                continue;
            }

            self.apply_one(migration, options.statement_timeout)
                .instrument(span)
                .await?;
            summary.applied.push(migration.identity.clone());
        }

        Ok(summary)
    }

    /// Applies one migration in its own transaction and records it.
    async fn apply_one(
        &self,
        migration: &MigrationDescriptor,
        statement_timeout: Option<Duration>,
    ) -> Result<(), MigrateError> {
        let statements = read_statements(migration)?;

        if statements.is_empty() {
            tracing::info!("Migration contains no statements");
        }

        for (n, batch) in batches(&statements).into_iter().enumerate() {
            if n > 0 {
                tracing::debug!(
                    kind = ?batch.kind,
                    first = batch.offset + 1,
                    "Switching statement kind; starting a new transaction"
                );
            }
            let mut tx = self.backend.begin_transaction().await?;
            let result = execute_all(tx.as_mut(), migration, &batch, statement_timeout).await;
            if let Err(err) = result {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!("Rollback after failed statement also failed: {rollback_err}");
                }
                if n > 0 {
                    tracing::warn!(
                        committed = batch.offset,
                        "Statements before the failing batch stay committed and run again on retry"
                    );
                }
                tracing::error!("{err}");
                return Err(err);
            }
            tx.commit().await.map_err(|e| {
                tracing::error!("Commit failed; migration not recorded: {e}");
                e
            })?;
        }

        self.ledger
            .record_applied(&migration.identity, &migration.checksum)
            .await
            .map_err(|e| {
                tracing::error!("Statements committed but the ledger write failed: {e}");
                e
            })?;
        tracing::info!(statements = statements.len(), "Applied migration");
        Ok(())
    }
}

/// A run of consecutive statements of one kind, applied in one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch<'a> {
    /// Kind shared by every statement in the batch.
    pub kind: StatementKind,
    /// Position of the first statement within the migration, 0-based.
    pub offset: usize,
    /// The statements, in file order.
    pub statements: &'a [String],
}

/// Splits `statements` into maximal runs of one [`StatementKind`].
pub fn batches(statements: &[String]) -> Vec<Batch<'_>> {
    let mut out: Vec<Batch<'_>> = Vec::new();
    for (idx, statement) in statements.iter().enumerate() {
        let kind = StatementKind::of(statement);
        match out.last_mut() {
            Some(batch) if batch.kind == kind => {
                batch.statements = &statements[batch.offset..=idx];
            }
            _ => out.push(Batch {
                kind,
                offset: idx,
                statements: &statements[idx..=idx],
            }),
        }
    }
    out
}

/// Executes a batch in order inside `tx`, stopping at the first failure.
///
/// Reported statement indexes are 1-based positions within the whole
/// migration.
async fn execute_all(
    tx: &mut dyn GraphTransaction,
    migration: &MigrationDescriptor,
    batch: &Batch<'_>,
    statement_timeout: Option<Duration>,
) -> Result<(), MigrateError> {
    for (pos, statement) in batch.statements.iter().enumerate() {
        let idx = batch.offset + pos;
        tracing::debug!(index = idx + 1, "Executing statement");
        let outcome = match statement_timeout {
            Some(limit) => tokio::time::timeout(limit, tx.execute(statement, &[]))
                .await
                .unwrap_or_else(|_| {
                    Err(MigrateError::Timeout(format!(
                        "statement exceeded {}s",
                        limit.as_secs_f64()
                    )))
                }),
            None => tx.execute(statement, &[]).await,
        };

        if let Err(e) = outcome {
            return Err(MigrateError::Execution {
                identity: migration.identity.clone(),
                path: migration.path.clone(),
                statement_index: idx + 1,
                statement: statement.clone(),
                message: e.to_string(),
            });
        }
    }
    Ok(())
}

/// Re-reads a migration file, checks it still matches its discovered
/// checksum, and splits it into statements.
fn read_statements(migration: &MigrationDescriptor) -> Result<Vec<String>, MigrateError> {
    let bytes = read_file(&migration.path)?;
    if checksum(&bytes) != migration.checksum {
        return Err(MigrateError::ChecksumChanged {
            identity: migration.identity.clone(),
            path: migration.path.clone(),
        });
    }
    let text = String::from_utf8(bytes).map_err(|e| MigrateError::Read {
        path: migration.path.clone(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
    })?;
    Ok(parse_statements(&text))
}

fn read_file(path: &Path) -> Result<Vec<u8>, MigrateError> {
    std::fs::read(path).map_err(|source| MigrateError::Read {
        path: path.to_path_buf(),
        source,
    })
}
