//! Status reporting and ledger-only rollback.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use graph_migrate_core::MigrateError;
use serde::Serialize;

use crate::descriptor::{identity_in_scope, MigrationDescriptor};
use crate::ledger::{AppliedRecord, LedgerStore};

/// The state of one discovered migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum MigrationState {
    /// Recorded in the ledger.
    Applied {
        /// When it was applied.
        applied_at: DateTime<Utc>,
        /// Whether the file changed since it was applied.
        drift: bool,
    },
    /// Not yet applied.
    Pending,
}

/// One line of a [`StatusReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusEntry {
    /// The migration identity.
    pub identity: String,
    /// The `domain_app` part of the identity.
    pub domain_app: String,
    /// The migration name.
    pub name: String,
    /// Where the file lives.
    pub path: PathBuf,
    /// Applied or pending.
    #[serde(flatten)]
    pub state: MigrationState,
}

impl StatusEntry {
    /// Returns `true` if the migration has a ledger record.
    pub const fn is_applied(&self) -> bool {
        matches!(self.state, MigrationState::Applied { .. })
    }

    /// Returns `true` if the migration is applied and its file changed since.
    pub const fn has_drift(&self) -> bool {
        matches!(self.state, MigrationState::Applied { drift: true, .. })
    }
}

/// Discovered migrations joined with the ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    /// One entry per discovered migration, in discovery order.
    pub entries: Vec<StatusEntry>,
    /// Ledger records with no matching file.
    pub orphaned: Vec<AppliedRecord>,
}

impl StatusReport {
    /// Returns the number of applied migrations.
    pub fn applied_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_applied()).count()
    }

    /// Returns the number of pending migrations.
    pub fn pending_count(&self) -> usize {
        self.entries.len() - self.applied_count()
    }

    /// Returns the number of applied migrations whose file changed.
    pub fn drift_count(&self) -> usize {
        self.entries.iter().filter(|e| e.has_drift()).count()
    }

    /// Renders the report for a terminal.
    ///
    /// ```text
    /// core
    ///  [X] 001_init
    ///  [X] 002_constraints  (changed since applied)
    /// twitter/tweet
    ///  [ ] 001_schema
    ///
    /// 3 migrations: 2 applied, 1 pending, 1 changed since applied
    /// ```
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        if self.entries.is_empty() {
            out.push_str("No migrations found.\n");
        }

        let mut current: Option<&str> = None;
        for entry in &self.entries {
            if current != Some(entry.domain_app.as_str()) {
                let _ = writeln!(out, "{}", entry.domain_app);
                current = Some(entry.domain_app.as_str());
            }
            let mark = if entry.is_applied() { 'X' } else { ' ' };
            let note = if entry.has_drift() {
                "  (changed since applied)"
            } else {
                ""
            };
            let _ = writeln!(out, " [{mark}] {}{note}", entry.name);
        }

        if !self.orphaned.is_empty() {
            out.push_str("\nLedger records without a file:\n");
            for record in &self.orphaned {
                let _ = writeln!(
                    out,
                    " [?] {}  (applied {})",
                    record.identity,
                    record.applied_at.format("%Y-%m-%d %H:%M:%S UTC")
                );
            }
        }

        let _ = write!(
            out,
            "\n{} migrations: {} applied, {} pending",
            self.entries.len(),
            self.applied_count(),
            self.pending_count()
        );
        if self.drift_count() > 0 {
            let _ = write!(out, ", {} changed since applied", self.drift_count());
        }
        out.push('\n');
        out
    }

    /// Renders the report as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, MigrateError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| MigrateError::Configuration(format!("Cannot render status as JSON: {e}")))
    }
}

/// Joins discovered migrations with ledger records.
///
/// Only entries in `scope` are reported when a scope is given. An empty
/// ledger reports everything as pending.
pub fn status(
    descriptors: &[MigrationDescriptor],
    applied: &BTreeMap<String, AppliedRecord>,
    scope: Option<&str>,
) -> StatusReport {
    let entries = descriptors
        .iter()
        .filter(|d| d.in_scope(scope))
        .map(|d| {
            let state = applied.get(&d.identity).map_or(MigrationState::Pending, |record| {
                MigrationState::Applied {
                    applied_at: record.applied_at,
                    drift: record.checksum != d.checksum,
                }
            });
            StatusEntry {
                identity: d.identity.clone(),
                domain_app: d.domain_app.clone(),
                name: d.name.clone(),
                path: d.path.clone(),
                state,
            }
        })
        .collect();

    let orphaned = applied
        .values()
        .filter(|r| identity_in_scope(&r.identity, scope))
        .filter(|r| !descriptors.iter().any(|d| d.identity == r.identity))
        .cloned()
        .collect();

    StatusReport { entries, orphaned }
}

/// What [`rollback_last`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollbackOutcome {
    /// The record was removed from the ledger. Schema effects remain.
    RolledBack(AppliedRecord),
    /// No applied migration matched.
    NothingToRollBack,
}

impl RollbackOutcome {
    /// The notice shown after a rollback.
    pub const SCHEMA_NOTICE: &'static str =
        "Only the ledger record was removed; schema effects of the migration were not reversed.";

    /// Returns a one-paragraph description for the operator.
    pub fn message(&self) -> String {
        match self {
            Self::RolledBack(record) => format!(
                "Rolled back '{}' (applied {}).\n{}",
                record.identity,
                record.applied_at.format("%Y-%m-%d %H:%M:%S UTC"),
                Self::SCHEMA_NOTICE
            ),
            Self::NothingToRollBack => "Nothing to roll back.".to_string(),
        }
    }
}

/// Picks the record to roll back: latest `applied_at`, ties broken by the
/// greatest identity.
pub fn rollback_candidate<'a>(
    applied: &'a BTreeMap<String, AppliedRecord>,
    scope: Option<&str>,
) -> Option<&'a AppliedRecord> {
    applied
        .values()
        .filter(|r| identity_in_scope(&r.identity, scope))
        .max_by(|a, b| {
            a.applied_at
                .cmp(&b.applied_at)
                .then_with(|| a.identity.cmp(&b.identity))
        })
}

/// Removes the most recently applied record from the ledger.
///
/// The migration's schema effects are left in place.
pub async fn rollback_last(
    ledger: &dyn LedgerStore,
    applied: &BTreeMap<String, AppliedRecord>,
    scope: Option<&str>,
) -> Result<RollbackOutcome, MigrateError> {
    let Some(record) = rollback_candidate(applied, scope) else {
        tracing::info!("Nothing to roll back");
        return Ok(RollbackOutcome::NothingToRollBack);
    };

    ledger.remove_applied(&record.identity).await?;
    tracing::warn!(
        identity = %record.identity,
        "Removed ledger record; schema effects were not reversed"
    );
    Ok(RollbackOutcome::RolledBack(record.clone()))
}
