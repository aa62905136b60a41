//! The applied-state ledger.
//!
//! A [`LedgerStore`] remembers which migrations ran, when, and with what
//! checksum. A record exists only for a migration whose statements all
//! committed; rollback deletes the record and leaves the schema alone.
//!
//! [`GraphLedger`] keeps one node per applied migration in the target database
//! itself, guarded by a uniqueness constraint on `identity`.
//! [`MemoryLedger`] keeps the same records in process.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use graph_migrate_backends::{GraphBackend, Row, Value};
use graph_migrate_core::MigrateError;
use serde::Serialize;

/// The default node label for ledger records.
pub const DEFAULT_LABEL: &str = "SchemaMigration";

/// The uniqueness constraint name used with the default label.
pub const DEFAULT_CONSTRAINT: &str = "graph_migrate_identity_unique";

/// Proof that a migration was applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedRecord {
    /// The migration identity.
    pub identity: String,
    /// When the store wrote the record.
    pub applied_at: DateTime<Utc>,
    /// The checksum of the file when it was applied.
    pub checksum: String,
}

impl AppliedRecord {
    /// Creates a record.
    pub fn new(
        identity: impl Into<String>,
        applied_at: DateTime<Utc>,
        checksum: impl Into<String>,
    ) -> Self {
        Self {
            identity: identity.into(),
            applied_at,
            checksum: checksum.into(),
        }
    }

    /// Decodes a record from a row with `identity`, `applied_at`, and
    /// `checksum` columns.
    pub fn from_row(row: &Row) -> Result<Self, MigrateError> {
        Ok(Self {
            identity: row.get("identity")?,
            applied_at: row.get("applied_at")?,
            checksum: row.get("checksum")?,
        })
    }
}

/// Persistent record of applied migrations.
#[async_trait::async_trait]
pub trait LedgerStore: Send + Sync {
    /// Creates whatever the store needs (constraints, indexes). Idempotent.
    async fn ensure_schema(&self) -> Result<(), MigrateError>;

    /// Returns every applied record keyed by identity.
    ///
    /// A store that was never written to yields an empty map.
    async fn list_applied(&self) -> Result<BTreeMap<String, AppliedRecord>, MigrateError>;

    /// Writes one record with a store-generated timestamp.
    ///
    /// Fails with [`MigrateError::LedgerConflict`] if `identity` is already recorded.
    async fn record_applied(&self, identity: &str, checksum: &str) -> Result<(), MigrateError>;

    /// Deletes the record for `identity`.
    ///
    /// Fails with [`MigrateError::NotFound`] if there is none.
    async fn remove_applied(&self, identity: &str) -> Result<(), MigrateError>;
}

// ── GraphLedger ─────────────────────────────────────────────────────

/// A ledger stored as nodes in the graph database being migrated.
pub struct GraphLedger {
    backend: Arc<dyn GraphBackend>,
    label: String,
}

impl std::fmt::Debug for GraphLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphLedger")
            .field("vendor", &self.backend.vendor())
            .field("label", &self.label)
            .finish()
    }
}

impl GraphLedger {
    /// Creates a ledger using `label` for its nodes.
    ///
    /// The label is interpolated into Cypher, so it must be a plain
    /// identifier: an ASCII letter or `_` followed by ASCII letters, digits,
    /// or `_`.
    pub fn new(backend: Arc<dyn GraphBackend>, label: impl Into<String>) -> Result<Self, MigrateError> {
        let label = label.into();
        validate_label(&label)?;
        Ok(Self { backend, label })
    }

    /// Creates a ledger using [`DEFAULT_LABEL`].
    pub fn with_default_label(backend: Arc<dyn GraphBackend>) -> Self {
        Self {
            backend,
            label: DEFAULT_LABEL.to_string(),
        }
    }

    /// Returns the node label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns the name of the uniqueness constraint on `identity`.
    pub fn constraint_name(&self) -> String {
        if self.label == DEFAULT_LABEL {
            DEFAULT_CONSTRAINT.to_string()
        } else {
            format!("graph_migrate_{}_identity_unique", self.label.to_lowercase())
        }
    }

    /// Returns the statement creating the uniqueness constraint.
    pub fn ensure_schema_cypher(&self) -> String {
        format!(
            "CREATE CONSTRAINT {} IF NOT EXISTS FOR (m:{}) REQUIRE m.identity IS UNIQUE",
            self.constraint_name(),
            self.label
        )
    }

    /// Returns the query listing every record.
    pub fn list_applied_cypher(&self) -> String {
        format!(
            "MATCH (m:{}) RETURN m.identity AS identity, toString(m.applied_at) AS applied_at, \
             m.checksum AS checksum ORDER BY m.identity",
            self.label
        )
    }

    /// Returns the statement writing a record unless one already exists.
    pub fn record_applied_cypher(&self) -> String {
        format!(
            "OPTIONAL MATCH (e:{label} {{identity: $identity}}) WITH e WHERE e IS NULL \
             CREATE (m:{label} {{identity: $identity, checksum: $checksum, applied_at: datetime()}}) \
             RETURN m.identity AS identity",
            label = self.label
        )
    }

    /// Returns the statement deleting a record and counting what it removed.
    pub fn remove_applied_cypher(&self) -> String {
        format!(
            "MATCH (m:{} {{identity: $identity}}) DELETE m RETURN count(m) AS removed",
            self.label
        )
    }
}

#[async_trait::async_trait]
impl LedgerStore for GraphLedger {
    async fn ensure_schema(&self) -> Result<(), MigrateError> {
        self.backend.execute(&self.ensure_schema_cypher(), &[]).await?;
        tracing::debug!(label = %self.label, "Ledger constraint ensured");
        Ok(())
    }

    async fn list_applied(&self) -> Result<BTreeMap<String, AppliedRecord>, MigrateError> {
        let rows = self.backend.query(&self.list_applied_cypher(), &[]).await?;
        rows.iter()
            .map(|row| AppliedRecord::from_row(row).map(|r| (r.identity.clone(), r)))
            .collect()
    }

    async fn record_applied(&self, identity: &str, checksum: &str) -> Result<(), MigrateError> {
        let params = [
            ("identity", Value::from(identity)),
            ("checksum", Value::from(checksum)),
        ];
        let rows = match self.backend.query(&self.record_applied_cypher(), &params).await {
            Ok(rows) => rows,
            Err(MigrateError::ConstraintViolation(_)) => {
                return Err(MigrateError::LedgerConflict(identity.to_string()));
            }
            Err(e) => return Err(e),
        };
        if rows.is_empty() {
            return Err(MigrateError::LedgerConflict(identity.to_string()));
        }
        Ok(())
    }

    async fn remove_applied(&self, identity: &str) -> Result<(), MigrateError> {
        let params = [("identity", Value::from(identity))];
        let rows = self.backend.query(&self.remove_applied_cypher(), &params).await?;
        let removed = match rows.first() {
            Some(row) => row.get::<i64>("removed")?,
            None => 0,
        };
        if removed == 0 {
            return Err(MigrateError::NotFound(format!(
                "No ledger record for migration '{identity}'"
            )));
        }
        Ok(())
    }
}

fn validate_label(label: &str) -> Result<(), MigrateError> {
    let mut chars = label.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(MigrateError::Configuration(format!(
            "Invalid ledger label '{label}': use letters, digits, and underscores"
        )))
    }
}

// ── MemoryLedger ────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct MemoryLedgerState {
    records: BTreeMap<String, AppliedRecord>,
    last_stamp: Option<DateTime<Utc>>,
    schema_ensured: bool,
}

/// An in-process ledger.
///
/// Timestamps are strictly increasing within one ledger even when the clock
/// does not advance between writes. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryLedger {
    state: Arc<Mutex<MemoryLedgerState>>,
}

impl MemoryLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a ledger pre-populated with `records`.
    pub fn with_records(records: impl IntoIterator<Item = AppliedRecord>) -> Self {
        let ledger = Self::new();
        for record in records {
            ledger.insert(record);
        }
        ledger
    }

    /// Inserts or replaces a record verbatim, bypassing conflict checks.
    pub fn insert(&self, record: AppliedRecord) {
        let mut state = self.state.lock().expect("memory ledger lock poisoned");
        if state.last_stamp.map_or(true, |last| record.applied_at > last) {
            state.last_stamp = Some(record.applied_at);
        }
        state.records.insert(record.identity.clone(), record);
    }

    /// Returns a copy of the record for `identity`.
    pub fn get(&self, identity: &str) -> Option<AppliedRecord> {
        let state = self.state.lock().expect("memory ledger lock poisoned");
        state.records.get(identity).cloned()
    }

    /// Returns the number of records.
    pub fn len(&self) -> usize {
        self.state.lock().expect("memory ledger lock poisoned").records.len()
    }

    /// Returns whether the ledger holds no records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns whether [`LedgerStore::ensure_schema`] has been called.
    pub fn schema_ensured(&self) -> bool {
        self.state.lock().expect("memory ledger lock poisoned").schema_ensured
    }
}

#[async_trait::async_trait]
impl LedgerStore for MemoryLedger {
    async fn ensure_schema(&self) -> Result<(), MigrateError> {
        self.state.lock().expect("memory ledger lock poisoned").schema_ensured = true;
        Ok(())
    }

    async fn list_applied(&self) -> Result<BTreeMap<String, AppliedRecord>, MigrateError> {
        Ok(self.state.lock().expect("memory ledger lock poisoned").records.clone())
    }

    async fn record_applied(&self, identity: &str, checksum: &str) -> Result<(), MigrateError> {
        let mut state = self.state.lock().expect("memory ledger lock poisoned");
        if state.records.contains_key(identity) {
            return Err(MigrateError::LedgerConflict(identity.to_string()));
        }
        let now = Utc::now();
        let stamp = match state.last_stamp {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        state.last_stamp = Some(stamp);
        state
            .records
            .insert(identity.to_string(), AppliedRecord::new(identity, stamp, checksum));
        Ok(())
    }

    async fn remove_applied(&self, identity: &str) -> Result<(), MigrateError> {
        let mut state = self.state.lock().expect("memory ledger lock poisoned");
        state.records.remove(identity).map(|_| ()).ok_or_else(|| {
            MigrateError::NotFound(format!("No ledger record for migration '{identity}'"))
        })
    }
}
