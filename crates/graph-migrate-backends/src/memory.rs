//! In-process graph backend.
//!
//! [`MemoryBackend`] does not interpret statements. It records every statement
//! it is asked to run, tracks which ones were committed, and can be told to
//! fail on statements matching a pattern or to answer queries with canned rows.
//! Like Neo4j, its transactions refuse to mix schema commands with data
//! statements. It backs the engine's and the CLI's tests.

use std::sync::{Arc, Mutex, MutexGuard};

use graph_migrate_core::MigrateError;

use crate::base::{GraphBackend, GraphTransaction, Params, StatementKind};
use crate::value::Row;

#[derive(Debug, Default)]
struct MemoryState {
    executed: Vec<String>,
    committed: Vec<String>,
    commits: usize,
    rollbacks: usize,
    failures: Vec<(String, String)>,
    responses: Vec<(String, Vec<Row>)>,
}

impl MemoryState {
    fn attempt(&mut self, statement: &str) -> Result<(), MigrateError> {
        self.executed.push(statement.to_string());
        match self.failures.iter().find(|(pattern, _)| statement.contains(pattern.as_str())) {
            Some((_, message)) => Err(MigrateError::Database(message.clone())),
            None => Ok(()),
        }
    }
}

/// A recording graph backend living entirely in memory.
///
/// Clones share state, so a test can keep a handle while the engine owns
/// another.
///
/// # Examples
///
/// ```
/// use graph_migrate_backends::{GraphBackend, MemoryBackend};
///
/// let backend = MemoryBackend::new();
/// backend.fail_on("DROP", "drops are not allowed");
/// assert_eq!(backend.vendor(), "memory");
/// assert!(backend.executed_statements().is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().expect("memory backend lock poisoned")
    }

    /// Makes every statement containing `pattern` fail with `message`.
    pub fn fail_on(&self, pattern: impl Into<String>, message: impl Into<String>) {
        self.state().failures.push((pattern.into(), message.into()));
    }

    /// Removes all failure rules.
    pub fn clear_failures(&self) {
        self.state().failures.clear();
    }

    /// Answers queries containing `pattern` with `rows`.
    pub fn respond_to(&self, pattern: impl Into<String>, rows: Vec<Row>) {
        self.state().responses.push((pattern.into(), rows));
    }

    /// Returns every statement attempted so far, in order, including failed ones.
    pub fn executed_statements(&self) -> Vec<String> {
        self.state().executed.clone()
    }

    /// Returns every statement that became durable, in commit order.
    pub fn committed_statements(&self) -> Vec<String> {
        self.state().committed.clone()
    }

    /// Returns the number of explicit transactions committed.
    pub fn commit_count(&self) -> usize {
        self.state().commits
    }

    /// Returns the number of explicit transactions rolled back.
    pub fn rollback_count(&self) -> usize {
        self.state().rollbacks
    }
}

#[async_trait::async_trait]
impl GraphBackend for MemoryBackend {
    fn vendor(&self) -> &str {
        "memory"
    }

    async fn execute(&self, statement: &str, _params: Params<'_>) -> Result<(), MigrateError> {
        let mut state = self.state();
        state.attempt(statement)?;
        state.committed.push(statement.to_string());
        Ok(())
    }

    async fn query(&self, statement: &str, _params: Params<'_>) -> Result<Vec<Row>, MigrateError> {
        let mut state = self.state();
        state.attempt(statement)?;
        state.committed.push(statement.to_string());
        let rows = state
            .responses
            .iter()
            .find(|(pattern, _)| statement.contains(pattern.as_str()))
            .map(|(_, rows)| rows.clone())
            .unwrap_or_default();
        Ok(rows)
    }

    async fn begin_transaction(&self) -> Result<Box<dyn GraphTransaction>, MigrateError> {
        Ok(Box::new(MemoryTransaction {
            state: Arc::clone(&self.state),
            pending: Vec::new(),
            kind: None,
        }))
    }
}

/// A transaction on a [`MemoryBackend`]; statements become visible in
/// [`MemoryBackend::committed_statements`] only on commit.
struct MemoryTransaction {
    state: Arc<Mutex<MemoryState>>,
    pending: Vec<String>,
    kind: Option<StatementKind>,
}

impl MemoryTransaction {
    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().expect("memory backend lock poisoned")
    }
}

#[async_trait::async_trait]
impl GraphTransaction for MemoryTransaction {
    async fn execute(&mut self, statement: &str, _params: Params<'_>) -> Result<(), MigrateError> {
        let kind = StatementKind::of(statement);
        if let Some(first) = self.kind.filter(|first| *first != kind) {
            self.state().executed.push(statement.to_string());
            return Err(MigrateError::Database(mixed_kinds_message(first)));
        }
        self.state().attempt(statement)?;
        self.kind = Some(kind);
        self.pending.push(statement.to_string());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), MigrateError> {
        let mut state = self.state.lock().expect("memory backend lock poisoned");
        state.committed.extend(self.pending.iter().cloned());
        state.commits += 1;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), MigrateError> {
        self.state().rollbacks += 1;
        Ok(())
    }
}

fn mixed_kinds_message(first: StatementKind) -> String {
    let detail = match first {
        StatementKind::Schema => "Tried to execute Write query after executing Schema modification",
        StatementKind::Data => "Tried to execute Schema modification after executing Write query",
    };
    format!("Neo.ClientError.Transaction.ForbiddenDueToTransactionType: {detail}")
}
