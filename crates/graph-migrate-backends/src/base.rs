//! Base graph backend traits.
//!
//! This module defines the [`GraphBackend`] trait that every backend
//! implementation must satisfy, along with [`GraphTransaction`] for executing
//! a group of statements as one unit of work. [`StatementKind`] tells schema
//! commands apart from data statements, since a graph transaction may not mix
//! the two.

use graph_migrate_core::MigrateError;

use crate::value::{Row, Value};

/// Whether a statement changes the schema (indexes, constraints) or reads and
/// writes data.
///
/// Neo4j refuses a data write after a schema change in the same transaction,
/// and a schema change after a data write, so the two kinds must be committed
/// separately.
///
/// ```
/// use graph_migrate_backends::StatementKind;
///
/// assert_eq!(
///     StatementKind::of("CREATE CONSTRAINT user_id IF NOT EXISTS FOR (u:User) REQUIRE u.id IS UNIQUE"),
///     StatementKind::Schema
/// );
/// assert_eq!(StatementKind::of("create text index t for (n:N) on (n.x)"), StatementKind::Schema);
/// assert_eq!(StatementKind::of("MERGE (s:Settings {key: 'version'})"), StatementKind::Data);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    /// `CREATE`/`DROP` of an index or constraint.
    Schema,
    /// Everything else.
    Data,
}

impl StatementKind {
    const INDEX_TYPES: [&'static str; 7] =
        ["RANGE", "TEXT", "POINT", "LOOKUP", "FULLTEXT", "VECTOR", "BTREE"];

    /// Classifies a statement by its leading keywords, case-insensitively.
    pub fn of(statement: &str) -> Self {
        let mut words = statement
            .split_whitespace()
            .map(str::to_ascii_uppercase)
            .peekable();

        if !matches!(words.next().as_deref(), Some("CREATE" | "DROP")) {
            return Self::Data;
        }
        if words.peek().map(String::as_str) == Some("OR") {
            words.next();
            if words.next().as_deref() != Some("REPLACE") {
                return Self::Data;
            }
        }
        if words
            .peek()
            .is_some_and(|w| Self::INDEX_TYPES.contains(&w.as_str()))
        {
            words.next();
        }
        match words.next().as_deref() {
            Some("INDEX" | "CONSTRAINT") => Self::Schema,
            _ => Self::Data,
        }
    }
}

/// Named statement parameters, passed as `$name` placeholders.
pub type Params<'a> = &'a [(&'a str, Value)];

/// An open transaction on a graph backend.
///
/// Transactions are obtained from [`GraphBackend::begin_transaction`] and must
/// be explicitly committed or rolled back. A transaction that is dropped
/// without either is never committed; the server discards it when its own
/// transaction timeout expires.
#[async_trait::async_trait]
pub trait GraphTransaction: Send {
    /// Executes a statement inside the transaction.
    async fn execute(&mut self, statement: &str, params: Params<'_>) -> Result<(), MigrateError>;

    /// Commits every statement executed so far.
    async fn commit(self: Box<Self>) -> Result<(), MigrateError>;

    /// Discards every statement executed so far.
    async fn rollback(self: Box<Self>) -> Result<(), MigrateError>;
}

/// The core trait for graph database backends.
///
/// Each backend provides a uniform interface for executing statements in
/// auto-commit mode, running queries that return rows, and opening explicit
/// transactions. All methods are async because every call crosses the network.
#[async_trait::async_trait]
pub trait GraphBackend: Send + Sync {
    /// Returns the vendor name (e.g. "neo4j-http", "memory").
    fn vendor(&self) -> &str;

    /// Executes a statement in its own auto-committed transaction.
    async fn execute(&self, statement: &str, params: Params<'_>) -> Result<(), MigrateError>;

    /// Executes a statement in its own auto-committed transaction and returns
    /// all result rows.
    async fn query(&self, statement: &str, params: Params<'_>) -> Result<Vec<Row>, MigrateError>;

    /// Begins a new explicit transaction.
    async fn begin_transaction(&self) -> Result<Box<dyn GraphTransaction>, MigrateError>;
}
