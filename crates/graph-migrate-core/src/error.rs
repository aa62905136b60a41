//! Core error types for graph-migrate.
//!
//! This module provides the error enum [`MigrateError`] shared by every crate
//! in the workspace. Variants carry enough context (migration identity, file
//! path, failing statement) for an operator to act on them without re-running
//! with extra logging.

use std::path::PathBuf;

use thiserror::Error;

/// The primary error type for graph-migrate.
///
/// Covers discovery, execution, ledger, backend, and configuration failures.
/// Each variant maps to a process exit code via [`MigrateError::exit_code`].
#[derive(Error, Debug)]
pub enum MigrateError {
    // ── Discovery ────────────────────────────────────────────────────

    /// Two distinct files resolve to the same migration identity.
    #[error("Duplicate migration identity '{identity}': {} and {}", first.display(), second.display())]
    DuplicateIdentity {
        /// The colliding identity.
        identity: String,
        /// The path that claimed the identity first.
        first: PathBuf,
        /// The path that collided with it.
        second: PathBuf,
    },

    /// A migration file could not be read.
    #[error("Cannot read migration file '{}': {source}", path.display())]
    Read {
        /// The unreadable file.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    // ── Execution ────────────────────────────────────────────────────

    /// A statement of a migration failed to execute.
    #[error(
        "Migration '{identity}' ({}) failed at statement {statement_index}: {message}\n  statement: {statement}",
        path.display()
    )]
    Execution {
        /// Identity of the failing migration.
        identity: String,
        /// Path of the backing file.
        path: PathBuf,
        /// 1-based index of the failing statement within the file.
        statement_index: usize,
        /// The statement text that failed.
        statement: String,
        /// The backend's error message.
        message: String,
    },

    /// A migration file changed on disk between discovery and execution.
    #[error("Migration '{identity}' changed on disk since discovery: {}", path.display())]
    ChecksumChanged {
        /// Identity of the changed migration.
        identity: String,
        /// Path of the backing file.
        path: PathBuf,
    },

    // ── Ledger ───────────────────────────────────────────────────────

    /// The ledger already holds a record for this identity.
    #[error("Ledger conflict: migration '{0}' is already recorded as applied")]
    LedgerConflict(String),

    /// A requested record or object does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    // ── Backend ──────────────────────────────────────────────────────

    /// The backend rejected a write because of a uniqueness constraint.
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// A generic database error reported by the backend.
    #[error("Database error: {0}")]
    Database(String),

    /// A value returned by the backend had an unexpected shape.
    #[error("Decode error: {0}")]
    Decode(String),

    /// The backend could not be reached.
    #[error("Connection error: {0}")]
    Connection(String),

    // ── Runtime ──────────────────────────────────────────────────────

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An operation exceeded its deadline.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// The run was cancelled by the operator.
    #[error("Cancelled")]
    Cancelled,

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MigrateError {
    /// Returns the process exit code associated with this error.
    ///
    /// Codes follow `sysexits.h` where one applies:
    ///
    /// - `DuplicateIdentity`, `Read`, `ChecksumChanged`, `Decode` -> 65 (data error)
    /// - `Connection` -> 69 (service unavailable)
    /// - `Io` -> 74 (I/O error)
    /// - `LedgerConflict`, `Timeout` -> 75 (temporary failure)
    /// - `Configuration` -> 78 (configuration error)
    /// - `Cancelled` -> 130
    /// - Everything else -> 1
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::DuplicateIdentity { .. }
            | Self::Read { .. }
            | Self::ChecksumChanged { .. }
            | Self::Decode(_) => 65,
            Self::Connection(_) => 69,
            Self::Io(_) => 74,
            Self::LedgerConflict(_) | Self::Timeout(_) => 75,
            Self::Configuration(_) => 78,
            Self::Cancelled => 130,
            Self::Execution { .. }
            | Self::NotFound(_)
            | Self::ConstraintViolation(_)
            | Self::Database(_) => 1,
        }
    }

    /// Returns `true` if this error is a [`MigrateError::NotFound`].
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// A convenience type alias for `Result<T, MigrateError>`.
pub type MigrateResult<T> = Result<T, MigrateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        let dup = MigrateError::DuplicateIdentity {
            identity: "core/001".into(),
            first: PathBuf::from("a"),
            second: PathBuf::from("b"),
        };
        assert_eq!(dup.exit_code(), 65);
        assert_eq!(MigrateError::Connection("x".into()).exit_code(), 69);
        assert_eq!(MigrateError::LedgerConflict("x".into()).exit_code(), 75);
        assert_eq!(MigrateError::Configuration("x".into()).exit_code(), 78);
        assert_eq!(MigrateError::Cancelled.exit_code(), 130);
        assert_eq!(MigrateError::Database("x".into()).exit_code(), 1);
        assert_eq!(MigrateError::NotFound("x".into()).exit_code(), 1);
    }

    #[test]
    fn test_every_exit_code_is_nonzero() {
        let errors = [
            MigrateError::NotFound("x".into()),
            MigrateError::Decode("x".into()),
            MigrateError::Timeout("x".into()),
            MigrateError::ConstraintViolation("x".into()),
        ];
        assert!(errors.iter().all(|e| e.exit_code() != 0));
    }

    #[test]
    fn test_execution_error_display_carries_context() {
        let err = MigrateError::Execution {
            identity: "core/identity/001_user_schema".into(),
            path: PathBuf::from("core/identity/migrations/001_user_schema.cypher"),
            statement_index: 2,
            statement: "CREATE INDEX user_email FOR (u:User) ON (u.email)".into(),
            message: "index already exists".into(),
        };
        let text = err.to_string();
        assert!(text.contains("core/identity/001_user_schema"));
        assert!(text.contains("statement 2"));
        assert!(text.contains("CREATE INDEX user_email"));
        assert!(text.contains("index already exists"));
    }

    #[test]
    fn test_duplicate_identity_display() {
        let err = MigrateError::DuplicateIdentity {
            identity: "core/001_init".into(),
            first: PathBuf::from("migrations/001_init.cypher"),
            second: PathBuf::from("core/migrations/001_init.cypher"),
        };
        assert!(err.to_string().contains("migrations/001_init.cypher"));
        assert!(err.to_string().contains("core/migrations/001_init.cypher"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err: MigrateError = io_err.into();
        assert_eq!(err.exit_code(), 74);
        assert!(err.to_string().contains("file missing"));
    }

    #[test]
    fn test_is_not_found() {
        assert!(MigrateError::NotFound("x".into()).is_not_found());
        assert!(!MigrateError::Cancelled.is_not_found());
    }
}
