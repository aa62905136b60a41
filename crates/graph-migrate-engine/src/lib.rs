//! # graph-migrate-engine
//!
//! Migration engine for graph databases. Discovers Cypher migration files
//! across a multi-domain source tree, checks them against a ledger of applied
//! migrations, and applies the pending ones in order, one transaction each.
//!
//! ## Architecture
//!
//! - [`MigrationLoader`] expands glob patterns and yields [`MigrationDescriptor`]s
//!   sorted by identity, each with a SHA-256 checksum.
//! - [`parser::Statements`] splits a file into statements.
//! - [`LedgerStore`] records applied migrations ([`GraphLedger`], [`MemoryLedger`]).
//! - [`MigrationExecutor`] plans and applies pending migrations.
//! - [`report`] joins discovery with the ledger for status and rollback.
//! - [`Migrator`] holds the handles and exposes the operations above.
//!
//! ## Module Overview
//!
//! - [`parser`] - `Statements`, `parse_statements`
//! - [`descriptor`] - `MigrationDescriptor`, identity rules, checksums
//! - [`loader`] - `MigrationLoader`, `Discovery`
//! - [`ledger`] - `LedgerStore`, `AppliedRecord`, `GraphLedger`, `MemoryLedger`
//! - [`executor`] - `MigrationExecutor`, `MigrationPlan`, `ApplyOptions`, `ApplySummary`
//! - [`report`] - `StatusReport`, `RollbackOutcome`
//! - [`skeleton`] - `create_skeleton`
//! - [`migrator`] - `Migrator`

#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod descriptor;
pub mod executor;
pub mod ledger;
pub mod loader;
pub mod migrator;
pub mod parser;
pub mod report;
pub mod skeleton;

// Re-export key types at the crate root.
pub use descriptor::MigrationDescriptor;
pub use executor::{ApplyOptions, ApplySummary, MigrationExecutor, MigrationPlan, MigrationStep};
pub use ledger::{AppliedRecord, GraphLedger, LedgerStore, MemoryLedger};
pub use loader::{Discovery, MigrationLoader};
pub use migrator::Migrator;
pub use parser::{parse_statements, Statements};
pub use report::{MigrationState, RollbackOutcome, StatusEntry, StatusReport};
