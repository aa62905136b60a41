//! # graph-migrate-backends
//!
//! Graph database backends for graph-migrate. Every backend implements
//! [`GraphBackend`], which runs statements in auto-commit mode, returns typed
//! rows from queries, and opens explicit [`GraphTransaction`]s.
//!
//! Supported backends:
//! - Neo4j over the transactional HTTP API (feature `http`, on by default)
//! - An in-memory recording backend for tests and dry runs

#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_const_for_fn)]

pub mod base;
#[cfg(feature = "http")]
pub mod http;
pub mod memory;
pub mod value;

pub use base::{GraphBackend, GraphTransaction, Params, StatementKind};
#[cfg(feature = "http")]
pub use http::HttpBackend;
pub use memory::MemoryBackend;
pub use value::{FromValue, Row, Value};
