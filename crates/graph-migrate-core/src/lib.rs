//! # graph-migrate-core
//!
//! Core error types, settings, and logging for the graph-migrate workspace.
//! This crate has no workspace dependencies and provides the foundation for all other crates.
//!
//! ## Modules
//!
//! - [`error`] - The [`MigrateError`] enum and result alias
//! - [`settings`] - Runtime configuration with sensible defaults
//! - [`settings_loader`] - Loading settings from TOML/JSON files and the environment
//! - [`logging`] - Tracing-based logging integration

pub mod error;
pub mod logging;
pub mod settings;
pub mod settings_loader;

// Re-export the most commonly used types at the crate root.
pub use error::{MigrateError, MigrateResult};
pub use settings::{DatabaseSettings, Settings};
