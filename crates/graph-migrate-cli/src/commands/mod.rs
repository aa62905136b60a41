//! Built-in commands.
//!
//! Each command implements the
//! [`MigrationCommand`](crate::command::MigrationCommand) trait.

pub mod create;
pub mod down;
pub mod status;
pub mod up;

pub use create::CreateCommand;
pub use down::DownCommand;
pub use status::StatusCommand;
pub use up::UpCommand;

use crate::command::CommandRegistry;

/// Registers all built-in commands into the given registry.
pub fn register_builtin_commands(registry: &mut CommandRegistry) {
    registry.register(Box::new(UpCommand));
    registry.register(Box::new(StatusCommand));
    registry.register(Box::new(CreateCommand));
    registry.register(Box::new(DownCommand));
}
