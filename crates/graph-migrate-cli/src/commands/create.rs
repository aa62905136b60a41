//! The `create` command.
//!
//! Writes a new, empty, numbered migration file for a `domain/app`.

use async_trait::async_trait;
use graph_migrate_core::MigrateError;

use crate::command::{CommandContext, MigrationCommand};

/// Creates a new migration skeleton.
pub struct CreateCommand;

#[async_trait]
impl MigrationCommand for CreateCommand {
    fn name(&self) -> &'static str {
        "create"
    }

    fn help(&self) -> &'static str {
        "Create a new empty migration file"
    }

    fn add_arguments(&self, cmd: clap::Command) -> clap::Command {
        cmd.arg(
            clap::Arg::new("name")
                .help("Descriptive name, e.g. \"add user email index\"")
                .required(true),
        )
        .arg(
            clap::Arg::new("app")
                .long("app")
                .value_name("DOMAIN/APP")
                .required(true)
                .help("The domain/app the migration belongs to"),
        )
    }

    async fn handle(
        &self,
        matches: &clap::ArgMatches,
        ctx: &CommandContext,
    ) -> Result<String, MigrateError> {
        let name = matches
            .get_one::<String>("name")
            .ok_or_else(|| MigrateError::Configuration("Missing migration name".into()))?;
        let app = matches
            .get_one::<String>("app")
            .ok_or_else(|| MigrateError::Configuration("Missing --app".into()))?;

        let path = ctx.migrator().create_skeleton(app, name)?;
        Ok(format!("Created {}\n", path.display()))
    }
}
