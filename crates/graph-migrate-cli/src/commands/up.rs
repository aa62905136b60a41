//! The `up` command.
//!
//! Applies pending migrations in identity order, one transaction per
//! migration, stopping at the first failure.

use std::fmt::Write as _;

use async_trait::async_trait;
use graph_migrate_core::MigrateError;

use crate::command::{app_arg, scope_arg, CommandContext, MigrationCommand};

/// Applies pending migrations.
///
/// Supports `--app` to limit the run to one `domain/app` and `--dry-run` to
/// print the statements that would run without touching the database.
pub struct UpCommand;

#[async_trait]
impl MigrationCommand for UpCommand {
    fn name(&self) -> &'static str {
        "up"
    }

    fn help(&self) -> &'static str {
        "Apply pending migrations"
    }

    fn add_arguments(&self, cmd: clap::Command) -> clap::Command {
        cmd.arg(app_arg("Only apply migrations of this domain/app"))
            .arg(
                clap::Arg::new("dry-run")
                    .long("dry-run")
                    .action(clap::ArgAction::SetTrue)
                    .help("Show what would be applied without executing anything"),
            )
    }

    async fn handle(
        &self,
        matches: &clap::ArgMatches,
        ctx: &CommandContext,
    ) -> Result<String, MigrateError> {
        let scope = scope_arg(matches);
        let dry_run = matches.get_flag("dry-run");

        if dry_run {
            tracing::info!("Dry run mode: nothing will be executed or recorded");
        }

        let summary = ctx.migrator().up(scope, dry_run).await?;

        let mut out = String::new();
        if summary.is_up_to_date() {
            out.push_str("No migrations to apply; up to date.\n");
        } else if summary.dry_run {
            let _ = writeln!(out, "Would apply {} migration(s):", summary.planned.len());
            for planned in &summary.planned {
                let _ = writeln!(
                    out,
                    "  {} ({} statement(s))",
                    planned.identity,
                    planned.statements.len()
                );
                for statement in &planned.statements {
                    let _ = writeln!(out, "    {};", statement.replace('\n', "\n    "));
                }
            }
        } else {
            let _ = writeln!(out, "Applied {} migration(s):", summary.count());
            for identity in &summary.applied {
                let _ = writeln!(out, "  {identity}");
            }
        }
        Ok(out)
    }
}
