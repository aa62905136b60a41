//! The `down` command.
//!
//! Removes the most recent ledger record. The migration's schema effects stay
//! in the database; the next `up` applies the file again.

use async_trait::async_trait;
use graph_migrate_core::MigrateError;

use crate::command::{app_arg, scope_arg, CommandContext, MigrationCommand};

/// Rolls back the last applied migration in the ledger only.
pub struct DownCommand;

#[async_trait]
impl MigrationCommand for DownCommand {
    fn name(&self) -> &'static str {
        "down"
    }

    fn help(&self) -> &'static str {
        "Remove the latest ledger record (schema effects are not reversed)"
    }

    fn add_arguments(&self, cmd: clap::Command) -> clap::Command {
        cmd.arg(app_arg("Only consider migrations of this domain/app"))
    }

    async fn handle(
        &self,
        matches: &clap::ArgMatches,
        ctx: &CommandContext,
    ) -> Result<String, MigrateError> {
        let outcome = ctx.migrator().rollback_last(scope_arg(matches)).await?;
        Ok(outcome.message() + "\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{context, parse};
    use graph_migrate_engine::LedgerStore;

    #[tokio::test]
    async fn test_down_removes_latest() {
        let (_, _, ledger, ctx) = context();
        ledger.record_applied("core/001_init", "a").await.unwrap();
        ledger.record_applied("core/002_more", "b").await.unwrap();

        let out = DownCommand
            .handle(&parse(&DownCommand, &["down"]), &ctx)
            .await
            .unwrap();
        assert!(out.contains("core/002_more"));
        assert!(out.contains("not reversed"));
        assert!(ledger.get("core/001_init").is_some());
        assert!(ledger.get("core/002_more").is_none());
    }

    #[tokio::test]
    async fn test_down_nothing() {
        let (_, _, _, ctx) = context();
        let out = DownCommand
            .handle(&parse(&DownCommand, &["down", "--app", "core"]), &ctx)
            .await
            .unwrap();
        assert_eq!(out, "Nothing to roll back.\n");
    }
}
