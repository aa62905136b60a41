//! The `status` command.
//!
//! Shows every discovered migration as applied (`[X]`) or pending (`[ ]`),
//! flags applied files that changed since, and lists ledger records whose file
//! is gone.

use async_trait::async_trait;
use graph_migrate_core::MigrateError;

use crate::command::{app_arg, scope_arg, CommandContext, MigrationCommand};

/// Lists migrations and their applied/pending status.
pub struct StatusCommand;

#[async_trait]
impl MigrationCommand for StatusCommand {
    fn name(&self) -> &'static str {
        "status"
    }

    fn help(&self) -> &'static str {
        "Show migration status"
    }

    fn add_arguments(&self, cmd: clap::Command) -> clap::Command {
        cmd.arg(app_arg("Only show migrations of this domain/app"))
            .arg(
                clap::Arg::new("format")
                    .long("format")
                    .value_parser(["text", "json"])
                    .default_value("text")
                    .help("Output format"),
            )
    }

    async fn handle(
        &self,
        matches: &clap::ArgMatches,
        ctx: &CommandContext,
    ) -> Result<String, MigrateError> {
        let report = ctx.migrator().status(scope_arg(matches)).await?;

        if report.drift_count() > 0 {
            tracing::warn!(
                drifted = report.drift_count(),
                "Applied migrations changed on disk since they were applied"
            );
        }

        match matches.get_one::<String>("format").map(String::as_str) {
            Some("json") => report.to_json().map(|json| json + "\n"),
            _ => Ok(report.render_text()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{context, parse, write};
    use graph_migrate_engine::LedgerStore;

    #[tokio::test]
    async fn test_status_empty_ledger() {
        let (root, _, _, ctx) = context();
        write(root.path(), "core/migrations/001_init.cypher", "A;");

        let out = StatusCommand
            .handle(&parse(&StatusCommand, &["status"]), &ctx)
            .await
            .unwrap();
        assert!(out.contains("core\n [ ] 001_init\n"));
        assert!(out.contains("1 migrations: 0 applied, 1 pending"));
    }

    #[tokio::test]
    async fn test_status_json() {
        let (root, _, ledger, ctx) = context();
        write(root.path(), "core/migrations/001_init.cypher", "A;");
        ledger.record_applied("core/001_init", "stale").await.unwrap();

        let out = StatusCommand
            .handle(&parse(&StatusCommand, &["status", "--format", "json"]), &ctx)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["entries"][0]["state"], "applied");
        assert_eq!(value["entries"][0]["drift"], true);
    }

    #[test]
    fn test_status_rejects_unknown_format() {
        let cmd = StatusCommand.add_arguments(clap::Command::new("status"));
        assert!(cmd.try_get_matches_from(["status", "--format", "xml"]).is_err());
    }
}
