//! The `graph-migrate` binary.
//!
//! Resolves settings, connects to the graph database over HTTP, and runs one
//! command. The run is cancelled on Ctrl-C and bounded by `run_timeout_secs`
//! when set. Exit codes follow [`MigrateError::exit_code`].

use std::process::ExitCode;
use std::sync::Arc;

use graph_migrate_backends::{GraphBackend, HttpBackend};
use graph_migrate_cli::command::{
    resolve_settings, run_with_deadline, CommandContext, CommandRegistry,
};
use graph_migrate_cli::commands::register_builtin_commands;
use graph_migrate_core::logging::setup_logging;
use graph_migrate_core::MigrateError;
use graph_migrate_engine::GraphLedger;

#[tokio::main]
async fn main() -> ExitCode {
    let mut registry = CommandRegistry::new();
    register_builtin_commands(&mut registry);
    let matches = registry.build_cli().get_matches();

    match run(&registry, &matches).await {
        Ok(output) => {
            print!("{output}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(registry: &CommandRegistry, matches: &clap::ArgMatches) -> Result<String, MigrateError> {
    let settings = resolve_settings(matches)?;
    setup_logging(&settings);

    let backend: Arc<dyn GraphBackend> = Arc::new(HttpBackend::from_settings(&settings.database)?);
    let ledger = GraphLedger::new(Arc::clone(&backend), settings.ledger_label.clone())?;
    let run_timeout = settings.run_timeout();
    let ctx = CommandContext::new(settings, backend, Arc::new(ledger));

    run_with_deadline(
        registry.execute(matches, &ctx),
        run_timeout,
        tokio::signal::ctrl_c(),
    )
    .await
}
