//! Command framework for graph-migrate.
//!
//! This module provides the [`MigrationCommand`] trait for defining CLI
//! commands, the [`CommandContext`] they run against, and the
//! [`CommandRegistry`] that builds the `clap` interface and dispatches to them.
//!
//! ## Defining a Custom Command
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use graph_migrate_cli::command::{CommandContext, MigrationCommand};
//! use graph_migrate_core::MigrateError;
//!
//! struct CountCommand;
//!
//! #[async_trait]
//! impl MigrationCommand for CountCommand {
//!     fn name(&self) -> &str { "count" }
//!     fn help(&self) -> &str { "Count discovered migrations" }
//!
//!     async fn handle(
//!         &self,
//!         _matches: &clap::ArgMatches,
//!         ctx: &CommandContext,
//!     ) -> Result<String, MigrateError> {
//!         let discovery = ctx.migrator().discover()?;
//!         Ok(format!("{} migrations\n", discovery.len()))
//!     }
//! }
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use graph_migrate_backends::GraphBackend;
use graph_migrate_core::{settings_loader, MigrateError, Settings};
use graph_migrate_engine::{LedgerStore, Migrator};

/// Everything a command needs to run: settings plus the injected backend and
/// ledger handles.
pub struct CommandContext {
    /// Resolved settings.
    pub settings: Settings,
    backend: Arc<dyn GraphBackend>,
    ledger: Arc<dyn LedgerStore>,
}

impl CommandContext {
    /// Creates a context from settings and handles.
    pub fn new(
        settings: Settings,
        backend: Arc<dyn GraphBackend>,
        ledger: Arc<dyn LedgerStore>,
    ) -> Self {
        Self {
            settings,
            backend,
            ledger,
        }
    }

    /// Builds a [`Migrator`] over this context's handles.
    pub fn migrator(&self) -> Migrator {
        Migrator::from_settings(
            &self.settings,
            Arc::clone(&self.backend),
            Arc::clone(&self.ledger),
        )
    }
}

/// A command that can be registered and invoked through the CLI.
///
/// Implementations define a name, help text, optional arguments, and an async
/// handler. The handler returns the text to print on stdout.
#[async_trait]
pub trait MigrationCommand: Send + Sync {
    /// Returns the name of this command (used to invoke it from the CLI).
    fn name(&self) -> &str;

    /// Returns a short help description for this command.
    fn help(&self) -> &str;

    /// Adds custom arguments to the clap command.
    ///
    /// The default implementation returns the command unchanged.
    fn add_arguments(&self, cmd: clap::Command) -> clap::Command {
        cmd
    }

    /// Executes the command and returns its stdout output.
    async fn handle(
        &self,
        matches: &clap::ArgMatches,
        ctx: &CommandContext,
    ) -> Result<String, MigrateError>;
}

/// A registry of commands.
///
/// Commands are registered by name and can be looked up, listed, or executed.
pub struct CommandRegistry {
    commands: HashMap<String, Box<dyn MigrationCommand>>,
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRegistry {
    /// Creates a new empty command registry.
    pub fn new() -> Self {
        Self {
            commands: HashMap::new(),
        }
    }

    /// Registers a command.
    ///
    /// If a command with the same name already exists, it is replaced.
    pub fn register(&mut self, command: Box<dyn MigrationCommand>) {
        let name = command.name().to_string();
        self.commands.insert(name, command);
    }

    /// Returns a reference to the command with the given name, if registered.
    pub fn get(&self, name: &str) -> Option<&dyn MigrationCommand> {
        self.commands.get(name).map(AsRef::as_ref)
    }

    /// Returns a sorted list of all registered command names.
    pub fn list_commands(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.commands.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Returns the number of registered commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Returns `true` if no commands are registered.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Builds the top-level clap `Command` with every registered subcommand
    /// and the global `--config` and `--root` options.
    pub fn build_cli(&self) -> clap::Command {
        let mut app = clap::Command::new("graph-migrate")
            .about("Checksum-tracked schema migrations for graph databases")
            .version(env!("CARGO_PKG_VERSION"))
            .subcommand_required(true)
            .arg_required_else_help(true)
            .arg(
                clap::Arg::new("config")
                    .long("config")
                    .global(true)
                    .value_name("FILE")
                    .value_parser(clap::value_parser!(PathBuf))
                    .help("Settings file (TOML, or JSON with a .json extension)"),
            )
            .arg(
                clap::Arg::new("root")
                    .long("root")
                    .global(true)
                    .value_name("DIR")
                    .value_parser(clap::value_parser!(PathBuf))
                    .help("Directory migration identities are computed from"),
            );

        let mut entries: Vec<_> = self.commands.iter().collect();
        entries.sort_by_key(|(name, _)| (*name).clone());

        for (name, cmd) in entries {
            // clap wants &'static str names; commands are registered once per
            // process, so leaking them is bounded.
            let static_name: &'static str = Box::leak(name.clone().into_boxed_str());
            let subcmd = clap::Command::new(static_name).about(cmd.help().to_string());
            let subcmd = cmd.add_arguments(subcmd);
            app = app.subcommand(subcmd);
        }

        app
    }

    /// Executes the command identified by the given argument matches.
    pub async fn execute(
        &self,
        matches: &clap::ArgMatches,
        ctx: &CommandContext,
    ) -> Result<String, MigrateError> {
        let (name, sub_matches) = matches.subcommand().ok_or_else(|| {
            MigrateError::Configuration("No subcommand specified".to_string())
        })?;

        let cmd = self.get(name).ok_or_else(|| {
            MigrateError::Configuration(format!("Unknown command: {name}"))
        })?;

        tracing::debug!(command = name, "Running command");
        cmd.handle(sub_matches, ctx).await
    }
}

/// Resolves settings from the global `--config` and `--root` options.
///
/// Without `--config`, settings come from defaults plus `GRAPH_MIGRATE_*`
/// environment variables. `--root` wins over both.
pub fn resolve_settings(matches: &clap::ArgMatches) -> Result<Settings, MigrateError> {
    let mut settings = match matches.get_one::<PathBuf>("config") {
        Some(path) => settings_loader::from_file_with_env(path)?,
        None => settings_loader::from_env(),
    };
    if let Some(root) = matches.get_one::<PathBuf>("root") {
        settings.root.clone_from(root);
    }
    Ok(settings)
}

/// Runs `command` under an optional overall deadline, giving up when
/// `cancel` resolves first.
///
/// Exceeding the deadline yields [`MigrateError::Timeout`] and cancellation
/// yields [`MigrateError::Cancelled`]. Either way the command future is
/// dropped, which abandons its open transaction without committing it.
pub async fn run_with_deadline<F, C>(
    command: F,
    run_timeout: Option<Duration>,
    cancel: C,
) -> Result<String, MigrateError>
where
    F: Future<Output = Result<String, MigrateError>>,
    C: Future,
{
    let bounded = async {
        match run_timeout {
            Some(limit) => tokio::time::timeout(limit, command).await.map_err(|_| {
                MigrateError::Timeout(format!("Run exceeded {}s", limit.as_secs_f64()))
            })?,
            None => command.await,
        }
    };

    tokio::select! {
        result = bounded => result,
        _ = cancel => {
            tracing::warn!("Interrupted; the migration in flight was not committed");
            Err(MigrateError::Cancelled)
        }
    }
}

/// Returns the `--app` scope of a subcommand, if given.
pub fn scope_arg(matches: &clap::ArgMatches) -> Option<&str> {
    matches.get_one::<String>("app").map(String::as_str)
}

/// The `--app` option shared by commands that accept a scope.
pub fn app_arg(help: &'static str) -> clap::Arg {
    clap::Arg::new("app")
        .long("app")
        .value_name("DOMAIN/APP")
        .help(help)
}

#[cfg(test)]
mod tests {
    use super::*;
    use graph_migrate_backends::MemoryBackend;
    use graph_migrate_engine::MemoryLedger;

    struct TestCommand {
        cmd_name: String,
    }

    impl TestCommand {
        fn new(name: &str) -> Self {
            Self {
                cmd_name: name.to_string(),
            }
        }
    }

    #[async_trait]
    impl MigrationCommand for TestCommand {
        fn name(&self) -> &str {
            &self.cmd_name
        }

        fn help(&self) -> &'static str {
            "A test command"
        }

        fn add_arguments(&self, cmd: clap::Command) -> clap::Command {
            cmd.arg(
                clap::Arg::new("verbose")
                    .long("verbose")
                    .action(clap::ArgAction::SetTrue),
            )
        }

        async fn handle(
            &self,
            _matches: &clap::ArgMatches,
            _ctx: &CommandContext,
        ) -> Result<String, MigrateError> {
            Ok(format!("ran {}", self.cmd_name))
        }
    }

    struct FailingCommand;

    #[async_trait]
    impl MigrationCommand for FailingCommand {
        fn name(&self) -> &'static str {
            "fail"
        }

        fn help(&self) -> &'static str {
            "A command that always fails"
        }

        async fn handle(
            &self,
            _matches: &clap::ArgMatches,
            _ctx: &CommandContext,
        ) -> Result<String, MigrateError> {
            Err(MigrateError::Configuration("deliberate failure".to_string()))
        }
    }

    fn context() -> CommandContext {
        CommandContext::new(
            Settings::default(),
            Arc::new(MemoryBackend::new()),
            Arc::new(MemoryLedger::new()),
        )
    }

    #[test]
    fn test_registry_new_is_empty() {
        let registry = CommandRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_register_and_get() {
        let mut registry = CommandRegistry::new();
        registry.register(Box::new(TestCommand::new("test")));
        assert_eq!(registry.len(), 1);

        let cmd = registry.get("test");
        assert!(cmd.is_some());
        assert_eq!(cmd.unwrap().help(), "A test command");
        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn test_list_commands_sorted() {
        let mut registry = CommandRegistry::new();
        registry.register(Box::new(TestCommand::new("up")));
        registry.register(Box::new(TestCommand::new("down")));
        registry.register(Box::new(TestCommand::new("status")));
        assert_eq!(registry.list_commands(), vec!["down", "status", "up"]);
    }

    #[test]
    fn test_register_replaces_existing() {
        let mut registry = CommandRegistry::new();
        registry.register(Box::new(TestCommand::new("test")));
        registry.register(Box::new(TestCommand::new("test")));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_build_cli_with_arguments_and_globals() {
        let mut registry = CommandRegistry::new();
        registry.register(Box::new(TestCommand::new("test")));

        let matches = registry
            .build_cli()
            .try_get_matches_from(["graph-migrate", "test", "--verbose", "--root", "/srv/app"])
            .unwrap();
        assert_eq!(
            matches.get_one::<PathBuf>("root"),
            Some(&PathBuf::from("/srv/app"))
        );
        let (name, sub_matches) = matches.subcommand().unwrap();
        assert_eq!(name, "test");
        assert!(sub_matches.get_flag("verbose"));
    }

    #[test]
    fn test_build_cli_requires_subcommand() {
        let registry = CommandRegistry::new();
        assert!(registry.build_cli().try_get_matches_from(["graph-migrate"]).is_err());
    }

    #[test]
    fn test_resolve_settings_root_override() {
        let mut registry = CommandRegistry::new();
        registry.register(Box::new(TestCommand::new("test")));
        let matches = registry
            .build_cli()
            .try_get_matches_from(["graph-migrate", "--root", "/srv/app", "test"])
            .unwrap();
        let settings = resolve_settings(&matches).unwrap();
        assert_eq!(settings.root, PathBuf::from("/srv/app"));
    }

    #[test]
    fn test_resolve_settings_from_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("graph-migrate.toml");
        std::fs::write(&config, "ledger_label = \"AppMigration\"\n").unwrap();

        let mut registry = CommandRegistry::new();
        registry.register(Box::new(TestCommand::new("test")));
        let matches = registry
            .build_cli()
            .try_get_matches_from(["graph-migrate", "test", "--config", config.to_str().unwrap()])
            .unwrap();
        let settings = resolve_settings(&matches).unwrap();
        assert_eq!(settings.ledger_label, "AppMigration");
    }

    #[test]
    fn test_resolve_settings_missing_config_file() {
        let mut registry = CommandRegistry::new();
        registry.register(Box::new(TestCommand::new("test")));
        let matches = registry
            .build_cli()
            .try_get_matches_from(["graph-migrate", "test", "--config", "/nonexistent/gm.toml"])
            .unwrap();
        assert!(resolve_settings(&matches).is_err());
    }

    #[tokio::test]
    async fn test_execute_success() {
        let mut registry = CommandRegistry::new();
        registry.register(Box::new(TestCommand::new("test")));

        let matches = registry
            .build_cli()
            .try_get_matches_from(["graph-migrate", "test"])
            .unwrap();
        let output = registry.execute(&matches, &context()).await.unwrap();
        assert_eq!(output, "ran test");
    }

    #[tokio::test]
    async fn test_execute_failing_command() {
        let mut registry = CommandRegistry::new();
        registry.register(Box::new(FailingCommand));

        let matches = registry
            .build_cli()
            .try_get_matches_from(["graph-migrate", "fail"])
            .unwrap();
        let result = registry.execute(&matches, &context()).await;
        assert!(matches!(result, Err(MigrateError::Configuration(_))));
    }

    // ── run_with_deadline ───────────────────────────────────────────

    #[tokio::test]
    async fn test_run_with_deadline_returns_output() {
        let out = run_with_deadline(
            async { Ok("done\n".to_string()) },
            Some(Duration::from_secs(5)),
            std::future::pending::<()>(),
        )
        .await
        .unwrap();
        assert_eq!(out, "done\n");
    }

    #[tokio::test]
    async fn test_run_with_deadline_times_out() {
        let err = run_with_deadline(
            std::future::pending::<Result<String, MigrateError>>(),
            Some(Duration::from_millis(20)),
            std::future::pending::<()>(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, MigrateError::Timeout(_)));
        assert_eq!(err.exit_code(), 75);
    }

    #[tokio::test]
    async fn test_run_with_deadline_cancelled() {
        let err = run_with_deadline(
            std::future::pending::<Result<String, MigrateError>>(),
            None,
            async {},
        )
        .await
        .unwrap_err();
        assert!(matches!(err, MigrateError::Cancelled));
        assert_eq!(err.exit_code(), 130);
    }

    #[tokio::test]
    async fn test_run_with_deadline_propagates_command_error() {
        let err = run_with_deadline(
            async { Err(MigrateError::Configuration("bad".into())) },
            None,
            std::future::pending::<()>(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, MigrateError::Configuration(_)));
    }
}
