pub mod context;
pub mod run;
pub mod secret;

use anyhow::Result;
use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser, Subcommand};
use std::ffi::OsString;
use tokio_util::sync::CancellationToken;

use crate::backend::BackendCapabilities;
use crate::config::settings::Settings;
use crate::containers::error::RunError;

#[derive(Parser)]
#[command(name = "shipctl")]
#[command(author = "Shipctl Team")]
#[command(version)]
#[command(about = "Run a container on a local engine or a cloud backend and attach to its output", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a container
    Run(run::RunArgs),

    /// Manage backend contexts (list, create, use, remove)
    Context {
        #[command(subcommand)]
        command: context::ContextCommands,
    },

    /// Manage secrets on the active backend
    Secret {
        #[command(subcommand)]
        command: secret::SecretCommands,
    },
}

impl Cli {
    /// The command tree with the flags `capabilities` allows.
    pub fn command_for(capabilities: BackendCapabilities) -> clap::Command {
        Self::command().mut_subcommand("run", |run| run::register_backend_flags(run, capabilities))
    }

    /// Parse the process arguments, exiting on error or `--help`.
    pub fn parse_for(capabilities: BackendCapabilities) -> Self {
        Self::try_parse_for(capabilities, std::env::args_os()).unwrap_or_else(|e| e.exit())
    }

    pub fn try_parse_for<I, T>(capabilities: BackendCapabilities, args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = Self::command_for(capabilities).try_get_matches_from(args)?;
        Self::from_matches(&matches)
    }

    fn from_matches(matches: &ArgMatches) -> Result<Self, clap::Error> {
        let mut cli = Self::from_arg_matches(matches)?;
        if let (Commands::Run(args), Some(run_matches)) = (&mut cli.command, matches.subcommand_matches("run")) {
            run::read_backend_flags(args, run_matches);
        }
        Ok(cli)
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    /// Run the parsed command against `settings`, with `context_override`
    /// taking precedence over the stored current context.
    pub async fn execute(
        self,
        settings: Settings,
        context_override: Option<&str>,
        cancel: CancellationToken,
    ) -> Result<()> {
        match self.command {
            Commands::Context { command } => command.execute(settings, context_override),
            Commands::Run(args) => {
                let context = settings.active_context(context_override)?;
                args.execute(&context, cancel).await
            }
            Commands::Secret { command } => {
                let context = settings.active_context(context_override)?;
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(RunError::Cancelled.into()),
                    result = command.execute(&context) => result,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendKind;

    #[test]
    fn test_command_tree_is_valid_for_every_backend() {
        for kind in [BackendKind::Docker, BackendKind::Aci] {
            Cli::command_for(kind.capabilities()).debug_assert();
        }
    }

    #[tokio::test]
    async fn test_interrupted_secret_command_reports_cancellation() {
        let cli = Cli::try_parse_for(BackendKind::Docker.capabilities(), ["shipctl", "secret", "create", "token"]).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = cli.execute(Settings::default(), None, cancel).await.unwrap_err();
        assert!(matches!(err.downcast_ref::<RunError>(), Some(RunError::Cancelled)));
    }

    #[test]
    fn test_verbose_is_global() {
        let cli = Cli::try_parse_for(BackendKind::Docker.capabilities(), ["shipctl", "context", "ls", "--verbose"]).unwrap();
        assert!(cli.verbose());
    }
}
