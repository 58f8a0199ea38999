mod backend;
mod cli;
mod config;
mod containers;
mod docker;
mod secrets;
mod utils;

use anyhow::Result;
use cli::Cli;
use colored::Colorize;
use config::settings::{Settings, CONTEXT_ENV};
use containers::error::RunError;
use tokio_util::sync::CancellationToken;

/// Exit status for failures that are not a run error (config, backend connection)
const GENERIC_FAILURE: i32 = 125;

#[tokio::main]
async fn main() {
    let code = match run().await {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            e.downcast_ref::<RunError>()
                .map(RunError::exit_code)
                .unwrap_or(GENERIC_FAILURE)
        }
    };
    std::process::exit(code);
}

async fn run() -> Result<()> {
    let settings = Settings::load()?;
    let context_override = std::env::var(CONTEXT_ENV).ok();

    // Backend-gated flags follow the active context; a context that fails to
    // resolve still gets the base command tree so it can be repaired.
    let capabilities = settings
        .active_context(context_override.as_deref())
        .map(|c| c.config.kind().capabilities())
        .unwrap_or_default();

    let cli = Cli::parse_for(capabilities);
    utils::logger::init(cli.verbose())?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::debug!("interrupt received, cancelling");
            on_interrupt.cancel();
        }
    });

    cli.execute(settings, context_override.as_deref(), cancel).await
}
