use anyhow::Result;
use clap::{Arg, ArgMatches, Args, Command};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

use crate::backend::{self, BackendCapabilities};
use crate::config::settings::ActiveContext;
use crate::containers::attach::{AttachController, RunOutcome};
use crate::containers::error::RunError;
use crate::containers::options::RunOptions;
use crate::containers::terminal::StdoutTerminal;

const DOMAIN_NAME_ARG: &str = "domainname";

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Image to run, then the command and arguments replacing the image default.
    /// Flag parsing stops at the image, so everything after it belongs to the command.
    #[arg(required = true, trailing_var_arg = true, value_name = "IMAGE [COMMAND]")]
    pub args: Vec<String>,

    /// Publish a container's port(s) ([HOST_IP:][HOST_PORT:]CONTAINER_PORT[/PROTO])
    #[arg(short, long, value_name = "PORTS")]
    pub publish: Vec<String>,

    /// Assign a name to the container
    #[arg(long)]
    pub name: Option<String>,

    /// Set metadata on the container (format: KEY=VALUE)
    #[arg(short = 'l', long = "label", value_name = "KEY=VALUE")]
    pub labels: Vec<String>,

    /// Mount a volume (format: SOURCE[:TARGET][:ro|rw])
    #[arg(short = 'v', long = "volume", value_name = "SOURCE[:TARGET][:ro]")]
    pub volumes: Vec<String>,

    /// Run container in background and print container ID
    #[arg(short, long)]
    pub detach: bool,

    /// Number of CPUs
    #[arg(long, default_value_t = 1.0)]
    pub cpus: f64,

    /// Memory limit (e.g., 512m, 1g)
    #[arg(short, long)]
    pub memory: Option<String>,

    /// Set environment variables (format: KEY=VALUE, or KEY to copy from the host)
    #[arg(short, long = "env", value_name = "KEY=VALUE")]
    pub env: Vec<String>,

    /// Read environment variables from a file, applied after --env in the order given
    #[arg(long = "envFile", visible_alias = "env-file", value_name = "FILE")]
    pub env_files: Vec<PathBuf>,

    /// Restart policy to apply when a container exits (none, always, on-failure)
    #[arg(long, default_value = "none")]
    pub restart: String,

    /// Set from `--domainname`, which only backends with the capability register
    #[arg(skip)]
    pub domain_name: Option<String>,
}

/// Add the flags whose availability depends on the active backend.
pub fn register_backend_flags(cmd: Command, capabilities: BackendCapabilities) -> Command {
    if capabilities.domain_name {
        cmd.arg(
            Arg::new(DOMAIN_NAME_ARG)
                .long(DOMAIN_NAME_ARG)
                .value_name("NAME")
                .help("Container NIS domain name"),
        )
    } else {
        cmd
    }
}

/// Read the capability-gated flags back out of the `run` matches.
pub fn read_backend_flags(args: &mut RunArgs, matches: &ArgMatches) {
    args.domain_name = matches
        .try_get_one::<String>(DOMAIN_NAME_ARG)
        .ok()
        .flatten()
        .cloned();
}

impl RunArgs {
    /// Split into the image reference and backend-agnostic options.
    pub fn into_options(self) -> (String, RunOptions) {
        let mut positionals = self.args.into_iter();
        // An empty image is rejected by the launch request builder
        let image = positionals.next().unwrap_or_default();
        let options = RunOptions {
            command: positionals.collect(),
            publish: self.publish,
            name: self.name,
            labels: self.labels,
            volumes: self.volumes,
            detach: self.detach,
            cpus: self.cpus,
            memory: self.memory,
            environment: self.env,
            env_files: self.env_files,
            restart: self.restart,
            domain_name: self.domain_name,
        };
        (image, options)
    }

    pub async fn execute(self, context: &ActiveContext, cancel: CancellationToken) -> Result<()> {
        let (image, options) = self.into_options();
        let detach = options.detach;

        // Validate before touching the backend
        let request = options.into_launch_request(&image)?;

        let backend = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RunError::Cancelled.into()),
            connected = backend::connect(&context.name, &context.config) => connected?,
        };
        let terminal = StdoutTerminal::new();
        let mut stdout = tokio::io::stdout();

        let outcome = AttachController::new(backend.containers(), &terminal, cancel)
            .run(request, detach, &mut stdout)
            .await?;

        match outcome {
            RunOutcome::Detached { id } => {
                tracing::debug!(backend = %backend.kind(), %id, "container left running in background");
            }
            RunOutcome::Attached { id, width } => {
                tracing::debug!(backend = %backend.kind(), %id, ?width, "log stream closed");
            }
        }

        Ok(())
    }
}
