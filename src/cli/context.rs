use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;

use crate::backend::BackendKind;
use crate::config::settings::{ContextConfig, Settings};

#[derive(Subcommand, Debug)]
pub enum ContextCommands {
    /// List contexts
    #[command(visible_alias = "list")]
    Ls,

    /// Create a context
    Create {
        /// Context name
        name: String,

        /// Backend the context targets
        #[arg(long, value_enum, default_value_t = BackendKind::Docker)]
        backend: BackendKind,

        /// Docker engine endpoint (unix://, tcp:// or http://)
        #[arg(long)]
        host: Option<String>,

        /// Cloud subscription (aci only)
        #[arg(long)]
        subscription_id: Option<String>,

        /// Cloud resource group (aci only)
        #[arg(long)]
        resource_group: Option<String>,

        /// Cloud region (aci only)
        #[arg(long)]
        location: Option<String>,
    },

    /// Set the current context
    Use {
        /// Context name
        name: String,
    },

    /// Remove a context
    #[command(visible_alias = "remove")]
    Rm {
        /// Context name
        name: String,
    },

    /// Print the active context name
    Show,
}

impl ContextCommands {
    /// `override_name` is the per-invocation context selection, if any.
    /// Resolution failures only matter to `show`, so a broken selection can
    /// still be repaired with `use` or `rm`.
    pub fn execute(self, mut settings: Settings, override_name: Option<&str>) -> Result<()> {
        match self {
            Self::Ls => {
                let active = settings
                    .active_context(override_name)
                    .map(|c| c.name)
                    .unwrap_or_else(|_| settings.current_context.clone());
                list_contexts(&settings, &active);
                Ok(())
            }
            Self::Create {
                name,
                backend,
                host,
                subscription_id,
                resource_group,
                location,
            } => {
                let config = context_config(backend, host, subscription_id, resource_group, location)?;
                settings.create_context(&name, config)?;
                settings.save()?;
                println!("{} Created context {}", "✓".green().bold(), name.cyan());
                Ok(())
            }
            Self::Use { name } => {
                settings.use_context(&name)?;
                settings.save()?;
                println!("{} Current context is now {}", "✓".green().bold(), name.cyan());
                Ok(())
            }
            Self::Rm { name } => {
                settings.remove_context(&name)?;
                settings.save()?;
                println!("{} Removed context {}", "✓".green().bold(), name.cyan());
                Ok(())
            }
            Self::Show => {
                println!("{}", settings.active_context(override_name)?.name);
                Ok(())
            }
        }
    }
}

fn context_config(
    backend: BackendKind,
    host: Option<String>,
    subscription_id: Option<String>,
    resource_group: Option<String>,
    location: Option<String>,
) -> Result<ContextConfig> {
    match backend {
        BackendKind::Docker => {
            if subscription_id.is_some() || resource_group.is_some() || location.is_some() {
                anyhow::bail!("--subscription-id, --resource-group and --location only apply to aci contexts");
            }
            Ok(ContextConfig::Docker { host })
        }
        BackendKind::Aci => {
            if host.is_some() {
                anyhow::bail!("--host only applies to docker contexts");
            }
            Ok(ContextConfig::Aci {
                subscription_id: subscription_id.context("aci contexts need --subscription-id")?,
                resource_group: resource_group.context("aci contexts need --resource-group")?,
                location: location.context("aci contexts need --location")?,
            })
        }
    }
}

fn list_contexts(settings: &Settings, active: &str) {
    println!(
        "{:<3}{:<20} {:<10} {}",
        "",
        "NAME".bold(),
        "TYPE".bold(),
        "ENDPOINT".bold()
    );
    println!("{}", "-".repeat(60));

    for (name, config) in settings.list_contexts() {
        let marker = if name == active { "*" } else { "" };
        println!(
            "{:<3}{:<20} {:<10} {}",
            marker.green().bold(),
            name,
            config.kind().to_string(),
            config.describe()
        );
    }
}
