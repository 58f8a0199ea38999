use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::io::AsyncReadExt;

use crate::backend;
use crate::config::settings::ActiveContext;
use crate::containers::error::RunError;
use crate::containers::options::parse_labels;
use crate::secrets::{NewSecret, Secret};

#[derive(Subcommand, Debug)]
pub enum SecretCommands {
    /// Create a secret
    Create {
        /// Secret name
        name: String,

        /// Read the secret content from a file ("-" or absent reads stdin)
        #[arg(short, long, value_name = "FILE")]
        file: Option<PathBuf>,

        /// Set metadata on the secret (format: KEY=VALUE)
        #[arg(short = 'l', long = "label", value_name = "KEY=VALUE")]
        labels: Vec<String>,
    },

    /// Show a secret's metadata
    Inspect {
        /// Secret ID or name
        id: String,
    },

    /// List secrets
    #[command(visible_alias = "list")]
    Ls {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete a secret
    #[command(visible_alias = "delete")]
    Rm {
        /// Secret ID or name
        id: String,

        /// Keep the secret recoverable for the backend's retention window
        #[arg(long)]
        recover: bool,
    },
}

impl SecretCommands {
    pub async fn execute(self, context: &ActiveContext) -> Result<()> {
        // Reject unsupported flags before connecting
        if let Self::Rm { recover: true, .. } = &self {
            if !context.config.kind().capabilities().recoverable_secret_delete {
                return Err(RunError::validation(
                    "flag",
                    format!(
                        "--recover is not supported by the {} backend of context '{}'",
                        context.config.kind(),
                        context.name
                    ),
                )
                .into());
            }
        }

        let backend = backend::connect(&context.name, &context.config).await?;
        let secrets = backend.secrets();

        match self {
            Self::Create { name, file, labels } => {
                let labels: BTreeMap<String, String> = parse_labels(&labels)?.into_iter().collect();
                let content = read_content(file.as_ref()).await?;
                let id = secrets
                    .create_secret(NewSecret { name, labels, content })
                    .await?;
                println!("{}", id);
            }
            Self::Inspect { id } => {
                let secret = secrets.inspect_secret(&id).await?;
                println!("{}", serde_json::to_string_pretty(&secret)?);
            }
            Self::Ls { json } => {
                let mut list = secrets.list_secrets().await?;
                list.sort_by(|a, b| a.name.cmp(&b.name));
                if json {
                    println!("{}", serde_json::to_string_pretty(&list)?);
                } else {
                    print_table(&list);
                }
            }
            Self::Rm { id, recover } => {
                secrets.delete_secret(&id, recover).await?;
                println!("{} Removed secret {}", "✓".green().bold(), id.cyan());
            }
        }

        Ok(())
    }
}

async fn read_content(file: Option<&PathBuf>) -> Result<Vec<u8>> {
    match file {
        Some(path) if path.as_os_str() != "-" => tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read secret file: {}", path.display())),
        _ => {
            let mut content = Vec::new();
            tokio::io::stdin()
                .read_to_end(&mut content)
                .await
                .context("Failed to read secret from stdin")?;
            Ok(content)
        }
    }
}

fn print_table(secrets: &[Secret]) {
    if secrets.is_empty() {
        println!("No secrets found.");
        return;
    }

    println!(
        "{:<28} {:<30} {:<18}",
        "ID".bold(),
        "NAME".bold(),
        "CREATED".bold()
    );
    println!("{}", "-".repeat(78));

    for secret in secrets {
        println!(
            "{:<28} {:<30} {:<18}",
            secret.id,
            secret.name,
            format_timestamp(secret.created_at.as_deref())
        );
    }
}

fn format_timestamp(timestamp: Option<&str>) -> String {
    use chrono::{DateTime, Utc};
    timestamp
        .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
        .map(|d| d.with_timezone(&Utc).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "Unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::settings::ContextConfig;
    use std::io::Write;

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(Some("2024-05-01T10:00:00.123456789Z")), "2024-05-01 10:00");
        assert_eq!(format_timestamp(Some("2024-05-01T12:30:00+02:00")), "2024-05-01 10:30");
        assert_eq!(format_timestamp(Some("yesterday")), "Unknown");
        assert_eq!(format_timestamp(None), "Unknown");
    }

    #[tokio::test]
    async fn test_read_content_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"s3cr3t\n").unwrap();

        let content = read_content(Some(&file.path().to_path_buf())).await.unwrap();
        assert_eq!(content, b"s3cr3t\n");
    }

    #[tokio::test]
    async fn test_recover_rejected_before_connecting() {
        let context = ActiveContext {
            name: "local".into(),
            config: ContextConfig::Docker {
                host: Some("tcp://127.0.0.1:1".into()),
            },
        };
        let command = SecretCommands::Rm {
            id: "abc".into(),
            recover: true,
        };

        let err = command.execute(&context).await.unwrap_err();
        assert!(err.to_string().contains("--recover is not supported by the docker backend"));
    }
}
