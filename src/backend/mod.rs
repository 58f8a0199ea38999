//! Backend selection and per-backend capabilities.

use anyhow::Result;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::settings::ContextConfig;
use crate::containers::service::ContainerService;
use crate::docker::client::DockerClient;
use crate::secrets::SecretService;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Local or remote docker engine
    Docker,
    /// Cloud container-instance service
    Aci,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Docker => f.write_str("docker"),
            Self::Aci => f.write_str("aci"),
        }
    }
}

/// Optional features a backend supports. Command registration and
/// validation consult this instead of branching on the backend kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackendCapabilities {
    /// Accepts a container NIS domain name (`run --domainname`)
    pub domain_name: bool,
    /// Can delete secrets with a recovery window (`secret rm --recover`)
    pub recoverable_secret_delete: bool,
}

impl BackendKind {
    pub fn capabilities(self) -> BackendCapabilities {
        match self {
            Self::Docker => BackendCapabilities::default(),
            Self::Aci => BackendCapabilities {
                domain_name: true,
                recoverable_secret_delete: true,
            },
        }
    }
}

/// A connected backend exposing the services commands consume.
pub trait Backend: Send + Sync {
    fn kind(&self) -> BackendKind;
    fn containers(&self) -> &dyn ContainerService;
    fn secrets(&self) -> &dyn SecretService;
}

/// Connect to the backend described by `context`.
pub async fn connect(context_name: &str, context: &ContextConfig) -> Result<Box<dyn Backend>> {
    tracing::debug!(context = context_name, backend = %context.kind(), "connecting");
    match context {
        ContextConfig::Docker { host } => {
            let client = DockerClient::new(host.as_deref()).await?;
            Ok(Box::new(client))
        }
        ContextConfig::Aci { .. } => anyhow::bail!(
            "Context '{}' uses the aci backend, which is not available in this build. \
             Switch with 'shipctl context use default'.",
            context_name
        ),
    }
}
