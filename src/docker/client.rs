use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::prelude::{Engine as _, BASE64_STANDARD};
use bollard::container::{CreateContainerOptions, LogOutput, LogsOptions, StartContainerOptions};
use bollard::errors::Error as EngineError;
use bollard::image::CreateImageOptions;
use bollard::models::SecretSpec;
use bollard::secret::ListSecretsOptions;
use bollard::Docker;
use futures::StreamExt;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

use super::config::{container_config, split_image_reference};
use crate::backend::{Backend, BackendKind};
use crate::containers::error::{self as run, RunError};
use crate::containers::request::ContainerLaunchRequest;
use crate::containers::service::{ContainerService, LogsRequest};
use crate::containers::stream::pump_logs;
use crate::secrets::{self, NewSecret, Secret, SecretError, SecretService};

/// Seconds before an engine request times out
const ENGINE_TIMEOUT: u64 = 120;

/// Docker engine backend
pub struct DockerClient {
    docker: Docker,
}

impl DockerClient {
    /// Connect to `host`, or the local engine defaults when unset
    pub async fn new(host: Option<&str>) -> Result<Self> {
        let docker = match host {
            Some(host) if host.starts_with("unix://") => {
                Docker::connect_with_unix(host, ENGINE_TIMEOUT, bollard::API_DEFAULT_VERSION)
            }
            Some(host) if host.starts_with("tcp://") || host.starts_with("http://") => {
                Docker::connect_with_http(host, ENGINE_TIMEOUT, bollard::API_DEFAULT_VERSION)
            }
            Some(host) => anyhow::bail!("Unsupported docker host '{}': expected unix://, tcp:// or http://", host),
            None => Docker::connect_with_local_defaults(),
        }
        .context("Failed to connect to Docker daemon. Is Docker running?")?;

        // Verify connection
        docker
            .ping()
            .await
            .context("Failed to ping Docker daemon")?;

        Ok(Self { docker })
    }

    /// Pull an image from its registry
    async fn pull_image(&self, image: &str) -> run::Result<()> {
        let (from_image, tag) = split_image_reference(image);
        let options = Some(CreateImageOptions {
            from_image,
            tag,
            ..Default::default()
        });

        let mut stream = self.docker.create_image(options, None, None);

        while let Some(result) = stream.next().await {
            match result {
                Ok(info) => {
                    if let Some(status) = info.status {
                        tracing::debug!("Pull status: {}", status);
                    }
                    if let Some(error) = info.error {
                        return Err(RunError::Submission(format!("pull of {} failed: {}", image, error)));
                    }
                }
                Err(e) => {
                    return Err(RunError::Submission(format!("pull of {} failed: {}", image, e)));
                }
            }
        }

        Ok(())
    }

    /// Create a container, pulling its image first if the engine lacks it
    async fn create_container(&self, request: &ContainerLaunchRequest) -> run::Result<String> {
        let cwd = std::env::current_dir()
            .map_err(|e| RunError::validation("volume", format!("cannot resolve working directory: {}", e)))?;
        let config = container_config(request, &cwd)?;
        let options = || {
            Some(CreateContainerOptions {
                name: request.id.clone(),
                platform: None,
            })
        };

        match self.docker.create_container(options(), config.clone()).await {
            Ok(response) => Ok(response.id),
            Err(e) if is_not_found(&e) => {
                tracing::info!(image = %request.image, "image not present locally, pulling");
                self.pull_image(&request.image).await?;
                let response = self
                    .docker
                    .create_container(options(), config)
                    .await
                    .map_err(|e| RunError::Submission(e.to_string()))?;
                Ok(response.id)
            }
            Err(e) => Err(RunError::Submission(e.to_string())),
        }
    }
}

fn is_not_found(err: &EngineError) -> bool {
    matches!(err, EngineError::DockerResponseServerError { status_code: 404, .. })
}

#[async_trait]
impl ContainerService for DockerClient {
    async fn submit(&self, request: ContainerLaunchRequest) -> run::Result<String> {
        if let Some(domain) = &request.domain_name {
            tracing::warn!(%domain, "docker backend ignores the container domain name");
        }
        let container_id = self.create_container(&request).await?;

        self.docker
            .start_container(&container_id, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| RunError::Submission(e.to_string()))?;

        tracing::debug!(id = %container_id, name = %request.id, "container started");
        Ok(container_id)
    }

    async fn stream_logs(&self, request: LogsRequest<'_>, cancel: &CancellationToken) -> run::Result<()> {
        let log_options = LogsOptions::<String> {
            follow: request.follow,
            stdout: true,
            stderr: true,
            ..Default::default()
        };

        let log_stream = self
            .docker
            .logs(&request.container, Some(log_options))
            .map(|chunk| chunk.map(LogOutput::into_bytes));

        pump_logs(log_stream, request.writer, request.width, cancel).await
    }
}

#[async_trait]
impl SecretService for DockerClient {
    async fn create_secret(&self, secret: NewSecret) -> secrets::Result<String> {
        let spec = SecretSpec {
            name: Some(secret.name),
            labels: Some(secret.labels.into_iter().collect::<HashMap<_, _>>()),
            data: Some(BASE64_STANDARD.encode(&secret.content)),
            ..Default::default()
        };

        let response = self.docker.create_secret(spec).await.map_err(secret_error)?;
        Ok(response.id)
    }

    async fn inspect_secret(&self, id: &str) -> secrets::Result<Secret> {
        let secret = self.docker.inspect_secret(id).await.map_err(|e| {
            if is_not_found(&e) {
                SecretError::NotFound(id.to_string())
            } else {
                secret_error(e)
            }
        })?;
        Ok(into_secret(secret))
    }

    async fn list_secrets(&self) -> secrets::Result<Vec<Secret>> {
        let engine_secrets = self
            .docker
            .list_secrets(None::<ListSecretsOptions<String>>)
            .await
            .map_err(secret_error)?;
        Ok(engine_secrets.into_iter().map(into_secret).collect())
    }

    async fn delete_secret(&self, id: &str, recover: bool) -> secrets::Result<()> {
        if recover {
            return Err(SecretError::Unsupported(
                "docker deletes secrets immediately, there is no recovery window".to_string(),
            ));
        }
        self.docker.delete_secret(id).await.map_err(|e| {
            if is_not_found(&e) {
                SecretError::NotFound(id.to_string())
            } else {
                secret_error(e)
            }
        })
    }
}

fn secret_error(err: EngineError) -> SecretError {
    SecretError::Backend(err.to_string())
}

fn into_secret(secret: bollard::models::Secret) -> Secret {
    let spec = secret.spec.unwrap_or_default();
    Secret {
        id: secret.id.unwrap_or_default(),
        name: spec.name.unwrap_or_default(),
        labels: spec.labels.unwrap_or_default().into_iter().collect(),
        created_at: secret.created_at,
    }
}

impl Backend for DockerClient {
    fn kind(&self) -> BackendKind {
        BackendKind::Docker
    }

    fn containers(&self) -> &dyn ContainerService {
        self
    }

    fn secrets(&self) -> &dyn SecretService {
        self
    }
}
