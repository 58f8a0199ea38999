use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use super::error::{Result, RunError};
use super::request::{ContainerLaunchRequest, MemoryQuantity, PortMapping, RestartPolicy, VolumeMount};

/// Raw, backend-agnostic options for a single `run` invocation.
///
/// Values are kept as the user typed them; [`RunOptions::into_launch_request`]
/// validates and resolves them.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub command: Vec<String>,
    pub publish: Vec<String>,
    pub name: Option<String>,
    pub labels: Vec<String>,
    pub volumes: Vec<String>,
    pub detach: bool,
    pub cpus: f64,
    pub memory: Option<String>,
    pub environment: Vec<String>,
    pub env_files: Vec<PathBuf>,
    pub restart: String,
    pub domain_name: Option<String>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            publish: Vec::new(),
            name: None,
            labels: Vec::new(),
            volumes: Vec::new(),
            detach: false,
            cpus: 1.0,
            memory: None,
            environment: Vec::new(),
            env_files: Vec::new(),
            restart: RestartPolicy::default().to_string(),
            domain_name: None,
        }
    }
}

impl RunOptions {
    /// Resolve these options into a launch request for `image`.
    ///
    /// Bare `KEY` environment entries are looked up in the host environment.
    pub fn into_launch_request(self, image: &str) -> Result<ContainerLaunchRequest> {
        self.into_launch_request_with(image, |key| std::env::var(key).ok())
    }

    /// Same as [`Self::into_launch_request`] with an explicit host lookup.
    pub fn into_launch_request_with<F>(self, image: &str, host_env: F) -> Result<ContainerLaunchRequest>
    where
        F: Fn(&str) -> Option<String>,
    {
        let image = image.trim();
        if image.is_empty() {
            return Err(RunError::validation("image", "image reference is empty"));
        }

        let id = match self.name {
            Some(name) => {
                validate_name(&name)?;
                name
            }
            None => generate_name(),
        };

        let mut ports = Vec::new();
        for spec in &self.publish {
            ports.extend(PortMapping::parse_spec(spec)?);
        }

        let labels = parse_labels(&self.labels)?;
        let env = resolve_environment(&self.environment, &self.env_files, &host_env)?;

        let volumes = self
            .volumes
            .iter()
            .map(|v| v.parse::<VolumeMount>())
            .collect::<Result<Vec<_>>>()?;

        if !self.cpus.is_finite() || self.cpus <= 0.0 {
            return Err(RunError::validation("cpus", format!("{} is not a positive number", self.cpus)));
        }

        let memory = self
            .memory
            .as_deref()
            .map(str::parse::<MemoryQuantity>)
            .transpose()?;

        let restart_policy = self.restart.parse::<RestartPolicy>()?;

        let domain_name = self
            .domain_name
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());

        let request = ContainerLaunchRequest {
            id,
            image: image.to_string(),
            command: self.command,
            ports,
            labels,
            env,
            volumes,
            cpus: self.cpus,
            memory,
            restart_policy,
            domain_name,
        };
        tracing::debug!(?request, "resolved launch request");
        Ok(request)
    }
}

fn validate_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            first.is_ascii_alphanumeric()
                && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        }
        None => false,
    };
    if !valid {
        return Err(RunError::validation(
            "name",
            format!("'{}' must match [a-zA-Z0-9][a-zA-Z0-9_.-]*", name),
        ));
    }
    Ok(())
}

fn generate_name() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("run-{}", &id[..12])
}

/// `KEY=VALUE` or bare `KEY` (empty value).
pub fn parse_labels(entries: &[String]) -> Result<IndexMap<String, String>> {
    let mut labels = IndexMap::new();
    for entry in entries {
        let (key, value) = entry.split_once('=').unwrap_or((entry.as_str(), ""));
        if key.trim().is_empty() {
            return Err(RunError::validation("label", format!("'{}' has an empty key", entry)));
        }
        labels.insert(key.trim().to_string(), value.to_string());
    }
    Ok(labels)
}

/// Merge direct `--env` entries with env files.
///
/// Direct entries are applied first, then each file in the given order. A
/// later source overrides an earlier one for the same key; a key keeps the
/// position of its first appearance.
pub fn resolve_environment<F>(direct: &[String], files: &[PathBuf], host_env: &F) -> Result<IndexMap<String, String>>
where
    F: Fn(&str) -> Option<String>,
{
    let mut env = IndexMap::new();

    for entry in direct {
        if let Some((key, value)) = parse_env_entry(entry, host_env).map_err(|msg| RunError::validation("env", msg))? {
            env.insert(key, value);
        }
    }

    for path in files {
        for (key, value) in read_env_file(path, host_env)? {
            env.insert(key, value);
        }
    }

    Ok(env)
}

fn parse_env_entry<F>(entry: &str, host_env: &F) -> std::result::Result<Option<(String, String)>, String>
where
    F: Fn(&str) -> Option<String>,
{
    match entry.split_once('=') {
        Some((key, value)) => {
            let key = key.trim();
            if key.is_empty() || key.contains(char::is_whitespace) {
                return Err(format!("'{}' is not a valid KEY=VALUE pair", entry));
            }
            Ok(Some((key.to_string(), value.to_string())))
        }
        None => {
            let key = entry.trim();
            if key.is_empty() || key.contains(char::is_whitespace) {
                return Err(format!("'{}' is not a valid variable name", entry));
            }
            // Unset host variables are dropped, as docker does
            Ok(host_env(key).map(|value| (key.to_string(), value)))
        }
    }
}

fn read_env_file<F>(path: &Path, host_env: &F) -> Result<Vec<(String, String)>>
where
    F: Fn(&str) -> Option<String>,
{
    let content = std::fs::read_to_string(path).map_err(|e| {
        RunError::validation("envFile", format!("failed to read {}: {}", path.display(), e))
    })?;

    let mut vars = Vec::new();
    for (index, line) in content.lines().enumerate() {
        let line = line.trim();

        // Skip empty lines and comments
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);

        let parsed = parse_env_entry(line, host_env)
            .map_err(|msg| RunError::validation("envFile", format!("{}:{}: {}", path.display(), index + 1, msg)))?;
        if let Some((key, value)) = parsed {
            vars.push((key, unquote(value.trim())));
        }
    }
    Ok(vars)
}

fn unquote(value: &str) -> String {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return value[1..value.len() - 1].to_string();
        }
    }
    value.to_string()
}
