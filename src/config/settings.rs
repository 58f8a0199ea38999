use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::backend::BackendKind;
use crate::utils::paths;

/// Name of the built-in local engine context. Always present, never stored.
pub const DEFAULT_CONTEXT: &str = "default";

/// Selects the active context for one invocation, ahead of the stored one.
pub const CONTEXT_ENV: &str = "SHIPCTL_CONTEXT";

/// Global shipctl settings stored in ~/.shipctl/config.yaml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// Context used when `SHIPCTL_CONTEXT` is not set
    #[serde(default = "default_context_name")]
    pub current_context: String,

    /// User-defined contexts (name -> backend parameters)
    #[serde(default)]
    pub contexts: BTreeMap<String, ContextConfig>,
}

fn default_context_name() -> String {
    DEFAULT_CONTEXT.to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            current_context: default_context_name(),
            contexts: BTreeMap::new(),
        }
    }
}

/// Backend parameters for one context.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContextConfig {
    /// Local or remote docker engine
    Docker {
        /// Engine endpoint (unix://, tcp:// or http://); local defaults when unset
        #[serde(default, skip_serializing_if = "Option::is_none")]
        host: Option<String>,
    },

    /// Cloud container-instance service
    Aci {
        subscription_id: String,
        resource_group: String,
        location: String,
    },
}

impl ContextConfig {
    pub fn kind(&self) -> BackendKind {
        match self {
            Self::Docker { .. } => BackendKind::Docker,
            Self::Aci { .. } => BackendKind::Aci,
        }
    }

    /// One-line endpoint summary for listings.
    pub fn describe(&self) -> String {
        match self {
            Self::Docker { host } => host.clone().unwrap_or_else(|| "local engine".to_string()),
            Self::Aci {
                subscription_id,
                resource_group,
                location,
            } => format!("{}/{} ({})", subscription_id, resource_group, location),
        }
    }
}

/// The context a command runs against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveContext {
    pub name: String,
    pub config: ContextConfig,
}

impl Settings {
    /// Load settings from disk, falling back to defaults if the file does not exist
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::get_settings_file()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings: {}", path.display()))?;

        let settings: Settings = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse settings file: {}", path.display()))?;

        Ok(settings)
    }

    /// Save settings to disk
    pub fn save(&self) -> Result<()> {
        self.save_to(&paths::get_settings_file()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write settings: {}", path.display()))?;

        Ok(())
    }

    /// Look up a context by name, including the built-in default
    pub fn get_context(&self, name: &str) -> Result<ContextConfig> {
        if name == DEFAULT_CONTEXT {
            return Ok(ContextConfig::Docker { host: None });
        }
        self.contexts.get(name).cloned().with_context(|| {
            format!(
                "Context '{}' not found. Run 'shipctl context ls' to see available contexts.",
                name
            )
        })
    }

    /// Resolve the context for this invocation: `override_name` (usually
    /// `SHIPCTL_CONTEXT`) first, then the stored current context.
    pub fn active_context(&self, override_name: Option<&str>) -> Result<ActiveContext> {
        let name = override_name
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.current_context)
            .to_string();
        let config = self.get_context(&name)?;
        Ok(ActiveContext { name, config })
    }

    /// Register a new context
    pub fn create_context(&mut self, name: &str, config: ContextConfig) -> Result<()> {
        if name == DEFAULT_CONTEXT || self.contexts.contains_key(name) {
            anyhow::bail!("Context '{}' already exists", name);
        }
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')) {
            anyhow::bail!("Invalid context name '{}': use letters, digits, '-', '_' or '.'", name);
        }
        self.contexts.insert(name.to_string(), config);
        Ok(())
    }

    /// Make `name` the stored current context
    pub fn use_context(&mut self, name: &str) -> Result<()> {
        self.get_context(name)?;
        self.current_context = name.to_string();
        Ok(())
    }

    /// Remove a context; removing the current one resets to the default
    pub fn remove_context(&mut self, name: &str) -> Result<()> {
        if name == DEFAULT_CONTEXT {
            anyhow::bail!("The '{}' context cannot be removed", DEFAULT_CONTEXT);
        }
        if self.contexts.remove(name).is_none() {
            anyhow::bail!("Context '{}' not found", name);
        }
        if self.current_context == name {
            self.current_context = default_context_name();
        }
        Ok(())
    }

    /// All contexts, default first
    pub fn list_contexts(&self) -> Vec<(String, ContextConfig)> {
        std::iter::once((DEFAULT_CONTEXT.to_string(), ContextConfig::Docker { host: None }))
            .chain(self.contexts.iter().map(|(k, v)| (k.clone(), v.clone())))
            .collect()
    }
}
