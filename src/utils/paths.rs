use anyhow::{Context, Result};
use std::path::PathBuf;

/// Overrides the configuration directory, mostly for tests and CI.
pub const CONFIG_DIR_ENV: &str = "SHIPCTL_CONFIG_DIR";

/// Get the shipctl configuration directory (`~/.shipctl` unless overridden)
pub fn get_config_dir() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV).filter(|d| !d.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    let home = dirs::home_dir().context("Could not find home directory")?;
    Ok(home.join(".shipctl"))
}

/// Get the settings file path
pub fn get_settings_file() -> Result<PathBuf> {
    Ok(get_config_dir()?.join("config.yaml"))
}
