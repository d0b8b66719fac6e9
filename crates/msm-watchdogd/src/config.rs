//! Configuration loading and command line overrides.

use std::path::Path;

use anyhow::{Context, Result};
use msm_watchdog::SupervisorConfig;
use tracing::{debug, info};

use crate::cli::Cli;

/// Load the supervisor configuration from `path`.
///
/// A missing file falls back to defaults unless it was named explicitly.
pub async fn load_from_path(path: &Path, explicit: bool) -> Result<SupervisorConfig> {
    if !explicit && !tokio::fs::try_exists(path).await.unwrap_or(false) {
        info!(path = %path.display(), "config file not found, using defaults");
        return Ok(SupervisorConfig::default());
    }

    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config: SupervisorConfig = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

    debug!(path = %path.display(), "loaded config");
    Ok(config)
}

/// Apply command line overrides on top of the file configuration.
pub fn apply_overrides(mut config: SupervisorConfig, cli: &Cli) -> SupervisorConfig {
    if let Some(enabled) = cli.enable {
        config.enabled = enabled;
    }
    if cli.debug_mode {
        config.debug_mode = true;
    }
    if let Some(base) = cli.timer_base {
        config.timer_base = base;
    }
    config
}

/// Load, override and validate.
pub async fn resolve(cli: &Cli) -> Result<SupervisorConfig> {
    let (path, explicit) = cli.config_path();
    let config = apply_overrides(load_from_path(&path, explicit).await?, cli);
    config
        .validate()
        .with_context(|| format!("Invalid configuration from {}", path.display()))?;
    Ok(config)
}
