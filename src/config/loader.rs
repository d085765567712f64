//! Configuration Loader - File Loading and Validation
//!
//! Handles loading `config.toml`, applying environment overrides,
//! validating all parameters, and providing clear error messages for
//! misconfiguration.

use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use super::{AppConfig, FRAMEWORK_ROOT_ENV};

/// Load and validate configuration from a TOML file.
///
/// # Errors
/// Returns detailed error if:
/// - File doesn't exist or can't be read
/// - TOML parsing fails
/// - Validation rules are violated
pub fn load_config(path: &str) -> Result<AppConfig> {
  let path = Path::new(path);

  let content = std::fs::read_to_string(path)
    .with_context(|| format!("Failed to read config file: {}", path.display()))?;

  let mut config = parse_config(&content)?;
  apply_env_overrides(&mut config, |key| std::env::var(key).ok());
  validate_config(&config)?;

  info!(
    service = %config.service.name,
    framework_root = ?config.framework.root,
    data_dir = %config.storage.data_dir,
    "Configuration loaded successfully"
  );

  Ok(config)
}

/// Parse configuration text without touching the environment.
pub fn parse_config(content: &str) -> Result<AppConfig> {
  toml::from_str(content).with_context(|| "Failed to parse config.toml")
}

/// Apply environment overrides using the given lookup.
///
/// `FRAMEWORK_ROOT`, when set and non-empty, replaces `[framework].root`.
pub fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F)
where
  F: Fn(&str) -> Option<String>,
{
  if let Some(root) = lookup(FRAMEWORK_ROOT_ENV).filter(|v| !v.trim().is_empty()) {
    config.framework.root = Some(PathBuf::from(root));
  }
}

/// Validate all configuration parameters.
pub fn validate_config(config: &AppConfig) -> Result<()> {
  anyhow::ensure!(
    !config.service.name.trim().is_empty(),
    "service.name must not be empty"
  );

  let framework = &config.framework;
  anyhow::ensure!(
    !framework.extension.is_empty() && !framework.extension.contains(['.', '/', '\\']),
    "framework.extension must be a bare extension like \"py\", got {:?}",
    framework.extension
  );
  anyhow::ensure!(
    !framework.package_index.is_empty() && !framework.package_index.contains(['/', '\\']),
    "framework.package_index must be a file stem, got {:?}",
    framework.package_index
  );
  anyhow::ensure!(
    is_contained_relative(Path::new(&framework.source_dir)),
    "framework.source_dir must be a relative path inside the root, got {:?}",
    framework.source_dir
  );

  anyhow::ensure!(
    !config.storage.data_dir.trim().is_empty(),
    "storage.data_dir must not be empty"
  );

  anyhow::ensure!(
    config.metrics.health_port != 0,
    "metrics.health_port must be non-zero"
  );

  Ok(())
}

fn is_contained_relative(path: &Path) -> bool {
  path
    .components()
    .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}
