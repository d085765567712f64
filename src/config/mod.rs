//! Configuration Module - TOML-based Service Configuration
//!
//! Loads and validates configuration from `config.toml` with an
//! environment variable override for the framework root.
//! The external framework's location is always supplied from outside -
//! there is no built-in fallback path.

pub mod loader;

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ProxyError;

/// Environment variable that overrides `[framework].root`.
pub const FRAMEWORK_ROOT_ENV: &str = "FRAMEWORK_ROOT";

/// Top-level service configuration.
///
/// Loaded from `config.toml` at startup and validated before anything
/// else is constructed.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
  /// Service identity and logging.
  pub service: ServiceConfig,
  /// External framework access.
  #[serde(default)]
  pub framework: FrameworkConfig,
  /// Record storage.
  #[serde(default)]
  pub storage: StorageConfig,
  /// Metrics and health endpoints.
  #[serde(default)]
  pub metrics: MetricsConfig,
}

/// Service identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
  /// Human-readable service name.
  pub name: String,
  /// Log level (trace, debug, info, warn, error).
  #[serde(default = "default_log_level")]
  pub log_level: String,
}

/// Where the external framework lives and how its source is laid out.
#[derive(Debug, Clone, Deserialize)]
pub struct FrameworkConfig {
  /// Framework root directory. Overridden by `FRAMEWORK_ROOT`.
  pub root: Option<PathBuf>,
  /// This project's own root, used by the isolation guard.
  /// Defaults to the working directory.
  pub project_root: Option<PathBuf>,
  /// Source directory under the root.
  #[serde(default = "default_source_dir")]
  pub source_dir: String,
  /// Source file extension, without the dot.
  #[serde(default = "default_extension")]
  pub extension: String,
  /// File stem of a package index.
  #[serde(default = "default_package_index")]
  pub package_index: String,
  /// Third-party packages installed alongside the framework.
  #[serde(default)]
  pub available_packages: Vec<String>,
  /// Load the well-known framework modules at startup.
  #[serde(default)]
  pub preload: bool,
}

impl FrameworkConfig {
  /// The configured framework root.
  ///
  /// # Errors
  /// `ProxyError::Configuration` when neither `FRAMEWORK_ROOT` nor
  /// `[framework].root` is set.
  pub fn resolve_root(&self) -> Result<&Path, ProxyError> {
    self.root.as_deref().ok_or_else(|| {
      ProxyError::Configuration(format!(
        "framework root is not configured; set {FRAMEWORK_ROOT_ENV} or [framework].root"
      ))
    })
  }

  /// This project's root, falling back to the working directory.
  pub fn resolve_project_root(&self) -> Result<PathBuf, ProxyError> {
    match &self.project_root {
      Some(root) => Ok(root.clone()),
      None => std::env::current_dir().map_err(|source| ProxyError::Io {
        path: PathBuf::from("."),
        source,
      }),
    }
  }
}

impl Default for FrameworkConfig {
  fn default() -> Self {
    Self {
      root: None,
      project_root: None,
      source_dir: default_source_dir(),
      extension: default_extension(),
      package_index: default_package_index(),
      available_packages: Vec::new(),
      preload: false,
    }
  }
}

/// Record storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
  /// Directory for record snapshots.
  #[serde(default = "default_data_dir")]
  pub data_dir: String,
}

impl Default for StorageConfig {
  fn default() -> Self {
    Self {
      data_dir: default_data_dir(),
    }
  }
}

/// Metrics and monitoring configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
  /// Enable Prometheus metrics export.
  #[serde(default = "default_true")]
  pub enabled: bool,
  /// Metrics server bind address.
  #[serde(default = "default_metrics_addr")]
  pub bind_address: String,
  /// Health check endpoint port.
  #[serde(default = "default_health_port")]
  pub health_port: u16,
}

impl Default for MetricsConfig {
  fn default() -> Self {
    Self {
      enabled: default_true(),
      bind_address: default_metrics_addr(),
      health_port: default_health_port(),
    }
  }
}

// Default value functions for serde

fn default_log_level() -> String {
  "info".to_string()
}

fn default_source_dir() -> String {
  "src".to_string()
}

fn default_extension() -> String {
  "py".to_string()
}

fn default_package_index() -> String {
  "__init__".to_string()
}

fn default_data_dir() -> String {
  "data".to_string()
}

const fn default_true() -> bool {
  true
}

fn default_metrics_addr() -> String {
  "0.0.0.0:9090".to_string()
}

const fn default_health_port() -> u16 {
  8080
}
