//! Error Types - Framework Access and Storage Failures
//!
//! `ProxyError` covers everything that can go wrong between asking for a
//! framework module and getting a handle back. `ValidationError` and
//! `StoreError` cover the storage side. Both halves are local to their
//! caller: nothing here is meant to crash the process.

use std::path::PathBuf;

use thiserror::Error;

/// Boxed root cause carried by [`ProxyError::ExternalDependency`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failures of the external module access proxy.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The external root is missing, unset or otherwise unusable.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The external root resolves to the hosting project itself.
    #[error("external root {} resolves to this project's own root", root.display())]
    SelfReference {
        /// Normalized path that matched the project root.
        root: PathBuf,
    },

    /// No file exists under either candidate path.
    #[error("module `{name}` not found (searched: {})", searched(candidates))]
    ModuleNotFound {
        /// Logical name as requested.
        name: String,
        /// Candidate paths, in the order they were checked.
        candidates: Vec<PathBuf>,
    },

    /// The module file exists but its own execution failed.
    #[error("module `{module}` could not be executed: {cause}")]
    ExternalDependency {
        /// Logical name of the module being executed.
        module: String,
        /// What the module needed and could not get.
        #[source]
        cause: BoxError,
    },

    /// Reading a resolved file failed.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ProxyError {
    /// Short label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::SelfReference { .. } => "self_reference",
            Self::ModuleNotFound { .. } => "module_not_found",
            Self::ExternalDependency { .. } => "external_dependency",
            Self::Io { .. } => "io",
        }
    }
}

fn searched(candidates: &[PathBuf]) -> String {
    if candidates.is_empty() {
        return "no valid candidate paths".to_string();
    }
    candidates
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Faults raised while executing a module's own top-level statements.
#[derive(Debug, Error)]
pub enum ExecutionFault {
    /// A third-party package the module imports is not installed here.
    #[error("package `{0}` is not available in this environment")]
    MissingPackage(String),

    /// A relative import walks above the framework's top-level package.
    #[error("relative import (level {level}) in `{module}` goes beyond the top-level package")]
    RelativeBeyondTopLevel { module: String, level: usize },

    /// The module's source does not parse.
    #[error("invalid syntax at line {line}")]
    InvalidSyntax { line: usize },

    /// The Python grammar could not be loaded or parsing was aborted.
    #[error("python parser unavailable: {0}")]
    Parser(String),
}

/// Rejected storage input. Always local to a single call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {field}: {reason}")]
pub struct ValidationError {
    /// Name of the offending input.
    pub field: &'static str,
    /// Human-readable reason.
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Failures of a record storage backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("storage I/O failed at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to (de)serialize records: {0}")]
    Serialization(#[from] serde_json::Error),
}
