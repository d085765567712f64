//! Isolation Guard - Pre-flight Check on the Framework Root
//!
//! The framework is a peer project. Before any module is loaded the guard
//! checks that its root exists and that it is not this project's own
//! root, comparing normalized paths so that trailing slashes, `..`
//! segments, relative spellings and symlinks cannot slip past.

use std::path::{Component, Path, PathBuf};

use tracing::{info, instrument};

use crate::error::ProxyError;

/// Validates a candidate framework root against the hosting project.
#[derive(Debug, Clone)]
pub struct IsolationGuard {
    /// Normalized project root.
    project_root: PathBuf,
}

impl IsolationGuard {
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self {
            project_root: normalize(project_root.as_ref()),
        }
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Check a candidate root, returning its normalized form.
    ///
    /// # Errors
    /// - `ProxyError::Configuration` if the candidate does not exist
    /// - `ProxyError::SelfReference` if it is the project root
    #[instrument(skip(self), fields(candidate = %candidate.display()))]
    pub fn check(&self, candidate: &Path) -> Result<PathBuf, ProxyError> {
        if !candidate.exists() {
            return Err(ProxyError::Configuration(format!(
                "external root {} does not exist",
                candidate.display()
            )));
        }

        let root = normalize(candidate);
        if root == self.project_root {
            return Err(ProxyError::SelfReference { root });
        }

        info!(root = %root.display(), "External root accepted");
        Ok(root)
    }
}

/// Canonicalize when possible, otherwise normalize lexically against the
/// working directory.
fn normalize(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }

    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let mut out = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
