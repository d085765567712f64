//! Filesystem Code Source - Path Resolution Under the Framework Root
//!
//! Maps `a.b.c` to exactly two candidates, checked in this order:
//! 1. `<root>/src/a/b/c.py`
//! 2. `<root>/src/a/b/c/__init__.py`
//!
//! No wildcard search, no alternate extensions, no upward search.
//! Files are only ever read.

use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use crate::config::FrameworkConfig;
use crate::domain::{ModuleName, SourceLocation};
use crate::error::ProxyError;
use crate::ports::CodeSource;

/// Read-only code source rooted at a framework checkout.
#[derive(Debug, Clone)]
pub struct FsCodeSource {
    /// `<root>/<source_dir>`.
    source_root: PathBuf,
    /// Extension without the dot.
    extension: String,
    /// File stem of a package index.
    package_index: String,
}

impl FsCodeSource {
    /// Source with the default layout (`src/`, `.py`, `__init__`).
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self::with_layout(root, "src", "py", "__init__")
    }

    pub fn with_layout(
        root: impl AsRef<Path>,
        source_dir: &str,
        extension: &str,
        package_index: &str,
    ) -> Self {
        Self {
            source_root: root.as_ref().join(source_dir),
            extension: extension.to_string(),
            package_index: package_index.to_string(),
        }
    }

    /// Layout taken from `[framework]` configuration.
    pub fn from_config(root: impl AsRef<Path>, config: &FrameworkConfig) -> Self {
        Self::with_layout(
            root,
            &config.source_dir,
            &config.extension,
            &config.package_index,
        )
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    /// The two candidate paths for `name`: direct file, then package index.
    pub fn candidates(&self, name: &ModuleName) -> [PathBuf; 2] {
        let mut dir = self.source_root.clone();
        for segment in name.segments() {
            dir.push(segment);
        }
        let direct = dir.with_extension(&self.extension);
        let index = dir.join(format!("{}.{}", self.package_index, self.extension));
        [direct, index]
    }
}

impl CodeSource for FsCodeSource {
    #[instrument(skip(self), fields(module = %name))]
    fn locate(&self, name: &ModuleName) -> Result<SourceLocation, ProxyError> {
        let [direct, index] = self.candidates(name);

        if direct.is_file() {
            debug!(path = %direct.display(), "Resolved module file");
            return Ok(SourceLocation {
                path: direct,
                is_package: false,
            });
        }
        if index.is_file() {
            debug!(path = %index.display(), "Resolved package index");
            return Ok(SourceLocation {
                path: index,
                is_package: true,
            });
        }

        Err(ProxyError::ModuleNotFound {
            name: name.to_string(),
            candidates: vec![direct, index],
        })
    }

    fn read(&self, location: &SourceLocation) -> Result<String, ProxyError> {
        std::fs::read_to_string(&location.path).map_err(|source| ProxyError::Io {
            path: location.path.clone(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    fn framework() -> (TempDir, FsCodeSource) {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let src = dir.path().join("src");
        fs::create_dir_all(src.join("analysis/indicators")).unwrap();
        fs::write(src.join("analysis/__init__.py"), "").unwrap();
        fs::write(src.join("analysis/indicators/__init__.py"), "").unwrap();
        fs::write(src.join("analysis/indicators/rsi.py"), "def rsi(): pass\n").unwrap();
        let source = FsCodeSource::new(dir.path());
        (dir, source)
    }

    #[test]
    fn test_candidates_are_fixed_and_ordered() {
        let source = FsCodeSource::new("/fw");
        let name = ModuleName::parse("a.b.c").unwrap();
        let [direct, index] = source.candidates(&name);
        assert_eq!(direct, PathBuf::from("/fw/src/a/b/c.py"));
        assert_eq!(index, PathBuf::from("/fw/src/a/b/c/__init__.py"));
    }

    #[test]
    fn test_direct_file_resolves() {
        let (_dir, source) = framework();
        let loc = source
            .locate(&ModuleName::parse("analysis.indicators.rsi").unwrap())
            .unwrap();
        assert!(!loc.is_package);
        assert!(loc.path.ends_with("analysis/indicators/rsi.py"));
        assert!(source.read(&loc).unwrap().contains("def rsi"));
    }

    #[test]
    fn test_package_index_fallback() {
        let (_dir, source) = framework();
        let loc = source
            .locate(&ModuleName::parse("analysis.indicators").unwrap())
            .unwrap();
        assert!(loc.is_package);
        assert!(loc.path.ends_with("analysis/indicators/__init__.py"));
    }

    #[test]
    fn test_direct_file_wins_over_package() {
        let (dir, source) = framework();
        fs::write(dir.path().join("src/analysis/indicators.py"), "X = 1\n").unwrap();
        let loc = source
            .locate(&ModuleName::parse("analysis.indicators").unwrap())
            .unwrap();
        assert!(!loc.is_package);
    }

    #[test]
    fn test_missing_module_lists_both_candidates() {
        let (_dir, source) = framework();
        let err = source
            .locate(&ModuleName::parse("analysis.missing").unwrap())
            .unwrap_err();
        match err {
            ProxyError::ModuleNotFound { name, candidates } => {
                assert_eq!(name, "analysis.missing");
                assert_eq!(candidates.len(), 2);
            }
            other => panic!("expected ModuleNotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_directory_without_index_is_not_a_module() {
        let (dir, source) = framework();
        fs::create_dir_all(dir.path().join("src/data")).unwrap();
        assert!(!source.contains(&ModuleName::parse("data").unwrap()));
    }
}
