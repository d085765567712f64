//! Loaded Module Types
//!
//! A framework module, once executed, is represented by a [`ModuleHandle`]:
//! its logical name, the key it is registered under, where its source came
//! from, and the [`Namespace`] its top-level statements produced.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use super::module_name::ModuleName;

/// Where a module's source was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    /// Resolved file path.
    pub path: PathBuf,
    /// True when the file is a package index (`pkg/__init__.py`).
    pub is_package: bool,
}

/// A module's source text, ready to execute.
#[derive(Debug, Clone)]
pub struct ModuleSource {
    pub name: ModuleName,
    pub location: SourceLocation,
    pub text: String,
}

/// One top-level import statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportStatement {
    /// `import a.b [as c]`
    Module {
        path: String,
        alias: Option<String>,
        line: usize,
    },
    /// `from [.]*module import names`
    From {
        /// Number of leading dots; zero for absolute imports.
        level: usize,
        /// Module text after the dots, possibly empty.
        module: String,
        /// Imported names (not aliases). `*` is kept as-is.
        names: Vec<String>,
        line: usize,
    },
}

impl ImportStatement {
    pub const fn is_relative(&self) -> bool {
        matches!(self, Self::From { level, .. } if *level > 0)
    }

    /// 1-based source line the statement starts on.
    pub const fn line(&self) -> usize {
        match self {
            Self::Module { line, .. } | Self::From { line, .. } => *line,
        }
    }
}

/// Names bound by executing a module's top-level statements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Namespace {
    names: BTreeSet<String>,
    imports: Vec<ImportStatement>,
}

impl Namespace {
    pub fn bind(&mut self, name: impl Into<String>) {
        self.names.insert(name.into());
    }

    pub fn record_import(&mut self, import: ImportStatement) {
        self.imports.push(import);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Bound names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn imports(&self) -> &[ImportStatement] {
        &self.imports
    }
}

/// Opaque handle to an executed framework module.
#[derive(Debug)]
pub struct ModuleHandle {
    name: ModuleName,
    qualified_name: String,
    location: SourceLocation,
    namespace: Namespace,
}

impl ModuleHandle {
    pub fn new(
        name: ModuleName,
        qualified_name: String,
        location: SourceLocation,
        namespace: Namespace,
    ) -> Self {
        Self {
            name,
            qualified_name,
            location,
            namespace,
        }
    }

    pub fn name(&self) -> &ModuleName {
        &self.name
    }

    /// Registry key, e.g. `framework.analysis.indicators`.
    pub fn qualified_name(&self) -> &str {
        &self.qualified_name
    }

    pub fn path(&self) -> &Path {
        &self.location.path
    }

    pub const fn is_package(&self) -> bool {
        self.location.is_package
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Whether the module binds `attr` at top level.
    pub fn has_attr(&self, attr: &str) -> bool {
        self.namespace.contains(attr)
    }
}
