//! Module Executor Port - Running a Module's Top-Level Code
//!
//! Executing framework code differs sharply by the framework's language,
//! so the loader only sees this trait. An executor turns source text into
//! a `Namespace` and pulls in whatever internal modules the source imports
//! through the `ImportResolver` it is handed.

use std::sync::Arc;

use crate::domain::{ModuleHandle, ModuleName, ModuleSource, Namespace};
use crate::error::ProxyError;

/// Resolves a module's imports against the loader's registry.
pub trait ImportResolver {
  /// Import a framework-owned module, loading and registering it if needed.
  ///
  /// Returns `Ok(None)` when the module is currently being executed
  /// further up the import chain (an import cycle).
  fn import_module(
    &mut self,
    name: &ModuleName,
  ) -> Result<Option<Arc<ModuleHandle>>, ProxyError>;

  /// Whether `name` is framework-owned code.
  fn is_internal(&self, name: &ModuleName) -> bool;
}

/// Executes a module in a fresh, isolated namespace.
pub trait ModuleExecutor: Send + Sync + 'static {
  /// # Errors
  /// `ProxyError::ExternalDependency` when the module's own execution
  /// fails, carrying the original cause.
  fn execute(
    &self,
    source: &ModuleSource,
    imports: &mut dyn ImportResolver,
  ) -> Result<Namespace, ProxyError>;
}
