//! Module Loader - Execute Framework Modules Into the Registry
//!
//! Reads a module's source through the `CodeSource` port, executes it in
//! a fresh namespace through the `ModuleExecutor` port, and registers the
//! result under `framework.<name>`. Imports made by the module while it
//! executes are served from the same registry, so the framework's own
//! relative imports resolve against the framework rather than against
//! the caller.
//!
//! Loading is not memoized here: every call re-executes and replaces the
//! registry entry. The proxy is what makes repeat access cheap.

use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::domain::{ModuleHandle, ModuleName, ModuleSource, SourceLocation};
use crate::error::ProxyError;
use crate::ports::{CodeSource, ImportResolver, ModuleExecutor};

use super::module_registry::ModuleRegistry;

/// Conventional namespace prefix for registered framework modules.
pub const EXTERNAL_NAMESPACE: &str = "framework";

/// Loads framework modules and registers them.
pub struct ModuleLoader {
  source: Arc<dyn CodeSource>,
  executor: Arc<dyn ModuleExecutor>,
  registry: Arc<ModuleRegistry>,
}

impl ModuleLoader {
  pub fn new(
    source: Arc<dyn CodeSource>,
    executor: Arc<dyn ModuleExecutor>,
    registry: Arc<ModuleRegistry>,
  ) -> Self {
    Self {
      source,
      executor,
      registry,
    }
  }

  pub fn registry(&self) -> &Arc<ModuleRegistry> {
    &self.registry
  }

  pub fn source(&self) -> &Arc<dyn CodeSource> {
    &self.source
  }

  /// Registry key for a logical name.
  pub fn qualify(name: &ModuleName) -> String {
    name.qualified(EXTERNAL_NAMESPACE)
  }

  /// Resolve, execute and register `name`.
  ///
  /// # Errors
  /// - `ModuleNotFound` if neither candidate file exists
  /// - `ExternalDependency` if the module's own execution fails
  pub fn load(&self, name: &ModuleName) -> Result<Arc<ModuleHandle>, ProxyError> {
    let location = self.source.locate(name)?;
    self.load_at(name, location)
  }

  /// Execute and register `name` from an already-resolved location.
  #[instrument(skip(self, location), fields(module = %name, path = %location.path.display()))]
  pub fn load_at(
    &self,
    name: &ModuleName,
    location: SourceLocation,
  ) -> Result<Arc<ModuleHandle>, ProxyError> {
    let mut context = LoadContext {
      loader: self,
      in_progress: Vec::new(),
    };
    context.execute(name, location)
  }
}

/// State of one top-level load: the chain of modules currently executing.
struct LoadContext<'a> {
  loader: &'a ModuleLoader,
  in_progress: Vec<String>,
}

impl LoadContext<'_> {
  fn execute(
    &mut self,
    name: &ModuleName,
    location: SourceLocation,
  ) -> Result<Arc<ModuleHandle>, ProxyError> {
    let text = self.loader.source.read(&location)?;
    let qualified = ModuleLoader::qualify(name);
    let source = ModuleSource {
      name: name.clone(),
      location,
      text,
    };

    self.in_progress.push(qualified.clone());
    let loader = self.loader;
    let result = loader.executor.execute(&source, self);
    self.in_progress.pop();
    let namespace = result?;

    let handle = Arc::new(ModuleHandle::new(
      source.name,
      qualified,
      source.location,
      namespace,
    ));
    if self.loader.registry.register(Arc::clone(&handle)).is_some() {
      debug!(module = %handle.qualified_name(), "Replaced registered module");
    }
    info!(
      module = %handle.qualified_name(),
      names = handle.namespace().names().count(),
      "Framework module loaded"
    );
    Ok(handle)
  }
}

impl ImportResolver for LoadContext<'_> {
  fn import_module(
    &mut self,
    name: &ModuleName,
  ) -> Result<Option<Arc<ModuleHandle>>, ProxyError> {
    let qualified = ModuleLoader::qualify(name);
    if self.in_progress.contains(&qualified) {
      debug!(module = %qualified, "Import cycle, using module under construction");
      return Ok(None);
    }
    if let Some(handle) = self.loader.registry.get(&qualified) {
      return Ok(Some(handle));
    }
    let location = self.loader.source.locate(name)?;
    self.execute(name, location).map(Some)
  }

  fn is_internal(&self, name: &ModuleName) -> bool {
    self.loader.source.contains(name)
  }
}

#[cfg(test)]
mod tests {
  use std::collections::HashMap;
  use std::path::PathBuf;
  use std::sync::Mutex;

  use super::*;
  use crate::adapters::framework::SourceExecutor;

  /// In-memory source keyed by logical name; counts reads.
  #[derive(Default)]
  struct MemorySource {
    files: HashMap<String, (String, bool)>,
    reads: Mutex<Vec<String>>,
  }

  impl MemorySource {
    fn with(mut self, name: &str, text: &str) -> Self {
      self.files.insert(name.to_string(), (text.to_string(), false));
      self
    }

    fn with_package(mut self, name: &str, text: &str) -> Self {
      self.files.insert(name.to_string(), (text.to_string(), true));
      self
    }

    fn reads(&self) -> Vec<String> {
      self.reads.lock().unwrap().clone()
    }
  }

  impl CodeSource for MemorySource {
    fn locate(&self, name: &ModuleName) -> Result<SourceLocation, ProxyError> {
      self.files
        .get(name.as_str())
        .map(|(_, is_package)| SourceLocation {
          path: PathBuf::from(name.as_str()),
          is_package: *is_package,
        })
        .ok_or_else(|| ProxyError::ModuleNotFound {
          name: name.to_string(),
          candidates: Vec::new(),
        })
    }

    fn read(&self, location: &SourceLocation) -> Result<String, ProxyError> {
      let key = location.path.to_string_lossy().to_string();
      self.reads.lock().unwrap().push(key.clone());
      Ok(self.files[&key].0.clone())
    }
  }

  fn loader(source: MemorySource) -> (Arc<MemorySource>, ModuleLoader) {
    let source = Arc::new(source);
    let loader = ModuleLoader::new(
      Arc::clone(&source) as Arc<dyn CodeSource>,
      Arc::new(SourceExecutor::new()),
      Arc::new(ModuleRegistry::new()),
    );
    (source, loader)
  }

  fn name(s: &str) -> ModuleName {
    ModuleName::parse(s).unwrap()
  }

  #[test]
  fn test_load_registers_under_qualified_key() {
    let (_, loader) =
      loader(MemorySource::default().with("data.market_data", "def fetch(): pass\n"));
    let handle = loader.load(&name("data.market_data")).unwrap();
    assert_eq!(handle.qualified_name(), "framework.data.market_data");
    assert!(handle.has_attr("fetch"));
    assert!(loader.registry().contains("framework.data.market_data"));
  }

  #[test]
  fn test_relative_imports_register_dependencies() {
    let (_, loader) = loader(
      MemorySource::default()
        .with_package("analysis", "")
        .with("analysis.common", "def smooth(): pass\n")
        .with("analysis.rsi", "from .common import smooth\n\ndef rsi(): pass\n"),
    );
    loader.load(&name("analysis.rsi")).unwrap();
    assert_eq!(
      loader.registry().qualified_names(),
      vec!["framework.analysis.common", "framework.analysis.rsi"]
    );
  }

  #[test]
  fn test_each_load_re_executes() {
    let (source, loader) = loader(MemorySource::default().with("strategies", "X = 1\n"));
    let first = loader.load(&name("strategies")).unwrap();
    let second = loader.load(&name("strategies")).unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(source.reads().len(), 2);
    assert!(Arc::ptr_eq(
      &loader.registry().get("framework.strategies").unwrap(),
      &second
    ));
  }

  #[test]
  fn test_dependencies_already_registered_are_reused() {
    let (source, loader) = loader(
      MemorySource::default()
        .with_package("analysis", "")
        .with("analysis.common", "")
        .with("analysis.a", "from . import common\n")
        .with("analysis.b", "from .common import *\n"),
    );
    loader.load(&name("analysis.a")).unwrap();
    loader.load(&name("analysis.b")).unwrap();
    let common_reads = source
      .reads()
      .into_iter()
      .filter(|r| r == "analysis.common")
      .count();
    assert_eq!(common_reads, 1);
  }

  #[test]
  fn test_import_cycle_terminates() {
    let (_, loader) = loader(
      MemorySource::default()
        .with_package("engine", "")
        .with("engine.a", "from .b import run\n\ndef start(): pass\n")
        .with("engine.b", "from .a import start\n\ndef run(): pass\n"),
    );
    let handle = loader.load(&name("engine.a")).unwrap();
    assert!(handle.has_attr("start"));
    assert!(loader.registry().contains("framework.engine.b"));
  }

  #[test]
  fn test_failing_dependency_is_wrapped_with_cause() {
    let (_, loader) = loader(
      MemorySource::default()
        .with_package("portfolio", "")
        .with("portfolio.optimizer", "import cvxpy\n")
        .with("portfolio.manager", "from .optimizer import solve\n"),
    );
    let err = loader.load(&name("portfolio.manager")).unwrap_err();
    let ProxyError::ExternalDependency { module, cause } = err else {
      panic!("expected ExternalDependency");
    };
    assert_eq!(module, "portfolio.manager");
    let inner = cause.downcast_ref::<ProxyError>().expect("inner proxy error");
    assert!(matches!(
      inner,
      ProxyError::ExternalDependency { module, .. } if module == "portfolio.optimizer"
    ));
    assert!(!loader.registry().contains("framework.portfolio.manager"));
  }

  #[test]
  fn test_missing_target_is_not_found() {
    let (_, loader) = loader(MemorySource::default());
    let err = loader.load(&name("nonexistent.module")).unwrap_err();
    assert!(matches!(err, ProxyError::ModuleNotFound { .. }));
  }
}
