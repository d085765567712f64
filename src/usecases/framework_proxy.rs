//! Framework Proxy - The Single Entry Point to the External Framework
//!
//! Composes the isolation guard, the filesystem code source and the
//! module loader. A proxy is constructed once by the composition root
//! (see `ProxyCell`) and then hands out module handles:
//! - the first `load` of a name resolves, executes and registers it
//! - later loads of the same name return the registered handle
//!
//! The proxy never writes under the framework root.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info, instrument, warn};

use crate::adapters::framework::{FsCodeSource, IsolationGuard, SourceExecutor};
use crate::config::FrameworkConfig;
use crate::domain::{ModuleHandle, ModuleName};
use crate::error::ProxyError;
use crate::ports::{CodeSource, ModuleExecutor};

use super::module_loader::ModuleLoader;
use super::module_registry::ModuleRegistry;

/// Framework module groups the rest of the system relies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameworkModule {
  /// Technical indicator implementations.
  Indicators,
  /// Market data access.
  MarketData,
  /// Strategy definitions.
  Strategies,
  /// Backtesting engine.
  Backtesting,
  /// Portfolio management.
  Portfolio,
}

impl FrameworkModule {
  pub const ALL: [Self; 5] = [
    Self::Indicators,
    Self::MarketData,
    Self::Strategies,
    Self::Backtesting,
    Self::Portfolio,
  ];

  /// Fixed logical name of the group.
  pub const fn logical_name(self) -> &'static str {
    match self {
      Self::Indicators => "analysis.indicators",
      Self::MarketData => "data.market_data",
      Self::Strategies => "strategies",
      Self::Backtesting => "backtest.engine",
      Self::Portfolio => "portfolio.manager",
    }
  }
}

/// Read-only access to the external framework.
pub struct FrameworkProxy {
  /// Normalized framework root.
  root: PathBuf,
  loader: ModuleLoader,
}

impl FrameworkProxy {
  /// Vet `root` against `project_root`, then build a proxy with the
  /// default filesystem layout and executor.
  ///
  /// # Errors
  /// `Configuration` if `root` does not exist, `SelfReference` if it
  /// is the project root.
  pub fn construct(
    root: impl AsRef<Path>,
    project_root: impl AsRef<Path>,
  ) -> Result<Self, ProxyError> {
    let root = IsolationGuard::new(project_root).check(root.as_ref())?;
    let source = Arc::new(FsCodeSource::new(&root));
    Ok(Self::with_parts(
      root,
      source,
      Arc::new(SourceExecutor::new()),
      Arc::new(ModuleRegistry::new()),
    ))
  }

  /// Build a proxy from `[framework]` configuration.
  ///
  /// # Errors
  /// `Configuration` when no root is configured, plus everything
  /// `construct` can return.
  pub fn from_config(config: &FrameworkConfig) -> Result<Self, ProxyError> {
    let root = config.resolve_root()?;
    let project_root = config.resolve_project_root()?;
    let root = IsolationGuard::new(project_root).check(root)?;

    let source = Arc::new(FsCodeSource::from_config(&root, config));
    let executor =
      SourceExecutor::new().with_packages(config.available_packages.iter().cloned());
    Ok(Self::with_parts(
      root,
      source,
      Arc::new(executor),
      Arc::new(ModuleRegistry::new()),
    ))
  }

  /// Assemble a proxy from explicit capabilities. No isolation check
  /// is run; callers supplying their own source are responsible for it.
  pub fn with_parts(
    root: PathBuf,
    source: Arc<dyn CodeSource>,
    executor: Arc<dyn ModuleExecutor>,
    registry: Arc<ModuleRegistry>,
  ) -> Self {
    Self {
      root,
      loader: ModuleLoader::new(source, executor, registry),
    }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  pub fn registry(&self) -> &Arc<ModuleRegistry> {
    self.loader.registry()
  }

  /// Load a framework module by logical name.
  ///
  /// # Errors
  /// - `ModuleNotFound` if neither candidate exists
  /// - `ExternalDependency` if the module's own imports fail
  #[instrument(skip(self))]
  pub fn load(&self, name: &str) -> Result<Arc<ModuleHandle>, ProxyError> {
    let name = ModuleName::parse(name)?;
    let key = ModuleLoader::qualify(&name);
    if let Some(handle) = self.loader.registry().get(&key) {
      debug!(module = %key, "Module served from registry");
      return Ok(handle);
    }
    self.loader.load(&name).inspect_err(|e| {
      warn!(module = %name, kind = e.kind(), error = %e, "Framework module load failed");
    })
  }

  pub fn load_group(&self, group: FrameworkModule) -> Result<Arc<ModuleHandle>, ProxyError> {
    self.load(group.logical_name())
  }

  pub fn indicators(&self) -> Result<Arc<ModuleHandle>, ProxyError> {
    self.load_group(FrameworkModule::Indicators)
  }

  pub fn market_data(&self) -> Result<Arc<ModuleHandle>, ProxyError> {
    self.load_group(FrameworkModule::MarketData)
  }

  pub fn strategies(&self) -> Result<Arc<ModuleHandle>, ProxyError> {
    self.load_group(FrameworkModule::Strategies)
  }

  pub fn backtesting(&self) -> Result<Arc<ModuleHandle>, ProxyError> {
    self.load_group(FrameworkModule::Backtesting)
  }

  pub fn portfolio(&self) -> Result<Arc<ModuleHandle>, ProxyError> {
    self.load_group(FrameworkModule::Portfolio)
  }

  /// Qualified names of every module registered so far.
  pub fn loaded_modules(&self) -> Vec<String> {
    self.loader.registry().qualified_names()
  }
}

type ProxyFactory = dyn Fn() -> Result<FrameworkProxy, ProxyError> + Send + Sync;

/// Construct-once holder for the proxy, owned by the composition root.
///
/// The first `get` runs the factory (and with it the isolation check)
/// under a lock; later calls return the same proxy. A failed
/// construction leaves the cell empty so the next `get` tries again.
pub struct ProxyCell {
  factory: Box<ProxyFactory>,
  slot: Mutex<Option<Arc<FrameworkProxy>>>,
  constructions: AtomicUsize,
}

impl ProxyCell {
  pub fn new<F>(factory: F) -> Self
  where
    F: Fn() -> Result<FrameworkProxy, ProxyError> + Send + Sync + 'static,
  {
    Self {
      factory: Box::new(factory),
      slot: Mutex::new(None),
      constructions: AtomicUsize::new(0),
    }
  }

  /// Cell that builds its proxy from `[framework]` configuration.
  pub fn from_config(config: FrameworkConfig) -> Self {
    Self::new(move || FrameworkProxy::from_config(&config))
  }

  /// The proxy, constructing it on first use.
  pub fn get(&self) -> Result<Arc<FrameworkProxy>, ProxyError> {
    let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(proxy) = slot.as_ref() {
      return Ok(Arc::clone(proxy));
    }

    let proxy = Arc::new((self.factory)()?);
    self.constructions.fetch_add(1, Ordering::Relaxed);
    info!(root = %proxy.root().display(), "Framework proxy constructed");
    *slot = Some(Arc::clone(&proxy));
    Ok(proxy)
  }

  pub fn is_initialized(&self) -> bool {
    self.slot
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .is_some()
  }

  /// Number of successful constructions over the cell's lifetime.
  pub fn constructions(&self) -> usize {
    self.constructions.load(Ordering::Relaxed)
  }

  /// Forget the current proxy. Only test harnesses need this.
  pub fn reset(&self) {
    self.slot
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .take();
  }
}
