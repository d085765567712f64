//! Module Registry - Owned Table of Executed Framework Modules
//!
//! Maps qualified keys (`framework.analysis.indicators`) to handles.
//! The registry is an explicit object threaded through the loader and
//! the proxy, so each proxy (and each test) gets its own.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::domain::ModuleHandle;

/// Thread-safe table of loaded module handles.
#[derive(Debug, Default)]
pub struct ModuleRegistry {
  modules: RwLock<HashMap<String, Arc<ModuleHandle>>>,
}

impl ModuleRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register a handle under its qualified name, returning any
  /// handle it replaces.
  pub fn register(&self, handle: Arc<ModuleHandle>) -> Option<Arc<ModuleHandle>> {
    self.modules
      .write()
      .unwrap_or_else(PoisonError::into_inner)
      .insert(handle.qualified_name().to_string(), handle)
  }

  pub fn get(&self, qualified_name: &str) -> Option<Arc<ModuleHandle>> {
    self.modules
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .get(qualified_name)
      .cloned()
  }

  pub fn contains(&self, qualified_name: &str) -> bool {
    self.modules
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .contains_key(qualified_name)
  }

  pub fn len(&self) -> usize {
    self.modules
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Qualified names in sorted order.
  pub fn qualified_names(&self) -> Vec<String> {
    let mut names: Vec<String> = self
      .modules
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .keys()
      .cloned()
      .collect();
    names.sort();
    names
  }
}
