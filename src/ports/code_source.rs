//! Code Source Port - Where Framework Source Comes From
//!
//! Isolates "find and read the framework's code" behind a capability the
//! loader depends on. The production adapter reads from a filesystem
//! root; tests substitute in-memory or mocked sources.

use crate::domain::{ModuleName, SourceLocation};
use crate::error::ProxyError;

/// Read-only access to a body of framework source code.
///
/// Implementations must be deterministic: the same logical name always
/// resolves the same way, and nothing is ever written back.
pub trait CodeSource: Send + Sync + 'static {
  /// Resolve a logical name to the location of its source.
  ///
  /// # Errors
  /// `ProxyError::ModuleNotFound` when no candidate exists.
  fn locate(&self, name: &ModuleName) -> Result<SourceLocation, ProxyError>;

  /// Read the source text at a resolved location.
  fn read(&self, location: &SourceLocation) -> Result<String, ProxyError>;

  /// Whether `name` resolves to framework-owned code.
  fn contains(&self, name: &ModuleName) -> bool {
    self.locate(name).is_ok()
  }
}
