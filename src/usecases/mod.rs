//! Use Cases Layer - Application Logic
//!
//! Orchestrates domain types with port interfaces to implement the
//! bridge's workflows.
//!
//! Use cases:
//! - `ModuleRegistry`: Owned table of executed framework modules
//! - `ModuleLoader`: Execute framework modules into the registry
//! - `FrameworkProxy`: Single entry point to the external framework
//! - `ProxyCell`: Construct-once holder for the proxy

pub mod framework_proxy;
pub mod module_loader;
pub mod module_registry;

pub use framework_proxy::{FrameworkModule, FrameworkProxy, ProxyCell};
pub use module_loader::{EXTERNAL_NAMESPACE, ModuleLoader};
pub use module_registry::ModuleRegistry;
