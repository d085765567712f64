//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the interfaces (traits) that the usecases layer requires from
//! the outside world. Adapters implement these traits.
//!
//! Port categories:
//! - `CodeSource`: Read-only access to the external framework's source
//! - `ModuleExecutor`: Executing a framework module into a namespace
//! - `RecordStore`: Generic tenant-scoped record persistence

pub mod code_source;
pub mod module_executor;
pub mod record_store;

pub use code_source::CodeSource;
pub use module_executor::{ImportResolver, ModuleExecutor};
pub use record_store::RecordStore;
