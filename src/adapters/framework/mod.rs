//! Framework Adapters - Read-only Access to the External Codebase
//!
//! Implements the `CodeSource` and `ModuleExecutor` ports for a
//! framework checked out on the local filesystem, plus the isolation
//! guard that vets its root before anything is read.

pub mod executor;
pub mod fs_source;
pub mod isolation;

pub use executor::SourceExecutor;
pub use fs_source::FsCodeSource;
pub use isolation::IsolationGuard;
