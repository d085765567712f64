//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Implements the port traits defined in `crate::ports` with concrete
//! external dependencies (filesystem, HTTP, Prometheus). Each sub-module
//! groups adapters by infrastructure concern.
//!
//! Adapter categories:
//! - `framework`: Read-only filesystem access to the external framework
//! - `metrics`: Prometheus metrics export and health checks
//! - `persistence`: JSON snapshot record storage

pub mod framework;
pub mod metrics;
pub mod persistence;
