//! Domain layer - Module naming, loaded-module types and storage rules.
//!
//! No I/O here apart from logging (hexagonal architecture inner ring).
//! Everything in this layer is testable in isolation.

pub mod module;
pub mod module_name;
pub mod record;
pub mod storage;

// Re-export core types for convenience
pub use module::{ImportStatement, ModuleHandle, ModuleSource, Namespace, SourceLocation};
pub use module_name::ModuleName;
pub use record::{RecordKind, StorageRecord};
pub use storage::{
    HealthCheckResult, HealthStatus, MetricsSnapshot, StorageMetrics,
    build_health_check_result, new_record_id, sanitize_payload, validate_tenant_id,
    validate_tenant_value,
};
