//! Record Store Port - Generic Tenant-Scoped Persistence
//!
//! Every backend behind this trait validates the tenant id, sanitizes
//! payload and metadata on write, and records each call in its
//! `StorageMetrics` before returning.

use async_trait::async_trait;

use crate::domain::{HealthCheckResult, RecordKind, StorageRecord};
use crate::error::StoreError;

/// Trait for generic record storage backends.
#[async_trait]
pub trait RecordStore: Send + Sync + 'static {
  /// Stable backend name used in health reports and metrics labels.
  fn backend_name(&self) -> &'static str;

  /// Insert or replace a record, returning what was stored.
  ///
  /// On replace, the original `created_at` is kept and `updated_at`
  /// is bumped.
  async fn put(&self, record: StorageRecord) -> Result<StorageRecord, StoreError>;

  /// Fetch one record by id.
  async fn get(
    &self,
    tenant_id: &str,
    kind: RecordKind,
    id: &str,
  ) -> Result<Option<StorageRecord>, StoreError>;

  /// All records of one kind for a tenant, oldest first.
  async fn list(
    &self,
    tenant_id: &str,
    kind: RecordKind,
  ) -> Result<Vec<StorageRecord>, StoreError>;

  /// Delete one record. Returns whether it existed.
  async fn delete(
    &self,
    tenant_id: &str,
    kind: RecordKind,
    id: &str,
  ) -> Result<bool, StoreError>;

  /// Report backend health together with operation metrics.
  async fn health_check(&self) -> HealthCheckResult;
}
