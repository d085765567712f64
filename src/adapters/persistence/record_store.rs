//! JSON Record Store - Atomic Snapshot Files per Tenant and Kind
//!
//! Records live in `records/<tenant-hex>/<kind>.json`. Each file is a
//! JSON array rewritten atomically (write to tmp file, then rename), so a
//! crash leaves either the old or the new version, never a partial one.
//! Tenant ids are hex-encoded into directory names and never form paths.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::adapters::metrics::MetricsRegistry;
use crate::domain::storage::{
    HealthCheckResult, HealthStatus, StorageMetrics, build_health_check_result, new_record_id,
    sanitize_payload, validate_tenant_id,
};
use crate::domain::{RecordKind, StorageRecord};
use crate::error::StoreError;
use crate::ports::RecordStore;

/// Tenant ids longer than this many bytes are hashed into their directory name.
const TENANT_DIR_PREFIX_BYTES: usize = 32;

/// File-backed generic record store.
pub struct JsonRecordStore {
    /// Base directory for tenant subdirectories.
    records_dir: PathBuf,
    /// Serializes read-modify-write cycles.
    write_lock: Mutex<()>,
    /// Rolling operation metrics.
    metrics: Mutex<StorageMetrics>,
    /// Optional Prometheus export.
    prometheus: Option<Arc<MetricsRegistry>>,
}

impl JsonRecordStore {
    pub const BACKEND: &'static str = "jsonfile";

    /// Create a store in the given data directory.
    ///
    /// Creates `<data_dir>/records` if it doesn't exist.
    pub async fn new(data_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let records_dir = data_dir.as_ref().join("records");
        fs::create_dir_all(&records_dir)
            .await
            .map_err(|source| StoreError::Io {
                path: records_dir.clone(),
                source,
            })?;

        info!(path = %records_dir.display(), "Record store ready");
        Ok(Self {
            records_dir,
            write_lock: Mutex::new(()),
            metrics: Mutex::new(StorageMetrics::new()),
            prometheus: None,
        })
    }

    /// Also export operation metrics to Prometheus.
    #[must_use]
    pub fn with_metrics(mut self, registry: Arc<MetricsRegistry>) -> Self {
        self.prometheus = Some(registry);
        self
    }

    /// Copy of the current operation metrics.
    pub async fn metrics(&self) -> StorageMetrics {
        *self.metrics.lock().await
    }

    fn kind_path(&self, tenant_id: &str, kind: RecordKind) -> PathBuf {
        self.records_dir
            .join(tenant_dir_name(tenant_id))
            .join(format!("{}.json", kind.as_str()))
    }

    async fn read_records(path: &Path) -> Result<Vec<StorageRecord>, StoreError> {
        match fs::read_to_string(path).await {
            Ok(json) => Ok(serde_json::from_str(&json)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(source) => Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Write all records atomically (tmp → rename).
    async fn write_records(path: &Path, records: &[StorageRecord]) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).await.map_err(io_err)?;
        }

        let json = serde_json::to_string_pretty(records)?;
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, json).await.map_err(io_err)?;
        fs::rename(&tmp_path, path).await.map_err(io_err)?;
        Ok(())
    }

    async fn observe(&self, operation: &'static str, started: Instant, success: bool) {
        let elapsed = started.elapsed();
        self.metrics.lock().await.record_outcome(elapsed, success);
        if let Some(registry) = &self.prometheus {
            registry.record_storage_op(Self::BACKEND, operation, elapsed, success);
        }
    }

    async fn put_inner(&self, mut record: StorageRecord) -> Result<StorageRecord, StoreError> {
        validate_tenant_id(&record.tenant_id)?;
        if record.id.trim().is_empty() {
            record.id = new_record_id();
        }
        record.payload = sanitize_payload(&record.payload);
        record.metadata = sanitize_payload(&record.metadata);

        let path = self.kind_path(&record.tenant_id, record.kind);
        let _guard = self.write_lock.lock().await;
        let mut records = Self::read_records(&path).await?;

        if let Some(existing) = records.iter_mut().find(|r| r.id == record.id) {
            record.created_at = existing.created_at;
            record.updated_at = Utc::now();
            *existing = record.clone();
            debug!(id = %record.id, "Record replaced");
        } else {
            records.push(record.clone());
            debug!(id = %record.id, "Record inserted");
        }

        Self::write_records(&path, &records).await?;
        Ok(record)
    }

    async fn get_inner(
        &self,
        tenant_id: &str,
        kind: RecordKind,
        id: &str,
    ) -> Result<Option<StorageRecord>, StoreError> {
        validate_tenant_id(tenant_id)?;
        let records = Self::read_records(&self.kind_path(tenant_id, kind)).await?;
        Ok(records.into_iter().find(|r| r.id == id))
    }

    async fn list_inner(
        &self,
        tenant_id: &str,
        kind: RecordKind,
    ) -> Result<Vec<StorageRecord>, StoreError> {
        validate_tenant_id(tenant_id)?;
        let mut records = Self::read_records(&self.kind_path(tenant_id, kind)).await?;
        records.sort_by_key(|r| r.created_at);
        Ok(records)
    }

    async fn delete_inner(
        &self,
        tenant_id: &str,
        kind: RecordKind,
        id: &str,
    ) -> Result<bool, StoreError> {
        validate_tenant_id(tenant_id)?;
        let path = self.kind_path(tenant_id, kind);
        let _guard = self.write_lock.lock().await;
        let mut records = Self::read_records(&path).await?;

        let before = records.len();
        records.retain(|r| r.id != id);
        if records.len() == before {
            return Ok(false);
        }
        Self::write_records(&path, &records).await?;
        Ok(true)
    }

    /// Check that the records directory is writable.
    async fn probe_writable(&self) -> Result<(), std::io::Error> {
        let probe = self.records_dir.join(".health_check");
        let result = fs::write(&probe, b"ok").await;
        let _ = fs::remove_file(&probe).await;
        result
    }
}

/// Directory name for a tenant: hex of the id, or for long ids the hex
/// of its first bytes plus a SHA-256 of the whole id. Never longer than
/// `2 * TENANT_DIR_PREFIX_BYTES + 65` bytes.
fn tenant_dir_name(tenant_id: &str) -> String {
    let bytes = tenant_id.as_bytes();
    if bytes.len() <= TENANT_DIR_PREFIX_BYTES {
        return hex(bytes);
    }

    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!(
        "{}-{:x}",
        hex(&bytes[..TENANT_DIR_PREFIX_BYTES]),
        hasher.finalize()
    )
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[async_trait]
impl RecordStore for JsonRecordStore {
    fn backend_name(&self) -> &'static str {
        Self::BACKEND
    }

    #[instrument(skip(self, record), fields(kind = %record.kind))]
    async fn put(&self, record: StorageRecord) -> Result<StorageRecord, StoreError> {
        let started = Instant::now();
        let result = self.put_inner(record).await;
        self.observe("put", started, result.is_ok()).await;
        result
    }

    async fn get(
        &self,
        tenant_id: &str,
        kind: RecordKind,
        id: &str,
    ) -> Result<Option<StorageRecord>, StoreError> {
        let started = Instant::now();
        let result = self.get_inner(tenant_id, kind, id).await;
        self.observe("get", started, result.is_ok()).await;
        result
    }

    async fn list(
        &self,
        tenant_id: &str,
        kind: RecordKind,
    ) -> Result<Vec<StorageRecord>, StoreError> {
        let started = Instant::now();
        let result = self.list_inner(tenant_id, kind).await;
        self.observe("list", started, result.is_ok()).await;
        result
    }

    #[instrument(skip(self, tenant_id))]
    async fn delete(
        &self,
        tenant_id: &str,
        kind: RecordKind,
        id: &str,
    ) -> Result<bool, StoreError> {
        let started = Instant::now();
        let result = self.delete_inner(tenant_id, kind, id).await;
        self.observe("delete", started, result.is_ok()).await;
        result
    }

    async fn health_check(&self) -> HealthCheckResult {
        let metrics = self.metrics().await;
        match self.probe_writable().await {
            Ok(()) => build_health_check_result(
                Self::BACKEND,
                HealthStatus::Healthy,
                None,
                Some(&metrics),
            ),
            Err(e) => {
                warn!(error = %e, "Record store is not writable");
                build_health_check_result(
                    Self::BACKEND,
                    HealthStatus::Unhealthy,
                    Some(format!("records directory not writable: {e}")),
                    Some(&metrics),
                )
            }
        }
    }
}
