//! Storage Primitives - Shared Rules for Every Persistence Backend
//!
//! Record id generation, tenant id validation, payload sanitization,
//! rolling operation metrics and the standard health-check report. Pure
//! functions apart from the `warn!` emitted for each dropped payload key.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;
use uuid::Uuid;

use crate::error::ValidationError;

/// Minimum tenant id length, in characters.
pub const MIN_TENANT_ID_LEN: usize = 8;

/// Keys that collide with object-construction machinery in dynamic runtimes.
pub const RESERVED_KEYS: &[&str] = &[
    "__proto__",
    "constructor",
    "prototype",
    "__class__",
    "__dict__",
    "__globals__",
    "__builtins__",
];

/// Any key with this prefix is reserved for the storage layer.
pub const RESERVED_PREFIX: &str = "__";

/// Fresh globally-unique record id.
pub fn new_record_id() -> String {
    Uuid::new_v4().to_string()
}

/// Validate a tenant id.
pub fn validate_tenant_id(tenant_id: &str) -> Result<(), ValidationError> {
    let len = tenant_id.chars().count();
    if len == 0 {
        return Err(ValidationError::new("tenant_id", "must not be empty"));
    }
    if len < MIN_TENANT_ID_LEN {
        return Err(ValidationError::new(
            "tenant_id",
            format!("must be at least {MIN_TENANT_ID_LEN} characters, got {len}"),
        ));
    }
    Ok(())
}

/// Validate a tenant id taken from an untyped request payload.
pub fn validate_tenant_value(value: Option<&Value>) -> Result<&str, ValidationError> {
    match value {
        None | Some(Value::Null) => Err(ValidationError::new("tenant_id", "is required")),
        Some(Value::String(id)) => validate_tenant_id(id).map(|()| id.as_str()),
        Some(other) => Err(ValidationError::new(
            "tenant_id",
            format!("must be a string, got {}", json_type(other)),
        )),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

pub fn is_reserved_key(key: &str) -> bool {
    RESERVED_KEYS.contains(&key) || key.starts_with(RESERVED_PREFIX)
}

/// Shallow copy of `payload` with reserved keys removed.
///
/// Non-object values are returned unchanged. Never fails.
pub fn sanitize_payload(payload: &Value) -> Value {
    let Value::Object(map) = payload else {
        return payload.clone();
    };

    let mut clean = Map::with_capacity(map.len());
    for (key, value) in map {
        if is_reserved_key(key) {
            warn!(key = %key, "Dropping reserved key from payload");
            continue;
        }
        clean.insert(key.clone(), value.clone());
    }
    Value::Object(clean)
}

/// Rolling per-backend operation counters.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StorageMetrics {
    operations: u64,
    errors: u64,
    avg_duration_ms: f64,
}

impl StorageMetrics {
    pub const fn new() -> Self {
        Self {
            operations: 0,
            errors: 0,
            avg_duration_ms: 0.0,
        }
    }

    /// Record one operation outcome.
    ///
    /// Updates the running mean with `new = (old * (n - 1) + d) / n`.
    #[allow(clippy::cast_precision_loss)]
    pub fn record_outcome(&mut self, duration: Duration, success: bool) {
        self.operations += 1;
        if !success {
            self.errors += 1;
        }
        let d = duration.as_secs_f64() * 1000.0;
        if self.operations == 1 {
            self.avg_duration_ms = d;
        } else {
            let n = self.operations as f64;
            self.avg_duration_ms = self.avg_duration_ms.mul_add(n - 1.0, d) / n;
        }
    }

    pub const fn operations(&self) -> u64 {
        self.operations
    }

    pub const fn errors(&self) -> u64 {
        self.errors
    }

    pub const fn avg_duration_ms(&self) -> f64 {
        self.avg_duration_ms
    }

    /// `(operations - errors) / max(operations, 1)`
    #[allow(clippy::cast_precision_loss)]
    pub fn success_rate(&self) -> f64 {
        (self.operations - self.errors) as f64 / self.operations.max(1) as f64
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            operations: self.operations,
            errors: self.errors,
            success_rate: self.success_rate(),
            avg_duration_ms: self.avg_duration_ms,
        }
    }
}

/// Serialized form of [`StorageMetrics`] inside a health report.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub operations: u64,
    pub errors: u64,
    pub success_rate: f64,
    pub avg_duration_ms: f64,
}

/// Health status label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    pub const fn is_healthy(self) -> bool {
        matches!(self, Self::Healthy)
    }
}

/// Fixed-shape health report shared by all backends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub backend: String,
    pub status: HealthStatus,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<MetricsSnapshot>,
}

pub fn build_health_check_result(
    backend: impl Into<String>,
    status: HealthStatus,
    details: Option<String>,
    metrics: Option<&StorageMetrics>,
) -> HealthCheckResult {
    HealthCheckResult {
        backend: backend.into(),
        status,
        timestamp: Utc::now(),
        details,
        metrics: metrics.map(StorageMetrics::snapshot),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_record_ids_are_unique_uuids() {
        let a = new_record_id();
        let b = new_record_id();
        assert_ne!(a, b);
        assert!(Uuid::parse_str(&a).is_ok());
    }

    #[test]
    fn test_tenant_id_length_boundary() {
        assert!(validate_tenant_id("abcdefg").is_err());
        assert!(validate_tenant_id("abcdefgh").is_ok());
        assert!(validate_tenant_id("").is_err());
        // Characters, not bytes.
        assert!(validate_tenant_id("ééééééé").is_err());
    }

    #[test]
    fn test_tenant_value_type_checked() {
        assert!(validate_tenant_value(None).is_err());
        assert!(validate_tenant_value(Some(&Value::Null)).is_err());
        let err = validate_tenant_value(Some(&json!(12_345_678))).unwrap_err();
        assert!(err.reason.contains("number"));
        assert_eq!(
            validate_tenant_value(Some(&json!("tenant-0001"))).unwrap(),
            "tenant-0001"
        );
    }

    #[test]
    fn test_sanitize_drops_reserved_and_prefixed_keys() {
        let payload = json!({
            "__proto__": 1,
            "constructor": "x",
            "__secret": true,
            "x": 2,
            "nested": {"__proto__": 3}
        });
        let clean = sanitize_payload(&payload);
        // Shallow: nested objects are copied as-is.
        assert_eq!(clean, json!({"x": 2, "nested": {"__proto__": 3}}));
    }

    #[test]
    fn test_sanitize_passes_non_objects_through() {
        for value in [json!([1, 2]), json!("s"), json!(null), json!(4.5)] {
            assert_eq!(sanitize_payload(&value), value);
        }
    }

    #[test]
    fn test_metrics_running_mean() {
        let mut m = StorageMetrics::new();
        m.record_outcome(Duration::from_millis(10), true);
        assert!((m.avg_duration_ms() - 10.0).abs() < 1e-9);
        m.record_outcome(Duration::from_millis(20), false);
        m.record_outcome(Duration::from_millis(30), true);
        assert_eq!(m.operations(), 3);
        assert_eq!(m.errors(), 1);
        assert!((m.avg_duration_ms() - 20.0).abs() < 1e-9);
        assert!((m.success_rate() - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_success_rate_without_operations() {
        assert!((StorageMetrics::new().success_rate() - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_health_check_without_metrics_has_three_keys() {
        let report = build_health_check_result("backendX", HealthStatus::Healthy, None, None);
        let value = serde_json::to_value(&report).unwrap();
        let keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys.len(), 3);
        for key in ["backend", "status", "timestamp"] {
            assert!(keys.contains(&key), "missing {key}");
        }
        assert_eq!(value["status"], "healthy");
    }

    #[test]
    fn test_health_check_with_metrics() {
        let mut m = StorageMetrics::new();
        m.record_outcome(Duration::from_millis(4), false);
        let report = build_health_check_result(
            "jsonfile",
            HealthStatus::Degraded,
            Some("slow disk".into()),
            Some(&m),
        );
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["details"], "slow disk");
        assert_eq!(value["metrics"]["operations"], 1);
        assert_eq!(value["metrics"]["errors"], 1);
        assert_eq!(value["metrics"]["success_rate"], 0.0);
    }
}
