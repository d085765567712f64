//! Prometheus Metrics Registry - Storage and Framework Observability
//!
//! Registers and exposes Prometheus metrics for storage operations and
//! framework module loading.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use tokio::sync::broadcast;
use tracing::{info, instrument, warn};

use crate::error::ProxyError;

/// Centralized Prometheus metrics for the bridge.
///
/// All metrics follow the naming convention `mcp_bridge_*`.
pub struct MetricsRegistry {
    /// Prometheus registry.
    registry: Registry,
    /// Storage operations by backend, operation and outcome.
    pub storage_operations: IntCounterVec,
    /// Storage operation latency in milliseconds.
    pub storage_latency_ms: HistogramVec,
    /// Framework modules currently registered.
    pub modules_loaded: IntGauge,
    /// Framework load failures by error kind.
    pub module_load_failures: IntCounterVec,
}

impl MetricsRegistry {
    /// Create and register all Prometheus metrics.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let storage_operations = IntCounterVec::new(
            Opts::new(
                "mcp_bridge_storage_operations_total",
                "Storage operations by backend, operation and outcome",
            ),
            &["backend", "operation", "outcome"],
        )?;

        let storage_latency_ms = HistogramVec::new(
            HistogramOpts::new(
                "mcp_bridge_storage_latency_ms",
                "Storage operation latency in milliseconds",
            )
            .buckets(vec![0.1, 0.5, 1.0, 5.0, 10.0, 50.0, 100.0, 500.0]),
            &["backend", "operation"],
        )?;

        let modules_loaded = IntGauge::new(
            "mcp_bridge_framework_modules_loaded",
            "Framework modules currently registered",
        )?;

        let module_load_failures = IntCounterVec::new(
            Opts::new(
                "mcp_bridge_framework_load_failures_total",
                "Framework module load failures by kind",
            ),
            &["kind"],
        )?;

        // Register all metrics
        registry.register(Box::new(storage_operations.clone()))?;
        registry.register(Box::new(storage_latency_ms.clone()))?;
        registry.register(Box::new(modules_loaded.clone()))?;
        registry.register(Box::new(module_load_failures.clone()))?;

        Ok(Self {
            registry,
            storage_operations,
            storage_latency_ms,
            modules_loaded,
            module_load_failures,
        })
    }

    pub fn record_storage_op(
        &self,
        backend: &str,
        operation: &str,
        elapsed: Duration,
        success: bool,
    ) {
        let outcome = if success { "ok" } else { "error" };
        self.storage_operations
            .with_label_values(&[backend, operation, outcome])
            .inc();
        self.storage_latency_ms
            .with_label_values(&[backend, operation])
            .observe(elapsed.as_secs_f64() * 1000.0);
    }

    pub fn record_module_load_failure(&self, error: &ProxyError) {
        self.module_load_failures
            .with_label_values(&[error.kind()])
            .inc();
    }

    pub fn set_modules_loaded(&self, count: usize) {
        self.modules_loaded
            .set(i64::try_from(count).unwrap_or(i64::MAX));
    }

    /// Encode all metrics in the Prometheus text format.
    pub fn render(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    /// Serve Prometheus metrics on the configured bind address.
    #[instrument(skip(self, shutdown_rx))]
    pub async fn serve(
        self: Arc<Self>,
        bind_address: String,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> anyhow::Result<()> {
        let metrics_self = Arc::clone(&self);

        let app = Router::new().route(
            "/metrics",
            get(move || {
                let metrics = Arc::clone(&metrics_self);
                async move {
                    metrics.render().map_err(|e| {
                        warn!(error = %e, "Failed to encode metrics");
                        StatusCode::INTERNAL_SERVER_ERROR
                    })
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind(&bind_address).await?;
        info!(address = %bind_address, "Prometheus metrics server started");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_contains_recorded_series() {
        let metrics = MetricsRegistry::new().unwrap();
        metrics.record_storage_op("jsonfile", "put", Duration::from_millis(2), true);
        metrics.record_module_load_failure(&ProxyError::Configuration("x".into()));
        metrics.set_modules_loaded(3);

        let text = metrics.render().unwrap();
        assert!(text.contains("mcp_bridge_storage_operations_total"));
        assert!(text.contains("outcome=\"ok\""));
        assert!(text.contains("kind=\"configuration\""));
        assert!(text.contains("mcp_bridge_framework_modules_loaded 3"));
    }
}
