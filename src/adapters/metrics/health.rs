//! Health Check Server - Liveness, Readiness and Backend Health
//!
//! Exposes /live, /ready and /health endpoints via axum 0.7 for
//! container health checks and monitoring. Readiness depends on the
//! framework proxy being constructed and the service not shutting down;
//! /health returns the storage backend's `HealthCheckResult` as JSON.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use tokio::sync::broadcast;
use tracing::{info, instrument};

use crate::ports::RecordStore;

/// Shared health state polled by readiness probes.
#[derive(Debug)]
pub struct HealthState {
    /// Whether the framework proxy is constructed and usable.
    pub framework_ready: AtomicBool,
    /// Set once graceful shutdown has begun.
    pub shutting_down: AtomicBool,
}

impl HealthState {
    /// Create a new health state (framework not ready yet).
    pub const fn new() -> Self {
        Self {
            framework_ready: AtomicBool::new(false),
            shutting_down: AtomicBool::new(false),
        }
    }

    /// Check if the service is ready to serve traffic.
    pub fn is_ready(&self) -> bool {
        self.framework_ready.load(Ordering::Relaxed) && !self.shutting_down.load(Ordering::Relaxed)
    }
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
struct AppState {
    health: Arc<HealthState>,
    store: Arc<dyn RecordStore>,
}

/// Axum-based health check HTTP server.
pub struct HealthServer {
    /// Health state shared with all components.
    state: Arc<HealthState>,
    /// Storage backend reported on /health.
    store: Arc<dyn RecordStore>,
    /// Bind port (default 8080 from config).
    port: u16,
}

impl HealthServer {
    /// Create a new health server.
    pub fn new(state: Arc<HealthState>, store: Arc<dyn RecordStore>, port: u16) -> Self {
        Self { state, store, port }
    }

    /// Build the router without binding a socket.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/live", get(Self::liveness))
            .route("/ready", get(Self::readiness))
            .route("/health", get(Self::backend_health))
            .with_state(AppState {
                health: Arc::clone(&self.state),
                store: Arc::clone(&self.store),
            })
    }

    /// Start the health check server in the background.
    #[instrument(skip(self, shutdown_rx))]
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) -> anyhow::Result<()> {
        let app = self.router();

        let addr = format!("0.0.0.0:{}", self.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;

        info!(address = %addr, "Health server started");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await?;

        Ok(())
    }

    /// Liveness probe: always returns 200 if the process is running.
    async fn liveness() -> impl IntoResponse {
        (StatusCode::OK, "OK")
    }

    /// Readiness probe: 200 only when the framework is reachable.
    async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
        if state.health.is_ready() {
            (StatusCode::OK, "READY")
        } else {
            (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
        }
    }

    /// Storage backend health report.
    async fn backend_health(State(state): State<AppState>) -> impl IntoResponse {
        let report = state.store.health_check().await;
        let code = if report.status.is_healthy() {
            StatusCode::OK
        } else {
            StatusCode::SERVICE_UNAVAILABLE
        };
        (code, Json(report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_readiness_requires_framework_and_no_shutdown() {
        let state = HealthState::new();
        assert!(!state.is_ready());
        state.framework_ready.store(true, Ordering::Relaxed);
        assert!(state.is_ready());
        state.shutting_down.store(true, Ordering::Relaxed);
        assert!(!state.is_ready());
    }
}
