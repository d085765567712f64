//! MCP Framework Bridge - Entry Point
//!
//! Initializes configuration, logging, the record store and the
//! framework proxy, then serves health and metrics until SIGINT.
//!
//! Wiring sequence:
//! 1. Load config (path from BRIDGE_CONFIG, default config.toml) + validate
//! 2. Init tracing (JSON structured logging)
//! 3. Create Prometheus registry
//! 4. Open JsonRecordStore under `[storage].data_dir`
//! 5. Construct the framework proxy (isolation check) and optionally preload
//! 6. Spawn health server (/live, /ready, /health) and metrics server
//! 7. Wait for SIGINT, then graceful shutdown

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use mcp_framework_bridge::adapters::metrics::{HealthServer, HealthState, MetricsRegistry};
use mcp_framework_bridge::adapters::persistence::JsonRecordStore;
use mcp_framework_bridge::config::{self, AppConfig};
use mcp_framework_bridge::ports::RecordStore;
use mcp_framework_bridge::usecases::{FrameworkModule, ProxyCell};

/// Environment variable naming the config file.
const CONFIG_PATH_ENV: &str = "BRIDGE_CONFIG";

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Load configuration ───────────────────────────────
    let config_path =
        std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| "config.toml".to_string());
    let config = config::loader::load_config(&config_path)
        .with_context(|| format!("Failed to load configuration from {config_path}"))?;

    // ── 2. Initialize structured JSON logging ───────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.service.log_level)),
        )
        .json()
        .init();

    info!(
        name = %config.service.name,
        version = env!("CARGO_PKG_VERSION"),
        data_dir = %config.storage.data_dir,
        "Starting MCP framework bridge"
    );

    // ── 3. Shutdown channel + shared state ──────────────────
    let (shutdown_tx, _shutdown_rx) = broadcast::channel::<()>(1);
    let health_state = Arc::new(HealthState::new());

    let metrics = Arc::new(MetricsRegistry::new().context("Failed to create metrics registry")?);

    // ── 4. Record store ─────────────────────────────────────
    let store = JsonRecordStore::new(&config.storage.data_dir)
        .await
        .context("Failed to open record store")?
        .with_metrics(Arc::clone(&metrics));
    let store: Arc<dyn RecordStore> = Arc::new(store);

    // ── 5. Framework proxy ──────────────────────────────────
    let proxy_cell = ProxyCell::from_config(config.framework.clone());
    connect_framework(&config, &proxy_cell, &health_state, &metrics);

    // ── 6. Spawn health + metrics servers ───────────────────
    let health_server = HealthServer::new(
        Arc::clone(&health_state),
        Arc::clone(&store),
        config.metrics.health_port,
    );
    let health_handle = tokio::spawn(health_server.run(shutdown_tx.subscribe()));

    let metrics_handle = if config.metrics.enabled {
        let server = Arc::clone(&metrics);
        let bind = config.metrics.bind_address.clone();
        let rx = shutdown_tx.subscribe();
        Some(tokio::spawn(async move {
            if let Err(e) = server.serve(bind, rx).await {
                error!(error = %e, "Metrics server failed");
            }
        }))
    } else {
        None
    };

    info!("All tasks spawned, bridge is running");

    // ── 7. Wait for SIGINT ──────────────────────────────────
    if let Err(e) = signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for SIGINT, shutting down");
    } else {
        info!("SIGINT received, initiating graceful shutdown");
    }

    // Readiness probe flips to 503 before servers stop.
    health_state.shutting_down.store(true, Ordering::Relaxed);
    let _ = shutdown_tx.send(());

    match tokio::time::timeout(Duration::from_secs(5), health_handle).await {
        Ok(Ok(Err(e))) => warn!(error = %e, "Health server exited with error"),
        Ok(Err(e)) => warn!(error = %e, "Health server task panicked"),
        Err(_) => warn!("Health server did not stop within 5s"),
        Ok(Ok(Ok(()))) => {}
    }
    if let Some(handle) = metrics_handle {
        let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
    }

    let report = store.health_check().await;
    info!(
        operations = report.metrics.as_ref().map_or(0, |m| m.operations),
        status = ?report.status,
        "Shutdown complete"
    );
    Ok(())
}

/// Construct the framework proxy and, when configured, preload the
/// well-known modules. Failures are logged; the service keeps serving
/// storage with readiness reporting the framework as unavailable.
fn connect_framework(
    config: &AppConfig,
    cell: &ProxyCell,
    health: &HealthState,
    metrics: &MetricsRegistry,
) {
    let proxy = match cell.get() {
        Ok(proxy) => proxy,
        Err(e) => {
            metrics.record_module_load_failure(&e);
            error!(error = %e, kind = e.kind(), "Framework proxy unavailable");
            return;
        }
    };

    if config.framework.preload {
        for group in FrameworkModule::ALL {
            if let Err(e) = proxy.load_group(group) {
                metrics.record_module_load_failure(&e);
                warn!(module = group.logical_name(), error = %e, "Preload failed");
            }
        }
    }

    let loaded = proxy.loaded_modules();
    metrics.set_modules_loaded(loaded.len());
    health.framework_ready.store(true, Ordering::Relaxed);
    info!(
        root = %proxy.root().display(),
        loaded = loaded.len(),
        "Framework proxy ready"
    );
}
