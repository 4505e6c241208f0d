//! Health and metrics HTTP endpoint
//!
//! - `/healthz`: liveness, always OK while the process serves requests
//! - `/readyz`: readiness, OK once the resource watchers are running
//! - `/metrics`: controller metrics in Prometheus text format

mod health;
mod metrics;

use crate::error::ControllerError;
use crate::metrics::Metrics;
use axum::{routing::get, Router};
use crds::PrometheusServer;
use kube_runtime::reflector::Store;
use std::net::SocketAddr;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared state of the HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub metrics: Arc<Metrics>,
    pub readiness: Arc<AtomicBool>,
    /// Servers seen by the server watcher, for the per-state gauge
    pub servers: Option<Store<PrometheusServer>>,
}

/// Create the router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health::liveness))
        .route("/readyz", get(health::readiness))
        .route("/metrics", get(metrics::get_metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves the health/metrics endpoint until the listener fails.
pub async fn serve(addr: SocketAddr, state: AppState) -> Result<(), ControllerError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ControllerError::Server(format!("failed to bind {}: {}", addr, e)))?;
    info!("Serving health checks and metrics on {}", addr);

    axum::serve(listener, create_router(state))
        .await
        .map_err(|e| ControllerError::Server(e.to_string()))
}
