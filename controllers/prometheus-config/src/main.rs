//! Prometheus Configuration Controller
//!
//! Reconciles the custom resources that tell Prometurbo where to
//! find metrics:
//! - PrometheusServer: checks the server is reachable with the configured
//!   credentials and reports which entity types each cluster will yield
//! - PrometheusExporter: validates entity, metric and attribute definitions

mod api;
mod backoff;
mod checks;
mod config;
mod connections;
mod controller;
mod error;
mod metrics;
mod reconciler;
mod status;
mod watcher;
#[cfg(test)]
mod test_utils;

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use controller::Controller;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    // kube's rustls-tls needs a process-wide crypto provider
    let _ = rustls::crypto::ring::default_provider().install_default();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting Prometheus Configuration Controller");

    let config = ControllerConfig::from_env()?;

    info!("Configuration:");
    info!("  Namespace: {}", config.watch_namespace.as_deref().unwrap_or("all namespaces"));
    info!("  Cluster id: {}", config.cluster_id.as_deref().unwrap_or("<discovered>"));
    info!("  Credentials: {:?}", config.credentials);
    info!("  Request timeout: {}s", config.timeout.as_secs());
    info!("  Resync interval: {}s", config.resync_interval.as_secs());
    info!("  Metrics address: {}", config.metrics_addr);

    let controller = Controller::new(config).await?;
    controller.run().await?;

    Ok(())
}
