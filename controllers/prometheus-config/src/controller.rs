//! Main controller implementation.
//!
//! Wires the Kubernetes client, the reconciler, both resource watchers and
//! the health/metrics endpoint together, and runs until one of them exits.

use crate::api::{self, AppState};
use crate::config::ControllerConfig;
use crate::connections::PrometheusConnections;
use crate::error::ControllerError;
use crate::metrics::Metrics;
use crate::reconciler::Reconciler;
use crate::watcher::Watcher;
use crds::{PrometheusExporter, PrometheusServer};
use k8s_openapi::api::core::v1::Service;
use kube::{Api, Client};
use kube_runtime::reflector::Store;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Main controller for Prometheus configuration resources.
pub struct Controller {
    server_watcher: JoinHandle<Result<(), ControllerError>>,
    exporter_watcher: JoinHandle<Result<(), ControllerError>>,
    housekeeping: JoinHandle<Result<(), ControllerError>>,
    http_server: JoinHandle<Result<(), ControllerError>>,
}

impl Controller {
    /// Creates the controller and starts its background tasks.
    pub async fn new(config: ControllerConfig) -> Result<Self, ControllerError> {
        info!("Initializing Prometheus configuration controller");

        let kube_client = Client::try_default().await?;

        let local_cluster_id = match &config.cluster_id {
            Some(id) => id.clone(),
            None => discover_cluster_id(&kube_client).await?,
        };
        info!("Local cluster id: {}", local_cluster_id);

        let (server_api, exporter_api): (Api<PrometheusServer>, Api<PrometheusExporter>) =
            match config.watch_namespace.as_deref() {
                Some(ns) => (
                    Api::namespaced(kube_client.clone(), ns),
                    Api::namespaced(kube_client.clone(), ns),
                ),
                None => (Api::all(kube_client.clone()), Api::all(kube_client.clone())),
            };

        let metrics = Arc::new(Metrics::new()?);
        let reconciler = Arc::new(Reconciler::new(
            kube_client,
            Box::new(PrometheusConnections::new(config.credentials.clone(), config.timeout)),
            local_cluster_id,
            config.resync_interval,
            metrics.clone(),
        ));

        let watcher = Arc::new(Watcher::new(reconciler.clone(), server_api, exporter_api));
        let server_controller = watcher.prometheus_server_controller();
        let server_store = server_controller.store();
        let exporter_controller = watcher.prometheus_exporter_controller();
        let exporter_store = exporter_controller.store();

        let server_watcher = {
            let watcher = watcher.clone();
            tokio::spawn(async move { watcher.watch_prometheus_servers(server_controller).await })
        };
        let exporter_watcher = {
            let watcher = watcher.clone();
            tokio::spawn(async move { watcher.watch_prometheus_exporters(exporter_controller).await })
        };

        let readiness = Arc::new(AtomicBool::new(false));
        let housekeeping = tokio::spawn(housekeeping(
            reconciler,
            server_store.clone(),
            exporter_store,
            readiness.clone(),
            config.resync_interval,
        ));
        let http_server = tokio::spawn(api::serve(
            config.metrics_addr,
            AppState {
                metrics,
                readiness,
                servers: Some(server_store),
            },
        ));

        Ok(Self {
            server_watcher,
            exporter_watcher,
            housekeeping,
            http_server,
        })
    }

    /// Runs until any watcher or the HTTP server exits.
    pub async fn run(mut self) -> Result<(), ControllerError> {
        info!("Prometheus configuration controller running");

        tokio::select! {
            result = &mut self.server_watcher => {
                result.map_err(|e| ControllerError::Watch(format!("PrometheusServer watcher panicked: {}", e)))?
                    .map_err(|e| ControllerError::Watch(format!("PrometheusServer watcher error: {}", e)))?;
            }
            result = &mut self.exporter_watcher => {
                result.map_err(|e| ControllerError::Watch(format!("PrometheusExporter watcher panicked: {}", e)))?
                    .map_err(|e| ControllerError::Watch(format!("PrometheusExporter watcher error: {}", e)))?;
            }
            result = &mut self.housekeeping => {
                result.map_err(|e| ControllerError::Watch(format!("Housekeeping task panicked: {}", e)))??;
            }
            result = &mut self.http_server => {
                result.map_err(|e| ControllerError::Server(format!("HTTP server panicked: {}", e)))??;
            }
        }

        Ok(())
    }
}

/// Marks the controller ready once both caches hold a full listing, then
/// prunes reconciler state of deleted objects every `interval`.
async fn housekeeping(
    reconciler: Arc<Reconciler>,
    servers: Store<PrometheusServer>,
    exporters: Store<PrometheusExporter>,
    readiness: Arc<AtomicBool>,
    interval: Duration,
) -> Result<(), ControllerError> {
    servers
        .wait_until_ready()
        .await
        .map_err(|e| ControllerError::Watch(format!("PrometheusServer cache: {}", e)))?;
    exporters
        .wait_until_ready()
        .await
        .map_err(|e| ControllerError::Watch(format!("PrometheusExporter cache: {}", e)))?;
    readiness.store(true, Ordering::Release);
    info!(
        "Caches synced ({} servers, {} exporters), controller ready",
        servers.state().len(),
        exporters.state().len()
    );

    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        debug!("Pruning reconciler state");
        reconciler.prune(&servers.state(), &exporters.state());
    }
}

/// The UID of the `default/kubernetes` Service identifies the cluster.
async fn discover_cluster_id(client: &Client) -> Result<String, ControllerError> {
    let services: Api<Service> = Api::namespaced(client.clone(), "default");
    let kubernetes = services.get("kubernetes").await?;
    kubernetes.metadata.uid.ok_or_else(|| {
        ControllerError::InvalidConfig(
            "default/kubernetes Service has no uid; set CLUSTER_ID explicitly".to_string(),
        )
    })
}
