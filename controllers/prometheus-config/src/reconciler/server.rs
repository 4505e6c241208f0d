//! PrometheusServer reconciliation

use super::{backoff_key, resource_ref, Reconciler};
use crate::connections::Connector;
use crate::error::ControllerError;
use crate::status::{
    desired_cluster_statuses, desired_server_status, server_status_patch, status_needs_update, ServerHealth,
};
use crds::{validate_server_spec, PrometheusServer, PrometheusServerSpec};
use kube::api::{ListParams, Patch, PatchParams};
use kube_runtime::controller::Action;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub(super) const KIND: &str = "PrometheusServer";

impl Reconciler {
    pub async fn reconcile_prometheus_server(&self, server: &PrometheusServer) -> Result<Action, ControllerError> {
        self.reconcile_prometheus_server_at(server, Instant::now()).await
    }

    pub(crate) async fn reconcile_prometheus_server_at(
        &self,
        server: &PrometheusServer,
        now: Instant,
    ) -> Result<Action, ControllerError> {
        let (namespace, name) = resource_ref(server, KIND)?;
        info!("Reconciling PrometheusServer {}/{}", namespace, name);

        let (health, requeue) = self.server_health(server, &namespace, &name, now).await;

        // An unusable spec gets no cluster breakdown
        let clusters = if matches!(health, ServerHealth::InvalidSpec(_)) {
            Vec::new()
        } else {
            let exporters = self.exporter_api(&namespace).list(&ListParams::default()).await?.items;
            desired_cluster_statuses(&server.spec, &self.local_cluster_id, &exporters, server.status.as_ref())
        };

        let desired = desired_server_status(&health, clusters);
        if status_needs_update(server.status.as_ref(), &desired) {
            self.server_api(&namespace)
                .patch_status(&name, &PatchParams::default(), &Patch::Merge(&server_status_patch(&desired)))
                .await?;
            info!(
                "Updated PrometheusServer {}/{} status: state={}, clusters={}",
                namespace,
                name,
                health.state().as_str(),
                desired.clusters.len()
            );
        } else {
            debug!("PrometheusServer {}/{} status unchanged", namespace, name);
        }

        Ok(Action::requeue(requeue))
    }

    /// Health of the server and the delay until it is due to be checked again.
    ///
    /// The server is only contacted when no check of the current generation
    /// is pending, so status patches and exporter events neither hit the
    /// server nor advance its backoff.
    async fn server_health(
        &self,
        server: &PrometheusServer,
        namespace: &str,
        name: &str,
        now: Instant,
    ) -> (ServerHealth, Duration) {
        let key = backoff_key(KIND, namespace, name);
        let generation = server.metadata.generation;

        if let Some((health, remaining)) = self.health_checks.fresh(&key, generation, now) {
            debug!(
                "PrometheusServer {}/{} checked recently, next check in {}s",
                namespace,
                name,
                remaining.as_secs()
            );
            return (health, remaining);
        }

        let health = check_server(self.connections.as_ref(), &server.spec, &self.local_cluster_id).await;
        let delay = if health.is_connected() {
            debug!("PrometheusServer {}/{}: {}", namespace, name, health.message());
            self.backoff.reset(&key);
            self.resync_interval
        } else {
            warn!("PrometheusServer {}/{} is unhealthy: {}", namespace, name, health.message());
            let delay = self.backoff.record_failure(&key);
            info!(
                "Rechecking PrometheusServer {}/{} in {}s (attempt {})",
                namespace,
                name,
                delay.as_secs(),
                self.backoff.failures(&key)
            );
            delay
        };

        self.health_checks.record(&key, generation, health.clone(), now + delay);
        (health, delay)
    }
}

/// Validates the server spec, then asks the server for its build
/// information and readiness.
pub async fn check_server(connector: &dyn Connector, spec: &PrometheusServerSpec, local_cluster_id: &str) -> ServerHealth {
    let address = match validate_server_spec(spec, local_cluster_id) {
        Ok(address) => address,
        Err(e) => return ServerHealth::InvalidSpec(e.to_string()),
    };

    let client = match connector.connect(&address) {
        Ok(client) => client,
        Err(e) => return ServerHealth::Unreachable(e.to_string()),
    };

    let info = match client.build_info().await {
        Ok(info) => info,
        Err(e) if e.is_authentication() => return ServerHealth::AuthenticationFailed(e.to_string()),
        Err(e) => return ServerHealth::Unreachable(e.to_string()),
    };

    match client.check_ready().await {
        Ok(()) => ServerHealth::Connected { version: info.version },
        Err(e) if e.is_authentication() => ServerHealth::AuthenticationFailed(e.to_string()),
        Err(e) => ServerHealth::Unreachable(format!("Prometheus {} is not ready: {}", info.version, e)),
    }
}
