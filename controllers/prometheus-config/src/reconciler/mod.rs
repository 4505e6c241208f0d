//! Reconciliation logic for PrometheusServer and PrometheusExporter.
//!
//! - `server`: connectivity check and per-cluster status of a PrometheusServer
//! - `exporter`: definition validation of a PrometheusExporter

mod exporter;
mod server;

pub use server::check_server;

use crate::backoff::BackoffTracker;
use crate::checks::HealthChecks;
use crate::connections::Connector;
use crate::error::ControllerError;
use crate::metrics::Metrics;
use crds::{validate_server_spec, PrometheusExporter, PrometheusServer};
use kube::{Api, Client, Resource};
use kube_runtime::controller::Action;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

/// Reconciles PrometheusServer and PrometheusExporter resources.
pub struct Reconciler {
    pub(crate) client: Client,
    pub(crate) connections: Box<dyn Connector>,
    /// Id reported for clusters that do not name one
    pub(crate) local_cluster_id: String,
    pub(crate) resync_interval: Duration,
    pub(crate) backoff: BackoffTracker,
    pub(crate) health_checks: HealthChecks,
    pub(crate) metrics: Arc<Metrics>,
}

impl Reconciler {
    pub fn new(
        client: Client,
        connections: Box<dyn Connector>,
        local_cluster_id: String,
        resync_interval: Duration,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            client,
            connections,
            local_cluster_id,
            resync_interval,
            backoff: BackoffTracker::default(),
            health_checks: HealthChecks::default(),
            metrics,
        }
    }

    pub(crate) fn server_api(&self, namespace: &str) -> Api<PrometheusServer> {
        Api::namespaced(self.client.clone(), namespace)
    }

    pub(crate) fn exporter_api(&self, namespace: &str) -> Api<PrometheusExporter> {
        Api::namespaced(self.client.clone(), namespace)
    }

    /// Requeue action after a failed reconciliation of `kind` `namespace/name`.
    pub fn requeue_after_error(&self, kind: &str, namespace: &str, name: &str, err: &ControllerError) -> Action {
        let key = backoff_key(kind, namespace, name);
        let delay = self.backoff.record_failure(&key);
        error!(
            "Reconciliation error for {} {}/{}: {} (attempt {}, retrying in {}s)",
            kind,
            namespace,
            name,
            err,
            self.backoff.failures(&key),
            delay.as_secs()
        );
        Action::requeue(delay)
    }

    /// Forgets backoff counters, health checks and clients that no longer
    /// belong to any object in `servers` or `exporters`.
    pub fn prune(&self, servers: &[Arc<PrometheusServer>], exporters: &[Arc<PrometheusExporter>]) {
        let mut live = HashSet::new();
        let mut addresses = Vec::new();

        for prometheus_server in servers {
            if let Ok((namespace, name)) = resource_ref(prometheus_server.as_ref(), server::KIND) {
                live.insert(backoff_key(server::KIND, &namespace, &name));
            }
            if let Ok(address) = validate_server_spec(&prometheus_server.spec, &self.local_cluster_id) {
                addresses.push(address);
            }
        }
        for prometheus_exporter in exporters {
            if let Ok((namespace, name)) = resource_ref(prometheus_exporter.as_ref(), exporter::KIND) {
                live.insert(backoff_key(exporter::KIND, &namespace, &name));
            }
        }

        self.backoff.retain(|key| live.contains(key));
        self.health_checks.retain(|key| live.contains(key));
        self.connections.retain(&addresses);
        debug!(
            "Pruned reconciler state to {} servers and {} exporters",
            servers.len(),
            exporters.len()
        );
    }
}

pub(crate) fn backoff_key(kind: &str, namespace: &str, name: &str) -> String {
    format!("{}:{}/{}", kind, namespace, name)
}

/// Namespace and name of a namespaced resource
pub(crate) fn resource_ref<K: Resource>(resource: &K, kind: &str) -> Result<(String, String), ControllerError> {
    let meta = resource.meta();
    let name = meta
        .name
        .clone()
        .ok_or_else(|| ControllerError::MissingMetadata(format!("{} without a name", kind)))?;
    let namespace = meta
        .namespace
        .clone()
        .ok_or_else(|| ControllerError::MissingMetadata(format!("{} {} without a namespace", kind, name)))?;
    Ok((namespace, name))
}
