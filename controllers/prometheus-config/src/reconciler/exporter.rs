//! PrometheusExporter reconciliation

use super::{backoff_key, resource_ref, Reconciler};
use crate::error::ControllerError;
use crate::status::{desired_exporter_status, exporter_status_patch, status_needs_update};
use crds::{PrometheusExporter, PrometheusExporterState};
use kube::api::{Patch, PatchParams};
use kube_runtime::controller::Action;
use tracing::{debug, info, warn};

pub(super) const KIND: &str = "PrometheusExporter";

impl Reconciler {
    /// Validates the exporter definition and records the verdict in status.
    ///
    /// Nothing is retried: an invalid definition stays invalid until edited.
    pub async fn reconcile_prometheus_exporter(&self, exporter: &PrometheusExporter) -> Result<Action, ControllerError> {
        let (namespace, name) = resource_ref(exporter, KIND)?;
        info!("Reconciling PrometheusExporter {}/{}", namespace, name);

        let desired = desired_exporter_status(&exporter.spec);
        if desired.state == Some(PrometheusExporterState::Error) {
            warn!(
                "PrometheusExporter {}/{} is invalid: {}",
                namespace,
                name,
                desired.message.as_deref().unwrap_or_default()
            );
        }

        if status_needs_update(exporter.status.as_ref(), &desired) {
            self.exporter_api(&namespace)
                .patch_status(&name, &PatchParams::default(), &Patch::Merge(&exporter_status_patch(&desired)))
                .await?;
            info!("Updated PrometheusExporter {}/{} status", namespace, name);
        } else {
            debug!("PrometheusExporter {}/{} status unchanged", namespace, name);
        }

        self.backoff.reset(&backoff_key(KIND, &namespace, &name));
        Ok(Action::await_change())
    }
}
