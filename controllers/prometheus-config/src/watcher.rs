//! Kubernetes resource watchers.
//!
//! Both kinds run through `run_controller()`, which drives a
//! `kube_runtime::Controller` with debouncing, bounded concurrency,
//! metrics and per-object error backoff.

use crate::error::ControllerError;
use crate::reconciler::Reconciler;
use crds::{PrometheusExporter, PrometheusServer};
use futures::StreamExt;
use kube::{Api, ResourceExt};
use kube_runtime::{
    controller::{Action, Config as ControllerConfig},
    reflector::ObjectRef,
    watcher, Controller,
};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

type ReconcileFuture = Pin<Box<dyn Future<Output = Result<Action, ControllerError>> + Send>>;

/// Debounce of 5s batches bursts of status updates; 3 concurrent
/// reconciliations per kind
fn controller_config() -> ControllerConfig {
    ControllerConfig::default()
        .debounce(Duration::from_secs(5))
        .concurrency(3)
}

async fn run_controller<K, F>(
    controller: Controller<K>,
    reconciler: Arc<Reconciler>,
    reconcile_fn: F,
    kind: &'static str,
) -> Result<(), ControllerError>
where
    K: kube::Resource + Clone + Send + Sync + 'static + std::fmt::Debug + serde::de::DeserializeOwned,
    K::DynamicType: Default + std::cmp::Eq + std::hash::Hash + Clone + std::fmt::Debug + Unpin,
    F: Fn(Arc<Reconciler>, Arc<K>) -> ReconcileFuture + Send + Sync + Clone + 'static,
{
    info!("Starting {} watcher", kind);

    let error_policy = move |obj: Arc<K>, err: &ControllerError, ctx: Arc<Reconciler>| {
        ctx.requeue_after_error(kind, &obj.namespace().unwrap_or_default(), &obj.name_any(), err)
    };

    let reconcile = move |obj: Arc<K>, ctx: Arc<Reconciler>| {
        let reconcile_fn = reconcile_fn.clone();
        async move {
            debug!("Reconciling {} {}", kind, obj.name_any());
            let started = Instant::now();
            let result = reconcile_fn(ctx.clone(), obj).await;
            ctx.metrics.observe_reconcile(kind, result.is_ok(), started.elapsed());
            result
        }
    };

    controller
        .run(reconcile, error_policy, reconciler)
        .for_each(|res| async move {
            match res {
                Ok((obj, action)) => debug!("Reconciled {} {}: {:?}", kind, obj.name, action),
                Err(e) => error!("Controller error for {}: {}", kind, e),
            }
        })
        .await;

    Ok(())
}

/// Watches PrometheusServers and PrometheusExporters.
pub struct Watcher {
    reconciler: Arc<Reconciler>,
    server_api: Api<PrometheusServer>,
    exporter_api: Api<PrometheusExporter>,
}

impl Watcher {
    pub fn new(
        reconciler: Arc<Reconciler>,
        server_api: Api<PrometheusServer>,
        exporter_api: Api<PrometheusExporter>,
    ) -> Self {
        Self {
            reconciler,
            server_api,
            exporter_api,
        }
    }

    /// Controller for PrometheusServers.
    ///
    /// Any exporter event re-queues every server in the exporter's
    /// namespace, since the exporter may change their cluster statuses.
    pub fn prometheus_server_controller(&self) -> Controller<PrometheusServer> {
        let controller = Controller::new(self.server_api.clone(), watcher::Config::default());
        let servers = controller.store();

        controller
            .watches(
                self.exporter_api.clone(),
                watcher::Config::default(),
                move |exporter: PrometheusExporter| {
                    let namespace = exporter.namespace();
                    servers
                        .state()
                        .into_iter()
                        .filter(|server| server.namespace() == namespace)
                        .map(|server| ObjectRef::from_obj(server.as_ref()))
                        .collect::<Vec<_>>()
                },
            )
            .with_config(controller_config())
    }

    /// Drives `controller`, built by `prometheus_server_controller()`.
    pub async fn watch_prometheus_servers(
        &self,
        controller: Controller<PrometheusServer>,
    ) -> Result<(), ControllerError> {
        run_controller(
            controller,
            self.reconciler.clone(),
            |reconciler, server| {
                Box::pin(async move { reconciler.reconcile_prometheus_server(&server).await })
            },
            "PrometheusServer",
        )
        .await
    }

    pub fn prometheus_exporter_controller(&self) -> Controller<PrometheusExporter> {
        Controller::new(self.exporter_api.clone(), watcher::Config::default()).with_config(controller_config())
    }

    /// Drives `controller`, built by `prometheus_exporter_controller()`.
    pub async fn watch_prometheus_exporters(
        &self,
        controller: Controller<PrometheusExporter>,
    ) -> Result<(), ControllerError> {
        run_controller(
            controller,
            self.reconciler.clone(),
            |reconciler, exporter| {
                Box::pin(async move { reconciler.reconcile_prometheus_exporter(&exporter).await })
            },
            "PrometheusExporter",
        )
        .await
    }
}
