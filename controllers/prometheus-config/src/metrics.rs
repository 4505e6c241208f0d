//! Controller self-metrics.

use crds::{PrometheusServer, PrometheusServerState};
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};
use std::sync::Arc;
use std::time::Duration;

/// Metrics registry of the controller
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    reconciliations: IntCounterVec,
    reconcile_duration: HistogramVec,
    servers: IntGaugeVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let reconciliations = IntCounterVec::new(
            Opts::new(
                "prometheus_config_reconciliations_total",
                "Reconciliations by resource kind and result",
            ),
            &["kind", "result"],
        )?;
        let reconcile_duration = HistogramVec::new(
            HistogramOpts::new(
                "prometheus_config_reconcile_duration_seconds",
                "Time spent reconciling one resource",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
            &["kind"],
        )?;
        let servers = IntGaugeVec::new(
            Opts::new("prometheus_config_servers", "PrometheusServers by reported state"),
            &["state"],
        )?;

        registry.register(Box::new(reconciliations.clone()))?;
        registry.register(Box::new(reconcile_duration.clone()))?;
        registry.register(Box::new(servers.clone()))?;

        Ok(Self {
            registry,
            reconciliations,
            reconcile_duration,
            servers,
        })
    }

    /// Records one finished reconciliation of `kind`.
    pub fn observe_reconcile(&self, kind: &str, success: bool, elapsed: Duration) {
        let result = if success { "success" } else { "error" };
        self.reconciliations.with_label_values(&[kind, result]).inc();
        self.reconcile_duration
            .with_label_values(&[kind])
            .observe(elapsed.as_secs_f64());
    }

    /// Sets the per-state server gauge from the servers currently known.
    pub fn observe_servers(&self, servers: &[Arc<PrometheusServer>]) {
        let (mut ok, mut error, mut unknown) = (0i64, 0i64, 0i64);
        for server in servers {
            match server.status.as_ref().and_then(|s| s.state) {
                Some(PrometheusServerState::Ok) => ok += 1,
                Some(PrometheusServerState::Error) => error += 1,
                None => unknown += 1,
            }
        }
        self.servers.with_label_values(&["ok"]).set(ok);
        self.servers.with_label_values(&["error"]).set(error);
        self.servers.with_label_values(&["unknown"]).set(unknown);
    }

    /// Renders every registered metric in the text exposition format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
