//! Controller-specific error types.

use kube::Error as KubeError;
use prometheus_client::PrometheusError;
use thiserror::Error;

/// Errors that can occur in the Prometheus configuration controller.
///
/// Connection and authentication failures against a Prometheus server are
/// not errors here: they are reported in the PrometheusServer status.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Prometheus client construction failed
    #[error("Prometheus error: {0}")]
    Prometheus(#[from] PrometheusError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Resource is missing name or namespace
    #[error("Missing metadata: {0}")]
    MissingMetadata(String),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),

    /// Metric registration failed
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Health/metrics HTTP server failed
    #[error("HTTP server error: {0}")]
    Server(String),
}
