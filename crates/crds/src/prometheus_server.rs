//! PrometheusServer CRD
//!
//! Declares a Prometheus server and the clusters it holds metrics for.

use crate::cluster::{ClusterConfiguration, ClusterStatus};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// PrometheusServerSpec defines the desired state of PrometheusServer
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "metrics.turbonomic.io",
    version = "v1alpha1",
    kind = "PrometheusServer",
    namespaced,
    status = "PrometheusServerStatus",
    shortname = "promserver",
    printcolumn = r#"{"name":"Address","type":"string","jsonPath":".spec.address"}"#,
    printcolumn = r#"{"name":"State","type":"string","jsonPath":".status.state"}"#,
    printcolumn = r#"{"name":"Reason","type":"string","jsonPath":".status.reason"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct PrometheusServerSpec {
    /// Address of the Prometheus server
    pub address: String,

    /// Clusters the Prometheus server holds metrics for.
    /// If empty, the server only serves the cluster the controller runs in.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub clusters: Vec<ClusterConfiguration>,
}

/// Overall server state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PrometheusServerState {
    Ok,
    Error,
}

impl PrometheusServerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrometheusServerState::Ok => "ok",
            PrometheusServerState::Error => "error",
        }
    }
}

/// Why a server is in the error state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum PrometheusServerReason {
    ConnectionFailure,
    AuthenticationFailure,
}

/// PrometheusServerStatus defines the observed state of PrometheusServer
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PrometheusServerStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<PrometheusServerState>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<PrometheusServerReason>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub clusters: Vec<ClusterStatus>,
}
