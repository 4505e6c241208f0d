//! PrometheusExporter CRD
//!
//! Describes how entities are constructed from the metrics exposed by one
//! kind of Prometheus exporter (JMX, Redis, MySQL, node, ...).

use crate::entity::EntityConfiguration;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// PrometheusExporterSpec defines the desired state of PrometheusExporter
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[kube(
    group = "metrics.turbonomic.io",
    version = "v1alpha1",
    kind = "PrometheusExporter",
    namespaced,
    status = "PrometheusExporterStatus",
    shortname = "promexporter",
    printcolumn = r#"{"name":"State","type":"string","jsonPath":".status.state"}"#,
    printcolumn = r#"{"name":"Reason","type":"string","jsonPath":".status.reason"}"#
)]
pub struct PrometheusExporterSpec {
    /// How entities are constructed from the metrics exposed by this
    /// type of exporter
    #[serde(rename = "entities")]
    #[schemars(length(min = 1))]
    pub entity_configs: Vec<EntityConfiguration>,
}

/// Overall exporter state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PrometheusExporterState {
    Ok,
    Error,
}

/// Why an exporter definition was rejected
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum PrometheusExporterReason {
    #[serde(rename = "InvalidPromQLSyntax")]
    InvalidPromQlSyntax,
    InvalidMetricDefinition,
    InvalidAttributeDefinition,
}

/// PrometheusExporterStatus defines the observed state of PrometheusExporter
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PrometheusExporterStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<PrometheusExporterState>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<PrometheusExporterReason>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_wire_names() {
        assert_eq!(
            serde_json::to_value(PrometheusExporterReason::InvalidPromQlSyntax).unwrap(),
            "InvalidPromQLSyntax"
        );
        assert_eq!(
            serde_json::to_value(PrometheusExporterReason::InvalidAttributeDefinition).unwrap(),
            "InvalidAttributeDefinition"
        );
        assert_eq!(
            serde_json::to_value(PrometheusExporterState::Ok).unwrap(),
            "ok"
        );
    }
}
