//! Cluster configuration and status shared by PrometheusServer

use crate::entity::EntityStatus;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::core::{Selector, SelectorExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Describes one Kubernetes cluster whose metrics are served by a
/// Prometheus server.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ClusterConfiguration {
    /// The labels that identify the cluster when executing PromQL queries
    /// against the Prometheus server
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub cluster_labels: BTreeMap<String, String>,

    /// The unique ID of the cluster
    ///
    /// Get the ID by running the following command in the cluster:
    ///     kubectl -n default get svc kubernetes -ojsonpath='{.metadata.uid}'
    /// If not specified, defaults to the ID of the cluster where the
    /// controller is running
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Label selector for PrometheusExporters.
    /// If not defined, selects all PrometheusExporter resources in the
    /// namespace of the PrometheusServer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exporter_selector: Option<LabelSelector>,
}

impl ClusterConfiguration {
    /// Resolves the cluster ID, falling back to the local cluster.
    pub fn resolved_id<'a>(&'a self, local_cluster_id: &'a str) -> &'a str {
        match self.id.as_deref() {
            Some(id) if !id.is_empty() => id,
            _ => local_cluster_id,
        }
    }

    /// Parses `exporterSelector`. `None` means every exporter is selected.
    pub fn parsed_selector(&self) -> Result<Option<Selector>, String> {
        self.exporter_selector.as_ref().map(parse_selector).transpose()
    }

    /// Whether an exporter carrying `labels` applies to this cluster.
    /// A malformed selector selects nothing.
    pub fn selects(&self, labels: &BTreeMap<String, String>) -> bool {
        match self.parsed_selector() {
            Ok(None) => true,
            Ok(Some(selector)) => selector.matches(labels),
            Err(_) => false,
        }
    }
}

/// Converts a `LabelSelector` into a matcher, rejecting requirements the
/// API server would reject for built-in resources.
fn parse_selector(selector: &LabelSelector) -> Result<Selector, String> {
    for requirement in selector.match_expressions.iter().flatten() {
        let has_values = requirement.values.as_ref().is_some_and(|v| !v.is_empty());
        match requirement.operator.as_str() {
            "In" | "NotIn" if !has_values => {
                return Err(format!(
                    "operator {} on key {:?} requires at least one value",
                    requirement.operator, requirement.key
                ));
            }
            "Exists" | "DoesNotExist" if has_values => {
                return Err(format!(
                    "operator {} on key {:?} must not have values",
                    requirement.operator, requirement.key
                ));
            }
            _ => {}
        }
    }

    Selector::try_from(selector.clone()).map_err(|e| e.to_string())
}

/// Observed state of one cluster
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterStatus {
    pub id: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entities: Vec<EntityStatus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_discovery_time: Option<chrono::DateTime<chrono::Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelectorRequirement;

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn requirement(key: &str, operator: &str, values: &[&str]) -> LabelSelectorRequirement {
        LabelSelectorRequirement {
            key: key.to_string(),
            operator: operator.to_string(),
            values: (!values.is_empty()).then(|| values.iter().map(|v| v.to_string()).collect()),
        }
    }

    fn cluster(selector: LabelSelector) -> ClusterConfiguration {
        ClusterConfiguration {
            exporter_selector: Some(selector),
            ..Default::default()
        }
    }

    #[test]
    fn test_resolved_id_defaults_to_local_cluster() {
        let mut cluster = ClusterConfiguration::default();
        assert_eq!(cluster.resolved_id("local-uid"), "local-uid");

        cluster.id = Some(String::new());
        assert_eq!(cluster.resolved_id("local-uid"), "local-uid");

        cluster.id = Some("remote-uid".to_string());
        assert_eq!(cluster.resolved_id("local-uid"), "remote-uid");
    }

    #[test]
    fn test_missing_or_empty_selector_selects_all_exporters() {
        assert!(ClusterConfiguration::default().selects(&BTreeMap::new()));

        let empty = cluster(LabelSelector::default());
        assert!(empty.selects(&labels(&[])));
        assert!(empty.selects(&labels(&[("app", "redis")])));
    }

    #[test]
    fn test_match_labels() {
        let cluster = cluster(LabelSelector {
            match_labels: Some(labels(&[("exporter", "jmx")])),
            ..Default::default()
        });
        assert!(cluster.selects(&labels(&[("exporter", "jmx"), ("team", "a")])));
        assert!(!cluster.selects(&labels(&[("exporter", "redis")])));
        assert!(!cluster.selects(&labels(&[])));
    }

    #[test]
    fn test_match_expressions() {
        let cluster = cluster(LabelSelector {
            match_expressions: Some(vec![
                requirement("exporter", "In", &["jmx", "redis"]),
                requirement("tier", "NotIn", &["test"]),
                requirement("owner", "Exists", &[]),
                requirement("deprecated", "DoesNotExist", &[]),
            ]),
            ..Default::default()
        });

        assert!(cluster.selects(&labels(&[("exporter", "redis"), ("owner", "ops")])));
        assert!(cluster.selects(&labels(&[("exporter", "jmx"), ("owner", "ops"), ("tier", "prod")])));
        assert!(!cluster.selects(&labels(&[("exporter", "mysql"), ("owner", "ops")])));
        assert!(!cluster.selects(&labels(&[("exporter", "jmx"), ("owner", "ops"), ("tier", "test")])));
        assert!(!cluster.selects(&labels(&[("exporter", "jmx")])));
        assert!(!cluster.selects(&labels(&[("exporter", "jmx"), ("owner", "ops"), ("deprecated", "true")])));
    }

    #[test]
    fn test_malformed_selectors_are_rejected() {
        for malformed in [
            requirement("exporter", "In", &[]),
            requirement("exporter", "NotIn", &[]),
            requirement("owner", "Exists", &["ops"]),
            requirement("owner", "Matches", &["ops"]),
        ] {
            let cluster = cluster(LabelSelector {
                match_expressions: Some(vec![malformed.clone()]),
                ..Default::default()
            });
            assert!(cluster.parsed_selector().is_err(), "{:?} should be rejected", malformed);
            assert!(!cluster.selects(&labels(&[("exporter", "jmx"), ("owner", "ops")])));
        }
    }

    #[test]
    fn test_deserializes_kubernetes_shape() {
        let cluster: ClusterConfiguration = serde_json::from_value(serde_json::json!({
            "id": "remote",
            "exporterSelector": {
                "matchLabels": {"exporter": "jmx"},
                "matchExpressions": [{"key": "env", "operator": "In", "values": ["prod"]}]
            }
        }))
        .unwrap();

        assert!(cluster.selects(&labels(&[("exporter", "jmx"), ("env", "prod")])));
        assert!(!cluster.selects(&labels(&[("exporter", "jmx"), ("env", "dev")])));
    }
}
