//! Desired-status computation for both resource kinds.
//!
//! Everything here is pure so the reconcilers only fetch, compare and patch.

use crds::{
    validate_exporter_spec, ClusterConfiguration, ClusterStatus, EntityStatus, EntityType,
    PrometheusExporter, PrometheusExporterSpec, PrometheusExporterState, PrometheusExporterStatus,
    PrometheusServerReason, PrometheusServerSpec, PrometheusServerState, PrometheusServerStatus,
};
use kube::ResourceExt;
use serde_json::{json, Value};
use std::collections::BTreeSet;

/// Result of checking a PrometheusServer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerHealth {
    /// Reachable and authenticated
    Connected { version: String },
    /// The server rejected the credentials
    AuthenticationFailed(String),
    /// Transport failure, timeout or API error
    Unreachable(String),
    /// The server definition is unusable (bad address, conflicting clusters)
    InvalidSpec(String),
}

impl ServerHealth {
    pub fn is_connected(&self) -> bool {
        matches!(self, ServerHealth::Connected { .. })
    }

    pub fn state(&self) -> PrometheusServerState {
        if self.is_connected() {
            PrometheusServerState::Ok
        } else {
            PrometheusServerState::Error
        }
    }

    pub fn reason(&self) -> Option<PrometheusServerReason> {
        match self {
            ServerHealth::Connected { .. } => None,
            ServerHealth::AuthenticationFailed(_) => Some(PrometheusServerReason::AuthenticationFailure),
            ServerHealth::Unreachable(_) | ServerHealth::InvalidSpec(_) => {
                Some(PrometheusServerReason::ConnectionFailure)
            }
        }
    }

    pub fn message(&self) -> String {
        match self {
            ServerHealth::Connected { version } => format!("Connected to Prometheus {}", version),
            ServerHealth::AuthenticationFailed(detail) => format!("Authentication failed: {}", detail),
            ServerHealth::Unreachable(detail) => format!("Failed to connect: {}", detail),
            ServerHealth::InvalidSpec(detail) => format!("Invalid server configuration: {}", detail),
        }
    }
}

/// Status an exporter should carry given its spec
pub fn desired_exporter_status(spec: &PrometheusExporterSpec) -> PrometheusExporterStatus {
    match validate_exporter_spec(spec) {
        Ok(()) => PrometheusExporterStatus {
            state: Some(PrometheusExporterState::Ok),
            reason: None,
            message: None,
        },
        Err(e) => PrometheusExporterStatus {
            state: Some(PrometheusExporterState::Error),
            reason: Some(e.reason()),
            message: Some(e.to_string()),
        },
    }
}

/// Per-cluster status of a server.
///
/// `exporters` are the exporters in the server's namespace; invalid ones and
/// ones not selected by a cluster are ignored. Entity counts and discovery
/// times already present in `current` are carried over for clusters and
/// entity types that still exist.
pub fn desired_cluster_statuses(
    spec: &PrometheusServerSpec,
    local_cluster_id: &str,
    exporters: &[PrometheusExporter],
    current: Option<&PrometheusServerStatus>,
) -> Vec<ClusterStatus> {
    let implicit = [ClusterConfiguration::default()];
    let clusters: &[ClusterConfiguration] = if spec.clusters.is_empty() {
        &implicit
    } else {
        &spec.clusters
    };

    let valid: Vec<&PrometheusExporter> = exporters
        .iter()
        .filter(|exporter| validate_exporter_spec(&exporter.spec).is_ok())
        .collect();

    clusters
        .iter()
        .map(|cluster| {
            let id = cluster.resolved_id(local_cluster_id);
            let previous = current.and_then(|status| status.clusters.iter().find(|c| c.id == id));

            let entity_types: BTreeSet<EntityType> = valid
                .iter()
                .filter(|exporter| cluster.selects(exporter.labels()))
                .flat_map(|exporter| exporter.spec.entity_configs.iter().map(|e| e.entity_type))
                .collect();

            let entities = entity_types
                .into_iter()
                .map(|entity_type| EntityStatus {
                    entity_type,
                    count: previous
                        .and_then(|p| p.entities.iter().find(|e| e.entity_type == entity_type))
                        .and_then(|e| e.count),
                })
                .collect();

            ClusterStatus {
                id: id.to_string(),
                entities,
                last_discovery_time: previous.and_then(|p| p.last_discovery_time),
            }
        })
        .collect()
}

/// Full server status from a health check and the cluster statuses
pub fn desired_server_status(health: &ServerHealth, clusters: Vec<ClusterStatus>) -> PrometheusServerStatus {
    PrometheusServerStatus {
        state: Some(health.state()),
        reason: health.reason(),
        message: Some(health.message()),
        clusters,
    }
}

/// Whether the stored status differs from the desired one
pub fn status_needs_update<S: PartialEq>(current: Option<&S>, desired: &S) -> bool {
    current != Some(desired)
}

/// Merge patch replacing the server status.
///
/// Absent fields are written as explicit nulls so a merge patch clears
/// them instead of leaving stale values behind.
pub fn server_status_patch(status: &PrometheusServerStatus) -> Value {
    json!({
        "status": {
            "state": status.state,
            "reason": status.reason,
            "message": status.message,
            "clusters": status.clusters,
        }
    })
}

/// Merge patch replacing the exporter status
pub fn exporter_status_patch(status: &PrometheusExporterStatus) -> Value {
    json!({
        "status": {
            "state": status.state,
            "reason": status.reason,
            "message": status.message,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{exporter, server_spec};
    use crds::PrometheusExporterReason;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
    use std::collections::BTreeMap;

    #[test]
    fn test_exporter_status_ok_and_error() {
        let valid = exporter("jmx", &[EntityType::Application], &[]);
        assert_eq!(
            desired_exporter_status(&valid.spec),
            PrometheusExporterStatus {
                state: Some(PrometheusExporterState::Ok),
                reason: None,
                message: None,
            }
        );

        let mut broken = valid.spec.clone();
        broken.entity_configs[0].metric_configs[0].queries[0].promql = "rate(x[5m]".to_string();
        let status = desired_exporter_status(&broken);
        assert_eq!(status.state, Some(PrometheusExporterState::Error));
        assert_eq!(status.reason, Some(PrometheusExporterReason::InvalidPromQlSyntax));
        assert!(status.message.is_some());
    }

    #[test]
    fn test_health_to_status_fields() {
        let connected = ServerHealth::Connected {
            version: "2.45.0".to_string(),
        };
        assert_eq!(connected.state(), PrometheusServerState::Ok);
        assert_eq!(connected.reason(), None);
        assert_eq!(connected.message(), "Connected to Prometheus 2.45.0");

        let auth = ServerHealth::AuthenticationFailed("401".to_string());
        assert_eq!(auth.state(), PrometheusServerState::Error);
        assert_eq!(auth.reason(), Some(PrometheusServerReason::AuthenticationFailure));

        for failure in [
            ServerHealth::Unreachable("refused".to_string()),
            ServerHealth::InvalidSpec("bad address".to_string()),
        ] {
            assert_eq!(failure.reason(), Some(PrometheusServerReason::ConnectionFailure));
        }
    }

    #[test]
    fn test_implicit_local_cluster() {
        let spec = server_spec("http://prometheus:9090", vec![]);
        let exporters = vec![
            exporter("jmx", &[EntityType::Application], &[]),
            exporter("redis", &[EntityType::DatabaseServer, EntityType::Application], &[]),
        ];

        let clusters = desired_cluster_statuses(&spec, "local-uid", &exporters, None);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].id, "local-uid");
        let types: Vec<EntityType> = clusters[0].entities.iter().map(|e| e.entity_type).collect();
        assert_eq!(types, vec![EntityType::Application, EntityType::DatabaseServer]);
        assert!(clusters[0].entities.iter().all(|e| e.count.is_none()));
        assert!(clusters[0].last_discovery_time.is_none());
    }

    #[test]
    fn test_selector_and_invalid_exporters() {
        let selector = LabelSelector {
            match_labels: Some(BTreeMap::from([("tier".to_string(), "db".to_string())])),
            ..Default::default()
        };
        let spec = server_spec(
            "http://thanos:9090",
            vec![
                ClusterConfiguration {
                    id: Some("remote".to_string()),
                    exporter_selector: Some(selector),
                    ..Default::default()
                },
                ClusterConfiguration::default(),
            ],
        );

        let mut invalid = exporter("broken", &[EntityType::VirtualMachine], &[("tier", "db")]);
        invalid.spec.entity_configs[0].attribute_configs.clear();
        let exporters = vec![
            exporter("jmx", &[EntityType::Application], &[("tier", "app")]),
            exporter("mysql", &[EntityType::DatabaseServer], &[("tier", "db")]),
            invalid,
        ];

        let clusters = desired_cluster_statuses(&spec, "local-uid", &exporters, None);
        assert_eq!(clusters[0].id, "remote");
        let remote: Vec<EntityType> = clusters[0].entities.iter().map(|e| e.entity_type).collect();
        assert_eq!(remote, vec![EntityType::DatabaseServer]);

        assert_eq!(clusters[1].id, "local-uid");
        let local: Vec<EntityType> = clusters[1].entities.iter().map(|e| e.entity_type).collect();
        assert_eq!(local, vec![EntityType::Application, EntityType::DatabaseServer]);
    }

    #[test]
    fn test_observations_are_preserved() {
        let spec = server_spec("http://prometheus:9090", vec![]);
        let exporters = vec![exporter("jmx", &[EntityType::Application], &[])];
        let discovered = chrono::Utc::now();
        let current = PrometheusServerStatus {
            clusters: vec![ClusterStatus {
                id: "local-uid".to_string(),
                entities: vec![
                    EntityStatus {
                        entity_type: EntityType::Application,
                        count: Some(12),
                    },
                    EntityStatus {
                        entity_type: EntityType::DatabaseServer,
                        count: Some(3),
                    },
                ],
                last_discovery_time: Some(discovered),
            }],
            ..Default::default()
        };

        let clusters = desired_cluster_statuses(&spec, "local-uid", &exporters, Some(&current));
        assert_eq!(clusters[0].last_discovery_time, Some(discovered));
        assert_eq!(
            clusters[0].entities,
            vec![EntityStatus {
                entity_type: EntityType::Application,
                count: Some(12),
            }]
        );

        // a different cluster id starts from scratch
        let clusters = desired_cluster_statuses(&spec, "other-uid", &exporters, Some(&current));
        assert!(clusters[0].last_discovery_time.is_none());
        assert_eq!(clusters[0].entities[0].count, None);
    }

    #[test]
    fn test_status_needs_update() {
        let desired = desired_server_status(
            &ServerHealth::Connected {
                version: "2.45.0".to_string(),
            },
            vec![],
        );
        assert!(status_needs_update(None, &desired));
        assert!(!status_needs_update(Some(&desired.clone()), &desired));

        let failing = desired_server_status(&ServerHealth::Unreachable("timeout".to_string()), vec![]);
        assert!(status_needs_update(Some(&failing), &desired));
    }

    #[test]
    fn test_patch_clears_stale_fields() {
        let status = desired_server_status(
            &ServerHealth::Connected {
                version: "2.45.0".to_string(),
            },
            vec![],
        );
        let patch = server_status_patch(&status);
        assert_eq!(patch["status"]["state"], "ok");
        assert!(patch["status"]["reason"].is_null());
        assert_eq!(patch["status"]["clusters"], json!([]));

        let patch = exporter_status_patch(&PrometheusExporterStatus {
            state: Some(PrometheusExporterState::Ok),
            reason: None,
            message: None,
        });
        assert!(patch["status"].as_object().unwrap().contains_key("message"));
        assert!(patch["status"]["message"].is_null());
    }
}
