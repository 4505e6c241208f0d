//! Entity configuration
//!
//! Describes how an entity (application, database server, VM) is derived
//! from the metrics exposed by one type of Prometheus exporter.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How to construct one entity type from exporter metrics
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct EntityConfiguration {
    /// Entity type
    #[serde(rename = "type")]
    pub entity_type: EntityType,

    /// Whether the entity is hosted on a virtual machine
    #[serde(rename = "hostedOnVM", default)]
    pub hosted_on_vm: bool,

    /// Metrics collected for this entity
    #[serde(rename = "metrics", default)]
    pub metric_configs: Vec<MetricConfiguration>,

    /// How to map metric labels into entity attributes.
    /// Exactly one attribute must be the identifier.
    #[serde(rename = "attributes", default)]
    pub attribute_configs: Vec<AttributeConfiguration>,
}

/// Supported entity types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "camelCase")]
pub enum EntityType {
    Application,
    DatabaseServer,
    VirtualMachine,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Application => "application",
            EntityType::DatabaseServer => "databaseServer",
            EntityType::VirtualMachine => "virtualMachine",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A commodity metric and the PromQL queries that produce it
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct MetricConfiguration {
    /// Metric type
    #[serde(rename = "type")]
    pub metric_type: MetricType,

    /// Queries producing the values of this metric
    #[serde(default)]
    pub queries: Vec<QueryConfiguration>,
}

/// Metric (commodity) types understood by Prometurbo discovery
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum MetricType {
    Cpu,
    Memory,
    ResponseTime,
    Transaction,
    Heap,
    CollectionTime,
    CacheHitRate,
    DbMem,
    Connection,
}

/// A single PromQL query contributing to a metric
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct QueryConfiguration {
    /// Which value of the metric this query produces
    #[serde(rename = "type")]
    pub query_type: QueryType,

    /// PromQL expression
    pub promql: String,
}

/// Value kinds a query can produce
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum QueryType {
    Used,
    Capacity,
    Peak,
}

/// Maps a metric label into an entity attribute
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AttributeConfiguration {
    /// Attribute name
    pub name: String,

    /// Source metric label
    pub label: String,

    /// Regular expression extracting a sub-pattern from the label value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matches: Option<String>,

    /// Template rebuilding the attribute value from the `matches` captures,
    /// e.g. `$1:$2` or `${host}`
    #[serde(rename = "as", default, skip_serializing_if = "Option::is_none")]
    pub as_template: Option<String>,

    /// Whether this attribute identifies the entity
    #[serde(default)]
    pub is_identifier: bool,
}

/// Observed count of one entity type
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct EntityStatus {
    #[serde(rename = "type")]
    pub entity_type: EntityType,

    /// Number of discovered entities; null until observed
    pub count: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_configuration_json_names() {
        let entity: EntityConfiguration = serde_json::from_value(serde_json::json!({
            "type": "databaseServer",
            "hostedOnVM": true,
            "metrics": [
                {"type": "dbMem", "queries": [{"type": "used", "promql": "redis_memory_used_bytes"}]}
            ],
            "attributes": [
                {"name": "ip", "label": "instance", "matches": "\\d{1,3}(?:\\.\\d{1,3}){3}", "isIdentifier": true},
                {"name": "port", "label": "instance", "matches": ":(\\d+)", "as": "$1"}
            ]
        }))
        .unwrap();

        assert_eq!(entity.entity_type, EntityType::DatabaseServer);
        assert!(entity.hosted_on_vm);
        assert_eq!(entity.metric_configs[0].metric_type, MetricType::DbMem);
        assert_eq!(entity.metric_configs[0].queries[0].query_type, QueryType::Used);
        assert!(entity.attribute_configs[0].is_identifier);
        assert!(!entity.attribute_configs[1].is_identifier);
        assert_eq!(entity.attribute_configs[1].as_template.as_deref(), Some("$1"));

        let back = serde_json::to_value(&entity).unwrap();
        assert_eq!(back["hostedOnVM"], true);
        assert_eq!(back["attributes"][1]["as"], "$1");
    }

    #[test]
    fn test_entity_status_serializes_null_count() {
        let status = EntityStatus {
            entity_type: EntityType::Application,
            count: None,
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json, serde_json::json!({"type": "application", "count": null}));
    }
}
