//! Runtime validation of PrometheusServer and PrometheusExporter specs
//!
//! The JSON schema carries the structural constraints (enums, required
//! fields, `minItems`). Everything the API server cannot check on its own
//! lives here, and every rejection maps onto a status reason.

use crate::entity::{AttributeConfiguration, EntityConfiguration};
use crate::prometheus_exporter::{PrometheusExporterReason, PrometheusExporterSpec};
use crate::prometheus_server::PrometheusServerSpec;
use regex::Regex;
use std::collections::HashSet;
use thiserror::Error;
use url::Url;

/// Rejection of a PrometheusExporter spec
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExporterSpecError {
    #[error("invalid PromQL in {entity} metric {metric}: {detail}")]
    PromQlSyntax {
        entity: String,
        metric: String,
        detail: String,
    },

    #[error("invalid metric definition: {0}")]
    MetricDefinition(String),

    #[error("invalid attribute definition in {entity}: {detail}")]
    AttributeDefinition { entity: String, detail: String },
}

impl ExporterSpecError {
    /// Status reason reported for this error
    pub fn reason(&self) -> PrometheusExporterReason {
        match self {
            ExporterSpecError::PromQlSyntax { .. } => PrometheusExporterReason::InvalidPromQlSyntax,
            ExporterSpecError::MetricDefinition(_) => PrometheusExporterReason::InvalidMetricDefinition,
            ExporterSpecError::AttributeDefinition { .. } => {
                PrometheusExporterReason::InvalidAttributeDefinition
            }
        }
    }
}

/// Rejection of a PrometheusServer spec
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServerSpecError {
    #[error("invalid address {address:?}: {detail}")]
    Address { address: String, detail: String },

    #[error("cluster id {0:?} is configured more than once")]
    DuplicateClusterId(String),

    #[error("invalid exporterSelector for cluster {cluster:?}: {detail}")]
    InvalidSelector { cluster: String, detail: String },
}

/// Validates a PrometheusExporter spec, returning the first problem found.
pub fn validate_exporter_spec(spec: &PrometheusExporterSpec) -> Result<(), ExporterSpecError> {
    if spec.entity_configs.is_empty() {
        return Err(ExporterSpecError::MetricDefinition(
            "at least one entity must be defined".to_string(),
        ));
    }

    for entity in &spec.entity_configs {
        validate_metrics(entity)?;
        validate_attributes(entity)?;
    }

    Ok(())
}

fn validate_metrics(entity: &EntityConfiguration) -> Result<(), ExporterSpecError> {
    let entity_name = entity.entity_type.as_str();

    if entity.metric_configs.is_empty() {
        return Err(ExporterSpecError::MetricDefinition(format!(
            "{} defines no metrics",
            entity_name
        )));
    }

    let mut metric_types = HashSet::new();
    for metric in &entity.metric_configs {
        let metric_name = serde_plain_name(&metric.metric_type);
        if !metric_types.insert(metric.metric_type) {
            return Err(ExporterSpecError::MetricDefinition(format!(
                "{} defines metric {} more than once",
                entity_name, metric_name
            )));
        }

        if metric.queries.is_empty() {
            return Err(ExporterSpecError::MetricDefinition(format!(
                "{} metric {} has no queries",
                entity_name, metric_name
            )));
        }

        let mut query_types = HashSet::new();
        for query in &metric.queries {
            if !query_types.insert(query.query_type) {
                return Err(ExporterSpecError::MetricDefinition(format!(
                    "{} metric {} defines query {} more than once",
                    entity_name,
                    metric_name,
                    serde_plain_name(&query.query_type)
                )));
            }

            check_promql(&query.promql).map_err(|detail| ExporterSpecError::PromQlSyntax {
                entity: entity_name.to_string(),
                metric: metric_name.clone(),
                detail,
            })?;
        }
    }

    Ok(())
}

fn validate_attributes(entity: &EntityConfiguration) -> Result<(), ExporterSpecError> {
    let entity_name = entity.entity_type.as_str();
    let invalid = |detail: String| ExporterSpecError::AttributeDefinition {
        entity: entity_name.to_string(),
        detail,
    };

    let identifiers = entity
        .attribute_configs
        .iter()
        .filter(|attr| attr.is_identifier)
        .count();
    if identifiers != 1 {
        return Err(invalid(format!(
            "exactly one attribute must be the identifier, found {}",
            identifiers
        )));
    }

    let mut names = HashSet::new();
    for attr in &entity.attribute_configs {
        if attr.name.is_empty() {
            return Err(invalid("attribute name must not be empty".to_string()));
        }
        if !names.insert(attr.name.as_str()) {
            return Err(invalid(format!("attribute {} is defined more than once", attr.name)));
        }
        validate_attribute(attr).map_err(|detail| invalid(format!("attribute {}: {}", attr.name, detail)))?;
    }

    Ok(())
}

fn validate_attribute(attr: &AttributeConfiguration) -> Result<(), String> {
    if !is_valid_label_name(&attr.label) {
        return Err(format!("{:?} is not a valid Prometheus label name", attr.label));
    }

    let regex = match attr.matches.as_deref() {
        Some(pattern) => {
            Some(Regex::new(pattern).map_err(|e| format!("invalid matches expression: {}", e))?)
        }
        None => None,
    };

    match (&attr.as_template, regex) {
        (None, _) => Ok(()),
        (Some(_), None) => Err("'as' requires 'matches'".to_string()),
        (Some(template), Some(regex)) => check_template(template, &regex),
    }
}

/// Prometheus label names match `[a-zA-Z_][a-zA-Z0-9_]*`
pub fn is_valid_label_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Checks that every `$ref` in `template` names a capture group of `regex`.
///
/// Reference syntax follows `regex::Captures::expand`: `$$` is a literal
/// dollar, `${name}` is explicit, and `$name` takes the longest run of
/// `[_0-9A-Za-z]`. All-digit names are group indices.
fn check_template(template: &str, regex: &Regex) -> Result<(), String> {
    let group_names: HashSet<&str> = regex.capture_names().flatten().collect();
    let group_count = regex.captures_len();

    let mut rest = template;
    while let Some(pos) = rest.find('$') {
        rest = &rest[pos + 1..];

        if let Some(stripped) = rest.strip_prefix('$') {
            rest = stripped;
            continue;
        }

        let name = if let Some(braced) = rest.strip_prefix('{') {
            let end = braced
                .find('}')
                .ok_or_else(|| format!("unterminated reference in template {:?}", template))?;
            rest = &braced[end + 1..];
            &braced[..end]
        } else {
            let end = rest
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(rest.len());
            let name = &rest[..end];
            rest = &rest[end..];
            name
        };

        if name.is_empty() {
            return Err(format!("empty capture reference in template {:?}", template));
        }

        let known = match name.parse::<usize>() {
            Ok(index) => index < group_count,
            Err(_) => group_names.contains(name),
        };
        if !known {
            return Err(format!(
                "template {:?} references unknown capture group {:?}",
                template, name
            ));
        }
    }

    Ok(())
}

/// Lexical sanity check of a PromQL expression.
///
/// This is not a parser: it rejects empty expressions, unbalanced
/// brackets and unterminated string literals, which covers the mistakes
/// that survive YAML editing.
pub fn check_promql(expr: &str) -> Result<(), String> {
    if expr.trim().is_empty() {
        return Err("expression is empty".to_string());
    }

    let mut stack: Vec<(char, usize)> = Vec::new();
    let mut chars = expr.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        match c {
            '"' | '\'' | '`' => {
                let quote = c;
                let mut closed = false;
                while let Some((_, s)) = chars.next() {
                    if s == '\\' && quote != '`' {
                        chars.next();
                    } else if s == quote {
                        closed = true;
                        break;
                    }
                }
                if !closed {
                    return Err(format!("unterminated string literal starting at offset {}", pos));
                }
            }
            '#' => {
                // comment runs to end of line
                while let Some((_, s)) = chars.peek() {
                    if *s == '\n' {
                        break;
                    }
                    chars.next();
                }
            }
            '(' | '[' | '{' => stack.push((c, pos)),
            ')' | ']' | '}' => {
                let expected = match c {
                    ')' => '(',
                    ']' => '[',
                    _ => '{',
                };
                match stack.pop() {
                    Some((open, _)) if open == expected => {}
                    Some((open, open_pos)) => {
                        return Err(format!(
                            "unexpected {:?} at offset {}, {:?} opened at offset {} is not closed",
                            c, pos, open, open_pos
                        ));
                    }
                    None => return Err(format!("unexpected {:?} at offset {}", c, pos)),
                }
            }
            _ => {}
        }
    }

    match stack.pop() {
        Some((open, pos)) => Err(format!("unclosed {:?} opened at offset {}", open, pos)),
        None => Ok(()),
    }
}

/// Validates a PrometheusServer spec and returns the parsed address.
///
/// Cluster ids are compared after clusters without an id have been
/// defaulted to `local_cluster_id`.
pub fn validate_server_spec(
    spec: &PrometheusServerSpec,
    local_cluster_id: &str,
) -> Result<Url, ServerSpecError> {
    let invalid = |detail: String| ServerSpecError::Address {
        address: spec.address.clone(),
        detail,
    };

    let url = Url::parse(spec.address.trim()).map_err(|e| invalid(e.to_string()))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(invalid(format!("unsupported scheme {:?}", url.scheme())));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(invalid("missing host".to_string()));
    }

    let mut ids = HashSet::new();
    for cluster in &spec.clusters {
        let id = cluster.resolved_id(local_cluster_id);
        if !ids.insert(id) {
            return Err(ServerSpecError::DuplicateClusterId(id.to_string()));
        }
        if let Err(detail) = cluster.parsed_selector() {
            return Err(ServerSpecError::InvalidSelector {
                cluster: id.to_string(),
                detail,
            });
        }
    }

    Ok(url)
}

/// Wire name of a unit enum variant, used in messages
fn serde_plain_name<T: serde::Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(s)) => s,
        _ => String::from("<unknown>"),
    }
}
