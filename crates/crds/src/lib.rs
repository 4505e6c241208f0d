//! Turbo Metrics CRD Definitions
//!
//! Kubernetes Custom Resource Definitions describing Prometheus servers and
//! the exporters whose metrics are turned into entities.

pub mod cluster;
pub mod entity;
pub mod prometheus_exporter;
pub mod prometheus_server;
pub mod validation;

pub use cluster::*;
pub use entity::*;
pub use prometheus_exporter::*;
pub use prometheus_server::*;
pub use validation::{
    ExporterSpecError, ServerSpecError, check_promql, validate_exporter_spec, validate_server_spec,
};
