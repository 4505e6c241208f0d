//! PrometheusClient trait for mocking
//!
//! This trait abstracts the PrometheusClient so reconcilers can be unit
//! tested without a running Prometheus server.

use crate::error::PrometheusError;
use crate::models::BuildInfo;

/// Trait for Prometheus API client operations
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait PrometheusClientTrait: Send + Sync {
    /// Get the base URL
    fn base_url(&self) -> &str;

    /// Fetch build information; doubles as an authenticated connectivity check
    async fn build_info(&self) -> Result<BuildInfo, PrometheusError>;

    /// Whether the server reports itself ready to serve traffic
    async fn check_ready(&self) -> Result<(), PrometheusError>;
}
