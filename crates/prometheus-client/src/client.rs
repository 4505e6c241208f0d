//! Prometheus API client
//!
//! Implements the read-only status endpoints of the Prometheus HTTP API:
//! `/api/v1/status/buildinfo` and `/-/ready`.

use crate::common::HttpClient;
use crate::error::PrometheusError;
use crate::models::{BuildInfo, Credentials};
use crate::prometheus_trait::PrometheusClientTrait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Prometheus API client
#[derive(Debug, Clone)]
pub struct PrometheusClient {
    http: HttpClient,
}

impl PrometheusClient {
    /// Create a new Prometheus client
    ///
    /// # Arguments
    /// * `base_url` - Prometheus base URL (e.g., "http://prometheus:9090")
    /// * `credentials` - Optional bearer token or basic auth
    /// * `timeout` - Per-request timeout
    pub fn new(
        base_url: &str,
        credentials: Option<Credentials>,
        timeout: Duration,
    ) -> Result<Self, PrometheusError> {
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(PrometheusError::InvalidRequest(format!(
                "base URL must be http(s): {}",
                base_url
            )));
        }

        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(PrometheusError::Http)?;

        Ok(Self {
            http: HttpClient::new(client, base_url, credentials),
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        self.http.base_url()
    }

    /// Fetch build information from `/api/v1/status/buildinfo`.
    ///
    /// # Returns
    /// * `Ok(BuildInfo)` - Server is reachable and accepted our credentials
    /// * `Err(PrometheusError::Authentication)` - Credentials rejected
    /// * `Err(PrometheusError)` - Any other failure
    pub async fn build_info(&self) -> Result<BuildInfo, PrometheusError> {
        debug!("Fetching build info from {}", self.http.base_url());
        let info: BuildInfo = self.http.get_api("/api/v1/status/buildinfo").await?;
        debug!("Prometheus at {} is version {}", self.http.base_url(), info.version);
        Ok(info)
    }

    /// Check `/-/ready`
    pub async fn check_ready(&self) -> Result<(), PrometheusError> {
        self.http.get_text("/-/ready").await.map(|_| ())
    }
}

#[async_trait::async_trait]
impl PrometheusClientTrait for PrometheusClient {
    fn base_url(&self) -> &str {
        PrometheusClient::base_url(self)
    }

    async fn build_info(&self) -> Result<BuildInfo, PrometheusError> {
        PrometheusClient::build_info(self).await
    }

    async fn check_ready(&self) -> Result<(), PrometheusError> {
        PrometheusClient::check_ready(self).await
    }
}
