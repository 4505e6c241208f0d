//! Prometheus client errors

use thiserror::Error;

/// Errors that can occur when talking to the Prometheus HTTP API
#[derive(Debug, Error)]
pub enum PrometheusError {
    /// HTTP request/response error (connection refused, DNS, TLS, timeout)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Prometheus returned an error response
    #[error("Prometheus API error: {0}")]
    Api(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Credentials rejected (401/403)
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Endpoint not found; usually the address points at something that
    /// is not a Prometheus API
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request (e.g. malformed base URL)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl PrometheusError {
    /// Whether the server rejected our credentials
    pub fn is_authentication(&self) -> bool {
        matches!(self, PrometheusError::Authentication(_))
    }
}
