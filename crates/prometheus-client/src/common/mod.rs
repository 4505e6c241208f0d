//! Common utilities for the Prometheus API client
//!
//! Wraps `reqwest` with credentials, URL building and decoding of the
//! `/api/v1` response envelope.

use crate::error::PrometheusError;
use crate::models::{ApiResponse, Credentials, ResponseStatus};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

/// HTTP client wrapper with authentication
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
    credentials: Option<Credentials>,
}

impl HttpClient {
    /// Create a new HTTP client wrapper
    pub fn new(client: Client, base_url: &str, credentials: Option<Credentials>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        }
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build a full URL from a path
    pub fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            Some(Credentials::Bearer(token)) => request.bearer_auth(token),
            Some(Credentials::Basic { username, password }) => {
                request.basic_auth(username, Some(password))
            }
            None => request,
        }
    }

    /// GET an endpoint that answers with plain text (`/-/ready`, `/-/healthy`)
    pub async fn get_text(&self, path: &str) -> Result<String, PrometheusError> {
        let url = self.build_url(path);
        debug!("GET {}", url);

        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(PrometheusError::Http)?;

        let status = response.status();
        let body = response.text().await?;
        check_status(path, status, &body)?;
        Ok(body)
    }

    /// GET an `/api/v1` endpoint and unwrap the response envelope
    pub async fn get_api<T: DeserializeOwned>(&self, path: &str) -> Result<T, PrometheusError> {
        let url = self.build_url(path);
        debug!("GET {}", url);

        let response = self
            .authorize(self.client.get(&url))
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(PrometheusError::Http)?;

        let status = response.status();
        let body = response.text().await?;
        decode_envelope(path, status, &body)
    }
}

/// Maps HTTP status codes onto client errors
pub(crate) fn check_status(path: &str, status: StatusCode, body: &str) -> Result<(), PrometheusError> {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(PrometheusError::Authentication(format!(
            "GET {} returned {}",
            path, status
        )));
    }

    if status == StatusCode::NOT_FOUND {
        return Err(PrometheusError::NotFound(format!(
            "GET {} returned 404, is this a Prometheus API endpoint?",
            path
        )));
    }

    if !status.is_success() {
        return Err(PrometheusError::Api(format!(
            "GET {} failed: {} - {}",
            path,
            status,
            body.chars().take(500).collect::<String>()
        )));
    }

    Ok(())
}

/// Decodes an `/api/v1` envelope.
///
/// Prometheus answers API errors with a non-2xx code and an error envelope,
/// so the envelope is inspected before the status code.
pub(crate) fn decode_envelope<T: DeserializeOwned>(
    path: &str,
    status: StatusCode,
    body: &str,
) -> Result<T, PrometheusError> {
    let envelope = serde_json::from_str::<ApiResponse<T>>(body);

    if let Ok(ApiResponse {
        status: ResponseStatus::Error,
        error_type,
        error,
        ..
    }) = &envelope
    {
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            check_status(path, status, body)?;
        }
        return Err(PrometheusError::Api(format!(
            "GET {} failed: {}: {}",
            path,
            error_type.as_deref().unwrap_or("unknown"),
            error.as_deref().unwrap_or("no error message")
        )));
    }

    check_status(path, status, body)?;

    let envelope = envelope.map_err(|e| {
        PrometheusError::Api(format!(
            "error decoding response body: {} - Response (first 500 chars): {}",
            e,
            body.chars().take(500).collect::<String>()
        ))
    })?;

    envelope
        .data
        .ok_or_else(|| PrometheusError::Api(format!("GET {} returned no data", path)))
}
