//! Mock PrometheusClient for unit testing
//!
//! Stores canned responses in memory and records how often each endpoint
//! was called.

use crate::error::PrometheusError;
use crate::models::BuildInfo;
use crate::prometheus_trait::PrometheusClientTrait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Canned outcome of a mock call
#[derive(Debug, Clone)]
enum MockOutcome {
    Healthy(BuildInfo),
    /// Build info answers, readiness does not
    NotReady(BuildInfo, String),
    Unauthorized(String),
    Unreachable(String),
    ApiError(String),
}

/// Mock PrometheusClient for testing
#[derive(Debug, Clone)]
pub struct MockPrometheusClient {
    base_url: String,
    outcome: Arc<Mutex<MockOutcome>>,
    calls: Arc<AtomicUsize>,
}

impl MockPrometheusClient {
    /// Create a mock that answers as a healthy Prometheus of `version`
    pub fn new(base_url: impl Into<String>, version: &str) -> Self {
        Self {
            base_url: base_url.into(),
            outcome: Arc::new(Mutex::new(MockOutcome::Healthy(BuildInfo {
                version: version.to_string(),
                ..Default::default()
            }))),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Subsequent calls fail with an authentication error
    pub fn set_unauthorized(&self, message: &str) {
        self.set(MockOutcome::Unauthorized(message.to_string()));
    }

    /// Subsequent calls fail as if the server could not be reached
    pub fn set_unreachable(&self, message: &str) {
        self.set(MockOutcome::Unreachable(message.to_string()));
    }

    /// Subsequent calls fail with a Prometheus API error
    pub fn set_api_error(&self, message: &str) {
        self.set(MockOutcome::ApiError(message.to_string()));
    }

    /// Build info keeps answering but readiness checks fail with `message`
    pub fn set_not_ready(&self, version: &str, message: &str) {
        self.set(MockOutcome::NotReady(
            BuildInfo {
                version: version.to_string(),
                ..Default::default()
            },
            message.to_string(),
        ));
    }

    /// Subsequent calls succeed again with `version`
    pub fn set_healthy(&self, version: &str) {
        self.set(MockOutcome::Healthy(BuildInfo {
            version: version.to_string(),
            ..Default::default()
        }));
    }

    /// Number of API calls made against this mock
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn set(&self, outcome: MockOutcome) {
        if let Ok(mut guard) = self.outcome.lock() {
            *guard = outcome;
        }
    }

    fn respond(&self, readiness: bool) -> Result<BuildInfo, PrometheusError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let outcome = self
            .outcome
            .lock()
            .map_err(|_| PrometheusError::Api("mock state poisoned".to_string()))?
            .clone();

        match outcome {
            MockOutcome::Healthy(info) => Ok(info),
            MockOutcome::NotReady(_, msg) if readiness => Err(PrometheusError::Api(msg)),
            MockOutcome::NotReady(info, _) => Ok(info),
            MockOutcome::Unauthorized(msg) => Err(PrometheusError::Authentication(msg)),
            // reqwest::Error cannot be constructed outside reqwest
            MockOutcome::Unreachable(msg) => Err(PrometheusError::Api(format!("connection refused: {}", msg))),
            MockOutcome::ApiError(msg) => Err(PrometheusError::Api(msg)),
        }
    }
}

#[async_trait::async_trait]
impl PrometheusClientTrait for MockPrometheusClient {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn build_info(&self) -> Result<BuildInfo, PrometheusError> {
        self.respond(false)
    }

    async fn check_ready(&self) -> Result<(), PrometheusError> {
        self.respond(true).map(|_| ())
    }
}
