//! Liveness and readiness handlers.

use super::AppState;
use axum::{extract::State, http::StatusCode};
use std::sync::atomic::Ordering;

pub async fn liveness() -> &'static str {
    "OK"
}

/// Ready once both resource watchers have been started.
#[tracing::instrument(skip(state))]
pub async fn readiness(State(state): State<AppState>) -> Result<&'static str, StatusCode> {
    if state.readiness.load(Ordering::Acquire) {
        Ok("READY")
    } else {
        Err(StatusCode::SERVICE_UNAVAILABLE)
    }
}
