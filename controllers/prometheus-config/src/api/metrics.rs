//! GET /metrics

use super::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse};
use tracing::warn;

const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

#[tracing::instrument(skip(state))]
pub async fn get_metrics(State(state): State<AppState>) -> impl IntoResponse {
    if let Some(servers) = &state.servers {
        state.metrics.observe_servers(&servers.state());
    }

    match state.metrics.render() {
        Ok(output) => (StatusCode::OK, [("content-type", CONTENT_TYPE)], output),
        Err(e) => {
            warn!(error = %e, "failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", CONTENT_TYPE)],
                e.to_string(),
            )
        }
    }
}
