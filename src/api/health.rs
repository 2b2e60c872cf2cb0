// Liveness endpoint

use axum::{extract::State, http::StatusCode, routing::get, Router};
use serde_json::json;
use tracing::instrument;

use crate::config::state::AppState;
use crate::utils::response_handler::HandlerResponse;

/// Reports version and the active backends
#[instrument(skip(state))]
pub async fn health_handler(State(state): State<AppState>) -> HandlerResponse {
    HandlerResponse::new(StatusCode::OK)
        .data(json!({
            "version": env!("CARGO_PKG_VERSION"),
            "environment": state.environment.environment,
            "storage": state.store.backend_name(),
            "sessions": state.environment.session_backend.as_str(),
        }))
        .message("Service is healthy")
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_handler))
}
