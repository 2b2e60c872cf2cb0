// Security operations route definitions. Every route requires a staff session.

use axum::{
    middleware::from_fn_with_state,
    routing::{get, patch, post},
    Router,
};

use crate::api::middleware::admin::require_admin;
use crate::config::state::AppState;
use super::handler;

pub fn security_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/security/dashboard", get(handler::dashboard_handler))
        .route("/security/events", post(handler::ingest_event_handler))
        .route("/security/export", get(handler::export_handler))
        .route("/security/block-ip", post(handler::block_ip_handler))
        .route("/security/unblock-ip", post(handler::unblock_ip_handler))
        .route("/security/alerts", get(handler::list_alerts_handler))
        .route("/security/alerts/{id}", patch(handler::update_alert_handler))
        .route_layer(from_fn_with_state(state, require_admin))
}
