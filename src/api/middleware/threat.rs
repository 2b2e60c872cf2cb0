// Start of file: /src/api/middleware/threat.rs

/*
    * Front-line request filter: refuses blocked IPs on the security endpoints
    * and rejects requests carrying SQL injection or XSS signatures.
*/

use axum::{
    body::{to_bytes, Body, Bytes},
    extract::{Query, Request, State},
    http::{Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde_json::json;
use tracing::{error, warn};

use crate::api::middleware::audit::SECURITY_PREFIX;
use crate::config::state::AppState;
use crate::models::{EventType, NewEvent, RequestMeta};
use crate::security::{
    audit::record_or_log,
    inspection::{inspect, preview, Threat},
};
use crate::utils::{request_meta::capture, response_handler::HandlerResponse};

const AUTH_PREFIX: &str = "/auth/";

pub async fn threat_detection_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let meta: RequestMeta = capture(
        request.method(),
        request.uri(),
        request.headers(),
        request.extensions(),
    );

    // 1. Blocked IPs never reach the security endpoints
    if meta.path.starts_with(SECURITY_PREFIX) {
        if let Some(ip) = meta.ip_address {
            match state.store.is_blocked(ip, Utc::now()).await {
                Ok(true) => {
                    record_or_log(
                        &state.store,
                        NewEvent::new(EventType::UnauthorizedAccess)
                            .request(&meta)
                            .description(format!("Blocked IP attempted access: {ip}"))
                            .status(StatusCode::FORBIDDEN.as_u16()),
                    )
                    .await;
                    return reject(StatusCode::FORBIDDEN, "Access denied");
                }
                Ok(false) => {}
                Err(e) => error!("Block lookup for {} failed: {:#}", ip, e),
            }
        }
    }

    // 2. Path and decoded query string
    let mut payload: String = meta.path.clone();
    if let Some(raw) = request.uri().query() {
        payload.push(' ');
        payload.push_str(raw);
    }
    if let Ok(Query(pairs)) = Query::<Vec<(String, String)>>::try_from_uri(request.uri()) {
        for (key, value) in pairs {
            payload.push(' ');
            payload.push_str(&key);
            payload.push('=');
            payload.push_str(&value);
        }
    }

    // 3. Bodies of auth submissions
    let request: Request = if inspects_body(request.method(), &meta.path) {
        let (parts, body) = request.into_parts();
        let bytes: Bytes = match to_bytes(body, state.environment.max_request_body_size).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Rejecting unreadable body on {}: {}", meta.path, e);
                return HandlerResponse::new(StatusCode::PAYLOAD_TOO_LARGE)
                    .message("Request body too large")
                    .into_response();
            }
        };
        payload.push(' ');
        payload.push_str(&String::from_utf8_lossy(&bytes));
        Request::from_parts(parts, Body::from(bytes))
    } else {
        request
    };

    if let Some(threat) = inspect(&payload) {
        record_threat(&state, &meta, threat, &payload).await;
        return reject(StatusCode::BAD_REQUEST, "Malicious request detected");
    }

    next.run(request).await
}

fn inspects_body(method: &Method, path: &str) -> bool {
    path.starts_with(AUTH_PREFIX) && matches!(*method, Method::POST | Method::PUT | Method::PATCH)
}

async fn record_threat(state: &AppState, meta: &RequestMeta, threat: Threat, payload: &str) {
    let ip: String = meta
        .ip_address
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    record_or_log(
        &state.store,
        NewEvent::new(threat.event_type())
            .request(meta)
            .description(format!("{} pattern from {}", threat.label(), ip))
            .extra("preview", preview(payload))
            .status(StatusCode::BAD_REQUEST.as_u16()),
    )
    .await;
}

fn reject(status: StatusCode, message: &str) -> Response {
    HandlerResponse::new(status)
        .data(json!({ "error": message }))
        .bare()
        .into_response()
}

// End of file: /src/api/middleware/threat.rs
