use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};

use crate::config::state::AppState;
use crate::models::{EventType, NewEvent, RequestMeta};
use crate::security::audit::record_or_log;
use crate::utils::request_meta::capture;

pub const SECURITY_PREFIX: &str = "/security";

/// Records every failed response served under `/security`.
/// 401 is audited as UNAUTHORIZED_ACCESS, any other error as SUSPICIOUS_ACTIVITY.
pub async fn security_audit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let audited: Option<RequestMeta> = request
        .uri()
        .path()
        .starts_with(SECURITY_PREFIX)
        .then(|| capture(request.method(), request.uri(), request.headers(), request.extensions()));

    let response: Response = next.run(request).await;
    let status: StatusCode = response.status();

    if let Some(meta) = audited {
        if status.as_u16() >= 400 {
            let event_type: EventType = if status == StatusCode::UNAUTHORIZED {
                EventType::UnauthorizedAccess
            } else {
                EventType::SuspiciousActivity
            };

            record_or_log(
                &state.store,
                NewEvent::new(event_type)
                    .description(format!("HTTP {} on {}", status.as_u16(), meta.path))
                    .request(&meta)
                    .status(status.as_u16()),
            )
            .await;
        }
    }

    response
}
