use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};

use crate::api::middleware::admin::bearer_token;
use crate::config::state::AppState;
use crate::models::{EventType, NewEvent, RequestMeta, User};
use crate::security::audit::record_or_log;
use crate::security::auth::{self, AuthError, LoginOutcome};
use crate::utils::response_handler::HandlerResponse;

// =============================================================================
// DTOs
// =============================================================================

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub full_name: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh: String,
}

// =============================================================================
// HANDLERS
// =============================================================================

/// Login and open a session.
/// 200 `{access, refresh, user}`, 429 blocked IP, 403 locked account, 401 otherwise.
#[instrument(name = "login", skip(state, payload), fields(ip = ?meta.ip_address))]
pub async fn login(
    State(state): State<AppState>,
    meta: RequestMeta,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<HandlerResponse, AuthError> {
    let Json(credentials) = match payload {
        Ok(json) => json,
        Err(rejection) => {
            auth::reject_blocked_ip(&state, &meta, "").await?;

            record_or_log(
                &state.store,
                NewEvent::new(EventType::LoginFailed)
                    .request(&meta)
                    .description("Invalid request format")
                    .extra("errors", rejection.body_text())
                    .status(StatusCode::BAD_REQUEST.as_u16()),
            )
            .await;
            return Err(AuthError::MalformedRequest(rejection.body_text()));
        }
    };

    let outcome: LoginOutcome =
        auth::login(&state, &meta, &credentials.email, &credentials.password).await?;

    Ok(HandlerResponse::new(StatusCode::OK)
        .data(json!({
            "access": outcome.tokens.access,
            "refresh": outcome.tokens.refresh,
            "user": outcome.user,
        }))
        .bare())
}

/// Register a new (non-staff) account
#[instrument(name = "register", skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    meta: RequestMeta,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<HandlerResponse, AuthError> {
    let Json(request) = payload.map_err(|r| AuthError::MalformedRequest(r.body_text()))?;

    let user: User = auth::register(
        &state,
        &meta,
        &request.email,
        &request.password,
        request.full_name,
    )
    .await?;

    info!("Registered {}", user.email);
    Ok(HandlerResponse::new(StatusCode::CREATED)
        .data(json!({ "user": user }))
        .message("Account created successfully"))
}

/// Exchange a refresh token for a new access token
#[instrument(name = "refresh", skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    meta: RequestMeta,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<HandlerResponse, AuthError> {
    let Json(request) = payload.map_err(|r| AuthError::MalformedRequest(r.body_text()))?;

    let access: String = auth::refresh(&state, &meta, &request.refresh).await?;

    Ok(HandlerResponse::new(StatusCode::OK)
        .data(json!({ "access": access }))
        .bare())
}

/// Revoke the caller's session
#[instrument(name = "logout", skip(state, headers))]
pub async fn logout(
    State(state): State<AppState>,
    meta: RequestMeta,
    headers: HeaderMap,
) -> Result<HandlerResponse, AuthError> {
    let token: &str = bearer_token(&headers).ok_or(AuthError::MissingToken)?;

    auth::logout(&state, &meta, token).await?;

    Ok(HandlerResponse::new(StatusCode::OK).message("Logged out"))
}
