use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::config::state::AppState;
use crate::database::SessionRecord;
use crate::security::auth::{self, AuthError};

/// Staff member resolved from the bearer token, stored in request extensions
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub email: String,
}

/// Token from an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| {
            value
                .strip_prefix("Bearer ")
                .or_else(|| value.strip_prefix("bearer "))
        })
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Middleware admitting only staff sessions.
/// 401 without a live access token, 403 for non-staff accounts.
pub async fn require_admin(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    // 1. Extract the bearer token
    let token: &str = bearer_token(&headers).ok_or(AuthError::MissingToken)?;

    // 2. Resolve the session
    let session: SessionRecord = auth::authenticate(&state, token).await?;

    // 3. Staff only
    if !session.is_staff {
        tracing::warn!("Non-staff account {} denied security access", session.email);
        return Err(AuthError::Forbidden);
    }

    request.extensions_mut().insert(AuthenticatedUser {
        user_id: session.user_id,
        email: session.email,
    });

    Ok(next.run(request).await)
}
