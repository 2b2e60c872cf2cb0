// Start of file: /src/security/auth.rs

/*
    * Authentication flows: login with progressive lockout, registration,
    * token refresh and logout. Tokens are opaque and live in the session store.
*/

use anyhow::{anyhow, Context};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use thiserror::Error;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::config::{environment::EnvironmentVariables, state::AppState};
use crate::database::{FailedLogin, SecurityStore, SessionRecord, StoreError, TokenKind};
use crate::models::{EventType, NewEvent, RequestMeta, User};
use crate::security::{audit::record_or_log, detection};
use crate::utils::response_handler::HandlerResponse;

pub const MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Too many failed attempts. Please try again later.")]
    IpBlocked,

    #[error("Account is temporarily locked. Please try again later.")]
    AccountLocked,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid request format: {0}")]
    MalformedRequest(String),

    #[error("{0}")]
    Validation(String),

    #[error("Email already registered")]
    EmailTaken,

    #[error("Authentication credentials were not provided")]
    MissingToken,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Admin privileges required")]
    Forbidden,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::IpBlocked => StatusCode::TOO_MANY_REQUESTS,
            AuthError::AccountLocked | AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::InvalidCredentials | AuthError::MissingToken | AuthError::InvalidToken => {
                StatusCode::UNAUTHORIZED
            }
            AuthError::MalformedRequest(_) | AuthError::Validation(_) => StatusCode::BAD_REQUEST,
            AuthError::EmailTaken => StatusCode::CONFLICT,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict => AuthError::EmailTaken,
            StoreError::Backend(e) => AuthError::Internal(e),
        }
    }
}

// Auth failures keep the bare `{ "error": ... }` body the login client reads
impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let message: String = match &self {
            AuthError::Internal(e) => {
                error!("Auth flow failed: {:#}", e);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        HandlerResponse::new(self.status_code())
            .data(json!({ "error": message }))
            .bare()
            .into_response()
    }
}

/// Tokens handed to a client after a successful login
#[derive(Debug, Clone)]
pub struct IssuedTokens {
    pub access: String,
    pub refresh: String,
}

#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub tokens: IssuedTokens,
    pub user: User,
}

/// Validates credentials for `email` and opens a session.
///
/// Order of checks: blocked IP (429), locked account (403), then password
/// verification (401). Every failure is audited and feeds the detection rules.
#[instrument(skip(state, password), fields(ip = ?meta.ip_address))]
pub async fn login(
    state: &AppState,
    meta: &RequestMeta,
    email: &str,
    password: &str,
) -> Result<LoginOutcome, AuthError> {
    let store: &SecurityStore = &state.store;
    let env: &EnvironmentVariables = &state.environment;
    let now: DateTime<Utc> = Utc::now();

    reject_blocked_ip(state, meta, email).await?;

    let user: Option<User> = store.find_user_by_email(email).await?;

    if let Some(account) = user.as_ref() {
        if account.is_locked_at(now) {
            return Err(reject_locked(store, meta, account).await);
        }

        if account.lock_expired_at(now) && store.clear_expired_lock(account.id, now).await? {
            record_or_log(
                store,
                NewEvent::new(EventType::AccountUnlocked)
                    .request(meta)
                    .user(account.id, account.email.clone())
                    .description("Lockout window elapsed"),
            )
            .await;
        }
    }

    let verified: bool = match user.as_ref() {
        Some(account) => verify_password(password, &account.password_hash).await?,
        None => false,
    };

    match user {
        Some(account) if verified => open_session(state, meta, account, now).await,
        other => {
            register_failure(store, env, meta, email, other.as_ref(), now).await?;
            Err(AuthError::InvalidCredentials)
        }
    }
}

async fn reject_locked(store: &SecurityStore, meta: &RequestMeta, account: &User) -> AuthError {
    record_or_log(
        store,
        NewEvent::new(EventType::UnauthorizedAccess)
            .request(meta)
            .user(account.id, account.email.clone())
            .description("Attempt to login to locked account")
            .status(StatusCode::FORBIDDEN.as_u16()),
    )
    .await;
    AuthError::AccountLocked
}

/// Fails with `IpBlocked` while the client IP is under an effective block
pub async fn reject_blocked_ip(
    state: &AppState,
    meta: &RequestMeta,
    attempted: &str,
) -> Result<(), AuthError> {
    let Some(ip) = meta.ip_address else {
        return Ok(());
    };

    if !state.store.is_blocked(ip, Utc::now()).await? {
        return Ok(());
    }

    record_or_log(
        &state.store,
        NewEvent::new(EventType::RateLimitExceeded)
            .request(meta)
            .attempted(attempted)
            .description(format!("Login attempt from blocked IP {ip}"))
            .status(StatusCode::TOO_MANY_REQUESTS.as_u16()),
    )
    .await;
    Err(AuthError::IpBlocked)
}

async fn register_failure(
    store: &SecurityStore,
    env: &EnvironmentVariables,
    meta: &RequestMeta,
    email: &str,
    user: Option<&User>,
    now: DateTime<Utc>,
) -> Result<(), AuthError> {
    let ip: String = meta
        .ip_address
        .map(|ip| ip.to_string())
        .unwrap_or_default();

    record_or_log(
        store,
        NewEvent::new(EventType::LoginFailed)
            .request(meta)
            .attempted(email)
            .description(format!("Failed login for {email}"))
            .extra("email_attempted", email)
            .extra("ip", ip)
            .status(StatusCode::UNAUTHORIZED.as_u16()),
    )
    .await;

    if let Some(account) = user {
        let lockout_until: DateTime<Utc> = Duration::try_minutes(env.account_lockout_minutes)
            .and_then(|window| now.checked_add_signed(window))
            .ok_or_else(|| {
                anyhow!("Lockout window of {} minutes is out of range", env.account_lockout_minutes)
            })?;
        let max_failures: i32 = i32::try_from(env.max_failed_logins)
            .context("MAX_FAILED_LOGINS out of range")?;

        let counted: Option<FailedLogin> = store
            .record_failed_login(account.id, now, max_failures, lockout_until)
            .await?;

        if let Some(FailedLogin { user: locked, locked_now: true }) = counted {
            warn!(
                "Locking {} after {} failed attempts",
                locked.email, locked.failed_login_attempts
            );
            record_or_log(
                store,
                NewEvent::new(EventType::AccountLocked)
                    .request(meta)
                    .user(locked.id, locked.email.clone())
                    .description(format!(
                        "Account locked for {} minutes after {} failed attempts",
                        env.account_lockout_minutes, locked.failed_login_attempts
                    ))
                    .extra("failed_attempts", locked.failed_login_attempts),
            )
            .await;
        }
    }

    if let Some(ip) = meta.ip_address {
        if let Err(e) = detection::analyze_failed_login(store, ip, now).await {
            error!("Threat detection for {} failed: {:#}", ip, e);
        }
    }

    Ok(())
}

async fn open_session(
    state: &AppState,
    meta: &RequestMeta,
    mut user: User,
    now: DateTime<Utc>,
) -> Result<LoginOutcome, AuthError> {
    // A concurrent failure may have locked the account while bcrypt ran
    if !state
        .store
        .record_successful_login(user.id, meta.ip_address, now)
        .await?
    {
        return Err(reject_locked(&state.store, meta, &user).await);
    }
    user.failed_login_attempts = 0;
    user.last_login_ip = meta.ip_address;

    let tokens: IssuedTokens = issue_tokens(state, &user).await?;

    record_or_log(
        &state.store,
        NewEvent::new(EventType::LoginSuccess)
            .request(meta)
            .user(user.id, user.email.clone())
            .description(format!("Successful login for {}", user.email))
            .status(StatusCode::OK.as_u16()),
    )
    .await;

    if user.is_staff {
        record_or_log(
            &state.store,
            NewEvent::new(EventType::AdminLogin)
                .request(meta)
                .user(user.id, user.email.clone())
                .description(format!("Staff login for {}", user.email))
                .status(StatusCode::OK.as_u16()),
        )
        .await;
    }

    info!("Session opened for {} at {}", user.email, now.to_rfc3339());
    Ok(LoginOutcome { tokens, user })
}

async fn issue_tokens(state: &AppState, user: &User) -> Result<IssuedTokens, AuthError> {
    let refresh: String = Uuid::new_v4().simple().to_string();
    let refresh_record: SessionRecord = SessionRecord {
        user_id: user.id,
        email: user.email.clone(),
        is_staff: user.is_staff,
        refresh_token: None,
    };
    state
        .sessions
        .put(
            TokenKind::Refresh,
            &refresh,
            &refresh_record,
            state.environment.refresh_token_ttl_seconds,
        )
        .await?;

    let access: String = issue_access_token(state, &refresh, &refresh_record).await?;
    Ok(IssuedTokens { access, refresh })
}

async fn issue_access_token(
    state: &AppState,
    refresh: &str,
    owner: &SessionRecord,
) -> Result<String, AuthError> {
    let access: String = Uuid::new_v4().simple().to_string();
    let record: SessionRecord = SessionRecord {
        refresh_token: Some(refresh.to_string()),
        ..owner.clone()
    };
    state
        .sessions
        .put(
            TokenKind::Access,
            &access,
            &record,
            state.environment.access_token_ttl_seconds,
        )
        .await?;
    Ok(access)
}

/// Creates a non-staff account
#[instrument(skip(state, password, full_name))]
pub async fn register(
    state: &AppState,
    meta: &RequestMeta,
    email: &str,
    password: &str,
    full_name: Option<String>,
) -> Result<User, AuthError> {
    validate_email(email)?;
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }

    let hash: String = hash_password(password, state.environment.bcrypt_cost).await?;
    let user: User = state
        .store
        .create_user(User::new(email, hash, full_name, false, Utc::now()))
        .await?;

    record_or_log(
        &state.store,
        NewEvent::new(EventType::AccountCreated)
            .request(meta)
            .user(user.id, user.email.clone())
            .description(format!("New account created: {}", user.email))
            .status(StatusCode::CREATED.as_u16()),
    )
    .await;

    Ok(user)
}

/// Trades a live refresh token for a new access token
#[instrument(skip_all)]
pub async fn refresh(state: &AppState, meta: &RequestMeta, refresh: &str) -> Result<String, AuthError> {
    let owner: SessionRecord = state
        .sessions
        .get(TokenKind::Refresh, refresh)
        .await?
        .ok_or(AuthError::InvalidToken)?;

    let access: String = issue_access_token(state, refresh, &owner).await?;

    record_or_log(
        &state.store,
        NewEvent::new(EventType::TokenRefresh)
            .request(meta)
            .user(owner.user_id, owner.email.clone())
            .description(format!("Access token refreshed for {}", owner.email)),
    )
    .await;

    Ok(access)
}

/// Revokes the access token and the refresh token it was issued from,
/// which also invalidates every other access token of that session
#[instrument(skip_all)]
pub async fn logout(state: &AppState, meta: &RequestMeta, access: &str) -> Result<(), AuthError> {
    let session: SessionRecord = authenticate(state, access).await?;

    state.sessions.revoke(TokenKind::Access, access).await?;
    if let Some(refresh) = session.refresh_token.as_deref() {
        state.sessions.revoke(TokenKind::Refresh, refresh).await?;
    }

    record_or_log(
        &state.store,
        NewEvent::new(EventType::Logout)
            .request(meta)
            .user(session.user_id, session.email.clone())
            .description(format!("Logout for {}", session.email)),
    )
    .await;

    Ok(())
}

/// Resolves a bearer access token to its session. An access token dies with
/// the refresh token it was minted from, so logout ends every sibling.
pub async fn authenticate(state: &AppState, access: &str) -> Result<SessionRecord, AuthError> {
    let session: SessionRecord = state
        .sessions
        .get(TokenKind::Access, access)
        .await?
        .ok_or(AuthError::InvalidToken)?;

    if let Some(refresh) = session.refresh_token.as_deref() {
        if state.sessions.get(TokenKind::Refresh, refresh).await?.is_none() {
            return Err(AuthError::InvalidToken);
        }
    }
    Ok(session)
}

/// Creates the configured staff account when it does not exist yet
pub async fn seed_admin(store: &SecurityStore, env: &EnvironmentVariables) -> anyhow::Result<()> {
    let (Some(email), Some(password)) = (env.admin_email.as_deref(), env.admin_password.as_deref())
    else {
        return Ok(());
    };

    if store.find_user_by_email(email).await?.is_some() {
        info!("Admin account {} already present", email);
        return Ok(());
    }

    let hash: String = hash_password(password, env.bcrypt_cost).await?;
    match store
        .create_user(User::new(email, hash, Some("Administrator".to_string()), true, Utc::now()))
        .await
    {
        Ok(user) => {
            info!("Seeded admin account {}", user.email);
            Ok(())
        }
        // Another instance seeded it first
        Err(StoreError::Conflict) => Ok(()),
        Err(StoreError::Backend(e)) => Err(e),
    }
}

fn validate_email(email: &str) -> Result<(), AuthError> {
    let trimmed: &str = email.trim();
    let valid: bool = match trimmed.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !trimmed.chars().any(char::is_whitespace)
        }
        None => false,
    };

    if valid {
        Ok(())
    } else {
        Err(AuthError::Validation("Enter a valid email address".to_string()))
    }
}

pub async fn hash_password(password: &str, cost: u32) -> anyhow::Result<String> {
    let password: String = password.to_string();
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .context("Password hashing task panicked")?
        .context("Failed to hash password")
}

async fn verify_password(password: &str, hash: &str) -> anyhow::Result<bool> {
    let password: String = password.to_string();
    let hash: String = hash.to_string();
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .context("Password verification task panicked")?
        .map_err(|e| anyhow!("Stored password hash is unreadable: {e}"))
}


// End of file: /src/security/auth.rs
