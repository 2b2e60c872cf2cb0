// Security operations handlers: dashboard, event ingest, SIEM export,
// IP blocking and alert triage

use std::net::IpAddr;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Extension, Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::middleware::admin::AuthenticatedUser;
use crate::config::state::AppState;
use crate::models::{
    AlertStatus, AuditEvent, BlockedIp, DashboardSnapshot, EventType, NewEvent, RequestMeta,
    Severity, ThreatAlert,
};
use crate::security::{
    audit::{record_event, record_or_log},
    detection,
};
use crate::utils::response_handler::HandlerResponse;

pub const DEFAULT_EXPORT_LIMIT: usize = 100;
pub const MAX_EXPORT_LIMIT: usize = 1_000;
pub const DEFAULT_ALERT_LIMIT: usize = 50;
pub const MAX_ALERT_LIMIT: usize = 500;

const DEFAULT_BLOCK_REASON: &str = "Manual block by admin";

// =============================================================================
// DTOs
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct IngestEventRequest {
    pub event_type: String,
    pub severity: Option<String>,
    pub ip_address: Option<String>,
    pub username_attempted: Option<String>,
    pub description: Option<String>,
    pub extra_data: Option<Value>,
    pub request_method: Option<String>,
    pub request_path: Option<String>,
    pub user_agent: Option<String>,
    pub status_code: Option<u16>,
}

#[derive(Debug, Deserialize)]
pub struct ExportParams {
    pub format: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BlockIpRequest {
    pub ip_address: Option<String>,
    pub reason: Option<String>,
    pub duration_minutes: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UnblockIpRequest {
    pub ip_address: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AlertListParams {
    pub status: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AlertUpdateRequest {
    pub status: String,
}

/// SIEM export renderings
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Cef,
}

impl ExportFormat {
    fn parse(value: Option<&str>) -> Result<Self, ApiError> {
        match value.map(str::to_ascii_lowercase).as_deref() {
            None | Some("json") => Ok(ExportFormat::Json),
            Some("cef") => Ok(ExportFormat::Cef),
            Some(other) => Err(ApiError::BadRequest(format!(
                "Unsupported export format '{other}', expected json or cef"
            ))),
        }
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

/// Composite dashboard query polled by the operations client
#[instrument(name = "security_dashboard", skip(state, admin), fields(admin = %admin.email))]
pub async fn dashboard_handler(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthenticatedUser>,
) -> Result<HandlerResponse, ApiError> {
    let snapshot: DashboardSnapshot = state.store.dashboard(Utc::now()).await?;

    info!(
        "Dashboard served: {} open alerts, {} blocked IPs",
        snapshot.summary.open_alerts, snapshot.summary.blocked_ips
    );

    let body: Value = serde_json::to_value(&snapshot)
        .map_err(|e| ApiError::Internal(anyhow::Error::new(e)))?;
    Ok(HandlerResponse::new(StatusCode::OK).data(body).bare())
}

/// Records an event reported by another system.
/// Severity is classified from the event type unless given explicitly.
#[instrument(name = "ingest_event", skip(state, admin, meta, payload))]
pub async fn ingest_event_handler(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthenticatedUser>,
    meta: RequestMeta,
    payload: Result<Json<IngestEventRequest>, JsonRejection>,
) -> Result<HandlerResponse, ApiError> {
    let Json(request) = payload?;

    let event_type: EventType = request.event_type.parse()?;
    let ip: Option<IpAddr> = request.ip_address.as_deref().map(parse_ip).transpose()?;

    let mut event: NewEvent = NewEvent::new(event_type)
        .ip(ip)
        .path(request.request_path.unwrap_or_default())
        .attempted(request.username_attempted.unwrap_or_default())
        .description(request.description.unwrap_or_default())
        .extra("reported_by", admin.email.clone());
    event.meta.method = request.request_method.unwrap_or_default();
    event.meta.user_agent = request.user_agent.unwrap_or(meta.user_agent);

    if let Some(severity) = request.severity.as_deref() {
        event = event.severity(severity.parse::<Severity>()?);
    }
    if let Some(code) = request.status_code {
        event = event.status(code);
    }
    match request.extra_data {
        None | Some(Value::Null) => {}
        Some(Value::Object(extra)) => {
            for (key, value) in extra {
                event = event.extra(&key, value);
            }
        }
        Some(_) => {
            return Err(ApiError::BadRequest("extra_data must be a JSON object".to_string()));
        }
    }

    let stored: AuditEvent = record_event(&state.store, event).await?;

    // Failed logins reported by other systems feed the same correlation rules
    let raised: Vec<ThreatAlert> = match (stored.event_type, stored.ip_address) {
        (EventType::LoginFailed, Some(ip)) => {
            detection::analyze_failed_login(&state.store, ip, Utc::now()).await?
        }
        _ => Vec::new(),
    };

    Ok(HandlerResponse::new(StatusCode::CREATED)
        .data(json!({ "event": stored, "alerts_raised": raised.len() }))
        .message("Event recorded"))
}

/// Newest audit events rendered for a SIEM
#[instrument(name = "siem_export", skip(state, admin, meta, params), fields(admin = %admin.email))]
pub async fn export_handler(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthenticatedUser>,
    meta: RequestMeta,
    params: Result<Query<ExportParams>, QueryRejection>,
) -> Result<HandlerResponse, ApiError> {
    let Query(params) = params?;
    let format: ExportFormat = ExportFormat::parse(params.format.as_deref())?;
    let limit: usize = parse_limit(params.limit.as_deref(), DEFAULT_EXPORT_LIMIT, MAX_EXPORT_LIMIT)?;

    let events: Vec<AuditEvent> = state.store.recent_events(limit).await?;

    let body: Value = match format {
        ExportFormat::Json => json!({
            "format": "JSON-SIEM",
            "total": events.len(),
            "logs": events.iter().map(AuditEvent::to_siem).collect::<Vec<Value>>(),
        }),
        ExportFormat::Cef => json!({
            "format": "CEF",
            "logs": events.iter().map(AuditEvent::to_cef).collect::<Vec<String>>(),
        }),
    };

    record_or_log(
        &state.store,
        NewEvent::new(EventType::DataExport)
            .request(&meta)
            .user(admin.user_id, admin.email.clone())
            .description(format!("SIEM export of {} events", events.len()))
            .extra("format", if format == ExportFormat::Cef { "cef" } else { "json" })
            .extra("count", events.len())
            .status(StatusCode::OK.as_u16()),
    )
    .await;

    Ok(HandlerResponse::new(StatusCode::OK).data(body).bare())
}

/// Manually blocks an IP, permanently unless a duration is given
#[instrument(name = "block_ip", skip(state, admin, meta, payload), fields(admin = %admin.email))]
pub async fn block_ip_handler(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthenticatedUser>,
    meta: RequestMeta,
    payload: Result<Json<BlockIpRequest>, JsonRejection>,
) -> Result<HandlerResponse, ApiError> {
    let Json(request) = payload?;
    let ip: IpAddr = required_ip(request.ip_address.as_deref())?;

    let now: DateTime<Utc> = Utc::now();
    let blocked_until: Option<DateTime<Utc>> = match request.duration_minutes {
        None => None,
        Some(minutes) => Some(block_expiry(now, minutes)?),
    };
    let reason: String = request
        .reason
        .filter(|r| !r.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_BLOCK_REASON.to_string());

    let created: bool = state
        .store
        .upsert_block(&BlockedIp {
            ip_address: ip,
            reason: reason.clone(),
            blocked_at: now,
            blocked_until,
            is_active: true,
            auto_blocked: false,
        })
        .await?;

    record_or_log(
        &state.store,
        NewEvent::new(EventType::SuspiciousActivity)
            .request(&meta)
            .user(admin.user_id, admin.email.clone())
            .description(format!("Admin manually blocked IP: {ip}"))
            .extra("blocked_ip", ip.to_string())
            .extra("reason", reason),
    )
    .await;

    let message: String = format!("IP {ip} has been blocked");
    Ok(HandlerResponse::new(StatusCode::OK)
        .data(json!({ "message": message, "created": created }))
        .message(message))
}

/// Lifts an active block
#[instrument(name = "unblock_ip", skip(state, admin, meta, payload), fields(admin = %admin.email))]
pub async fn unblock_ip_handler(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthenticatedUser>,
    meta: RequestMeta,
    payload: Result<Json<UnblockIpRequest>, JsonRejection>,
) -> Result<HandlerResponse, ApiError> {
    let Json(request) = payload?;
    let ip: IpAddr = required_ip(request.ip_address.as_deref())?;

    if !state.store.deactivate_block(ip).await? {
        return Err(ApiError::NotFound(format!("No active block for {ip}")));
    }

    record_or_log(
        &state.store,
        NewEvent::new(EventType::PermissionChange)
            .request(&meta)
            .user(admin.user_id, admin.email.clone())
            .description(format!("Admin unblocked IP: {ip}"))
            .extra("unblocked_ip", ip.to_string()),
    )
    .await;

    let message: String = format!("IP {ip} has been unblocked");
    Ok(HandlerResponse::new(StatusCode::OK)
        .data(json!({ "message": message }))
        .message(message))
}

/// Alerts newest first, optionally filtered by status
#[instrument(name = "list_alerts", skip(state, params))]
pub async fn list_alerts_handler(
    State(state): State<AppState>,
    params: Result<Query<AlertListParams>, QueryRejection>,
) -> Result<HandlerResponse, ApiError> {
    let Query(params) = params?;
    let status: Option<AlertStatus> = params
        .status
        .as_deref()
        .map(str::parse::<AlertStatus>)
        .transpose()?;
    let limit: usize = parse_limit(params.limit.as_deref(), DEFAULT_ALERT_LIMIT, MAX_ALERT_LIMIT)?;

    let alerts: Vec<ThreatAlert> = state.store.list_alerts(status, limit).await?;

    Ok(HandlerResponse::new(StatusCode::OK)
        .data(json!({ "alerts": alerts, "count": alerts.len() }))
        .message(format!("{} alerts", alerts.len())))
}

/// Moves an alert through triage. Closing statuses stamp `resolved_at`.
#[instrument(name = "update_alert", skip(state, admin, meta, id, payload), fields(admin = %admin.email))]
pub async fn update_alert_handler(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthenticatedUser>,
    meta: RequestMeta,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<AlertUpdateRequest>, JsonRejection>,
) -> Result<HandlerResponse, ApiError> {
    let Path(id) = id?;
    let Json(request) = payload?;
    let status: AlertStatus = request.status.parse()?;

    let alert: ThreatAlert = state
        .store
        .set_alert_status(id, status, Utc::now())
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Alert {id} not found")))?;

    let mut details: Map<String, Value> = Map::new();
    details.insert("alert_id".to_string(), json!(id));
    details.insert("status".to_string(), json!(status));

    record_or_log(
        &state.store,
        NewEvent::new(EventType::PermissionChange)
            .request(&meta)
            .user(admin.user_id, admin.email.clone())
            .description(format!("Alert {id} moved to {status}"))
            .extra("alert", Value::Object(details)),
    )
    .await;

    Ok(HandlerResponse::new(StatusCode::OK)
        .data(json!({ "alert": alert }))
        .message("Alert updated"))
}

// =============================================================================
// HELPERS
// =============================================================================

fn parse_ip(raw: &str) -> Result<IpAddr, ApiError> {
    raw.trim()
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("'{raw}' is not a valid IP address")))
}

fn required_ip(raw: Option<&str>) -> Result<IpAddr, ApiError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => parse_ip(raw),
        None => Err(ApiError::BadRequest("ip_address required".to_string())),
    }
}

/// End of a timed block; rejects non-positive and unrepresentable durations
fn block_expiry(now: DateTime<Utc>, minutes: i64) -> Result<DateTime<Utc>, ApiError> {
    if minutes <= 0 {
        return Err(ApiError::BadRequest(
            "duration_minutes must be a positive number".to_string(),
        ));
    }
    Duration::try_minutes(minutes)
        .and_then(|duration| now.checked_add_signed(duration))
        .ok_or_else(|| {
            ApiError::BadRequest(format!("duration_minutes {minutes} is out of range"))
        })
}

/// Missing means `default`; values above `max` are clamped
fn parse_limit(raw: Option<&str>, default: usize, max: usize) -> Result<usize, ApiError> {
    match raw {
        None => Ok(default),
        Some(raw) => match raw.trim().parse::<usize>() {
            Ok(0) | Err(_) => Err(ApiError::BadRequest(format!(
                "limit must be a positive integer, got '{raw}'"
            ))),
            Ok(limit) => Ok(limit.min(max)),
        },
    }
}
