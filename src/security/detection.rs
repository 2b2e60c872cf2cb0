// Start of file: /src/security/detection.rs

/*
    * Correlation rules run against the audit trail after a failed login.
    * Each rule raises at most one OPEN alert per source IP per window.
*/

use std::net::IpAddr;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use tracing::{instrument, warn};

use crate::database::{EventQuery, SecurityStore};
use crate::models::{AlertType, BlockedIp, EventType, NewEvent, Severity, ThreatAlert};
use crate::security::audit::record_event;

pub const BRUTE_FORCE_THRESHOLD: i64 = 5;
pub const BRUTE_FORCE_WINDOW_MINUTES: i64 = 10;
pub const AUTO_BLOCK_MINUTES: i64 = 60;

/// Enumeration fires strictly above this many auth requests
pub const ENUMERATION_THRESHOLD: i64 = 10;
pub const ENUMERATION_WINDOW_MINUTES: i64 = 5;

const AUTH_PATH_FRAGMENT: &str = "/auth/";

/// Failed logins from one IP within the window. At the threshold a HIGH
/// BRUTE_FORCE alert is raised and the IP is blocked for an hour.
#[instrument(skip(store))]
pub async fn check_brute_force(
    store: &SecurityStore,
    ip: IpAddr,
    now: DateTime<Utc>,
) -> Result<Option<ThreatAlert>> {
    let window_start: DateTime<Utc> = now - Duration::minutes(BRUTE_FORCE_WINDOW_MINUTES);

    let failed: i64 = store
        .count_events(&EventQuery {
            event_type: Some(EventType::LoginFailed),
            ip_address: Some(ip),
            since: Some(window_start),
            ..EventQuery::default()
        })
        .await?;

    if failed < BRUTE_FORCE_THRESHOLD
        || store.has_open_alert(AlertType::BruteForce, ip, window_start).await?
    {
        return Ok(None);
    }

    let alert: ThreatAlert = ThreatAlert::open(
        AlertType::BruteForce,
        Severity::High,
        Some(ip),
        format!(
            "Brute force detected: {failed} failed login attempts from {ip} in {BRUTE_FORCE_WINDOW_MINUTES} minutes"
        ),
        json!({
            "failed_attempts": failed,
            "timewindow": format!("{BRUTE_FORCE_WINDOW_MINUTES} minutes"),
            "ip_address": ip.to_string(),
            "mitre_technique": "T1110.001",
        }),
        "Block IP, notify admin, reset affected account password",
        now,
    );
    store.insert_alert(&alert).await?;

    record_event(
        store,
        NewEvent::new(EventType::BruteForceDetected)
            .ip(Some(ip))
            .description(alert.description.clone())
            .extra("failed_attempts", failed)
            .extra("alert_id", alert.id.to_string()),
    )
    .await?;

    let block: BlockedIp = BlockedIp {
        ip_address: ip,
        reason: format!("Brute force: {failed} failed attempts"),
        blocked_at: now,
        blocked_until: Some(now + Duration::minutes(AUTO_BLOCK_MINUTES)),
        is_active: true,
        auto_blocked: true,
    };
    store.upsert_block(&block).await?;

    warn!("Auto-blocked {} for {} minutes", ip, AUTO_BLOCK_MINUTES);
    Ok(Some(alert))
}

/// Bursts of requests against auth endpoints from one IP.
#[instrument(skip(store))]
pub async fn check_account_enumeration(
    store: &SecurityStore,
    ip: IpAddr,
    now: DateTime<Utc>,
) -> Result<Option<ThreatAlert>> {
    let window_start: DateTime<Utc> = now - Duration::minutes(ENUMERATION_WINDOW_MINUTES);

    let requests: i64 = store
        .count_events(&EventQuery {
            ip_address: Some(ip),
            path_contains: Some(AUTH_PATH_FRAGMENT),
            since: Some(window_start),
            ..EventQuery::default()
        })
        .await?;

    if requests <= ENUMERATION_THRESHOLD
        || store
            .has_open_alert(AlertType::AccountEnumeration, ip, window_start)
            .await?
    {
        return Ok(None);
    }

    let alert: ThreatAlert = ThreatAlert::open(
        AlertType::AccountEnumeration,
        Severity::High,
        Some(ip),
        format!("Account enumeration detected: {requests} auth requests from {ip}"),
        json!({
            "request_count": requests,
            "endpoint": AUTH_PATH_FRAGMENT,
            "mitre_technique": "T1087",
        }),
        "Block IP, investigate for credential stuffing",
        now,
    );
    store.insert_alert(&alert).await?;

    warn!("{}", alert.description);
    Ok(Some(alert))
}

/// Runs every rule for `ip`, returning the alerts raised
pub async fn analyze_failed_login(
    store: &SecurityStore,
    ip: IpAddr,
    now: DateTime<Utc>,
) -> Result<Vec<ThreatAlert>> {
    let mut raised: Vec<ThreatAlert> = Vec::new();
    raised.extend(check_brute_force(store, ip, now).await?);
    raised.extend(check_account_enumeration(store, ip, now).await?);
    Ok(raised)
}


// End of file: /src/security/detection.rs
