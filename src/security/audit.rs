// Start of file: /src/security/audit.rs

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{error, info, warn};

use crate::database::SecurityStore;
use crate::models::{AuditEvent, NewEvent};

/// Persists an event and mirrors it to the structured log.
/// HIGH and CRITICAL events are logged at `warn`, the rest at `info`.
pub async fn record_event(store: &SecurityStore, event: NewEvent) -> Result<AuditEvent> {
    let event: AuditEvent = event.into_event(Utc::now());

    store
        .insert_event(&event)
        .await
        .with_context(|| format!("Failed to store {} event", event.event_type))?;

    let ip: String = event
        .ip_address
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| "-".to_string());

    if event.severity.is_elevated() {
        warn!(
            event_type = %event.event_type,
            severity = %event.severity,
            ip = %ip,
            user = %event.actor(),
            "{}",
            event.description
        );
    } else {
        info!(
            event_type = %event.event_type,
            severity = %event.severity,
            ip = %ip,
            user = %event.actor(),
            "{}",
            event.description
        );
    }

    Ok(event)
}

/// Like `record_event` but never fails the caller; storage errors are logged.
pub async fn record_or_log(store: &SecurityStore, event: NewEvent) {
    let event_type = event.event_type;
    if let Err(e) = record_event(store, event).await {
        error!("Audit write for {} dropped: {:#}", event_type, e);
    }
}


// End of file: /src/security/audit.rs
