// Storage facade for users, audit events, threat alerts and IP blocks.
// Dispatches to the in-memory or Postgres implementation chosen at startup.

use std::net::IpAddr;

use anyhow::Result;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::database::{memory_store::MemoryStore, postgres_service::PostgresStore};
use crate::models::{
    AlertStatus, AlertType, AuditEvent, BlockedIp, DashboardSnapshot, EventType, ThreatAlert, User,
};

/// Failures callers are expected to branch on
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record already exists")]
    Conflict,

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Account state after a failed login was counted
#[derive(Clone, Debug)]
pub struct FailedLogin {
    pub user: User,
    /// This failure is the one that crossed the lockout threshold
    pub locked_now: bool,
}

/// Filter for counting audit events. Unset fields match everything.
#[derive(Clone, Debug, Default)]
pub struct EventQuery {
    pub event_type: Option<EventType>,
    pub ip_address: Option<IpAddr>,
    pub path_contains: Option<&'static str>,
    pub since: Option<DateTime<Utc>>,
}

impl EventQuery {
    pub fn matches(&self, event: &AuditEvent) -> bool {
        self.event_type.is_none_or(|t| event.event_type == t)
            && self.ip_address.is_none_or(|ip| event.ip_address == Some(ip))
            && self.path_contains.is_none_or(|p| event.request_path.contains(p))
            && self.since.is_none_or(|since| event.timestamp >= since)
    }
}

#[derive(Clone, Debug)]
pub enum SecurityStore {
    Memory(MemoryStore),
    Postgres(PostgresStore),
}

impl SecurityStore {
    pub fn backend_name(&self) -> &'static str {
        match self {
            SecurityStore::Memory(_) => "memory",
            SecurityStore::Postgres(_) => "postgres",
        }
    }

    pub async fn create_user(&self, user: User) -> Result<User, StoreError> {
        match self {
            SecurityStore::Memory(s) => s.create_user(user).await,
            SecurityStore::Postgres(s) => s.create_user(user).await,
        }
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        match self {
            SecurityStore::Memory(s) => s.find_user_by_email(email).await,
            SecurityStore::Postgres(s) => s.find_user_by_email(email).await,
        }
    }

    pub async fn find_user(&self, id: Uuid) -> Result<Option<User>> {
        match self {
            SecurityStore::Memory(s) => s.find_user(id).await,
            SecurityStore::Postgres(s) => s.find_user(id).await,
        }
    }

    /// Atomically counts a failed login. Reaching `max_failures` locks the
    /// account until `lockout_until`; an existing lock is never extended.
    /// `None` when the account no longer exists.
    pub async fn record_failed_login(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
        max_failures: i32,
        lockout_until: DateTime<Utc>,
    ) -> Result<Option<FailedLogin>> {
        match self {
            SecurityStore::Memory(s) => {
                s.record_failed_login(id, now, max_failures, lockout_until).await
            }
            SecurityStore::Postgres(s) => {
                s.record_failed_login(id, now, max_failures, lockout_until).await
            }
        }
    }

    /// Resets the failure counter and stamps the login IP, unless a lock is in
    /// force at `now`. Returns false when the account is locked.
    pub async fn record_successful_login(
        &self,
        id: Uuid,
        ip: Option<IpAddr>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        match self {
            SecurityStore::Memory(s) => s.record_successful_login(id, ip, now).await,
            SecurityStore::Postgres(s) => s.record_successful_login(id, ip, now).await,
        }
    }

    /// Clears a lock whose window has passed. Returns true only for the caller
    /// that actually cleared it.
    pub async fn clear_expired_lock(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool> {
        match self {
            SecurityStore::Memory(s) => s.clear_expired_lock(id, now).await,
            SecurityStore::Postgres(s) => s.clear_expired_lock(id, now).await,
        }
    }

    pub async fn insert_event(&self, event: &AuditEvent) -> Result<()> {
        match self {
            SecurityStore::Memory(s) => s.insert_event(event).await,
            SecurityStore::Postgres(s) => s.insert_event(event).await,
        }
    }

    pub async fn count_events(&self, query: &EventQuery) -> Result<i64> {
        match self {
            SecurityStore::Memory(s) => s.count_events(query).await,
            SecurityStore::Postgres(s) => s.count_events(query).await,
        }
    }

    /// Newest first
    pub async fn recent_events(&self, limit: usize) -> Result<Vec<AuditEvent>> {
        match self {
            SecurityStore::Memory(s) => s.recent_events(limit).await,
            SecurityStore::Postgres(s) => s.recent_events(limit).await,
        }
    }

    pub async fn insert_alert(&self, alert: &ThreatAlert) -> Result<()> {
        match self {
            SecurityStore::Memory(s) => s.insert_alert(alert).await,
            SecurityStore::Postgres(s) => s.insert_alert(alert).await,
        }
    }

    /// Whether an OPEN alert of `alert_type` for `ip` was raised at or after `since`
    pub async fn has_open_alert(
        &self,
        alert_type: AlertType,
        ip: IpAddr,
        since: DateTime<Utc>,
    ) -> Result<bool> {
        match self {
            SecurityStore::Memory(s) => s.has_open_alert(alert_type, ip, since).await,
            SecurityStore::Postgres(s) => s.has_open_alert(alert_type, ip, since).await,
        }
    }

    /// Newest first, optionally restricted to one status
    pub async fn list_alerts(
        &self,
        status: Option<AlertStatus>,
        limit: usize,
    ) -> Result<Vec<ThreatAlert>> {
        match self {
            SecurityStore::Memory(s) => s.list_alerts(status, limit).await,
            SecurityStore::Postgres(s) => s.list_alerts(status, limit).await,
        }
    }

    /// Returns the updated alert, or `None` when the id is unknown
    pub async fn set_alert_status(
        &self,
        id: Uuid,
        status: AlertStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<ThreatAlert>> {
        match self {
            SecurityStore::Memory(s) => s.set_alert_status(id, status, now).await,
            SecurityStore::Postgres(s) => s.set_alert_status(id, status, now).await,
        }
    }

    /// Creates or re-activates a block. Returns true when a new row was created.
    pub async fn upsert_block(&self, block: &BlockedIp) -> Result<bool> {
        match self {
            SecurityStore::Memory(s) => s.upsert_block(block).await,
            SecurityStore::Postgres(s) => s.upsert_block(block).await,
        }
    }

    /// Returns false when there was no active block for `ip`
    pub async fn deactivate_block(&self, ip: IpAddr) -> Result<bool> {
        match self {
            SecurityStore::Memory(s) => s.deactivate_block(ip).await,
            SecurityStore::Postgres(s) => s.deactivate_block(ip).await,
        }
    }

    pub async fn is_blocked(&self, ip: IpAddr, now: DateTime<Utc>) -> Result<bool> {
        match self {
            SecurityStore::Memory(s) => s.is_blocked(ip, now).await,
            SecurityStore::Postgres(s) => s.is_blocked(ip, now).await,
        }
    }

    pub async fn dashboard(&self, now: DateTime<Utc>) -> Result<DashboardSnapshot> {
        match self {
            SecurityStore::Memory(s) => s.dashboard(now).await,
            SecurityStore::Postgres(s) => s.dashboard(now).await,
        }
    }

    pub async fn shutdown(&self) {
        match self {
            SecurityStore::Memory(_) => tracing::info!("Memory store shutdown (noop)"),
            SecurityStore::Postgres(s) => s.shutdown().await,
        }
    }
}
