// In-process storage backend. Used for local development and the test suite.

use std::collections::{HashMap, VecDeque};
use std::net::IpAddr;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::database::security_store::{EventQuery, FailedLogin, StoreError};
use crate::models::{
    user::normalize_email, AlertStatus, AlertType, AuditEvent, BlockedIp, DashboardSnapshot,
    ThreatAlert, User,
};
use crate::security::aggregation::build_snapshot;

/// Oldest events are evicted past this many records
const MAX_EVENTS: usize = 100_000;

#[derive(Debug, Default)]
struct MemoryState {
    users: HashMap<Uuid, User>,
    emails: HashMap<String, Uuid>,
    events: VecDeque<AuditEvent>,
    alerts: Vec<ThreatAlert>,
    blocks: HashMap<IpAddr, BlockedIp>,
}

#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create_user(&self, user: User) -> Result<User, StoreError> {
        let mut state = self.state.write().await;
        if state.emails.contains_key(&user.email) {
            return Err(StoreError::Conflict);
        }
        state.emails.insert(user.email.clone(), user.id);
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let state = self.state.read().await;
        Ok(state
            .emails
            .get(&normalize_email(email))
            .and_then(|id| state.users.get(id))
            .cloned())
    }

    pub async fn find_user(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    pub async fn record_failed_login(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
        max_failures: i32,
        lockout_until: DateTime<Utc>,
    ) -> Result<Option<FailedLogin>> {
        let mut state = self.state.write().await;
        let Some(user) = state.users.get_mut(&id) else {
            return Ok(None);
        };

        user.failed_login_attempts += 1;
        user.last_failed_login = Some(now);

        let locked_now: bool = !user.is_locked && user.failed_login_attempts >= max_failures;
        if locked_now {
            user.is_locked = true;
            user.lockout_until = Some(lockout_until);
        }

        Ok(Some(FailedLogin { user: user.clone(), locked_now }))
    }

    pub async fn record_successful_login(
        &self,
        id: Uuid,
        ip: Option<IpAddr>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let mut state = self.state.write().await;
        match state.users.get_mut(&id) {
            Some(user) if !user.is_locked_at(now) => {
                user.failed_login_attempts = 0;
                user.last_login_ip = ip;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    pub async fn clear_expired_lock(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool> {
        let mut state = self.state.write().await;
        match state.users.get_mut(&id) {
            Some(user) if user.lock_expired_at(now) => {
                user.is_locked = false;
                user.lockout_until = None;
                user.failed_login_attempts = 0;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    pub async fn insert_event(&self, event: &AuditEvent) -> Result<()> {
        let mut state = self.state.write().await;
        if state.events.len() >= MAX_EVENTS {
            state.events.pop_front();
        }
        state.events.push_back(event.clone());
        Ok(())
    }

    pub async fn count_events(&self, query: &EventQuery) -> Result<i64> {
        let state = self.state.read().await;
        Ok(state.events.iter().filter(|e| query.matches(e)).count() as i64)
    }

    pub async fn recent_events(&self, limit: usize) -> Result<Vec<AuditEvent>> {
        let state = self.state.read().await;
        let mut events: Vec<AuditEvent> = state.events.iter().cloned().collect();
        events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        events.truncate(limit);
        Ok(events)
    }

    pub async fn insert_alert(&self, alert: &ThreatAlert) -> Result<()> {
        self.state.write().await.alerts.push(alert.clone());
        Ok(())
    }

    pub async fn has_open_alert(
        &self,
        alert_type: AlertType,
        ip: IpAddr,
        since: DateTime<Utc>,
    ) -> Result<bool> {
        let state = self.state.read().await;
        Ok(state.alerts.iter().any(|a| {
            a.alert_type == alert_type
                && a.status == AlertStatus::Open
                && a.source_ip == Some(ip)
                && a.triggered_at >= since
        }))
    }

    pub async fn list_alerts(
        &self,
        status: Option<AlertStatus>,
        limit: usize,
    ) -> Result<Vec<ThreatAlert>> {
        let state = self.state.read().await;
        let mut alerts: Vec<ThreatAlert> = state
            .alerts
            .iter()
            .filter(|a| status.is_none_or(|s| a.status == s))
            .cloned()
            .collect();
        alerts.sort_by(|a, b| b.triggered_at.cmp(&a.triggered_at));
        alerts.truncate(limit);
        Ok(alerts)
    }

    pub async fn set_alert_status(
        &self,
        id: Uuid,
        status: AlertStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<ThreatAlert>> {
        let mut state = self.state.write().await;
        Ok(state.alerts.iter_mut().find(|a| a.id == id).map(|alert| {
            alert.transition(status, now);
            alert.clone()
        }))
    }

    pub async fn upsert_block(&self, block: &BlockedIp) -> Result<bool> {
        let mut state = self.state.write().await;
        if let Some(existing) = state.blocks.get_mut(&block.ip_address) {
            existing.reason = block.reason.clone();
            existing.blocked_until = block.blocked_until;
            existing.is_active = true;
            existing.auto_blocked = block.auto_blocked;
            return Ok(false);
        }
        state.blocks.insert(block.ip_address, block.clone());
        Ok(true)
    }

    pub async fn deactivate_block(&self, ip: IpAddr) -> Result<bool> {
        let mut state = self.state.write().await;
        match state.blocks.get_mut(&ip) {
            Some(block) if block.is_active => {
                block.is_active = false;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    pub async fn is_blocked(&self, ip: IpAddr, now: DateTime<Utc>) -> Result<bool> {
        let state = self.state.read().await;
        Ok(state.blocks.get(&ip).is_some_and(|b| b.is_effective(now)))
    }

    pub async fn dashboard(&self, now: DateTime<Utc>) -> Result<DashboardSnapshot> {
        let state = self.state.read().await;
        Ok(build_snapshot(now, &state.events, &state.alerts, state.blocks.values()))
    }
}
