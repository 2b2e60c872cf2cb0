// Start of file: /src/models/user.rs

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Account record. Security counters are never serialized to clients.
#[derive(Clone, Debug, Serialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub full_name: Option<String>,
    pub is_staff: bool,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub failed_login_attempts: i32,
    #[serde(skip_serializing)]
    pub last_failed_login: Option<DateTime<Utc>>,
    #[serde(skip_serializing)]
    pub is_locked: bool,
    #[serde(skip_serializing)]
    pub lockout_until: Option<DateTime<Utc>>,
    #[serde(skip_serializing)]
    pub last_login_ip: Option<IpAddr>,
}

impl User {
    pub fn new(
        email: &str,
        password_hash: String,
        full_name: Option<String>,
        is_staff: bool,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: normalize_email(email),
            password_hash,
            full_name,
            is_staff,
            created_at,
            failed_login_attempts: 0,
            last_failed_login: None,
            is_locked: false,
            lockout_until: None,
            last_login_ip: None,
        }
    }

    /// True while a lockout is in force
    pub fn is_locked_at(&self, now: DateTime<Utc>) -> bool {
        self.is_locked && self.lockout_until.is_some_and(|until| until > now)
    }

    /// True when a lock flag is set but its window has passed
    pub fn lock_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.is_locked && !self.is_locked_at(now)
    }
}

/// Emails are unique case-insensitively
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

// End of file: /src/models/user.rs
