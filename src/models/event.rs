// Start of file: /src/models/event.rs

/*
    * Audit event taxonomy: event types, severities, and the stored event record
    * together with its SIEM export renderings.
*/

use std::{fmt, net::IpAddr, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::models::ParseEnumError;

/// Categorical event priority. Ordered from least to most severe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Most severe first, the order the dashboard reports distributions in
    pub const DESCENDING: [Severity; 5] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
        Severity::Info,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        }
    }

    /// Numeric severity used in the CEF header (0-10 scale)
    pub fn cef_score(&self) -> u8 {
        match self {
            Severity::Info => 2,
            Severity::Low => 3,
            Severity::Medium => 5,
            Severity::High => 8,
            Severity::Critical => 10,
        }
    }

    pub fn is_elevated(&self) -> bool {
        *self >= Severity::High
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = ParseEnumError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Severity::DESCENDING
            .into_iter()
            .find(|s| s.as_str().eq_ignore_ascii_case(value))
            .ok_or_else(|| ParseEnumError::new("severity", value))
    }
}

/// Kind of audited action.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    // Authentication
    LoginSuccess,
    LoginFailed,
    Logout,
    TokenRefresh,
    PasswordChange,
    PasswordResetRequest,
    // Account
    AccountCreated,
    AccountLocked,
    AccountUnlocked,
    ProfileUpdate,
    // Resource
    BookingCreated,
    BookingModified,
    BookingCancelled,
    PaymentInitiated,
    PaymentSuccess,
    PaymentFailed,
    // Security
    SuspiciousActivity,
    BruteForceDetected,
    RateLimitExceeded,
    UnauthorizedAccess,
    SqlInjectionAttempt,
    XssAttempt,
    // Admin
    AdminLogin,
    DataExport,
    UserDeleted,
    PermissionChange,
}

impl EventType {
    pub const ALL: [EventType; 26] = [
        EventType::LoginSuccess,
        EventType::LoginFailed,
        EventType::Logout,
        EventType::TokenRefresh,
        EventType::PasswordChange,
        EventType::PasswordResetRequest,
        EventType::AccountCreated,
        EventType::AccountLocked,
        EventType::AccountUnlocked,
        EventType::ProfileUpdate,
        EventType::BookingCreated,
        EventType::BookingModified,
        EventType::BookingCancelled,
        EventType::PaymentInitiated,
        EventType::PaymentSuccess,
        EventType::PaymentFailed,
        EventType::SuspiciousActivity,
        EventType::BruteForceDetected,
        EventType::RateLimitExceeded,
        EventType::UnauthorizedAccess,
        EventType::SqlInjectionAttempt,
        EventType::XssAttempt,
        EventType::AdminLogin,
        EventType::DataExport,
        EventType::UserDeleted,
        EventType::PermissionChange,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::LoginSuccess => "LOGIN_SUCCESS",
            EventType::LoginFailed => "LOGIN_FAILED",
            EventType::Logout => "LOGOUT",
            EventType::TokenRefresh => "TOKEN_REFRESH",
            EventType::PasswordChange => "PASSWORD_CHANGE",
            EventType::PasswordResetRequest => "PASSWORD_RESET_REQUEST",
            EventType::AccountCreated => "ACCOUNT_CREATED",
            EventType::AccountLocked => "ACCOUNT_LOCKED",
            EventType::AccountUnlocked => "ACCOUNT_UNLOCKED",
            EventType::ProfileUpdate => "PROFILE_UPDATE",
            EventType::BookingCreated => "BOOKING_CREATED",
            EventType::BookingModified => "BOOKING_MODIFIED",
            EventType::BookingCancelled => "BOOKING_CANCELLED",
            EventType::PaymentInitiated => "PAYMENT_INITIATED",
            EventType::PaymentSuccess => "PAYMENT_SUCCESS",
            EventType::PaymentFailed => "PAYMENT_FAILED",
            EventType::SuspiciousActivity => "SUSPICIOUS_ACTIVITY",
            EventType::BruteForceDetected => "BRUTE_FORCE_DETECTED",
            EventType::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            EventType::UnauthorizedAccess => "UNAUTHORIZED_ACCESS",
            EventType::SqlInjectionAttempt => "SQL_INJECTION_ATTEMPT",
            EventType::XssAttempt => "XSS_ATTEMPT",
            EventType::AdminLogin => "ADMIN_LOGIN",
            EventType::DataExport => "DATA_EXPORT",
            EventType::UserDeleted => "USER_DELETED",
            EventType::PermissionChange => "PERMISSION_CHANGE",
        }
    }

    /// Severity assigned automatically when an event is recorded
    pub fn default_severity(&self) -> Severity {
        match self {
            EventType::BruteForceDetected
            | EventType::SqlInjectionAttempt
            | EventType::XssAttempt
            | EventType::AccountLocked => Severity::Critical,

            EventType::LoginFailed
            | EventType::UnauthorizedAccess
            | EventType::RateLimitExceeded
            | EventType::PaymentFailed => Severity::High,

            EventType::PasswordResetRequest | EventType::SuspiciousActivity => Severity::Medium,

            _ => Severity::Info,
        }
    }

    /// MITRE ATT&CK technique the event is evidence of, or "N/A"
    pub fn mitre_technique(&self) -> &'static str {
        match self {
            EventType::LoginFailed => "T1110 - Brute Force",
            EventType::BruteForceDetected => "T1110.001 - Password Guessing",
            EventType::SqlInjectionAttempt => "T1190 - Exploit Public-Facing Application",
            EventType::XssAttempt => "T1059.007 - JavaScript",
            EventType::UnauthorizedAccess => "T1078 - Valid Accounts",
            EventType::RateLimitExceeded => "T1498 - Network Denial of Service",
            _ => "N/A",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = ParseEnumError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        EventType::ALL
            .into_iter()
            .find(|e| e.as_str().eq_ignore_ascii_case(value))
            .ok_or_else(|| ParseEnumError::new("event type", value))
    }
}

/// A persisted audit record.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub event_type: EventType,
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
    pub user_id: Option<Uuid>,
    pub user_email: Option<String>,
    pub username_attempted: String,
    pub ip_address: Option<IpAddr>,
    pub user_agent: String,
    pub request_method: String,
    pub request_path: String,
    pub request_id: Uuid,
    pub description: String,
    pub extra_data: Value,
    pub status_code: Option<u16>,
}

impl AuditEvent {
    /// Actor label used by the exporters: the account email when known,
    /// otherwise whatever username was attempted.
    pub fn actor(&self) -> &str {
        self.user_email.as_deref().unwrap_or(&self.username_attempted)
    }

    /// JSON-SIEM rendering
    pub fn to_siem(&self) -> Value {
        let outcome: &str = match self.status_code {
            Some(code) if code < 400 => "success",
            _ => "failure",
        };

        json!({
            "timestamp": self.timestamp.to_rfc3339(),
            "event_type": self.event_type,
            "severity": self.severity,
            "source_ip": self.ip_address.map(|ip| ip.to_string()),
            "user": self.actor(),
            "action": self.request_method,
            "resource": self.request_path,
            "outcome": outcome,
            "details": self.extra_data,
            "mitre_technique": self.event_type.mitre_technique(),
        })
    }

    /// ArcSight Common Event Format line
    pub fn to_cef(&self) -> String {
        let src: String = self
            .ip_address
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| "None".to_string());
        let user: &str = match self.actor() {
            "" => "None",
            actor => actor,
        };

        format!(
            "CEF:0|HotelSystem|Security|1.0|{}|{}|{}|src={} duser={} request={}",
            self.event_type,
            cef_escape(&self.description),
            self.severity.cef_score(),
            src,
            cef_extension_escape(user),
            cef_extension_escape(&self.request_path),
        )
    }
}

// Pipes and backslashes are header delimiters in CEF
fn cef_escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('|', "\\|")
}

// Extension values delimit on `=` and must stay on one line
fn cef_extension_escape(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('=', "\\=")
        .replace('\r', "\\r")
        .replace('\n', "\\n")
}

/// Request context captured alongside an event.
#[derive(Clone, Debug, Default)]
pub struct RequestMeta {
    pub ip_address: Option<IpAddr>,
    pub user_agent: String,
    pub method: String,
    pub path: String,
}

/// An event about to be recorded. Severity defaults from the event type.
#[derive(Clone, Debug)]
pub struct NewEvent {
    pub event_type: EventType,
    pub severity: Option<Severity>,
    pub user_id: Option<Uuid>,
    pub user_email: Option<String>,
    pub username_attempted: String,
    pub meta: RequestMeta,
    pub description: String,
    pub extra_data: Map<String, Value>,
    pub status_code: Option<u16>,
}

impl NewEvent {
    pub fn new(event_type: EventType) -> Self {
        Self {
            event_type,
            severity: None,
            user_id: None,
            user_email: None,
            username_attempted: String::new(),
            meta: RequestMeta::default(),
            description: String::new(),
            extra_data: Map::new(),
            status_code: None,
        }
    }

    pub fn request(mut self, meta: &RequestMeta) -> Self {
        self.meta = meta.clone();
        self
    }

    pub fn ip(mut self, ip: Option<IpAddr>) -> Self {
        self.meta.ip_address = ip;
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.meta.path = path.into();
        self
    }

    pub fn user(mut self, id: Uuid, email: impl Into<String>) -> Self {
        self.user_id = Some(id);
        self.user_email = Some(email.into());
        self
    }

    pub fn attempted(mut self, username: impl Into<String>) -> Self {
        self.username_attempted = username.into();
        self
    }

    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn extra(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.extra_data.insert(key.to_string(), value.into());
        self
    }

    pub fn status(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    /// Finalizes the record, stamping id, request id and timestamp.
    pub fn into_event(self, timestamp: DateTime<Utc>) -> AuditEvent {
        AuditEvent {
            id: Uuid::new_v4(),
            severity: self.severity.unwrap_or_else(|| self.event_type.default_severity()),
            event_type: self.event_type,
            timestamp,
            user_id: self.user_id,
            user_email: self.user_email,
            username_attempted: self.username_attempted,
            ip_address: self.meta.ip_address,
            user_agent: self.meta.user_agent,
            request_method: self.meta.method,
            request_path: self.meta.path,
            request_id: Uuid::new_v4(),
            description: self.description,
            extra_data: Value::Object(self.extra_data),
            status_code: self.status_code,
        }
    }
}


// End of file: /src/models/event.rs
