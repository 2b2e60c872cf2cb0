// Start of file: /src/models/mod.rs

/*
    * Domain records: audit events, threat alerts, IP blocks, accounts,
    * and the dashboard snapshot served to the web client.
*/

pub mod alert;
pub mod blocked_ip;
pub mod dashboard;
pub mod event;
pub mod user;

pub use alert::{AlertStatus, AlertType, ThreatAlert};
pub use blocked_ip::BlockedIp;
pub use dashboard::DashboardSnapshot;
pub use event::{AuditEvent, EventType, NewEvent, RequestMeta, Severity};
pub use user::User;

/// Raised when a stored or submitted enum name is not recognized
#[derive(Debug, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

impl ParseEnumError {
    pub fn new(kind: &'static str, value: &str) -> Self {
        Self { kind, value: value.to_string() }
    }
}

// End of file: /src/models/mod.rs
