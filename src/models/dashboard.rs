// Start of file: /src/models/dashboard.rs

/*
    * Shapes returned by `GET /security/dashboard`. Field names are part of the
    * contract with the web client.
*/

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::models::{
    alert::{AlertType, ThreatAlert},
    event::{EventType, Severity},
};

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub open_alerts: i64,
    pub critical_events_24h: i64,
    pub failed_logins_24h: i64,
    pub blocked_ips: i64,
    pub total_alerts_24h: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TimelineBucket {
    pub hour: DateTime<Utc>,
    pub count: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SeverityCount {
    pub severity: Severity,
    pub count: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EventTypeCount {
    pub event_type: EventType,
    pub count: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct IpCount {
    pub ip_address: String,
    pub count: i64,
}

/// Condensed open alert for the dashboard feed
#[derive(Clone, Debug, Serialize)]
pub struct AlertDigest {
    pub id: Uuid,
    pub alert_type: AlertType,
    pub severity: Severity,
    pub source_ip: Option<String>,
    pub description: String,
    pub triggered_at: DateTime<Utc>,
    pub evidence: Value,
}

impl From<&ThreatAlert> for AlertDigest {
    fn from(alert: &ThreatAlert) -> Self {
        Self {
            id: alert.id,
            alert_type: alert.alert_type,
            severity: alert.severity,
            source_ip: alert.source_ip.map(|ip| ip.to_string()),
            description: alert.description.clone(),
            triggered_at: alert.triggered_at,
            evidence: alert.evidence.clone(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct DashboardSnapshot {
    pub summary: DashboardSummary,
    pub event_timeline: Vec<TimelineBucket>,
    pub severity_distribution: Vec<SeverityCount>,
    pub events_by_type: Vec<EventTypeCount>,
    pub top_suspicious_ips: Vec<IpCount>,
    pub recent_alerts: Vec<AlertDigest>,
}

// End of file: /src/models/dashboard.rs
