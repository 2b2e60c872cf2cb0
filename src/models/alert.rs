// Start of file: /src/models/alert.rs

/*
    * Threat alerts raised by the detection engine and triaged by admins.
*/

use std::{fmt, net::IpAddr, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::models::{event::Severity, ParseEnumError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertType {
    BruteForce,
    CredentialStuffing,
    UnusualLocation,
    RapidBooking,
    MassDataAccess,
    AfterHoursAccess,
    MultipleFailedPayments,
    AccountEnumeration,
}

impl AlertType {
    pub const ALL: [AlertType; 8] = [
        AlertType::BruteForce,
        AlertType::CredentialStuffing,
        AlertType::UnusualLocation,
        AlertType::RapidBooking,
        AlertType::MassDataAccess,
        AlertType::AfterHoursAccess,
        AlertType::MultipleFailedPayments,
        AlertType::AccountEnumeration,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::BruteForce => "BRUTE_FORCE",
            AlertType::CredentialStuffing => "CREDENTIAL_STUFFING",
            AlertType::UnusualLocation => "UNUSUAL_LOCATION",
            AlertType::RapidBooking => "RAPID_BOOKING",
            AlertType::MassDataAccess => "MASS_DATA_ACCESS",
            AlertType::AfterHoursAccess => "AFTER_HOURS_ACCESS",
            AlertType::MultipleFailedPayments => "MULTIPLE_FAILED_PAYMENTS",
            AlertType::AccountEnumeration => "ACCOUNT_ENUMERATION",
        }
    }
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertType {
    type Err = ParseEnumError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        AlertType::ALL
            .into_iter()
            .find(|a| a.as_str().eq_ignore_ascii_case(value))
            .ok_or_else(|| ParseEnumError::new("alert type", value))
    }
}

/// Triage state of an alert.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertStatus {
    #[default]
    Open,
    Investigating,
    Resolved,
    FalsePositive,
}

impl AlertStatus {
    pub const ALL: [AlertStatus; 4] = [
        AlertStatus::Open,
        AlertStatus::Investigating,
        AlertStatus::Resolved,
        AlertStatus::FalsePositive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Open => "OPEN",
            AlertStatus::Investigating => "INVESTIGATING",
            AlertStatus::Resolved => "RESOLVED",
            AlertStatus::FalsePositive => "FALSE_POSITIVE",
        }
    }

    /// Closed alerts carry a resolution timestamp
    pub fn is_closed(&self) -> bool {
        matches!(self, AlertStatus::Resolved | AlertStatus::FalsePositive)
    }
}

impl fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertStatus {
    type Err = ParseEnumError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        AlertStatus::ALL
            .into_iter()
            .find(|s| s.as_str().eq_ignore_ascii_case(value))
            .ok_or_else(|| ParseEnumError::new("alert status", value))
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ThreatAlert {
    pub id: Uuid,
    pub alert_type: AlertType,
    pub severity: Severity,
    pub status: AlertStatus,
    pub triggered_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub source_ip: Option<IpAddr>,
    pub affected_user: Option<Uuid>,
    pub description: String,
    pub evidence: Value,
    pub recommended_action: String,
}

impl ThreatAlert {
    pub fn open(
        alert_type: AlertType,
        severity: Severity,
        source_ip: Option<IpAddr>,
        description: impl Into<String>,
        evidence: Value,
        recommended_action: impl Into<String>,
        triggered_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            alert_type,
            severity,
            status: AlertStatus::Open,
            triggered_at,
            resolved_at: None,
            source_ip,
            affected_user: None,
            description: description.into(),
            evidence,
            recommended_action: recommended_action.into(),
        }
    }

    /// Moves the alert to `status`, stamping or clearing `resolved_at`.
    pub fn transition(&mut self, status: AlertStatus, now: DateTime<Utc>) {
        self.status = status;
        self.resolved_at = if status.is_closed() { Some(now) } else { None };
    }
}

// End of file: /src/models/alert.rs
