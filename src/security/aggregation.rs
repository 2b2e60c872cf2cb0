// Start of file: /src/security/aggregation.rs

/*
    * Time-bucketed aggregation behind the dashboard. The in-memory store feeds
    * its records through `build_snapshot`; the Postgres store computes the same
    * shapes in SQL using the window helpers below.
*/

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, Utc};

use crate::models::{
    dashboard::{
        AlertDigest, DashboardSnapshot, DashboardSummary, EventTypeCount, IpCount, SeverityCount,
        TimelineBucket,
    },
    AlertStatus, AuditEvent, BlockedIp, EventType, Severity, ThreatAlert,
};

/// Length of every ranked list on the dashboard
pub const TOP_N: usize = 10;

pub fn since_24h(now: DateTime<Utc>) -> DateTime<Utc> {
    now - Duration::hours(24)
}

pub fn since_7d(now: DateTime<Utc>) -> DateTime<Utc> {
    now - Duration::days(7)
}

/// Floors a timestamp to the start of its UTC hour
pub fn truncate_to_hour(ts: DateTime<Utc>) -> DateTime<Utc> {
    let secs: i64 = ts.timestamp();
    DateTime::from_timestamp(secs - secs.rem_euclid(3_600), 0).unwrap_or(ts)
}

/// Sorts by count descending, breaking ties on the rendered key.
fn rank<K>(counts: HashMap<K, i64>, key: impl Fn(&K) -> String) -> Vec<(K, i64)> {
    let mut ranked: Vec<(K, i64)> = counts.into_iter().collect();
    ranked.sort_by(|(ka, ca), (kb, cb)| cb.cmp(ca).then_with(|| key(ka).cmp(&key(kb))));
    ranked.truncate(TOP_N);
    ranked
}

/// Builds the full dashboard view from raw records.
pub fn build_snapshot<'a>(
    now: DateTime<Utc>,
    events: impl IntoIterator<Item = &'a AuditEvent>,
    alerts: impl IntoIterator<Item = &'a ThreatAlert>,
    blocks: impl IntoIterator<Item = &'a BlockedIp>,
) -> DashboardSnapshot {
    let day_ago: DateTime<Utc> = since_24h(now);
    let week_ago: DateTime<Utc> = since_7d(now);

    let mut summary: DashboardSummary = DashboardSummary::default();
    let mut timeline: BTreeMap<DateTime<Utc>, i64> = BTreeMap::new();
    let mut by_severity: HashMap<Severity, i64> = HashMap::new();
    let mut by_type: HashMap<EventType, i64> = HashMap::new();
    let mut by_ip: HashMap<String, i64> = HashMap::new();

    for event in events {
        if event.timestamp >= week_ago {
            *by_severity.entry(event.severity).or_default() += 1;
        }
        if event.timestamp < day_ago {
            continue;
        }

        *timeline.entry(truncate_to_hour(event.timestamp)).or_default() += 1;
        *by_type.entry(event.event_type).or_default() += 1;

        if event.severity == Severity::Critical {
            summary.critical_events_24h += 1;
        }
        if event.event_type == EventType::LoginFailed {
            summary.failed_logins_24h += 1;
        }
        if let (true, Some(ip)) = (event.severity.is_elevated(), event.ip_address) {
            *by_ip.entry(ip.to_string()).or_default() += 1;
        }
    }

    let mut open: Vec<&ThreatAlert> = Vec::new();
    for alert in alerts {
        if alert.triggered_at >= day_ago {
            summary.total_alerts_24h += 1;
        }
        if alert.status == AlertStatus::Open {
            open.push(alert);
        }
    }
    summary.open_alerts = open.len() as i64;
    open.sort_by(|a, b| b.triggered_at.cmp(&a.triggered_at));

    summary.blocked_ips = blocks.into_iter().filter(|b| b.is_effective(now)).count() as i64;

    DashboardSnapshot {
        summary,
        event_timeline: timeline
            .into_iter()
            .map(|(hour, count)| TimelineBucket { hour, count })
            .collect(),
        severity_distribution: Severity::DESCENDING
            .into_iter()
            .filter_map(|severity| {
                by_severity
                    .get(&severity)
                    .map(|&count| SeverityCount { severity, count })
            })
            .collect(),
        events_by_type: rank(by_type, |t| t.as_str().to_string())
            .into_iter()
            .map(|(event_type, count)| EventTypeCount { event_type, count })
            .collect(),
        top_suspicious_ips: rank(by_ip, String::clone)
            .into_iter()
            .map(|(ip_address, count)| IpCount { ip_address, count })
            .collect(),
        recent_alerts: open.into_iter().take(TOP_N).map(AlertDigest::from).collect(),
    }
}


// End of file: /src/security/aggregation.rs
