//! tests/security/dashboard.rs
//! The composite dashboard query and its access rules.

#[path = "../mod.rs"]
mod common;

use reqwest::StatusCode;
use serde_json::Value;

#[tokio::test]
async fn requires_a_bearer_token() {
    let app: common::TestApp = common::spawn_app().await;

    let resp: reqwest::Response = app
        .client
        .get(app.url("/security/dashboard"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let bogus: reqwest::Response = app
        .get_as("/security/dashboard", "forged-token", "192.0.2.1")
        .await;
    assert_eq!(bogus.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn rejects_non_staff_accounts() {
    let app: common::TestApp = common::spawn_app().await;
    assert_eq!(
        app.register("housekeeping@hotel.test", "fresh-towels-daily").await.status(),
        StatusCode::CREATED
    );

    let login: Value = app
        .login("housekeeping@hotel.test", "fresh-towels-daily", "192.0.2.2")
        .await
        .json()
        .await
        .unwrap();

    let resp: reqwest::Response = app
        .get_as("/security/dashboard", login["access"].as_str().unwrap(), "192.0.2.2")
        .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn returns_every_section_as_a_bare_body() {
    let app: common::TestApp = common::spawn_app().await;
    let token: String = app.admin_token().await;

    let resp: reqwest::Response = app.get_as("/security/dashboard", &token, "192.0.2.3").await;
    assert_eq!(resp.status(), StatusCode::OK);

    let json: Value = resp.json().await.unwrap();
    for key in [
        "summary",
        "event_timeline",
        "severity_distribution",
        "events_by_type",
        "top_suspicious_ips",
        "recent_alerts",
    ] {
        assert!(json.get(key).is_some(), "missing {key}");
    }
    for key in [
        "open_alerts",
        "critical_events_24h",
        "failed_logins_24h",
        "blocked_ips",
        "total_alerts_24h",
    ] {
        assert!(json["summary"][key].is_i64(), "summary.{key} is not a count");
    }
    assert!(json.get("code").is_none());
}

#[tokio::test]
async fn reflects_a_brute_force_attack() {
    let app: common::TestApp = common::spawn_app().await;
    app.brute_force_from("203.0.113.77").await;
    let token: String = app.admin_token().await;

    let json: Value = app
        .get_as("/security/dashboard", &token, "192.0.2.4")
        .await
        .json()
        .await
        .unwrap();

    let summary: &Value = &json["summary"];
    assert_eq!(summary["failed_logins_24h"], 5);
    assert_eq!(summary["open_alerts"], 1);
    assert_eq!(summary["blocked_ips"], 1);
    assert_eq!(summary["total_alerts_24h"], 1);
    assert!(summary["critical_events_24h"].as_i64().unwrap() >= 1);

    assert_eq!(json["top_suspicious_ips"][0]["ip_address"], "203.0.113.77");
    assert_eq!(json["top_suspicious_ips"][0]["count"], 6);
    assert_eq!(json["severity_distribution"][0]["severity"], "CRITICAL");
    assert_eq!(json["events_by_type"][0]["event_type"], "LOGIN_FAILED");
    assert_eq!(json["recent_alerts"][0]["alert_type"], "BRUTE_FORCE");
    assert_eq!(json["recent_alerts"][0]["evidence"]["failed_attempts"], 5);

    let timeline: &Vec<Value> = json["event_timeline"].as_array().unwrap();
    assert!(!timeline.is_empty());
    assert!(timeline.iter().all(|b| b["count"].as_i64().unwrap() > 0));
}
