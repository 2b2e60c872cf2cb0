//! tests/security/audit.rs
//! Events recorded as a side effect of requests: failed security calls,
//! staff logins and bursts against the auth endpoints.

#[path = "../mod.rs"]
mod common;

use hotel_sentinel::models::EventType;
use reqwest::StatusCode;
use serde_json::{json, Value};

#[tokio::test]
async fn failed_security_requests_are_recorded() {
    let app: common::TestApp = common::spawn_app().await;

    let anonymous: reqwest::Response = app
        .client
        .get(app.url("/security/dashboard"))
        .header("x-forwarded-for", "203.0.113.90")
        .send()
        .await
        .unwrap();
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(app.count_events(EventType::UnauthorizedAccess).await, 1);
    assert_eq!(app.count_events(EventType::SuspiciousActivity).await, 0);

    let token: String = app.admin_token().await;
    let missing: reqwest::Response = app
        .client
        .patch(app.url("/security/alerts/6f1c2d4e-8a3b-4c5d-9e7f-0a1b2c3d4e5f"))
        .bearer_auth(&token)
        .header("x-forwarded-for", "192.0.2.13")
        .json(&json!({ "status": "RESOLVED" }))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    assert_eq!(app.count_events(EventType::SuspiciousActivity).await, 1);
    assert_eq!(app.count_events(EventType::UnauthorizedAccess).await, 1);
}

#[tokio::test]
async fn staff_logins_are_recorded() {
    let app: common::TestApp = common::spawn_app().await;
    app.admin_token().await;

    assert_eq!(app.count_events(EventType::LoginSuccess).await, 1);
    assert_eq!(app.count_events(EventType::AdminLogin).await, 1);

    assert_eq!(
        app.register("bellhop@hotel.test", "luggage-cart-7").await.status(),
        StatusCode::CREATED
    );
    assert_eq!(
        app.login("bellhop@hotel.test", "luggage-cart-7", "192.0.2.14").await.status(),
        StatusCode::OK
    );
    assert_eq!(app.count_events(EventType::LoginSuccess).await, 2);
    assert_eq!(app.count_events(EventType::AdminLogin).await, 1);
}

#[tokio::test]
async fn auth_bursts_raise_an_enumeration_alert() {
    let app: common::TestApp = common::spawn_app().await;

    // Registrations all come from the same address
    for n in 0..10 {
        assert_eq!(
            app.register(&format!("guest{n}@hotel.test"), "weekend-stay-2026").await.status(),
            StatusCode::CREATED
        );
    }
    assert_eq!(
        app.login("guest0@hotel.test", "wrong-password", "192.0.2.200").await.status(),
        StatusCode::UNAUTHORIZED
    );

    let token: String = app.admin_token().await;
    let open: Value = app
        .get_as("/security/alerts?status=OPEN", &token, "192.0.2.15")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(open["data"]["count"], 1);

    let alert: &Value = &open["data"]["alerts"][0];
    assert_eq!(alert["alert_type"], "ACCOUNT_ENUMERATION");
    assert_eq!(alert["source_ip"], "192.0.2.200");
    assert_eq!(alert["evidence"]["request_count"], 11);
    assert_eq!(alert["evidence"]["mitre_technique"], "T1087");
}
