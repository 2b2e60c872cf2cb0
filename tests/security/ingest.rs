//! tests/security/ingest.rs
//! Events reported by other systems.

#[path = "../mod.rs"]
mod common;

use reqwest::StatusCode;
use serde_json::{json, Value};

#[tokio::test]
async fn severity_is_classified_unless_given() {
    let app: common::TestApp = common::spawn_app().await;
    let token: String = app.admin_token().await;

    let classified: Value = app
        .post_as(
            "/security/events",
            &token,
            json!({ "event_type": "PAYMENT_FAILED", "ip_address": "198.51.100.80" }),
        )
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(classified["code"], 201);
    assert_eq!(classified["data"]["event"]["severity"], "HIGH");

    let explicit: Value = app
        .post_as(
            "/security/events",
            &token,
            json!({
                "event_type": "BOOKING_MODIFIED",
                "severity": "low",
                "description": "Late checkout requested",
                "extra_data": { "room": "1204" }
            }),
        )
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(explicit["data"]["event"]["severity"], "LOW");
    assert_eq!(explicit["data"]["event"]["extra_data"]["room"], "1204");
}

#[tokio::test]
async fn rejects_unknown_types_and_bad_extra_data() {
    let app: common::TestApp = common::spawn_app().await;
    let token: String = app.admin_token().await;

    let unknown: reqwest::Response = app
        .post_as("/security/events", &token, json!({ "event_type": "ROOM_SERVICE" }))
        .await;
    assert_eq!(unknown.status(), StatusCode::BAD_REQUEST);

    let bad_extra: reqwest::Response = app
        .post_as(
            "/security/events",
            &token,
            json!({ "event_type": "LOGOUT", "extra_data": [1, 2, 3] }),
        )
        .await;
    assert_eq!(bad_extra.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn reported_failed_logins_feed_detection() {
    let app: common::TestApp = common::spawn_app().await;
    let token: String = app.admin_token().await;

    let mut raised: Vec<Value> = Vec::new();
    for _ in 0..5 {
        let json: Value = app
            .post_as(
                "/security/events",
                &token,
                json!({ "event_type": "LOGIN_FAILED", "ip_address": "198.51.100.81" }),
            )
            .await
            .json()
            .await
            .unwrap();
        raised.push(json["data"]["alerts_raised"].clone());
    }
    assert_eq!(raised, vec![json!(0), json!(0), json!(0), json!(0), json!(1)]);

    assert_eq!(
        app.login(common::ADMIN_EMAIL, common::ADMIN_PASSWORD, "198.51.100.81")
            .await
            .status(),
        StatusCode::TOO_MANY_REQUESTS
    );
}
