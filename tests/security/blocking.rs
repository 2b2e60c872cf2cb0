//! tests/security/blocking.rs
//! Manual IP blocks and their effect on login and the security endpoints.

#[path = "../mod.rs"]
mod common;

use reqwest::StatusCode;
use serde_json::{json, Value};

#[tokio::test]
async fn manual_block_denies_access_until_lifted() {
    let app: common::TestApp = common::spawn_app().await;
    let token: String = app.admin_token().await;

    let resp: reqwest::Response = app
        .post_as("/security/block-ip", &token, json!({ "ip_address": "198.51.100.66" }))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["data"]["created"], true);
    assert_eq!(json["data"]["message"], "IP 198.51.100.66 has been blocked");

    // Security endpoints refuse the address, even with a valid token
    let denied: reqwest::Response = app.get_as("/security/dashboard", &token, "198.51.100.66").await;
    assert_eq!(denied.status(), StatusCode::FORBIDDEN);
    let body: Value = denied.json().await.unwrap();
    assert_eq!(body["error"], "Access denied");

    // Login from it is throttled
    assert_eq!(
        app.login(common::ADMIN_EMAIL, common::ADMIN_PASSWORD, "198.51.100.66")
            .await
            .status(),
        StatusCode::TOO_MANY_REQUESTS
    );

    // Re-blocking updates the existing entry
    let again: Value = app
        .post_as("/security/block-ip", &token, json!({ "ip_address": "198.51.100.66", "reason": "repeat" }))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(again["data"]["created"], false);

    let lifted: reqwest::Response = app
        .post_as("/security/unblock-ip", &token, json!({ "ip_address": "198.51.100.66" }))
        .await;
    assert_eq!(lifted.status(), StatusCode::OK);
    assert_eq!(
        app.login(common::ADMIN_EMAIL, common::ADMIN_PASSWORD, "198.51.100.66")
            .await
            .status(),
        StatusCode::OK
    );

    let missing: reqwest::Response = app
        .post_as("/security/unblock-ip", &token, json!({ "ip_address": "198.51.100.66" }))
        .await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn block_requires_a_valid_ip() {
    let app: common::TestApp = common::spawn_app().await;
    let token: String = app.admin_token().await;

    let missing: reqwest::Response = app.post_as("/security/block-ip", &token, json!({})).await;
    assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
    let json: Value = missing.json().await.unwrap();
    assert_eq!(json["data"]["error"], "ip_address required");

    let invalid: reqwest::Response = app
        .post_as("/security/block-ip", &token, json!({ "ip_address": "999.1.1.1" }))
        .await;
    assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn oversized_durations_are_rejected() {
    let app: common::TestApp = common::spawn_app().await;
    let token: String = app.admin_token().await;

    let resp: reqwest::Response = app
        .post_as(
            "/security/block-ip",
            &token,
            json!({ "ip_address": "198.51.100.9", "duration_minutes": 9_000_000_000_000_i64 }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // Nothing was stored and the server keeps serving
    let json: Value = app
        .get_as("/security/dashboard", &token, "192.0.2.12")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(json["summary"]["blocked_ips"], 0);
}

#[tokio::test]
async fn timed_blocks_count_on_the_dashboard() {
    let app: common::TestApp = common::spawn_app().await;
    let token: String = app.admin_token().await;

    let resp: reqwest::Response = app
        .post_as(
            "/security/block-ip",
            &token,
            json!({ "ip_address": "2001:db8::7", "duration_minutes": 30 }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let json: Value = app
        .get_as("/security/dashboard", &token, "192.0.2.5")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(json["summary"]["blocked_ips"], 1);
}
