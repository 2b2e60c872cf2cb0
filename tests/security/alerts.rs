//! tests/security/alerts.rs
//! Alert listing and triage.

#[path = "../mod.rs"]
mod common;

use reqwest::StatusCode;
use serde_json::{json, Value};

async fn patch_alert(app: &common::TestApp, token: &str, id: &str, body: Value) -> reqwest::Response {
    app.client
        .patch(app.url(&format!("/security/alerts/{id}")))
        .bearer_auth(token)
        .header("x-forwarded-for", "192.0.2.10")
        .json(&body)
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn brute_force_alert_can_be_resolved() {
    let app: common::TestApp = common::spawn_app().await;
    app.brute_force_from("203.0.113.31").await;
    let token: String = app.admin_token().await;

    let open: Value = app
        .get_as("/security/alerts?status=OPEN", &token, "192.0.2.10")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(open["data"]["count"], 1);
    let alert: &Value = &open["data"]["alerts"][0];
    assert_eq!(alert["alert_type"], "BRUTE_FORCE");
    assert_eq!(alert["severity"], "HIGH");
    assert_eq!(alert["source_ip"], "203.0.113.31");
    assert!(alert["resolved_at"].is_null());

    let id: &str = alert["id"].as_str().unwrap();
    let resp: reqwest::Response = patch_alert(&app, &token, id, json!({ "status": "RESOLVED" })).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let updated: Value = resp.json().await.unwrap();
    assert_eq!(updated["data"]["alert"]["status"], "RESOLVED");
    assert!(updated["data"]["alert"]["resolved_at"].is_string());

    let still_open: Value = app
        .get_as("/security/alerts?status=OPEN", &token, "192.0.2.10")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(still_open["data"]["count"], 0);
}

#[tokio::test]
async fn triage_validates_ids_and_statuses() {
    let app: common::TestApp = common::spawn_app().await;
    let token: String = app.admin_token().await;

    let unknown: reqwest::Response = patch_alert(
        &app,
        &token,
        "6f1c2d4e-8a3b-4c5d-9e7f-0a1b2c3d4e5f",
        json!({ "status": "RESOLVED" }),
    )
    .await;
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);

    let bad_id: reqwest::Response =
        patch_alert(&app, &token, "not-a-uuid", json!({ "status": "RESOLVED" })).await;
    assert_eq!(bad_id.status(), StatusCode::BAD_REQUEST);

    assert_eq!(
        app.get_as("/security/alerts?status=CLOSED", &token, "192.0.2.10").await.status(),
        StatusCode::BAD_REQUEST
    );
}
