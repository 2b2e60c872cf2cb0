//! tests/auth/login.rs
//! Login contract: bare token body on success, bare `{error}` on failure.

#[path = "../mod.rs"]
mod common;

use reqwest::StatusCode;
use serde_json::Value;

#[tokio::test]
async fn admin_login_returns_tokens_and_user() {
    let app: common::TestApp = common::spawn_app().await;

    let resp: reqwest::Response = app
        .login(common::ADMIN_EMAIL, common::ADMIN_PASSWORD, "198.51.100.10")
        .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let json: Value = resp.json().await.unwrap();
    assert!(json["access"].as_str().is_some_and(|t| !t.is_empty()));
    assert!(json["refresh"].as_str().is_some_and(|t| !t.is_empty()));
    assert_ne!(json["access"], json["refresh"]);
    assert_eq!(json["user"]["email"], common::ADMIN_EMAIL);
    assert_eq!(json["user"]["is_staff"], true);

    // No envelope and no secrets
    assert!(json.get("code").is_none());
    assert!(json["user"].get("password_hash").is_none());
}

#[tokio::test]
async fn emails_match_case_insensitively() {
    let app: common::TestApp = common::spawn_app().await;

    let resp: reqwest::Response = app
        .login("Security.Lead@HOTEL.test", common::ADMIN_PASSWORD, "198.51.100.11")
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn wrong_password_is_401() {
    let app: common::TestApp = common::spawn_app().await;

    let resp: reqwest::Response = app
        .login(common::ADMIN_EMAIL, "not-the-password", "198.51.100.12")
        .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["error"], "Invalid credentials");
}

#[tokio::test]
async fn unknown_account_is_401() {
    let app: common::TestApp = common::spawn_app().await;

    let resp: reqwest::Response = app
        .login("nobody@hotel.test", "whatever-it-is", "198.51.100.13")
        .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn malformed_body_is_400() {
    let app: common::TestApp = common::spawn_app().await;

    let resp: reqwest::Response = app
        .client
        .post(app.url("/auth/login"))
        .header("x-forwarded-for", "198.51.100.14")
        .header("content-type", "application/json")
        .body(r#"{"email": "guest@hotel.test"}"#)
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let json: Value = resp.json().await.unwrap();
    assert!(json["error"].as_str().unwrap().starts_with("Invalid request format"));
}

#[tokio::test]
async fn injection_in_credentials_is_rejected() {
    let app: common::TestApp = common::spawn_app().await;

    let resp: reqwest::Response = app
        .login("admin' OR '1'='1", "x", "198.51.100.15")
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["error"], "Malicious request detected");
}
