//! tests/auth/sessions.rs
//! Registration, token refresh and logout.

#[path = "../mod.rs"]
mod common;

use reqwest::StatusCode;
use serde_json::{json, Value};

#[tokio::test]
async fn register_creates_a_non_staff_account() {
    let app: common::TestApp = common::spawn_app().await;

    let resp: reqwest::Response = app.register("Concierge@Hotel.test", "long-enough-pass").await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["status"], "CREATED");
    assert_eq!(json["data"]["user"]["email"], "concierge@hotel.test");
    assert_eq!(json["data"]["user"]["is_staff"], false);

    let again: reqwest::Response = app.register("concierge@hotel.test", "another-password").await;
    assert_eq!(again.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn register_validates_input() {
    let app: common::TestApp = common::spawn_app().await;

    assert_eq!(
        app.register("not-an-email", "long-enough-pass").await.status(),
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        app.register("porter@hotel.test", "short").await.status(),
        StatusCode::BAD_REQUEST
    );
}

#[tokio::test]
async fn refresh_issues_a_working_access_token() {
    let app: common::TestApp = common::spawn_app().await;

    let login: Value = app
        .login(common::ADMIN_EMAIL, common::ADMIN_PASSWORD, "198.51.100.40")
        .await
        .json()
        .await
        .unwrap();

    let resp: reqwest::Response = app
        .client
        .post(app.url("/auth/refresh"))
        .json(&json!({ "refresh": login["refresh"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let refreshed: Value = resp.json().await.unwrap();
    let access: &str = refreshed["access"].as_str().unwrap();
    assert_ne!(access, login["access"].as_str().unwrap());

    let dashboard: reqwest::Response = app
        .get_as("/security/dashboard", access, "198.51.100.40")
        .await;
    assert_eq!(dashboard.status(), StatusCode::OK);
}

#[tokio::test]
async fn unknown_refresh_token_is_401() {
    let app: common::TestApp = common::spawn_app().await;

    let resp: reqwest::Response = app
        .client
        .post(app.url("/auth/refresh"))
        .json(&json!({ "refresh": "not-a-token" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_revokes_both_tokens() {
    let app: common::TestApp = common::spawn_app().await;

    let login: Value = app
        .login(common::ADMIN_EMAIL, common::ADMIN_PASSWORD, "198.51.100.41")
        .await
        .json()
        .await
        .unwrap();
    let access: &str = login["access"].as_str().unwrap();

    let resp: reqwest::Response = app
        .client
        .post(app.url("/auth/logout"))
        .bearer_auth(access)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    assert_eq!(
        app.get_as("/security/dashboard", access, "198.51.100.41").await.status(),
        StatusCode::UNAUTHORIZED
    );

    let refresh: reqwest::Response = app
        .client
        .post(app.url("/auth/refresh"))
        .json(&json!({ "refresh": login["refresh"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(refresh.status(), StatusCode::UNAUTHORIZED);

    let without_token: reqwest::Response = app
        .client
        .post(app.url("/auth/logout"))
        .send()
        .await
        .unwrap();
    assert_eq!(without_token.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_ends_every_access_token_of_the_session() {
    let app: common::TestApp = common::spawn_app().await;

    let login: Value = app
        .login(common::ADMIN_EMAIL, common::ADMIN_PASSWORD, "198.51.100.42")
        .await
        .json()
        .await
        .unwrap();
    let first: &str = login["access"].as_str().unwrap();

    let refreshed: Value = app
        .client
        .post(app.url("/auth/refresh"))
        .json(&json!({ "refresh": login["refresh"] }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let second: &str = refreshed["access"].as_str().unwrap();

    let resp: reqwest::Response = app
        .client
        .post(app.url("/auth/logout"))
        .bearer_auth(second)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    // The earlier token was minted from the same refresh token
    assert_eq!(
        app.get_as("/security/dashboard", first, "198.51.100.42").await.status(),
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        app.get_as("/security/dashboard", second, "198.51.100.42").await.status(),
        StatusCode::UNAUTHORIZED
    );
}
