//! tests/auth/lockout.rs
//! Progressive lockout per account (403) and brute-force blocking per IP (429).

#[path = "../mod.rs"]
mod common;

use chrono::{DateTime, Duration, Utc};
use hotel_sentinel::models::{EventType, User};
use reqwest::StatusCode;
use serde_json::{json, Value};
use tokio::task::JoinSet;

const GUEST_EMAIL: &str = "front.desk@hotel.test";
const GUEST_PASSWORD: &str = "check-in-at-3pm";

#[tokio::test]
async fn five_failures_lock_the_account() {
    let app: common::TestApp = common::spawn_app().await;
    assert_eq!(app.register(GUEST_EMAIL, GUEST_PASSWORD).await.status(), StatusCode::CREATED);

    // A different IP per attempt keeps brute-force blocking out of the picture
    for attempt in 0..5 {
        let resp: reqwest::Response = app
            .login(GUEST_EMAIL, "wrong-password", &format!("203.0.113.{}", attempt + 1))
            .await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    let resp: reqwest::Response = app.login(GUEST_EMAIL, GUEST_PASSWORD, "203.0.113.50").await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["error"], "Account is temporarily locked. Please try again later.");

    assert_eq!(app.count_events(EventType::AccountLocked).await, 1);
    assert_eq!(app.count_events(EventType::LoginFailed).await, 5);
    assert_eq!(app.count_events(EventType::UnauthorizedAccess).await, 1);
}

#[tokio::test]
async fn concurrent_failures_still_lock_the_account() {
    let app: common::TestApp = common::spawn_app().await;
    assert_eq!(app.register(GUEST_EMAIL, GUEST_PASSWORD).await.status(), StatusCode::CREATED);

    let mut attempts: JoinSet<StatusCode> = JoinSet::new();
    for attempt in 0..8 {
        let client: reqwest::Client = app.client.clone();
        let url: String = app.url("/auth/login");
        attempts.spawn(async move {
            client
                .post(url)
                .header("x-forwarded-for", format!("203.0.113.{}", attempt + 60))
                .json(&json!({ "email": GUEST_EMAIL, "password": "wrong-password" }))
                .send()
                .await
                .unwrap()
                .status()
        });
    }
    while let Some(status) = attempts.join_next().await {
        let status: StatusCode = status.unwrap();
        assert!(
            status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN,
            "unexpected {status}"
        );
    }

    let user: User = app
        .state
        .store
        .find_user_by_email(GUEST_EMAIL)
        .await
        .unwrap()
        .unwrap();
    assert!(user.failed_login_attempts >= 5);
    assert!(user.is_locked);
    assert_eq!(app.count_events(EventType::AccountLocked).await, 1);

    assert_eq!(
        app.login(GUEST_EMAIL, GUEST_PASSWORD, "203.0.113.70").await.status(),
        StatusCode::FORBIDDEN
    );
}

#[tokio::test]
async fn expired_lock_is_lifted_on_next_login() {
    let app: common::TestApp = common::spawn_app().await;
    assert_eq!(app.register(GUEST_EMAIL, GUEST_PASSWORD).await.status(), StatusCode::CREATED);

    let user: User = app
        .state
        .store
        .find_user_by_email(GUEST_EMAIL)
        .await
        .unwrap()
        .unwrap();
    let an_hour_ago: DateTime<Utc> = Utc::now() - Duration::hours(1);
    let counted = app
        .state
        .store
        .record_failed_login(user.id, an_hour_ago, 1, an_hour_ago + Duration::minutes(15))
        .await
        .unwrap()
        .unwrap();
    assert!(counted.locked_now);

    assert_eq!(
        app.login(GUEST_EMAIL, GUEST_PASSWORD, "203.0.113.80").await.status(),
        StatusCode::OK
    );
    assert_eq!(app.count_events(EventType::AccountUnlocked).await, 1);

    let user: User = app
        .state
        .store
        .find_user_by_email(GUEST_EMAIL)
        .await
        .unwrap()
        .unwrap();
    assert!(!user.is_locked);
    assert_eq!(user.failed_login_attempts, 0);
}

#[tokio::test]
async fn successful_login_resets_the_counter() {
    let app: common::TestApp = common::spawn_app().await;
    assert_eq!(app.register(GUEST_EMAIL, GUEST_PASSWORD).await.status(), StatusCode::CREATED);

    for attempt in 0..4 {
        let resp: reqwest::Response = app
            .login(GUEST_EMAIL, "wrong-password", &format!("203.0.113.{}", attempt + 10))
            .await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
    assert_eq!(
        app.login(GUEST_EMAIL, GUEST_PASSWORD, "203.0.113.20").await.status(),
        StatusCode::OK
    );

    // Four more failures stay under the threshold again
    for attempt in 0..4 {
        let resp: reqwest::Response = app
            .login(GUEST_EMAIL, "wrong-password", &format!("203.0.113.{}", attempt + 30))
            .await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
    assert_eq!(
        app.login(GUEST_EMAIL, GUEST_PASSWORD, "203.0.113.40").await.status(),
        StatusCode::OK
    );
}

#[tokio::test]
async fn brute_force_blocks_the_ip() {
    let app: common::TestApp = common::spawn_app().await;
    app.brute_force_from("203.0.113.99").await;

    // Even valid credentials are refused from the blocked address
    let resp: reqwest::Response = app
        .login(common::ADMIN_EMAIL, common::ADMIN_PASSWORD, "203.0.113.99")
        .await;
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);

    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["error"], "Too many failed attempts. Please try again later.");

    // Other addresses are unaffected
    let resp: reqwest::Response = app
        .login(common::ADMIN_EMAIL, common::ADMIN_PASSWORD, "203.0.113.98")
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
}
