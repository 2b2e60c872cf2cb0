//! tests/mod.rs
//! A shared test helper to spawn the app on an ephemeral port with
//! in-memory backends and a seeded admin account.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{serve, Router};
use hotel_sentinel::config::{environment::EnvironmentVariables, state::AppState};
use hotel_sentinel::core::server::create_app;
use hotel_sentinel::database::EventQuery;
use hotel_sentinel::models::EventType;
use hotel_sentinel::security::auth::seed_admin;
use serde_json::{json, Value};
use tokio::net::TcpListener as TokioTcpListener;

pub const ADMIN_EMAIL: &str = "security.lead@hotel.test";
pub const ADMIN_PASSWORD: &str = "night-shift-2024";

pub struct TestApp {
    pub base_url: String,
    pub client: reqwest::Client,
    pub state: AppState,
}

/// Spawns the app on a random unused port.
pub async fn spawn_app() -> TestApp {
    // * Minimum bcrypt cost and a generous request timeout.
    let env: EnvironmentVariables = EnvironmentVariables {
        bcrypt_cost: 4,
        default_timeout_seconds: 10,
        admin_email: Some(ADMIN_EMAIL.to_string()),
        admin_password: Some(ADMIN_PASSWORD.to_string()),
        ..EnvironmentVariables::default()
    };

    let state: AppState = AppState::in_memory(Arc::new(env));
    seed_admin(&state.store, &state.environment)
        .await
        .expect("Failed to seed admin");

    let app: Router = create_app(state.clone());

    // * Bind an ephemeral port using std::net::TcpListener.
    let std_listener: std::net::TcpListener = std::net::TcpListener::bind("127.0.0.1:0")
        .expect("Failed to bind random port");
    std_listener.set_nonblocking(true).unwrap();

    // * Convert std::net::TcpListener to tokio::net::TcpListener.
    let tokio_listener: TokioTcpListener = TokioTcpListener::from_std(std_listener)
        .expect("Failed to convert to tokio listener");

    let addr: SocketAddr = tokio_listener.local_addr().unwrap();

    // * Spawn the server in a background task.
    tokio::spawn(async move {
        serve(tokio_listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .expect("Server failed");
    });

    TestApp {
        base_url: format!("http://{}", addr),
        client: reqwest::Client::new(),
        state,
    }
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// POST /auth/login as if from `ip`
    pub async fn login(&self, email: &str, password: &str, ip: &str) -> reqwest::Response {
        self.client
            .post(self.url("/auth/login"))
            .header("x-forwarded-for", ip)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .expect("Failed to execute login request.")
    }

    pub async fn register(&self, email: &str, password: &str) -> reqwest::Response {
        self.client
            .post(self.url("/auth/register"))
            .header("x-forwarded-for", "192.0.2.200")
            .json(&json!({ "email": email, "password": password, "full_name": "Front Desk" }))
            .send()
            .await
            .expect("Failed to execute register request.")
    }

    /// Access token for the seeded admin
    pub async fn admin_token(&self) -> String {
        let resp: reqwest::Response = self.login(ADMIN_EMAIL, ADMIN_PASSWORD, "192.0.2.250").await;
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        let body: Value = resp.json().await.unwrap();
        body["access"].as_str().unwrap().to_string()
    }

    /// GET `path` with a bearer token, as if from `ip`
    pub async fn get_as(&self, path: &str, token: &str, ip: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .bearer_auth(token)
            .header("x-forwarded-for", ip)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn post_as(&self, path: &str, token: &str, body: Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .bearer_auth(token)
            .header("x-forwarded-for", "192.0.2.250")
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    /// Number of recorded events of `event_type`
    pub async fn count_events(&self, event_type: EventType) -> i64 {
        self.state
            .store
            .count_events(&EventQuery {
                event_type: Some(event_type),
                ..EventQuery::default()
            })
            .await
            .expect("Failed to count events")
    }

    /// Five wrong passwords from `ip`, enough to trip brute-force detection
    pub async fn brute_force_from(&self, ip: &str) {
        for attempt in 0..5 {
            let resp: reqwest::Response = self
                .login(&format!("guest{attempt}@hotel.test"), "wrong-password", ip)
                .await;
            assert_eq!(resp.status(), reqwest::StatusCode::UNAUTHORIZED);
        }
    }
}
