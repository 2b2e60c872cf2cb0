// Start of file: src/main.rs

use std::net::SocketAddr;
use std::sync::Arc;
use axum::{Router, serve};
use tokio::net::TcpListener;

use hotel_sentinel::config::{environment::EnvironmentVariables, state::AppState};
use hotel_sentinel::core::{logging::init_tracing, server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let environment: Arc<EnvironmentVariables> = Arc::new(EnvironmentVariables::instance().clone());
    let state: AppState = AppState::from_environment(environment.clone()).await?;

    let app: Router = server::create_app(state.clone());
    let listener: TcpListener = server::setup_listener(&environment).await?;

    tracing::info!(
        "Server listening on: {}://{}",
        environment.protocol,
        listener.local_addr()?
    );

    // Peer addresses feed the client IP fallback
    serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(server::shutdown_signal())
        .await?;

    state.shutdown().await;
    Ok(())
}

// End of file: src/main.rs
