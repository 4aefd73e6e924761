// Main entry point - Dependency injection and server setup
mod domain;
mod application;
mod infrastructure;
mod presentation;

use std::{net::SocketAddr, sync::Arc};
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::application::coordinator::SessionCoordinator;
use crate::infrastructure::config::{load_dashboard_config, resolve_runtime_config};
use crate::infrastructure::connector::connector_for;
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{dashboard, health_check, history, retry_session, send_command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Load configuration
    let config = load_dashboard_config()?;
    let client = reqwest::Client::builder()
        .timeout(config.request_timeout())
        .build()?;

    // Pick the transport once; later changes need a restart
    let runtime = resolve_runtime_config(&config, &client).await;
    let connector = connector_for(&runtime, &config, client);

    // Create the session (application layer)
    let coordinator = Arc::new(SessionCoordinator::new(config.session_settings(&runtime)));
    coordinator.start(connector);

    let state = Arc::new(AppState {
        coordinator: coordinator.clone(),
    });

    // Build router (presentation layer)
    let router = Router::new()
        .route("/healthz", get(health_check))
        .route("/api/dashboard", get(dashboard))
        .route("/api/history", get(history))
        .route("/api/commands/:command", post(send_command))
        .route("/api/session/retry", post(retry_session))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr: SocketAddr = config.server.bind.parse()?;
    tracing::info!("Starting engine-telemetry dashboard on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    coordinator.stop().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
