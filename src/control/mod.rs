//! Operator control surface: Axum JSON API.
//!
//! Start and cancel runs, tune amount ranges, refresh the wallet and read
//! progress. CORS enabled for local tooling.

pub mod routes;

use anyhow::{Context, Result};
use axum::{
    http::{header, Method},
    routing::{get, post, put},
    Router,
};
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

pub use routes::{AppState, ControlState};

/// Bind the control port and serve in a background task.
pub async fn spawn_control(state: AppState, port: u16) -> Result<JoinHandle<()>> {
    let app = build_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind control port {port}"))?;
    info!(port, "Control API listening on http://localhost:{port}");

    Ok(tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "Control API server error");
        }
    }))
}

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(routes::health))
        .route("/api/status", get(routes::get_status))
        .route("/api/pairs", get(routes::get_pairs))
        .route("/api/pairs/:id/ranges", put(routes::put_ranges))
        .route("/api/runs", post(routes::start_run))
        .route("/api/runs/cancel", post(routes::cancel_run))
        .route("/api/wallet/refresh", post(routes::refresh_wallet))
        .route("/api/activity", get(routes::get_activity))
        .layer(cors)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
