//! HTTP API: Axum server exposing the analyzer.
//!
//! CORS is open so browser frontends can call the service directly.

pub mod routes;

use anyhow::{Context, Result};
use axum::{
    http::{header, HeaderName, Method},
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

pub use routes::{ApiState, AppState};

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static(routes::CLIENT_ID_HEADER),
        ]);

    Router::new()
        .route("/health", get(routes::health))
        .route("/status", get(routes::get_status))
        .route("/analyze-market", post(routes::analyze_market))
        .route("/query", post(routes::query))
        .route("/prices", get(routes::get_prices))
        .layer(cors)
        .with_state(state)
}

/// Serve the API until `shutdown` resolves.
pub async fn serve<F>(state: AppState, addr: SocketAddr, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind API address {addr}"))?;
    info!(%addr, "API server listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("API server error")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
