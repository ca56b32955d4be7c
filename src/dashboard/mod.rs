//! Dashboard: Axum JSON API over the refresh scheduler.
//!
//! Exposes the board views (races, movers, winners), the refresh and timer
//! controls, export downloads and the preference store. CORS enabled for
//! local development.

pub mod routes;

use anyhow::{Context, Result};
use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use routes::AppState;

/// Bind the dashboard port and serve in a background task.
pub async fn spawn_dashboard(state: AppState, port: u16) -> Result<JoinHandle<()>> {
    let app = build_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind dashboard port {port}"))?;
    info!(port, "Dashboard server starting on http://localhost:{port}");

    Ok(tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "Dashboard server error");
        }
    }))
}

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(HeaderValue::from_static("*"))
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        // Views
        .route("/api/status", get(routes::get_status))
        .route("/api/racecourses", get(routes::get_racecourses))
        .route("/api/races", get(routes::get_races))
        .route("/api/movers", get(routes::get_movers))
        .route("/api/winners", get(routes::get_winners))
        // Controls
        .route("/api/refresh", post(routes::post_refresh))
        .route("/api/winners/refresh", post(routes::post_winners_refresh))
        .route("/api/timer/start", post(routes::post_timer_start))
        .route("/api/timer/stop", post(routes::post_timer_stop))
        // Export + preferences
        .route("/api/export/:format", get(routes::get_export))
        .route(
            "/api/preferences/:key",
            get(routes::get_preference).put(routes::put_preference),
        )
        .route("/health", get(routes::health))
        .layer(cors)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
