//! HTTP control API
//!
//! Thin layer over the event bus: requests become bus events, bus outputs are
//! streamed back over SSE.

pub mod handlers;
pub mod sse;

use crate::agd::SharedThresholds;
use crate::error::{Error, Result};
use crate::logging::LogControl;
use axum::{
    routing::{get, post},
    Router,
};
use std::future::Future;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use vela_common::config::ApiConfig;
use vela_common::events::{EventBus, PlayerState};

/// Shared application context passed to all handlers
#[derive(Clone)]
pub struct AppContext {
    pub bus: EventBus,
    pub thresholds: SharedThresholds,
    pub player_state: watch::Receiver<PlayerState>,
    /// Reading source the AGD processor listens to (`agd.source`)
    pub agd_source: String,
    /// `None` when logging was not installed through [`crate::logging::init`]
    pub log_control: Option<LogControl>,
}

pub fn create_router(ctx: AppContext) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/api/v1/thresholds",
            get(handlers::get_thresholds).post(handlers::set_threshold),
        )
        .route("/api/v1/level", post(handlers::request_level))
        .route("/api/v1/readings", post(handlers::post_reading))
        .route("/api/v1/player", get(handlers::get_player_state))
        .route(
            "/api/v1/log-level",
            get(handlers::get_log_level).post(handlers::set_log_level),
        )
        .route("/api/v1/events", get(sse::event_stream))
        .with_state(ctx)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Serve the API until `shutdown` resolves
pub async fn serve<F>(config: &ApiConfig, ctx: AppContext, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = format!("{}:{}", config.interface, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| Error::Http(format!("Failed to bind to {}: {}", addr, e)))?;
    info!("Starting HTTP server on {}", addr);

    axum::serve(listener, create_router(ctx))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| Error::Http(format!("Server error: {}", e)))?;

    info!("HTTP server stopped");
    Ok(())
}
