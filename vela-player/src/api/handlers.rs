//! HTTP request handlers

use super::AppContext;
use crate::error::{ApiError, ApiResult};
use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use tracing::info;
use vela_common::events::{PlayerState, VelaEvent};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    fn accepted() -> (StatusCode, Json<Self>) {
        (
            StatusCode::ACCEPTED,
            Json(Self {
                status: "accepted".to_string(),
            }),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdEntry {
    pub level: usize,
    pub value: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ThresholdsResponse {
    pub thresholds: Vec<ThresholdEntry>,
}

#[derive(Debug, Deserialize)]
pub struct LevelRequest {
    pub level: usize,
}

#[derive(Debug, Deserialize)]
pub struct ReadingRequest {
    pub value: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LogLevelBody {
    pub filter: String,
}

/// Source name for readings posted over HTTP
const WEB_SOURCE: &str = "web";

// ============================================================================
// Handlers
// ============================================================================

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "vela-player".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /api/v1/thresholds
///
/// Returns the table and asks the processor to publish it on the bus, so
/// SSE clients see the same values.
pub async fn get_thresholds(State(ctx): State<AppContext>) -> Json<ThresholdsResponse> {
    ctx.bus.emit_lossy(VelaEvent::RequestThresholds);

    let thresholds = ctx
        .thresholds
        .get_all()
        .into_iter()
        .map(|(level, value)| ThresholdEntry { level, value })
        .collect();
    Json(ThresholdsResponse { thresholds })
}

/// POST /api/v1/thresholds
pub async fn set_threshold(
    State(ctx): State<AppContext>,
    Json(entry): Json<ThresholdEntry>,
) -> ApiResult<(StatusCode, Json<StatusResponse>)> {
    let max = ctx.thresholds.len();
    if entry.level < 1 || entry.level > max {
        return Err(ApiError::BadRequest(format!(
            "level {} out of range 1..={}",
            entry.level, max
        )));
    }
    if !entry.value.is_finite() {
        return Err(ApiError::BadRequest("threshold must be finite".to_string()));
    }

    info!(level = entry.level, value = entry.value, "threshold change requested");
    ctx.bus.emit_lossy(VelaEvent::SetThreshold {
        level: entry.level,
        value: entry.value,
    });
    Ok(StatusResponse::accepted())
}

/// POST /api/v1/level
pub async fn request_level(
    State(ctx): State<AppContext>,
    Json(request): Json<LevelRequest>,
) -> ApiResult<(StatusCode, Json<StatusResponse>)> {
    let max = ctx.thresholds.len();
    if request.level > max {
        return Err(ApiError::BadRequest(format!(
            "level {} out of range 0..={}",
            request.level, max
        )));
    }

    info!(level = request.level, "level change requested over HTTP");
    ctx.bus.emit_lossy(VelaEvent::PlayLevelChange {
        level: request.level,
        comment: WEB_SOURCE.to_string(),
    });
    Ok(StatusResponse::accepted())
}

/// POST /api/v1/readings
pub async fn post_reading(
    State(ctx): State<AppContext>,
    Json(request): Json<ReadingRequest>,
) -> ApiResult<(StatusCode, Json<StatusResponse>)> {
    if !request.value.is_finite() {
        return Err(ApiError::BadRequest("reading must be finite".to_string()));
    }
    if ctx.agd_source != WEB_SOURCE {
        return Err(ApiError::Conflict(format!(
            "AGD processor reads from {:?}; set agd.source = \"{}\" to post readings",
            ctx.agd_source, WEB_SOURCE
        )));
    }

    ctx.bus.emit_lossy(VelaEvent::Reading {
        source: WEB_SOURCE.to_string(),
        value: request.value,
    });
    Ok(StatusResponse::accepted())
}

/// GET /api/v1/player
pub async fn get_player_state(State(ctx): State<AppContext>) -> Json<PlayerState> {
    Json(*ctx.player_state.borrow())
}

/// GET /api/v1/log-level
pub async fn get_log_level(State(ctx): State<AppContext>) -> ApiResult<Json<LogLevelBody>> {
    let control = ctx
        .log_control
        .as_ref()
        .ok_or_else(|| ApiError::Unavailable("log control not installed".to_string()))?;
    Ok(Json(LogLevelBody {
        filter: control.current(),
    }))
}

/// POST /api/v1/log-level
pub async fn set_log_level(
    State(ctx): State<AppContext>,
    Json(body): Json<LogLevelBody>,
) -> ApiResult<Json<LogLevelBody>> {
    let control = ctx
        .log_control
        .as_ref()
        .ok_or_else(|| ApiError::Unavailable("log control not installed".to_string()))?;
    control.set_filter(&body.filter)?;
    Ok(Json(LogLevelBody {
        filter: control.current(),
    }))
}
