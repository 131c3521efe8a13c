//! Transport endpoints
//!
//! Every command goes to whichever backend is active; see `PlayerController`.

use axum::{extract::State, routing::{get, post}, Json, Router};
use serde::Deserialize;
use tracing::info;

use super::StatusResponse;
use crate::controller::PlayerStatus;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeekRequest {
    pub time_seconds: f64,
}

#[derive(Debug, Deserialize)]
pub struct VolumeRequest {
    pub volume: f32,
}

#[derive(Debug, Deserialize)]
pub struct IndexRequest {
    pub index: usize,
}

/// POST /playback/play
pub async fn play(State(state): State<AppState>) -> ApiResult<Json<StatusResponse>> {
    info!("Play command received");
    state.controller.play().await?;
    Ok(Json(StatusResponse::ok()))
}

/// POST /playback/pause
pub async fn pause(State(state): State<AppState>) -> ApiResult<Json<StatusResponse>> {
    info!("Pause command received");
    state.controller.pause().await?;
    Ok(Json(StatusResponse::ok()))
}

/// POST /playback/resume
pub async fn resume(State(state): State<AppState>) -> ApiResult<Json<StatusResponse>> {
    state.controller.resume().await?;
    Ok(Json(StatusResponse::ok()))
}

/// POST /playback/next
pub async fn next(State(state): State<AppState>) -> ApiResult<Json<StatusResponse>> {
    info!("Next command received");
    state.controller.next().await?;
    Ok(Json(StatusResponse::ok()))
}

/// POST /playback/previous
pub async fn previous(State(state): State<AppState>) -> ApiResult<Json<StatusResponse>> {
    info!("Previous command received");
    state.controller.previous().await?;
    Ok(Json(StatusResponse::ok()))
}

/// POST /playback/seek
pub async fn seek(
    State(state): State<AppState>,
    Json(req): Json<SeekRequest>,
) -> ApiResult<Json<StatusResponse>> {
    if !req.time_seconds.is_finite() {
        return Err(ApiError::BadRequest("timeSeconds must be a finite number".to_string()));
    }
    state.controller.seek(req.time_seconds.max(0.0)).await?;
    Ok(Json(StatusResponse::ok()))
}

/// POST /playback/volume
///
/// Out-of-range values are clamped to 0.0..=1.0.
pub async fn set_volume(
    State(state): State<AppState>,
    Json(req): Json<VolumeRequest>,
) -> ApiResult<Json<StatusResponse>> {
    if !req.volume.is_finite() {
        return Err(ApiError::BadRequest("volume must be a finite number".to_string()));
    }
    state.controller.set_volume(req.volume.clamp(0.0, 1.0)).await?;
    Ok(Json(StatusResponse::ok()))
}

/// POST /playback/index
pub async fn play_at_index(
    State(state): State<AppState>,
    Json(req): Json<IndexRequest>,
) -> ApiResult<Json<StatusResponse>> {
    info!(index = req.index, "Jump command received");
    state.controller.play_at_index(req.index).await?;
    Ok(Json(StatusResponse::ok()))
}

/// GET /playback/state
pub async fn get_state(State(state): State<AppState>) -> Json<PlayerStatus> {
    Json(state.controller.status().await)
}

pub fn playback_routes() -> Router<AppState> {
    Router::new()
        .route("/playback/play", post(play))
        .route("/playback/pause", post(pause))
        .route("/playback/resume", post(resume))
        .route("/playback/next", post(next))
        .route("/playback/previous", post(previous))
        .route("/playback/seek", post(seek))
        .route("/playback/volume", post(set_volume))
        .route("/playback/index", post(play_at_index))
        .route("/playback/state", get(get_state))
}
