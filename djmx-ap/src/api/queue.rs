//! Queue endpoints
//!
//! Queue edits always target the local engine, whichever backend is active.

use axum::{extract::State, routing::post, Json, Router};
use djmx_common::types::{CatalogTrack, QueueItem};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::StatusResponse;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct QueueRequest {
    pub items: Vec<QueueItem>,
}

#[derive(Debug, Deserialize)]
pub struct CatalogQueueRequest {
    pub tracks: Vec<CatalogTrack>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueResponse {
    pub length: usize,
    pub current_index: usize,
}

async fn queue_response(state: &AppState) -> Json<QueueResponse> {
    let snapshot = state.controller.engine().snapshot().await;
    Json(QueueResponse {
        length: snapshot.queue.len(),
        current_index: snapshot.current_index,
    })
}

/// POST /queue
pub async fn set_queue(
    State(state): State<AppState>,
    Json(req): Json<QueueRequest>,
) -> Json<QueueResponse> {
    info!(count = req.items.len(), "Replacing queue");
    state.controller.set_queue(req.items).await;
    queue_response(&state).await
}

/// POST /queue/append
pub async fn append(
    State(state): State<AppState>,
    Json(req): Json<QueueRequest>,
) -> Json<QueueResponse> {
    state.controller.append_to_queue(req.items).await;
    queue_response(&state).await
}

/// POST /queue/insert
pub async fn insert(
    State(state): State<AppState>,
    Json(req): Json<QueueRequest>,
) -> Json<QueueResponse> {
    state.controller.insert_after_current(req.items).await;
    queue_response(&state).await
}

/// POST /queue/catalog
pub async fn set_catalog(
    State(state): State<AppState>,
    Json(req): Json<CatalogQueueRequest>,
) -> Json<QueueResponse> {
    info!(count = req.tracks.len(), "Loading catalog tracks");
    state.controller.set_catalog_queue(req.tracks).await;
    queue_response(&state).await
}

/// POST /queue/play-count
///
/// Zeroes the play counter and re-arms the DJ trigger.
pub async fn reset_play_count(State(state): State<AppState>) -> Json<StatusResponse> {
    state.controller.reset_trigger().await;
    Json(StatusResponse::ok())
}

pub fn queue_routes() -> Router<AppState> {
    Router::new()
        .route("/queue", post(set_queue))
        .route("/queue/append", post(append))
        .route("/queue/insert", post(insert))
        .route("/queue/catalog", post(set_catalog))
        .route("/queue/play-count", post(reset_play_count))
}
