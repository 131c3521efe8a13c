//! Catalog lookup endpoints

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use djmx_common::types::CatalogTrack;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::catalog::{demo_tracks_for_artists, MAX_SEARCH_LIMIT};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

const DEFAULT_PER_ARTIST: u32 = 3;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    #[serde(default)]
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct ArtistTracksQuery {
    /// Comma-separated artist names
    #[serde(default)]
    pub artists: String,
    #[serde(default)]
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TracksResponse {
    pub tracks: Vec<CatalogTrack>,
    /// True when the built-in demo set was served
    pub demo: bool,
}

/// GET /catalog/search?q=&limit=
pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<TracksResponse>> {
    let q = query.q.trim();
    if q.is_empty() {
        return Err(ApiError::BadRequest("Query parameter q is required".to_string()));
    }

    let catalog = state
        .catalog
        .as_ref()
        .ok_or_else(|| ApiError::Upstream("Catalog is not configured".to_string()))?;

    let tracks = catalog
        .search_tracks(q, query.limit.unwrap_or(MAX_SEARCH_LIMIT))
        .await?;

    Ok(Json(TracksResponse {
        tracks,
        demo: false,
    }))
}

/// GET /catalog/tracks?artists=a,b&limit=3
///
/// Never fails on catalog trouble; demo tracks are served instead.
pub async fn tracks_for_artists(
    State(state): State<AppState>,
    Query(query): Query<ArtistTracksQuery>,
) -> ApiResult<Json<TracksResponse>> {
    let artists: Vec<String> = query
        .artists
        .split(',')
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty())
        .collect();

    if artists.is_empty() {
        return Err(ApiError::BadRequest("At least one artist is required".to_string()));
    }

    let per_artist = query
        .limit
        .unwrap_or(DEFAULT_PER_ARTIST)
        .clamp(1, MAX_SEARCH_LIMIT);

    if let Some(catalog) = state.catalog.as_ref() {
        let tracks = catalog.tracks_for_artists(&artists, per_artist).await;
        if !tracks.is_empty() {
            return Ok(Json(TracksResponse {
                tracks,
                demo: false,
            }));
        }
        warn!("Catalog returned no tracks; serving demo tracks");
    }

    Ok(Json(TracksResponse {
        tracks: demo_tracks_for_artists(&artists, per_artist),
        demo: true,
    }))
}

pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/catalog/search", get(search))
        .route("/catalog/tracks", get(tracks_for_artists))
}
