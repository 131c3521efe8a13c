//! Experience generation endpoints
//!
//! POST /generate starts a job and returns immediately; clients poll
//! GET /experience/:id until the record is ready or failed.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use djmx_common::types::{ExperienceRecord, GenerationPreferences};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::pipeline::CancelOutcome;
use crate::AppState;

pub const MAX_ARTISTS: usize = 10;
pub const MAX_GENRES: usize = 5;
pub const MAX_MOOD_CHARS: usize = 100;

/// POST /generate request
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    #[serde(default)]
    pub artists: Vec<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub mood: Option<String>,
}

impl GenerateRequest {
    /// Trim, drop blanks and apply the size caps
    ///
    /// Fails when no artist survives.
    pub fn sanitize(self) -> Result<GenerationPreferences, ApiError> {
        let artists = clean_list(self.artists, MAX_ARTISTS);
        if artists.is_empty() {
            return Err(ApiError::BadRequest(
                "At least one artist is required".to_string(),
            ));
        }

        let genres = clean_list(self.genres, MAX_GENRES);
        let mood = self
            .mood
            .map(|m| m.trim().chars().take(MAX_MOOD_CHARS).collect::<String>());

        Ok(GenerationPreferences::new(artists, genres, mood))
    }
}

fn clean_list(values: Vec<String>, cap: usize) -> Vec<String> {
    values
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .take(cap)
        .collect()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub experience_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub status: String,
}

/// POST /generate
pub async fn start_generation(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> ApiResult<(StatusCode, Json<GenerateResponse>)> {
    let preferences = request.sanitize()?;
    let experience_id = state.pipeline.start_generation(preferences).await;

    Ok((StatusCode::ACCEPTED, Json(GenerateResponse { experience_id })))
}

/// GET /experience/:id
pub async fn get_experience(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ExperienceRecord>> {
    state
        .store
        .get(&id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Experience not found".to_string()))
}

/// POST /experience/:id/cancel
pub async fn cancel_experience(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<CancelResponse>)> {
    match state.pipeline.cancel_generation(&id).await {
        CancelOutcome::Cancelled => {
            info!(experience_id = %id, "Cancellation requested");
            Ok((
                StatusCode::ACCEPTED,
                Json(CancelResponse {
                    status: "cancelling".to_string(),
                }),
            ))
        }
        CancelOutcome::AlreadyFinished => Err(ApiError::Conflict(
            "Experience already finished".to_string(),
        )),
        CancelOutcome::NotFound => Err(ApiError::NotFound("Experience not found".to_string())),
    }
}

pub fn generate_routes() -> Router<AppState> {
    Router::new()
        .route("/generate", post(start_generation))
        .route("/experience/:id", get(get_experience))
        .route("/experience/:id/cancel", post(cancel_experience))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_trims_and_caps() {
        let request = GenerateRequest {
            artists: (0..15).map(|i| format!("  Artist {}  ", i)).collect(),
            genres: vec!["".into(), " shoegaze ".into()],
            mood: Some(format!("  {}", "m".repeat(150))),
        };

        let prefs = request.sanitize().unwrap();
        assert_eq!(prefs.artists.len(), MAX_ARTISTS);
        assert_eq!(prefs.artists[0], "Artist 0");
        assert_eq!(prefs.genres, vec!["shoegaze".to_string()]);
        assert_eq!(prefs.mood.chars().count(), MAX_MOOD_CHARS);
    }

    #[test]
    fn test_sanitize_rejects_blank_artists() {
        let request = GenerateRequest {
            artists: vec!["   ".into(), "".into()],
            ..Default::default()
        };
        assert!(matches!(request.sanitize(), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn test_missing_mood_gets_default() {
        let request = GenerateRequest {
            artists: vec!["Deftones".into()],
            ..Default::default()
        };
        let prefs = request.sanitize().unwrap();
        assert_eq!(prefs.mood, djmx_common::types::DEFAULT_MOOD);
    }
}
