//! Remote session notifications
//!
//! The browser-side remote player reports its lifecycle here; these calls
//! drive backend selection.

use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;
use tracing::info;

use super::StatusResponse;
use crate::error::{ApiError, ApiResult};
use crate::remote::RemoteStateUpdate;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadyRequest {
    pub device_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRequest {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// POST /remote/token
pub async fn install_token(
    State(state): State<AppState>,
    Json(req): Json<TokenRequest>,
) -> ApiResult<Json<StatusResponse>> {
    let access_token = req.access_token.trim().to_string();
    if access_token.is_empty() {
        return Err(ApiError::BadRequest("accessToken is required".to_string()));
    }
    info!("Remote access token installed");
    state
        .controller
        .install_token(access_token, req.refresh_token.filter(|t| !t.trim().is_empty()))
        .await;
    Ok(Json(StatusResponse::ok()))
}

/// POST /remote/ready
pub async fn ready(
    State(state): State<AppState>,
    Json(req): Json<ReadyRequest>,
) -> ApiResult<Json<StatusResponse>> {
    if req.device_id.trim().is_empty() {
        return Err(ApiError::BadRequest("deviceId is required".to_string()));
    }
    state.controller.remote_ready(req.device_id).await;
    Ok(Json(StatusResponse::ok()))
}

/// POST /remote/not-ready
pub async fn not_ready(State(state): State<AppState>) -> Json<StatusResponse> {
    state.controller.remote_not_ready().await;
    Json(StatusResponse::ok())
}

/// POST /remote/state
pub async fn state_changed(
    State(state): State<AppState>,
    Json(update): Json<RemoteStateUpdate>,
) -> Json<StatusResponse> {
    state.controller.remote_state_changed(update).await;
    Json(StatusResponse::ok())
}

/// POST /remote/auth-error
pub async fn auth_error(State(state): State<AppState>) -> Json<StatusResponse> {
    state.controller.remote_auth_error();
    Json(StatusResponse::ok())
}

pub fn remote_routes() -> Router<AppState> {
    Router::new()
        .route("/remote/token", post(install_token))
        .route("/remote/ready", post(ready))
        .route("/remote/not-ready", post(not_ready))
        .route("/remote/state", post(state_changed))
        .route("/remote/auth-error", post(auth_error))
}
