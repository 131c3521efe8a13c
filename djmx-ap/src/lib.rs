//! djmx-ap library interface
//!
//! Player service: a crossfading local queue engine, a remote-device backend
//! and the DJ injector that splices generated intro/song/outro content into
//! the queue after a few plays.

pub mod api;
pub mod audio;
pub mod backend;
pub mod config;
pub mod controller;
pub mod error;
pub mod injector;
pub mod playback;
pub mod remote;

pub use crate::error::{ApiError, ApiResult, Error, Result};

use axum::Router;
use chrono::{DateTime, Utc};
use djmx_common::events::EventBus;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::controller::PlayerController;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<PlayerController>,
    pub event_bus: EventBus,
    /// Output device name as reported at startup
    pub audio_device: String,
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        controller: Arc<PlayerController>,
        event_bus: EventBus,
        audio_device: impl Into<String>,
    ) -> Self {
        Self {
            controller,
            event_bus,
            audio_device: audio_device.into(),
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .merge(api::playback_routes())
        .merge(api::queue_routes())
        .merge(api::remote_routes())
        .merge(api::health_routes())
        .route("/events", get(api::event_stream))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
