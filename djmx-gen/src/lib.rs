//! djmx-gen library interface
//!
//! Generation service: turns listener preferences into a three-item DJ
//! experience (spoken intro, generated song, spoken outro) and exposes
//! catalog lookups used to seed playback.

pub mod api;
pub mod catalog;
pub mod clients;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod store;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use djmx_common::events::EventBus;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::catalog::SpotifyCatalog;
use crate::pipeline::GenerationPipeline;
use crate::store::ExperienceStore;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: ExperienceStore,
    pub pipeline: GenerationPipeline,
    /// None when catalog credentials are not configured
    pub catalog: Option<Arc<SpotifyCatalog>>,
    pub event_bus: EventBus,
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        pipeline: GenerationPipeline,
        catalog: Option<Arc<SpotifyCatalog>>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            store: pipeline.store().clone(),
            pipeline,
            catalog,
            event_bus,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .merge(api::generate_routes())
        .merge(api::catalog_routes())
        .merge(api::health_routes())
        .route("/events", get(api::event_stream))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
