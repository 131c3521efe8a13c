//! HTTP API handlers for djmx-ap

pub mod health;
pub mod playback;
pub mod queue;
pub mod remote;
pub mod sse;

pub use health::health_routes;
pub use playback::playback_routes;
pub use queue::queue_routes;
pub use remote::remote_routes;
pub use sse::event_stream;

use serde::Serialize;

/// Acknowledgement body for commands with nothing else to report
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }
}
