//! Server-Sent Events for experience progress
//!
//! Forwards experience events from the bus; playback events are not relayed.

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use djmx_common::events::DjmxEvent;
use futures::stream::{Stream, StreamExt};
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};

use crate::AppState;

/// GET /events
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    debug!("New SSE client connected");

    let rx = state.event_bus.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| async move {
        match result {
            Ok(event) => {
                if !is_experience_event(&event) {
                    return None;
                }
                let event_type = event.event_type();
                match serde_json::to_string(&event) {
                    Ok(json) => Some(Ok(Event::default().event(event_type).data(json))),
                    Err(e) => {
                        warn!("Failed to serialize event {}: {}", event_type, e);
                        None
                    }
                }
            }
            Err(e) => {
                // Lagged subscriber; keep streaming
                warn!("SSE stream error: {:?}", e);
                None
            }
        }
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

fn is_experience_event(event: &DjmxEvent) -> bool {
    matches!(
        event,
        DjmxEvent::ExperienceProgress { .. }
            | DjmxEvent::ExperienceReady { .. }
            | DjmxEvent::ExperienceFailed { .. }
    )
}
