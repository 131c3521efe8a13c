//! Event types for the DJMX event system
//!
//! Provides the shared event enum and the EventBus used by both services.
//! Events are broadcast in-process and serialized for SSE transmission.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::types::QueueItemKind;

/// Why a queue item started playing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartReason {
    /// First item after a queue replacement
    QueueStart,
    /// Explicit play command
    Play,
    /// User skip (next/previous)
    Skip,
    /// Jump to an arbitrary index
    Jump,
    /// Unattended advance after a crossfade or natural end
    AutoAdvance,
}

/// DJMX event types
///
/// Events are broadcast via EventBus; `#[serde(tag = "type")]` keeps the SSE
/// payload self-describing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DjmxEvent {
    /// Generation job progressed
    ExperienceProgress {
        experience_id: Uuid,
        step: String,
        percent: u8,
        timestamp: DateTime<Utc>,
    },

    /// Generation job finished with a queue
    ExperienceReady {
        experience_id: Uuid,
        item_count: usize,
        timestamp: DateTime<Utc>,
    },

    /// Generation job failed or was cancelled
    ExperienceFailed {
        experience_id: Uuid,
        error: String,
        timestamp: DateTime<Utc>,
    },

    /// Transport switched between playing and paused
    PlaybackStateChanged {
        is_playing: bool,
        timestamp: DateTime<Utc>,
    },

    /// An item became the current item
    TrackStarted {
        index: usize,
        item_id: String,
        title: String,
        kind: QueueItemKind,
        reason: StartReason,
        timestamp: DateTime<Utc>,
    },

    /// Crossfade window opened between two adjacent items
    CrossfadeStarted {
        from_index: usize,
        to_index: usize,
        timestamp: DateTime<Utc>,
    },

    /// Crossfade window closed; `index` is the new current item
    CrossfadeCompleted {
        index: usize,
        timestamp: DateTime<Utc>,
    },

    /// Periodic position report
    PlaybackProgress {
        index: usize,
        current_time_seconds: f64,
        duration_seconds: f64,
        timestamp: DateTime<Utc>,
    },

    /// Queue contents changed
    QueueChanged {
        length: usize,
        current_index: usize,
        timestamp: DateTime<Utc>,
    },

    /// Volume changed (0.0-1.0)
    VolumeChanged {
        volume: f32,
        timestamp: DateTime<Utc>,
    },

    /// Active playback backend changed ("local" or "remote")
    BackendChanged {
        backend: String,
        timestamp: DateTime<Utc>,
    },

    /// Generated DJ content was installed into the local queue
    DjContentInstalled {
        experience_id: Uuid,
        mode: String,
        item_count: usize,
        timestamp: DateTime<Utc>,
    },
}

impl DjmxEvent {
    /// Event name used for the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            DjmxEvent::ExperienceProgress { .. } => "ExperienceProgress",
            DjmxEvent::ExperienceReady { .. } => "ExperienceReady",
            DjmxEvent::ExperienceFailed { .. } => "ExperienceFailed",
            DjmxEvent::PlaybackStateChanged { .. } => "PlaybackStateChanged",
            DjmxEvent::TrackStarted { .. } => "TrackStarted",
            DjmxEvent::CrossfadeStarted { .. } => "CrossfadeStarted",
            DjmxEvent::CrossfadeCompleted { .. } => "CrossfadeCompleted",
            DjmxEvent::PlaybackProgress { .. } => "PlaybackProgress",
            DjmxEvent::QueueChanged { .. } => "QueueChanged",
            DjmxEvent::VolumeChanged { .. } => "VolumeChanged",
            DjmxEvent::BackendChanged { .. } => "BackendChanged",
            DjmxEvent::DjContentInstalled { .. } => "DjContentInstalled",
        }
    }
}

/// In-process broadcast bus for DjmxEvent
///
/// Cloning is cheap; all clones share one channel.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<DjmxEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with the given channel capacity
    ///
    /// Slow subscribers lose the oldest events once `capacity` is exceeded.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<DjmxEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: DjmxEvent,
    ) -> Result<usize, broadcast::error::SendError<DjmxEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: DjmxEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_without_subscribers_errors() {
        let bus = EventBus::new(10);
        let result = bus.emit(DjmxEvent::VolumeChanged {
            volume: 0.5,
            timestamp: Utc::now(),
        });
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_subscriber_receives_events() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        bus.emit_lossy(DjmxEvent::CrossfadeCompleted {
            index: 3,
            timestamp: Utc::now(),
        });

        match rx.recv().await.unwrap() {
            DjmxEvent::CrossfadeCompleted { index, .. } => assert_eq!(index, 3),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = DjmxEvent::TrackStarted {
            index: 0,
            item_id: "x-intro".to_string(),
            title: "DJ Intro".to_string(),
            kind: QueueItemKind::DjIntro,
            reason: StartReason::QueueStart,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "TrackStarted");
        assert_eq!(json["kind"], "dj_intro");
        assert_eq!(json["reason"], "queue_start");
        assert_eq!(event.event_type(), "TrackStarted");
    }
}
