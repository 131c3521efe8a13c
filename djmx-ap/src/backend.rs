//! Uniform transport surface over the local engine and the remote device
//!
//! The controller talks to whichever backend is active through
//! [`PlaybackBackend`]; neither side knows about the other.

use async_trait::async_trait;
use djmx_common::types::{QueueItem, QueueItemKind};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::playback::PlaybackEngine;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Local,
    Remote,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Local => "local",
            BackendKind::Remote => "remote",
        }
    }
}

/// What is currently audible
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NowPlaying {
    Track {
        id: String,
        title: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        artist: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        album_art: Option<String>,
        #[serde(default)]
        is_ai_generated: bool,
    },
    DjSegment {
        id: String,
        kind: QueueItemKind,
        title: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        dj_text: Option<String>,
    },
}

impl NowPlaying {
    pub fn from_item(item: &QueueItem) -> Self {
        if item.kind.is_spoken() {
            NowPlaying::DjSegment {
                id: item.id.clone(),
                kind: item.kind,
                title: item.metadata.title.clone(),
                dj_text: item.metadata.dj_text.clone(),
            }
        } else {
            NowPlaying::Track {
                id: item.id.clone(),
                title: item.metadata.title.clone(),
                artist: item.metadata.artist.clone(),
                album_art: item.metadata.album_art.clone(),
                is_ai_generated: item.metadata.is_ai_generated,
            }
        }
    }
}

/// Transport state reported by a backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendStatus {
    pub kind: BackendKind,
    pub is_playing: bool,
    pub position_seconds: f64,
    pub duration_seconds: f64,
    pub volume: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub now_playing: Option<NowPlaying>,
}

#[async_trait]
pub trait PlaybackBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Start playback of the current item
    async fn play(&self) -> Result<()>;

    async fn pause(&self) -> Result<()>;

    async fn resume(&self) -> Result<()>;

    async fn next(&self) -> Result<()>;

    async fn previous(&self) -> Result<()>;

    async fn seek(&self, seconds: f64) -> Result<()>;

    /// Volume in 0.0..=1.0
    async fn set_volume(&self, volume: f32) -> Result<()>;

    async fn status(&self) -> BackendStatus;
}

#[async_trait]
impl PlaybackBackend for PlaybackEngine {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    async fn play(&self) -> Result<()> {
        PlaybackEngine::play(self).await;
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        PlaybackEngine::pause(self).await;
        Ok(())
    }

    async fn resume(&self) -> Result<()> {
        PlaybackEngine::play(self).await;
        Ok(())
    }

    async fn next(&self) -> Result<()> {
        PlaybackEngine::next(self).await;
        Ok(())
    }

    async fn previous(&self) -> Result<()> {
        PlaybackEngine::previous(self).await;
        Ok(())
    }

    async fn seek(&self, seconds: f64) -> Result<()> {
        PlaybackEngine::seek(self, seconds).await;
        Ok(())
    }

    async fn set_volume(&self, volume: f32) -> Result<()> {
        PlaybackEngine::set_volume(self, volume).await;
        Ok(())
    }

    async fn status(&self) -> BackendStatus {
        let snapshot = self.snapshot().await;
        let now_playing = snapshot
            .queue
            .get(snapshot.current_index)
            .map(NowPlaying::from_item);

        BackendStatus {
            kind: BackendKind::Local,
            is_playing: snapshot.is_playing,
            position_seconds: snapshot.current_time_seconds,
            duration_seconds: snapshot.duration_seconds,
            volume: snapshot.volume,
            now_playing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use djmx_common::types::QueueItemMetadata;

    fn item(kind: QueueItemKind) -> QueueItem {
        QueueItem {
            id: "x".to_string(),
            kind,
            audio_url: String::new(),
            metadata: QueueItemMetadata {
                title: "T".to_string(),
                dj_text: Some("Hello night owls".to_string()),
                is_ai_generated: kind.is_dj_content(),
                ..Default::default()
            },
            duration_seconds: 1.0,
        }
    }

    #[test]
    fn test_spoken_items_are_dj_segments() {
        let now = NowPlaying::from_item(&item(QueueItemKind::DjOutro));
        let json = serde_json::to_value(&now).unwrap();

        assert_eq!(json["type"], "dj_segment");
        assert_eq!(json["kind"], "dj_outro");
        assert_eq!(json["dj_text"], "Hello night owls");
    }

    #[test]
    fn test_ai_song_is_a_track() {
        match NowPlaying::from_item(&item(QueueItemKind::AiSong)) {
            NowPlaying::Track {
                is_ai_generated, ..
            } => assert!(is_ai_generated),
            other => panic!("unexpected: {:?}", other),
        }
    }
}
