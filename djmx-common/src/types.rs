//! Data model shared by the generation service and the player
//!
//! Wire format is camelCase JSON so records can be handed to web clients unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Mood recorded when the caller gives none
pub const DEFAULT_MOOD: &str = "energetic";

/// Kind of a queue entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueItemKind {
    /// Track resolved from the music catalog
    CatalogTrack,
    /// Spoken DJ introduction
    DjIntro,
    /// Generated song
    AiSong,
    /// Spoken DJ outro
    DjOutro,
}

impl QueueItemKind {
    /// True for items produced by the generation pipeline
    pub fn is_dj_content(&self) -> bool {
        !matches!(self, QueueItemKind::CatalogTrack)
    }

    /// True for spoken segments (intro/outro)
    pub fn is_spoken(&self) -> bool {
        matches!(self, QueueItemKind::DjIntro | QueueItemKind::DjOutro)
    }
}

/// Display metadata attached to a queue entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItemMetadata {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album_art: Option<String>,
    /// Transcript of a spoken segment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dj_text: Option<String>,
    #[serde(default)]
    pub is_ai_generated: bool,
}

/// A unit of playback
///
/// Immutable once placed in a queue; only its position changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    pub id: String,
    pub kind: QueueItemKind,
    /// Playable URL; empty when the item has no audio (silent placeholder)
    #[serde(default)]
    pub audio_url: String,
    pub metadata: QueueItemMetadata,
    /// Declared length, used before the decoder reports the real duration
    pub duration_seconds: f64,
}

impl QueueItem {
    /// Whether the item carries a playable audio source
    pub fn has_audio(&self) -> bool {
        !self.audio_url.trim().is_empty()
    }
}

/// Track metadata as returned by the music catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogTrack {
    pub id: String,
    pub title: String,
    /// Artist names joined with ", "
    pub artist: String,
    pub album: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album_art: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
    /// Whole seconds
    pub duration: u32,
    #[serde(default)]
    pub spotify_url: String,
}

impl CatalogTrack {
    /// Remote playback reference for this track
    pub fn uri(&self) -> String {
        format!("spotify:track:{}", self.id)
    }

    /// Convert to a queue entry; the preview clip is the playable source
    pub fn to_queue_item(&self) -> QueueItem {
        QueueItem {
            id: self.id.clone(),
            kind: QueueItemKind::CatalogTrack,
            audio_url: self.preview_url.clone().unwrap_or_default(),
            metadata: QueueItemMetadata {
                title: self.title.clone(),
                artist: Some(self.artist.clone()),
                album_art: self.album_art.clone(),
                dj_text: None,
                is_ai_generated: false,
            },
            duration_seconds: self.duration as f64,
        }
    }
}

/// Listener preferences driving one generation job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationPreferences {
    pub artists: Vec<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default = "default_mood")]
    pub mood: String,
}

fn default_mood() -> String {
    DEFAULT_MOOD.to_string()
}

impl GenerationPreferences {
    /// Build preferences, recording the default mood when none is given
    pub fn new(artists: Vec<String>, genres: Vec<String>, mood: Option<String>) -> Self {
        let mood = mood
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(default_mood);
        Self {
            artists,
            genres,
            mood,
        }
    }
}

/// Generation job status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExperienceStatus {
    Generating,
    Ready,
    Error,
}

impl ExperienceStatus {
    /// Ready and Error are terminal; a record never leaves them
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExperienceStatus::Ready | ExperienceStatus::Error)
    }
}

/// Progress report for a generation job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub step: String,
    /// 0-100
    pub percent: u8,
}

impl Default for Progress {
    fn default() -> Self {
        Self {
            step: "Initializing".to_string(),
            percent: 0,
        }
    }
}

/// Intermediate outputs kept until the job reaches a terminal state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialArtifacts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intro_audio_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outro_audio_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub music_job_id: Option<String>,
}

/// One generation job's state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperienceRecord {
    pub id: Uuid,
    pub status: ExperienceStatus,
    pub progress: Progress,
    /// Present only when status is ready
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue: Option<Vec<QueueItem>>,
    /// Present only when status is error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub context: GenerationPreferences,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dj_intro_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dj_outro_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_song_title: Option<String>,
    #[serde(default)]
    pub artifacts: PartialArtifacts,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ExperienceRecord {
    /// New record in the generating state at 0%
    pub fn new(id: Uuid, context: GenerationPreferences) -> Self {
        let now = Utc::now();
        Self {
            id,
            status: ExperienceStatus::Generating,
            progress: Progress::default(),
            queue: None,
            error: None,
            context,
            dj_intro_text: None,
            dj_outro_text: None,
            ai_song_title: None,
            artifacts: PartialArtifacts::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
