//! DJ-injection trigger
//!
//! Counts tracks played and, once the listener reaches the configured
//! threshold, asks the generation service for a DJ segment built from the
//! distinct artists in the current catalog queue. Fires at most once until
//! [`DjInjector::reset`].

use async_trait::async_trait;
use djmx_common::types::{
    ExperienceRecord, ExperienceStatus, GenerationPreferences, QueueItem, QueueItemKind,
    QueueItemMetadata,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Plays counted before generation starts (the fifth track)
pub const DEFAULT_TRIGGER_THRESHOLD: u32 = 4;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Give up waiting on the generation service after this long
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(300);

/// How generated content enters the local queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InjectionMode {
    /// Replace the queue; the DJ segment starts immediately
    #[default]
    Replace,
    /// Splice after the current item; the DJ segment plays next
    InsertAfterCurrent,
}

impl InjectionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            InjectionMode::Replace => "replace",
            InjectionMode::InsertAfterCurrent => "insert_after_current",
        }
    }
}

impl FromStr for InjectionMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "replace" => Ok(InjectionMode::Replace),
            "insert_after_current" | "insert" => Ok(InjectionMode::InsertAfterCurrent),
            other => Err(Error::Config(format!("Unknown injection mode: {}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum InjectionStatus {
    Idle,
    Generating,
    Ready {
        experience_id: Uuid,
        item_count: usize,
    },
    Error {
        message: String,
    },
}

/// A finished DJ segment
#[derive(Debug, Clone)]
pub struct GeneratedContent {
    pub experience_id: Uuid,
    pub queue: Vec<QueueItem>,
}

#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Run one generation to completion
    async fn generate(&self, preferences: GenerationPreferences) -> Result<GeneratedContent>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    experience_id: Uuid,
}

/// Talks to a running djmx-gen service
pub struct HttpGenerationService {
    http: reqwest::Client,
    base_url: String,
    poll_interval: Duration,
    max_wait: Duration,
}

impl HttpGenerationService {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_wait: DEFAULT_MAX_WAIT,
        }
    }

    pub fn with_timing(mut self, poll_interval: Duration, max_wait: Duration) -> Self {
        self.poll_interval = poll_interval;
        self.max_wait = max_wait;
        self
    }

    async fn fetch_record(&self, id: &Uuid) -> Result<ExperienceRecord> {
        let response = self
            .http
            .get(format!("{}/experience/{}", self.base_url, id))
            .send()
            .await
            .map_err(|e| Error::Generation(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::Generation(format!(
                "Experience {} lookup failed: HTTP {}",
                id,
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| Error::Generation(format!("Invalid experience record: {}", e)))
    }
}

#[async_trait]
impl GenerationService for HttpGenerationService {
    async fn generate(&self, preferences: GenerationPreferences) -> Result<GeneratedContent> {
        let response = self
            .http
            .post(format!("{}/generate", self.base_url))
            .json(&preferences)
            .send()
            .await
            .map_err(|e| Error::Generation(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Generation(format!("HTTP {}: {}", status, body)));
        }

        let GenerateResponse { experience_id } = response
            .json()
            .await
            .map_err(|e| Error::Generation(format!("Invalid generate response: {}", e)))?;
        info!(experience_id = %experience_id, "DJ generation started");

        let deadline = Instant::now() + self.max_wait;
        loop {
            tokio::time::sleep(self.poll_interval).await;
            let record = self.fetch_record(&experience_id).await?;
            debug!(
                experience_id = %experience_id,
                step = %record.progress.step,
                percent = record.progress.percent,
                "DJ generation progress"
            );

            match record.status {
                ExperienceStatus::Ready => {
                    return Ok(GeneratedContent {
                        experience_id,
                        queue: record.queue.unwrap_or_default(),
                    })
                }
                ExperienceStatus::Error => {
                    return Err(Error::Generation(
                        record.error.unwrap_or_else(|| "Unknown error".to_string()),
                    ))
                }
                ExperienceStatus::Generating => {}
            }

            if Instant::now() >= deadline {
                return Err(Error::Generation(format!(
                    "Gave up waiting for experience {} after {}s",
                    experience_id,
                    self.max_wait.as_secs()
                )));
            }
        }
    }
}

/// Pre-rendered DJ segment from a directory holding `intro.mp3`, `song.mp3`
/// and `outro.mp3`; used when no generation service is configured
pub struct StaticGenerationService {
    dir: PathBuf,
}

impl StaticGenerationService {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn item(&self, id: &str, kind: QueueItemKind, file: &str, metadata: QueueItemMetadata, duration: f64) -> QueueItem {
        QueueItem {
            id: id.to_string(),
            kind,
            audio_url: self.dir.join(file).to_string_lossy().into_owned(),
            metadata,
            duration_seconds: duration,
        }
    }
}

#[async_trait]
impl GenerationService for StaticGenerationService {
    async fn generate(&self, preferences: GenerationPreferences) -> Result<GeneratedContent> {
        let lead = preferences
            .artists
            .first()
            .cloned()
            .unwrap_or_else(|| "Late Night".to_string());

        let queue = vec![
            self.item(
                "dj-intro",
                QueueItemKind::DjIntro,
                "intro.mp3",
                QueueItemMetadata {
                    title: "DJ Intro".to_string(),
                    dj_text: Some("Hey what's up everyone, your DJ here...".to_string()),
                    is_ai_generated: true,
                    ..Default::default()
                },
                15.0,
            ),
            self.item(
                "dj-song",
                QueueItemKind::AiSong,
                "song.mp3",
                QueueItemMetadata {
                    title: format!("{} Vibe", lead),
                    artist: Some("DJ".to_string()),
                    is_ai_generated: true,
                    ..Default::default()
                },
                120.0,
            ),
            self.item(
                "dj-outro",
                QueueItemKind::DjOutro,
                "outro.mp3",
                QueueItemMetadata {
                    title: "DJ Outro".to_string(),
                    dj_text: Some("That was fire! Thanks for listening...".to_string()),
                    is_ai_generated: true,
                    ..Default::default()
                },
                10.0,
            ),
        ];

        Ok(GeneratedContent {
            experience_id: Uuid::new_v4(),
            queue,
        })
    }
}

/// Play counter with a one-shot generation trigger
pub struct DjInjector {
    threshold: u32,
    mode: InjectionMode,
    genres: Vec<String>,
    mood: Option<String>,
    play_count: AtomicU32,
    triggered: AtomicBool,
    artists: RwLock<Vec<String>>,
    status: RwLock<InjectionStatus>,
    service: Arc<dyn GenerationService>,
}

impl DjInjector {
    pub fn new(service: Arc<dyn GenerationService>, threshold: u32, mode: InjectionMode) -> Self {
        Self {
            threshold,
            mode,
            genres: Vec::new(),
            mood: None,
            play_count: AtomicU32::new(0),
            triggered: AtomicBool::new(false),
            artists: RwLock::new(Vec::new()),
            status: RwLock::new(InjectionStatus::Idle),
            service,
        }
    }

    /// Genres and mood sent with every generation request
    pub fn with_taste(mut self, genres: Vec<String>, mood: Option<String>) -> Self {
        self.genres = genres;
        self.mood = mood;
        self
    }

    pub fn mode(&self) -> InjectionMode {
        self.mode
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn play_count(&self) -> u32 {
        self.play_count.load(Ordering::Acquire)
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::Acquire)
    }

    pub async fn status(&self) -> InjectionStatus {
        self.status.read().await.clone()
    }

    pub async fn artists(&self) -> Vec<String> {
        self.artists.read().await.clone()
    }

    /// Replace the artist list with the distinct artists of `names`
    ///
    /// Each entry may hold several artists joined with ", ". Order of first
    /// appearance is kept.
    pub async fn set_artists<I, S>(&self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut distinct: Vec<String> = Vec::new();
        for name in names {
            for artist in name.as_ref().split(", ") {
                let artist = artist.trim();
                if !artist.is_empty() && !distinct.iter().any(|a| a == artist) {
                    distinct.push(artist.to_string());
                }
            }
        }
        *self.artists.write().await = distinct;
    }

    /// Count one play; returns true when this play fires the trigger
    pub async fn register_play(&self) -> bool {
        let count = self.play_count.fetch_add(1, Ordering::AcqRel) + 1;
        if count != self.threshold && count != self.threshold + 1 {
            return false;
        }
        if self.artists.read().await.is_empty() {
            debug!(count, "Trigger point reached but no artists known");
            return false;
        }

        let fired = self
            .triggered
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if fired {
            info!(count, "DJ injection triggered");
        }
        fired
    }

    /// Clear the counter and the one-shot guard
    pub async fn reset(&self) {
        self.play_count.store(0, Ordering::Release);
        self.triggered.store(false, Ordering::Release);
        *self.status.write().await = InjectionStatus::Idle;
        debug!("DJ injection trigger reset");
    }

    /// Run the generation for a fired trigger
    pub async fn generate(&self) -> Result<GeneratedContent> {
        *self.status.write().await = InjectionStatus::Generating;
        let preferences =
            GenerationPreferences::new(self.artists().await, self.genres.clone(), self.mood.clone());

        match self.service.generate(preferences).await {
            Ok(content) => {
                *self.status.write().await = InjectionStatus::Ready {
                    experience_id: content.experience_id,
                    item_count: content.queue.len(),
                };
                Ok(content)
            }
            Err(e) => {
                warn!(error = %e, "DJ generation failed");
                *self.status.write().await = InjectionStatus::Error {
                    message: e.to_string(),
                };
                Err(e)
            }
        }
    }
}
