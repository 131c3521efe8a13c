//! In-memory experience record store
//!
//! One record per generation job, keyed by experience id. Records live for the
//! process lifetime unless a TTL is configured, in which case terminal records
//! older than the TTL are swept periodically.
//!
//! Every mutation is a single write-lock section, so pollers never observe a
//! half-applied stage (e.g. `ready` without a queue).

use chrono::{DateTime, Utc};
use djmx_common::types::{
    ExperienceRecord, ExperienceStatus, GenerationPreferences, PartialArtifacts, QueueItem,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

/// Shared handle to the experience records
#[derive(Clone, Default)]
pub struct ExperienceStore {
    records: Arc<RwLock<HashMap<Uuid, ExperienceRecord>>>,
    ttl: Option<Duration>,
}

impl ExperienceStore {
    /// Store without eviction
    pub fn new() -> Self {
        Self::default()
    }

    /// Store whose terminal records expire `ttl` after their last update
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            records: Arc::default(),
            ttl: Some(ttl),
        }
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Insert a fresh generating record and return its id
    pub async fn create(&self, context: GenerationPreferences) -> Uuid {
        let id = Uuid::new_v4();
        let record = ExperienceRecord::new(id, context);
        self.records.write().await.insert(id, record);
        id
    }

    /// Snapshot of a record
    pub async fn get(&self, id: &Uuid) -> Option<ExperienceRecord> {
        self.records.read().await.get(id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Number of records still generating
    pub async fn active_count(&self) -> usize {
        self.records
            .read()
            .await
            .values()
            .filter(|r| r.status == ExperienceStatus::Generating)
            .count()
    }

    /// Apply `f` to a generating record; terminal and unknown records are untouched
    async fn with_generating<T>(
        &self,
        id: &Uuid,
        f: impl FnOnce(&mut ExperienceRecord) -> T,
    ) -> Option<T> {
        let mut records = self.records.write().await;
        let record = records.get_mut(id)?;
        if record.is_terminal() {
            return None;
        }
        let result = f(record);
        record.updated_at = Utc::now();
        Some(result)
    }

    /// Set step and percent; a lower percent than the current one is ignored
    ///
    /// Returns the percent now recorded, or None if the record is terminal or unknown.
    pub async fn update_progress(&self, id: &Uuid, step: &str, percent: u8) -> Option<u8> {
        self.with_generating(id, |record| {
            let percent = percent.min(100).max(record.progress.percent);
            record.progress.step = step.to_string();
            record.progress.percent = percent;
            percent
        })
        .await
    }

    /// Nudge percent forward by `increment`, never beyond `cap`
    pub async fn advance_progress(
        &self,
        id: &Uuid,
        step: &str,
        increment: u8,
        cap: u8,
    ) -> Option<u8> {
        self.with_generating(id, |record| {
            let current = record.progress.percent;
            let percent = current.saturating_add(increment).min(cap).max(current);
            record.progress.step = step.to_string();
            record.progress.percent = percent;
            percent
        })
        .await
    }

    /// Record the script's spoken text and song title
    pub async fn set_script(
        &self,
        id: &Uuid,
        intro_text: &str,
        outro_text: &str,
        song_title: &str,
    ) -> bool {
        self.with_generating(id, |record| {
            record.dj_intro_text = Some(intro_text.to_string());
            record.dj_outro_text = Some(outro_text.to_string());
            record.ai_song_title = Some(song_title.to_string());
        })
        .await
        .is_some()
    }

    /// Merge intermediate outputs into the record
    pub async fn record_artifacts(&self, id: &Uuid, artifacts: PartialArtifacts) -> bool {
        self.with_generating(id, |record| {
            let existing = &mut record.artifacts;
            if artifacts.intro_audio_url.is_some() {
                existing.intro_audio_url = artifacts.intro_audio_url;
            }
            if artifacts.outro_audio_url.is_some() {
                existing.outro_audio_url = artifacts.outro_audio_url;
            }
            if artifacts.music_job_id.is_some() {
                existing.music_job_id = artifacts.music_job_id;
            }
        })
        .await
        .is_some()
    }

    /// Transition to ready with the finished queue in one write
    ///
    /// Partial artifacts are released; the queue now references the audio.
    pub async fn complete(&self, id: &Uuid, queue: Vec<QueueItem>) -> bool {
        self.with_generating(id, |record| {
            record.status = ExperienceStatus::Ready;
            record.progress.step = "Complete".to_string();
            record.progress.percent = 100;
            record.queue = Some(queue);
            record.artifacts = PartialArtifacts::default();
        })
        .await
        .is_some()
    }

    /// Transition to error, returning the partial artifacts for cleanup
    pub async fn fail(&self, id: &Uuid, message: &str) -> Option<PartialArtifacts> {
        self.with_generating(id, |record| {
            record.status = ExperienceStatus::Error;
            record.error = Some(message.to_string());
            record.queue = None;
            std::mem::take(&mut record.artifacts)
        })
        .await
    }

    /// Remove terminal records whose last update is older than the TTL
    pub async fn evict_expired(&self, now: DateTime<Utc>) -> usize {
        let Some(ttl) = self.ttl else {
            return 0;
        };
        let Ok(ttl) = chrono::Duration::from_std(ttl) else {
            return 0;
        };

        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, record| !(record.is_terminal() && record.updated_at + ttl < now));
        let evicted = before - records.len();

        if evicted > 0 {
            debug!(evicted, remaining = records.len(), "Evicted expired experiences");
        }
        evicted
    }

    /// Sweep expired records every `interval` until cancelled
    ///
    /// Returns None when the store has no TTL.
    pub fn spawn_eviction_task(
        &self,
        interval: Duration,
        cancel: CancellationToken,
    ) -> Option<JoinHandle<()>> {
        let ttl = self.ttl?;
        let store = self.clone();
        info!(ttl_secs = ttl.as_secs(), "Experience eviction enabled");

        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        store.evict_expired(Utc::now()).await;
                    }
                }
            }
        }))
    }
}
