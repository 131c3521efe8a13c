//! Generation pipeline
//!
//! Turns listener preferences into a DJ intro, a generated song and a DJ outro.
//!
//! Stages (percent recorded on the experience record):
//! 1. Script generation (10 → 20)
//! 2. Intro speech, outro speech and music job start, concurrently (25 → 40)
//! 3. Poll the music job until done (40 → at most 85)
//! 4. Queue assembly (90)
//! 5. Completion (100, ready)
//!
//! `start_generation` returns immediately; the stages run on a spawned task
//! whose outcome is written back into the record. Any stage error ends the job
//! in the error state; nothing is retried.

use chrono::Utc;
use djmx_common::events::{DjmxEvent, EventBus};
use djmx_common::types::{
    GenerationPreferences, PartialArtifacts, QueueItem, QueueItemKind, QueueItemMetadata,
};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::clients::music::{wait_for_completion, WaitOptions};
use crate::clients::{
    DjScript, MusicGenerator, MusicJob, MusicStatus, ScriptGenerator, SpeechAudio,
    SpeechSynthesizer, VoicePreset,
};
use crate::error::GenerationError;
use crate::store::ExperienceStore;

/// Tunables for the pipeline
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Delay between music status polls
    pub poll_interval: Duration,
    /// Wall-clock ceiling for the music job
    pub poll_timeout: Duration,
    /// Percent added per "still processing" poll
    pub poll_increment: u8,
    /// Highest percent reachable while polling
    pub poll_cap: u8,
    pub intro_fallback_seconds: f64,
    pub song_fallback_seconds: f64,
    pub outro_fallback_seconds: f64,
    pub voice: VoicePreset,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(3),
            poll_timeout: Duration::from_secs(180),
            poll_increment: 2,
            poll_cap: 85,
            intro_fallback_seconds: 10.0,
            song_fallback_seconds: 120.0,
            outro_fallback_seconds: 8.0,
            voice: VoicePreset::MaleEnergetic,
        }
    }
}

/// The three generative services the pipeline drives
#[derive(Clone)]
pub struct PipelineClients {
    pub script: Arc<dyn ScriptGenerator>,
    pub speech: Arc<dyn SpeechSynthesizer>,
    pub music: Arc<dyn MusicGenerator>,
}

/// Result of a cancellation request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// Token fired; the job will finish in the error state
    Cancelled,
    /// Job already ready or failed
    AlreadyFinished,
    NotFound,
}

/// Outputs of the concurrent audio stage
struct AudioOutputs {
    intro: SpeechAudio,
    outro: SpeechAudio,
    music: MusicJob,
}

/// Orchestrates generation jobs against an owned experience store
#[derive(Clone)]
pub struct GenerationPipeline {
    store: ExperienceStore,
    clients: PipelineClients,
    config: PipelineConfig,
    event_bus: EventBus,
    jobs: Arc<RwLock<HashMap<Uuid, CancellationToken>>>,
}

/// Race `fut` against cancellation
async fn cancellable<T, E>(
    token: &CancellationToken,
    fut: impl Future<Output = Result<T, E>>,
) -> Result<T, GenerationError>
where
    E: Into<GenerationError>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(GenerationError::Cancelled),
        result = fut => result.map_err(Into::into),
    }
}

impl GenerationPipeline {
    pub fn new(
        store: ExperienceStore,
        clients: PipelineClients,
        config: PipelineConfig,
        event_bus: EventBus,
    ) -> Self {
        Self {
            store,
            clients,
            config,
            event_bus,
            jobs: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn store(&self) -> &ExperienceStore {
        &self.store
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Number of jobs still running
    pub async fn running_jobs(&self) -> usize {
        self.jobs.read().await.len()
    }

    /// Create a generating record and run the stages in the background
    ///
    /// Input is not validated here; callers sanitize. Returns as soon as the
    /// record exists, before any upstream call completes.
    pub async fn start_generation(&self, preferences: GenerationPreferences) -> Uuid {
        let id = self.store.create(preferences.clone()).await;
        let token = CancellationToken::new();
        self.jobs.write().await.insert(id, token.clone());

        info!(
            experience_id = %id,
            artists = ?preferences.artists,
            mood = %preferences.mood,
            "Starting generation"
        );

        let pipeline = self.clone();
        tokio::spawn(async move {
            pipeline.run_job(id, preferences, token).await;
        });

        id
    }

    /// Fire the job's cancellation token
    pub async fn cancel_generation(&self, id: &Uuid) -> CancelOutcome {
        if let Some(token) = self.jobs.read().await.get(id) {
            info!(experience_id = %id, "Cancelling generation");
            token.cancel();
            return CancelOutcome::Cancelled;
        }

        // Tokens are dropped only after the terminal write
        match self.store.get(id).await {
            Some(_) => CancelOutcome::AlreadyFinished,
            None => CancelOutcome::NotFound,
        }
    }

    /// Run one job to a terminal state; errors never escape this boundary
    async fn run_job(&self, id: Uuid, preferences: GenerationPreferences, token: CancellationToken) {
        match self.run(id, &preferences, &token).await {
            Ok(queue) => {
                let item_count = queue.len();
                if self.store.complete(&id, queue).await {
                    info!(experience_id = %id, item_count, "Experience ready");
                    self.event_bus.emit_lossy(DjmxEvent::ExperienceReady {
                        experience_id: id,
                        item_count,
                        timestamp: Utc::now(),
                    });
                }
            }
            Err(err) => {
                let message = err.to_string();
                match err {
                    GenerationError::Cancelled => warn!(experience_id = %id, "Generation cancelled"),
                    _ => error!(experience_id = %id, error = %message, "Generation failed"),
                }

                if let Some(artifacts) = self.store.fail(&id, &message).await {
                    discard_artifacts(&id, artifacts);
                }
                self.event_bus.emit_lossy(DjmxEvent::ExperienceFailed {
                    experience_id: id,
                    error: message,
                    timestamp: Utc::now(),
                });
            }
        }

        self.jobs.write().await.remove(&id);
    }

    async fn progress(&self, id: &Uuid, step: &str, percent: u8) {
        if let Some(percent) = self.store.update_progress(id, step, percent).await {
            self.emit_progress(id, step, percent);
        }
    }

    fn emit_progress(&self, id: &Uuid, step: &str, percent: u8) {
        debug!(experience_id = %id, step, percent, "Progress");
        self.event_bus.emit_lossy(DjmxEvent::ExperienceProgress {
            experience_id: *id,
            step: step.to_string(),
            percent,
            timestamp: Utc::now(),
        });
    }

    async fn run(
        &self,
        id: Uuid,
        preferences: &GenerationPreferences,
        token: &CancellationToken,
    ) -> Result<Vec<QueueItem>, GenerationError> {
        // Stage 1: script
        self.progress(&id, "Creating DJ script", 10).await;
        let script = cancellable(token, self.clients.script.generate_script(preferences)).await?;
        self.store
            .set_script(&id, &script.intro_text, &script.outro_text, &script.song_title)
            .await;
        self.progress(&id, "Starting audio generation", 20).await;

        // Stage 2: speech and music kickoff, joined
        self.progress(&id, "Generating audio", 25).await;
        let audio = self.generate_audio(&id, &script, token).await?;
        self.progress(&id, "Waiting for song generation", 40).await;

        // Stage 3: poll unless the start response was already final
        let music = match audio.music.status {
            MusicStatus::Completed => {
                debug!(experience_id = %id, "Music completed on start");
                audio.music.clone()
            }
            MusicStatus::Failed => {
                return Err(GenerationError::UpstreamApi(format!(
                    "Music generation failed: {}",
                    audio.music.error.as_deref().unwrap_or("unknown error")
                )));
            }
            MusicStatus::Processing => self.wait_for_music(&id, &audio.music.id, token).await?,
        };

        let song_url = music
            .audio_url
            .clone()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| {
                GenerationError::UpstreamApi("Music generation completed without audio".to_string())
            })?;

        // Stage 4: assembly
        self.progress(&id, "Assembling queue", 90).await;
        if token.is_cancelled() {
            return Err(GenerationError::Cancelled);
        }

        Ok(self.assemble_queue(&id, &script, &audio, &music, song_url))
    }

    async fn generate_audio(
        &self,
        id: &Uuid,
        script: &DjScript,
        token: &CancellationToken,
    ) -> Result<AudioOutputs, GenerationError> {
        let voice = self.config.voice;
        let speech = &self.clients.speech;
        let music = &self.clients.music;

        let intro = async {
            speech
                .synthesize(&script.intro_text, voice)
                .await
                .map_err(GenerationError::from)
        };
        let outro = async {
            speech
                .synthesize(&script.outro_text, voice)
                .await
                .map_err(GenerationError::from)
        };
        let song = async {
            music
                .start(&script.song_lyrics, &script.song_style)
                .await
                .map_err(GenerationError::from)
        };

        let (intro, outro, music) =
            cancellable(token, async { tokio::try_join!(intro, outro, song) }).await?;

        self.store
            .record_artifacts(
                id,
                PartialArtifacts {
                    intro_audio_url: Some(intro.audio_url.clone()),
                    outro_audio_url: Some(outro.audio_url.clone()),
                    music_job_id: Some(music.id.clone()),
                },
            )
            .await;

        debug!(experience_id = %id, music_job = %music.id, "Audio stage joined");
        Ok(AudioOutputs {
            intro,
            outro,
            music,
        })
    }

    async fn wait_for_music(
        &self,
        id: &Uuid,
        job_id: &str,
        token: &CancellationToken,
    ) -> Result<MusicJob, GenerationError> {
        let options = WaitOptions {
            max_wait: self.config.poll_timeout,
            poll_interval: self.config.poll_interval,
        };
        let increment = self.config.poll_increment;
        let cap = self.config.poll_cap;

        wait_for_completion(self.clients.music.as_ref(), job_id, &options, token, |_| async move {
            if let Some(percent) = self
                .store
                .advance_progress(id, "Generating song", increment, cap)
                .await
            {
                self.emit_progress(id, "Generating song", percent);
            }
        })
        .await
    }

    fn assemble_queue(
        &self,
        id: &Uuid,
        script: &DjScript,
        audio: &AudioOutputs,
        music: &MusicJob,
        song_url: String,
    ) -> Vec<QueueItem> {
        let config = &self.config;

        vec![
            QueueItem {
                id: format!("{}-intro", id),
                kind: QueueItemKind::DjIntro,
                audio_url: audio.intro.audio_url.clone(),
                metadata: QueueItemMetadata {
                    title: "DJ Intro".to_string(),
                    artist: Some("DJ".to_string()),
                    album_art: None,
                    dj_text: Some(script.intro_text.clone()),
                    is_ai_generated: true,
                },
                duration_seconds: audio
                    .intro
                    .duration_seconds
                    .unwrap_or(config.intro_fallback_seconds),
            },
            QueueItem {
                id: format!("{}-song", id),
                kind: QueueItemKind::AiSong,
                audio_url: song_url,
                metadata: QueueItemMetadata {
                    title: script.song_title.clone(),
                    artist: Some("AI Generated".to_string()),
                    album_art: None,
                    dj_text: None,
                    is_ai_generated: true,
                },
                duration_seconds: music
                    .duration
                    .filter(|d| *d > 0.0)
                    .unwrap_or(config.song_fallback_seconds),
            },
            QueueItem {
                id: format!("{}-outro", id),
                kind: QueueItemKind::DjOutro,
                audio_url: audio.outro.audio_url.clone(),
                metadata: QueueItemMetadata {
                    title: "DJ Outro".to_string(),
                    artist: Some("DJ".to_string()),
                    album_art: None,
                    dj_text: Some(script.outro_text.clone()),
                    is_ai_generated: true,
                },
                duration_seconds: audio
                    .outro
                    .duration_seconds
                    .unwrap_or(config.outro_fallback_seconds),
            },
        ]
    }
}

/// Release intermediate outputs of a failed job
///
/// Provider-hosted audio expires on its own; the references are dropped here.
fn discard_artifacts(id: &Uuid, artifacts: PartialArtifacts) {
    if artifacts == PartialArtifacts::default() {
        return;
    }
    info!(
        experience_id = %id,
        intro = artifacts.intro_audio_url.is_some(),
        outro = artifacts.outro_audio_url.is_some(),
        music_job = ?artifacts.music_job_id,
        "Discarding partial artifacts"
    );
}
