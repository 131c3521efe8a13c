//! Text-to-music via the MiniMax music_generation endpoint
//!
//! Music generation is a long-running job: `start` returns a job id (or, on
//! the fast path, an already-completed result) and `status` is polled.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{ClientError, MiniMaxConfig, MiniMaxHttp};
use crate::error::GenerationError;

const MUSIC_PATH: &str = "/v1/music_generation";
const MODEL: &str = "music-2.5";

/// Provider limit on lyrics length (characters)
pub const MAX_LYRICS_CHARS: usize = 3500;
/// Provider limit on the style prompt (characters)
pub const MAX_PROMPT_CHARS: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MusicStatus {
    Processing,
    Completed,
    Failed,
}

/// Music job snapshot, returned by both start and status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MusicJob {
    pub id: String,
    pub status: MusicStatus,
    #[serde(default)]
    pub audio_url: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Long-running music generation service
#[async_trait]
pub trait MusicGenerator: Send + Sync {
    async fn start(&self, lyrics: &str, prompt: &str) -> Result<MusicJob, ClientError>;

    async fn status(&self, job_id: &str) -> Result<MusicJob, ClientError>;
}

/// Reject inputs the provider would refuse
pub fn validate_music_request(lyrics: &str, prompt: &str) -> Result<(), ClientError> {
    let lyrics_len = lyrics.chars().count();
    if lyrics_len > MAX_LYRICS_CHARS {
        return Err(ClientError::InvalidRequest(format!(
            "lyrics are {} characters (max {})",
            lyrics_len, MAX_LYRICS_CHARS
        )));
    }

    let prompt_len = prompt.chars().count();
    if prompt_len > MAX_PROMPT_CHARS {
        return Err(ClientError::InvalidRequest(format!(
            "style prompt is {} characters (max {})",
            prompt_len, MAX_PROMPT_CHARS
        )));
    }

    Ok(())
}

#[derive(Debug, Serialize)]
struct MusicRequest<'a> {
    model: &'a str,
    lyrics: &'a str,
    prompt: &'a str,
}

/// Music client backed by music-2.5
#[derive(Clone)]
pub struct MiniMaxMusicClient {
    http: MiniMaxHttp,
}

impl MiniMaxMusicClient {
    pub fn new(config: MiniMaxConfig) -> Result<Self, ClientError> {
        Ok(Self {
            http: MiniMaxHttp::new(config)?,
        })
    }
}

#[async_trait]
impl MusicGenerator for MiniMaxMusicClient {
    async fn start(&self, lyrics: &str, prompt: &str) -> Result<MusicJob, ClientError> {
        validate_music_request(lyrics, prompt)?;

        let request = MusicRequest {
            model: MODEL,
            lyrics,
            prompt,
        };
        let job: MusicJob = self.http.post_json(MUSIC_PATH, &request).await?;
        debug!(job_id = %job.id, status = ?job.status, "Music job started");
        Ok(job)
    }

    async fn status(&self, job_id: &str) -> Result<MusicJob, ClientError> {
        self.http
            .get_json(&format!("{}/{}", MUSIC_PATH, job_id))
            .await
    }
}

/// Polling parameters for [`wait_for_completion`]
#[derive(Debug, Clone)]
pub struct WaitOptions {
    pub max_wait: Duration,
    pub poll_interval: Duration,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            max_wait: Duration::from_secs(120),
            poll_interval: Duration::from_secs(3),
        }
    }
}

/// Poll a music job until it completes, fails, times out or is cancelled
///
/// `on_processing` runs after every poll that reports the job still running,
/// with the 1-based poll count.
pub async fn wait_for_completion<F, Fut>(
    music: &dyn MusicGenerator,
    job_id: &str,
    options: &WaitOptions,
    cancel: &CancellationToken,
    mut on_processing: F,
) -> Result<MusicJob, GenerationError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = ()>,
{
    let started = Instant::now();
    let mut polls = 0u32;

    while started.elapsed() < options.max_wait {
        let job = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(GenerationError::Cancelled),
            result = music.status(job_id) => result?,
        };
        polls += 1;

        match job.status {
            MusicStatus::Completed => {
                info!(job_id = %job_id, polls, "Music generation completed");
                return Ok(job);
            }
            MusicStatus::Failed => {
                let reason = job.error.unwrap_or_else(|| "unknown error".to_string());
                return Err(GenerationError::UpstreamApi(format!(
                    "Music generation failed: {}",
                    reason
                )));
            }
            MusicStatus::Processing => {
                debug!(job_id = %job_id, polls, "Music still processing");
                on_processing(polls).await;
            }
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(GenerationError::Cancelled),
            _ = tokio::time::sleep(options.poll_interval) => {}
        }
    }

    Err(GenerationError::GenerationTimeout(options.max_wait.as_secs()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    /// Reports "processing" for `processing_polls` polls, then `final_status`
    struct ScriptedMusic {
        processing_polls: u32,
        final_status: MusicStatus,
        polls: AtomicU32,
    }

    impl ScriptedMusic {
        fn new(processing_polls: u32, final_status: MusicStatus) -> Self {
            Self {
                processing_polls,
                final_status,
                polls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl MusicGenerator for ScriptedMusic {
        async fn start(&self, _lyrics: &str, _prompt: &str) -> Result<MusicJob, ClientError> {
            unreachable!("not used by wait tests")
        }

        async fn status(&self, job_id: &str) -> Result<MusicJob, ClientError> {
            let n = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
            let status = if n > self.processing_polls {
                self.final_status
            } else {
                MusicStatus::Processing
            };
            Ok(MusicJob {
                id: job_id.to_string(),
                status,
                audio_url: (status == MusicStatus::Completed)
                    .then(|| "https://cdn.example/song.mp3".to_string()),
                duration: Some(95.0),
                error: (status == MusicStatus::Failed).then(|| "content policy".to_string()),
            })
        }
    }

    #[test]
    fn test_validate_limits() {
        assert!(validate_music_request("la", "pop").is_ok());

        let long_lyrics = "x".repeat(MAX_LYRICS_CHARS + 1);
        assert!(matches!(
            validate_music_request(&long_lyrics, "pop"),
            Err(ClientError::InvalidRequest(_))
        ));

        let long_prompt = "y".repeat(MAX_PROMPT_CHARS + 1);
        assert!(matches!(
            validate_music_request("la", &long_prompt),
            Err(ClientError::InvalidRequest(_))
        ));

        // Exactly at the limit is accepted
        let exact = "z".repeat(MAX_LYRICS_CHARS);
        assert!(validate_music_request(&exact, "pop").is_ok());
    }

    #[test]
    fn test_job_deserialization() {
        let job: MusicJob =
            serde_json::from_str(r#"{"id":"job-1","status":"processing"}"#).unwrap();
        assert_eq!(job.status, MusicStatus::Processing);
        assert!(job.audio_url.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_completes_after_processing() {
        let music = ScriptedMusic::new(3, MusicStatus::Completed);
        let ticks = Arc::new(AtomicU32::new(0));
        let cancel = CancellationToken::new();

        let ticks_cb = ticks.clone();
        let job = wait_for_completion(&music, "job-1", &WaitOptions::default(), &cancel, |_| {
            let ticks = ticks_cb.clone();
            async move {
                ticks.fetch_add(1, Ordering::SeqCst);
            }
        })
        .await
        .unwrap();

        assert_eq!(job.status, MusicStatus::Completed);
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_reports_failure() {
        let music = ScriptedMusic::new(1, MusicStatus::Failed);
        let cancel = CancellationToken::new();

        let err = wait_for_completion(&music, "job-1", &WaitOptions::default(), &cancel, |_| {
            async {}
        })
        .await
        .unwrap_err();

        assert_eq!(
            err,
            GenerationError::UpstreamApi("Music generation failed: content policy".to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_times_out_with_default_ceiling() {
        let music = ScriptedMusic::new(u32::MAX, MusicStatus::Completed);
        let cancel = CancellationToken::new();

        let err = wait_for_completion(&music, "job-1", &WaitOptions::default(), &cancel, |_| {
            async {}
        })
        .await
        .unwrap_err();

        assert_eq!(err, GenerationError::GenerationTimeout(120));
        // One poll per 3s interval across the 120s window
        assert_eq!(music.polls.load(Ordering::SeqCst), 40);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_observes_cancellation() {
        let music = ScriptedMusic::new(u32::MAX, MusicStatus::Completed);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = wait_for_completion(&music, "job-1", &WaitOptions::default(), &cancel, |_| {
            async {}
        })
        .await
        .unwrap_err();

        assert_eq!(err, GenerationError::Cancelled);
    }
}
