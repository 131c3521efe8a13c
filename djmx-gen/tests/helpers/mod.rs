//! Shared fakes for djmx-gen integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use djmx_common::events::EventBus;
use djmx_common::types::{ExperienceRecord, GenerationPreferences};
use djmx_gen::clients::{
    ClientError, DjScript, MusicGenerator, MusicJob, MusicStatus, ScriptGenerator, SpeechAudio,
    SpeechSynthesizer, VoicePreset,
};
use djmx_gen::error::GenerationError;
use djmx_gen::pipeline::{GenerationPipeline, PipelineClients, PipelineConfig};
use djmx_gen::store::ExperienceStore;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use uuid::Uuid;

pub fn sample_script() -> DjScript {
    DjScript {
        intro_text: "Intro: welcome back to the late shift".to_string(),
        song_style: "dream pop, shimmering guitars".to_string(),
        song_lyrics: "[Verse]\nNeon on the water".to_string(),
        song_title: "Neon Water".to_string(),
        outro_text: "Outro: that one was made just for you".to_string(),
    }
}

/// Script generator that optionally waits on a gate or fails
#[derive(Default)]
pub struct FakeScript {
    pub gate: Option<Arc<Notify>>,
    pub error: Option<GenerationError>,
}

impl FakeScript {
    pub fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            error: None,
        }
    }

    pub fn failing(error: GenerationError) -> Self {
        Self {
            gate: None,
            error: Some(error),
        }
    }
}

#[async_trait]
impl ScriptGenerator for FakeScript {
    async fn generate_script(
        &self,
        _preferences: &GenerationPreferences,
    ) -> Result<DjScript, GenerationError> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        match &self.error {
            Some(err) => Err(err.clone()),
            None => Ok(sample_script()),
        }
    }
}

/// Intro speech reports a duration; outro speech does not
pub struct FakeSpeech;

#[async_trait]
impl SpeechSynthesizer for FakeSpeech {
    async fn synthesize(&self, text: &str, _voice: VoicePreset) -> Result<SpeechAudio, ClientError> {
        if text.starts_with("Intro") {
            Ok(SpeechAudio {
                audio_url: "https://cdn.test/intro.mp3".to_string(),
                duration_seconds: Some(12.5),
            })
        } else {
            Ok(SpeechAudio {
                audio_url: "https://cdn.test/outro.mp3".to_string(),
                duration_seconds: None,
            })
        }
    }
}

/// Music job that stays "processing" for a fixed number of polls
pub struct FakeMusic {
    pub processing_polls: u32,
    pub polls: AtomicU32,
}

impl FakeMusic {
    pub fn completing_after(processing_polls: u32) -> Self {
        Self {
            processing_polls,
            polls: AtomicU32::new(0),
        }
    }

    pub fn never_completing() -> Self {
        Self::completing_after(u32::MAX)
    }
}

#[async_trait]
impl MusicGenerator for FakeMusic {
    async fn start(&self, _lyrics: &str, _prompt: &str) -> Result<MusicJob, ClientError> {
        Ok(MusicJob {
            id: "job-1".to_string(),
            status: MusicStatus::Processing,
            audio_url: None,
            duration: None,
            error: None,
        })
    }

    async fn status(&self, job_id: &str) -> Result<MusicJob, ClientError> {
        let n = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
        if n > self.processing_polls {
            Ok(MusicJob {
                id: job_id.to_string(),
                status: MusicStatus::Completed,
                audio_url: Some("https://cdn.test/song.mp3".to_string()),
                duration: Some(95.0),
                error: None,
            })
        } else {
            Ok(MusicJob {
                id: job_id.to_string(),
                status: MusicStatus::Processing,
                audio_url: None,
                duration: None,
                error: None,
            })
        }
    }
}

pub fn pipeline_with(
    script: FakeScript,
    music: FakeMusic,
    event_bus: EventBus,
) -> GenerationPipeline {
    let clients = PipelineClients {
        script: Arc::new(script),
        speech: Arc::new(FakeSpeech),
        music: Arc::new(music),
    };
    GenerationPipeline::new(
        ExperienceStore::new(),
        clients,
        PipelineConfig::default(),
        event_bus,
    )
}

pub fn preferences() -> GenerationPreferences {
    GenerationPreferences::new(
        vec!["Deftones".to_string(), "The Cure".to_string()],
        vec!["shoegaze".to_string()],
        Some("nocturnal".to_string()),
    )
}

/// Poll the store until the record leaves the generating state
pub async fn wait_for_terminal(store: &ExperienceStore, id: &Uuid) -> ExperienceRecord {
    for _ in 0..20_000 {
        if let Some(record) = store.get(id).await {
            if record.is_terminal() {
                return record;
            }
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("experience {} never reached a terminal state", id);
}
