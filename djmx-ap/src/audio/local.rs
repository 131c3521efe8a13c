//! Local decoder-backed voices
//!
//! Loading fetches the item's bytes, decodes and resamples them off the async
//! runtime, then registers the PCM with the mixer paused at gain 1.0.

use async_trait::async_trait;
use djmx_common::types::QueueItem;
use std::sync::Arc;
use tracing::debug;

use super::decoder::SimpleDecoder;
use super::mixer::{Mixer, VoiceState};
use super::resampler::Resampler;
use super::source::AudioSource;
use crate::error::{Error, Result};
use crate::playback::{Voice, VoiceFactory};

/// A voice rendered by the shared mixer; unregisters itself on drop
pub struct LocalVoice {
    state: Arc<VoiceState>,
    mixer: Arc<Mixer>,
    sample_rate: u32,
}

impl LocalVoice {
    pub fn new(samples: Vec<f32>, sample_rate: u32, mixer: Arc<Mixer>) -> Self {
        let state = Arc::new(VoiceState::new(samples));
        mixer.add(Arc::clone(&state));
        Self {
            state,
            mixer,
            sample_rate,
        }
    }
}

impl Voice for LocalVoice {
    fn play(&mut self) -> Result<()> {
        self.state.set_paused(false);
        Ok(())
    }

    fn pause(&mut self) {
        self.state.set_paused(true);
    }

    fn seek(&mut self, seconds: f64) {
        let frame = (seconds.max(0.0) * self.sample_rate as f64) as usize;
        self.state.set_frame_pos(frame);
    }

    fn set_volume(&mut self, volume: f32) {
        self.state.set_gain(volume);
    }

    fn position_seconds(&self) -> f64 {
        self.state.frame_pos() as f64 / self.sample_rate as f64
    }

    fn duration_seconds(&self) -> Option<f64> {
        Some(self.state.total_frames() as f64 / self.sample_rate as f64)
    }

    fn is_finished(&self) -> bool {
        self.state.is_finished()
    }
}

impl Drop for LocalVoice {
    fn drop(&mut self) {
        self.mixer.remove(&self.state);
    }
}

/// Loads queue items into [`LocalVoice`]s
pub struct LocalVoiceFactory {
    client: reqwest::Client,
    mixer: Arc<Mixer>,
    sample_rate: u32,
}

impl LocalVoiceFactory {
    pub fn new(client: reqwest::Client, mixer: Arc<Mixer>, sample_rate: u32) -> Self {
        Self {
            client,
            mixer,
            sample_rate,
        }
    }
}

#[async_trait]
impl VoiceFactory for LocalVoiceFactory {
    async fn load(&self, item: &QueueItem) -> Result<Box<dyn Voice>> {
        let source = AudioSource::parse(&item.audio_url).map_err(|e| Error::load(&item.id, e))?;
        let fetched = source
            .fetch(&self.client)
            .await
            .map_err(|e| Error::load(&item.id, e))?;

        let output_rate = self.sample_rate;
        let samples = tokio::task::spawn_blocking(move || -> Result<Vec<f32>> {
            let decoded = SimpleDecoder::decode_bytes(fetched.bytes, fetched.extension.as_deref())?;
            Resampler::resample(&decoded.samples, decoded.sample_rate, output_rate, 2)
        })
        .await
        .map_err(|e| Error::load(&item.id, format!("decode task failed: {}", e)))?
        .map_err(|e| Error::load(&item.id, e))?;

        debug!(
            item_id = %item.id,
            frames = samples.len() / 2,
            "Loaded local voice"
        );
        Ok(Box::new(LocalVoice::new(
            samples,
            self.sample_rate,
            Arc::clone(&self.mixer),
        )))
    }
}
