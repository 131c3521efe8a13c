//! Shared fakes for djmx-ap integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use djmx_ap::error::{Error, Result};
use djmx_ap::injector::{GeneratedContent, GenerationService};
use djmx_ap::playback::{EngineConfig, PlaybackEngine, Voice, VoiceFactory};
use djmx_common::events::{DjmxEvent, EventBus};
use djmx_common::types::{
    CatalogTrack, GenerationPreferences, QueueItem, QueueItemKind, QueueItemMetadata,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;
use uuid::Uuid;

pub const TICK: Duration = Duration::from_millis(100);

pub fn item(id: &str, duration_seconds: f64) -> QueueItem {
    QueueItem {
        id: id.to_string(),
        kind: QueueItemKind::CatalogTrack,
        audio_url: format!("https://cdn.test/{}.mp3", id),
        metadata: QueueItemMetadata {
            title: id.to_uppercase(),
            artist: Some("Test Artist".to_string()),
            ..Default::default()
        },
        duration_seconds,
    }
}

pub fn dj_item(id: &str, kind: QueueItemKind, duration_seconds: f64) -> QueueItem {
    QueueItem {
        kind,
        ..item(id, duration_seconds)
    }
}

/// Item without a playable source
pub fn silent_item(id: &str, duration_seconds: f64) -> QueueItem {
    QueueItem {
        audio_url: String::new(),
        ..item(id, duration_seconds)
    }
}

pub fn catalog_track(id: &str, artist: &str) -> CatalogTrack {
    CatalogTrack {
        id: id.to_string(),
        title: format!("Track {}", id),
        artist: artist.to_string(),
        album: "Album".to_string(),
        album_art: None,
        preview_url: Some(format!("https://cdn.test/{}.mp3", id)),
        duration: 30,
        spotify_url: format!("https://open.spotify.com/track/{}", id),
    }
}

pub fn dj_segment() -> Vec<QueueItem> {
    vec![
        dj_item("intro", QueueItemKind::DjIntro, 5.0),
        dj_item("song", QueueItemKind::AiSong, 10.0),
        dj_item("outro", QueueItemKind::DjOutro, 5.0),
    ]
}

// ----------------------------------------------------------------------
// Voices
// ----------------------------------------------------------------------

/// Virtual-clock voice; position follows tokio time while playing
pub struct MockVoice {
    id: String,
    duration: f64,
    offset: f64,
    started_at: Option<Instant>,
    volumes: Arc<Mutex<HashMap<String, f32>>>,
    live: Arc<AtomicUsize>,
}

impl Voice for MockVoice {
    fn play(&mut self) -> Result<()> {
        if self.started_at.is_none() {
            self.started_at = Some(Instant::now());
        }
        Ok(())
    }

    fn pause(&mut self) {
        self.offset = self.position_seconds();
        self.started_at = None;
    }

    fn seek(&mut self, seconds: f64) {
        self.offset = seconds.clamp(0.0, self.duration);
        if self.started_at.is_some() {
            self.started_at = Some(Instant::now());
        }
    }

    fn set_volume(&mut self, volume: f32) {
        if let Ok(mut volumes) = self.volumes.lock() {
            volumes.insert(self.id.clone(), volume);
        }
    }

    fn position_seconds(&self) -> f64 {
        let running = self
            .started_at
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        (self.offset + running).min(self.duration)
    }

    fn duration_seconds(&self) -> Option<f64> {
        Some(self.duration)
    }

    fn is_finished(&self) -> bool {
        self.position_seconds() >= self.duration
    }
}

impl Drop for MockVoice {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Builds mock voices from the item's declared duration
#[derive(Default)]
pub struct MockVoiceFactory {
    pub live: Arc<AtomicUsize>,
    pub loads: Arc<Mutex<Vec<String>>>,
    pub volumes: Arc<Mutex<HashMap<String, f32>>>,
    pub failing: HashSet<String>,
    pub delays: HashMap<String, Duration>,
}

impl MockVoiceFactory {
    pub fn failing_on(ids: &[&str]) -> Self {
        Self {
            failing: ids.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    /// Loads of `id` take `delay` of virtual time
    pub fn slow_on(id: &str, delay: Duration) -> Self {
        Self {
            delays: HashMap::from([(id.to_string(), delay)]),
            ..Default::default()
        }
    }

    pub fn live_voices(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn loads(&self) -> Vec<String> {
        self.loads.lock().map(|l| l.clone()).unwrap_or_default()
    }

    pub fn volume_of(&self, id: &str) -> Option<f32> {
        self.volumes.lock().ok().and_then(|v| v.get(id).copied())
    }
}

#[async_trait]
impl VoiceFactory for MockVoiceFactory {
    async fn load(&self, item: &QueueItem) -> Result<Box<dyn Voice>> {
        if let Ok(mut loads) = self.loads.lock() {
            loads.push(item.id.clone());
        }
        if let Some(delay) = self.delays.get(&item.id) {
            tokio::time::sleep(*delay).await;
        }
        if self.failing.contains(&item.id) {
            return Err(Error::load(&item.id, "HTTP 404"));
        }
        self.live.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockVoice {
            id: item.id.clone(),
            duration: item.duration_seconds,
            offset: 0.0,
            started_at: None,
            volumes: Arc::clone(&self.volumes),
            live: Arc::clone(&self.live),
        }))
    }
}

pub struct TestEngine {
    pub engine: PlaybackEngine,
    pub factory: Arc<MockVoiceFactory>,
    pub bus: EventBus,
}

pub fn test_engine(factory: MockVoiceFactory) -> TestEngine {
    let factory = Arc::new(factory);
    let bus = EventBus::new(1000);
    let engine = PlaybackEngine::new(
        factory.clone(),
        EngineConfig {
            tick_interval: TICK,
            crossfade_window: Duration::from_secs(2),
            ..EngineConfig::default()
        },
        bus.clone(),
    );
    TestEngine {
        engine,
        factory,
        bus,
    }
}

/// Let spawned loads run to completion
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

/// Advance virtual time by `duration`, ticking the engine every `TICK`
pub async fn run_for(engine: &PlaybackEngine, duration: Duration) {
    let steps = (duration.as_millis() / TICK.as_millis()) as u32;
    for _ in 0..steps {
        tokio::time::advance(TICK).await;
        engine.tick().await;
        settle().await;
    }
}

/// Drain everything currently buffered on a receiver
pub fn drain(rx: &mut broadcast::Receiver<DjmxEvent>) -> Vec<DjmxEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

// ----------------------------------------------------------------------
// Generation
// ----------------------------------------------------------------------

/// Generation service returning a fixed DJ segment
#[derive(Default)]
pub struct FakeGeneration {
    pub calls: AtomicU32,
    pub last_artists: Mutex<Vec<String>>,
    pub fail: bool,
}

impl FakeGeneration {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationService for FakeGeneration {
    async fn generate(&self, preferences: GenerationPreferences) -> Result<GeneratedContent> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_artists.lock() {
            *last = preferences.artists.clone();
        }
        if self.fail {
            return Err(Error::Generation("music generation timed out".to_string()));
        }
        Ok(GeneratedContent {
            experience_id: Uuid::new_v4(),
            queue: dj_segment(),
        })
    }
}
