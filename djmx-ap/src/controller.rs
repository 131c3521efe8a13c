//! Player controller
//!
//! Owns both backends and routes every transport command to the active one:
//! remote when it is authenticated and has a ready device, local otherwise.
//! Queue operations always target the local engine. While the remote backend
//! is active, next/previous walk a local index over the catalog queue and ask
//! the device to play the track at that index.
//!
//! The controller also counts plays for the DJ-injection trigger and installs
//! generated content when the trigger fires.

use chrono::Utc;
use djmx_common::events::{DjmxEvent, EventBus, StartReason};
use djmx_common::types::{CatalogTrack, QueueItem};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::backend::{BackendKind, BackendStatus, PlaybackBackend};
use crate::error::Result;
use crate::injector::{DjInjector, InjectionMode, InjectionStatus};
use crate::playback::{PlaybackEngine, PlaybackSnapshot};
use crate::remote::{RemotePlaybackAdapter, RemoteStateUpdate, TokenStore};

#[derive(Debug, Default)]
struct CatalogQueue {
    tracks: Vec<CatalogTrack>,
    index: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteSummary {
    pub authenticated: bool,
    pub ready: bool,
    pub catalog_index: usize,
    pub catalog_len: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InjectionSummary {
    pub play_count: u32,
    pub threshold: u32,
    pub triggered: bool,
    pub mode: InjectionMode,
    pub status: InjectionStatus,
}

/// Everything a client needs to render the player
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerStatus {
    pub backend: BackendKind,
    pub transport: BackendStatus,
    pub local: PlaybackSnapshot,
    pub remote: RemoteSummary,
    pub injection: InjectionSummary,
}

pub struct PlayerController {
    engine: PlaybackEngine,
    remote: Arc<RemotePlaybackAdapter>,
    tokens: Arc<TokenStore>,
    injector: Arc<DjInjector>,
    catalog: RwLock<CatalogQueue>,
    event_bus: EventBus,
    last_backend: Mutex<BackendKind>,
}

impl PlayerController {
    pub fn new(
        engine: PlaybackEngine,
        remote: Arc<RemotePlaybackAdapter>,
        tokens: Arc<TokenStore>,
        injector: Arc<DjInjector>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            engine,
            remote,
            tokens,
            injector,
            catalog: RwLock::new(CatalogQueue::default()),
            event_bus,
            last_backend: Mutex::new(BackendKind::Local),
        }
    }

    pub fn engine(&self) -> &PlaybackEngine {
        &self.engine
    }

    pub fn remote(&self) -> &Arc<RemotePlaybackAdapter> {
        &self.remote
    }

    pub fn injector(&self) -> &Arc<DjInjector> {
        &self.injector
    }

    pub fn active_kind(&self) -> BackendKind {
        if self.remote.is_active() {
            BackendKind::Remote
        } else {
            BackendKind::Local
        }
    }

    /// Backend that receives transport commands
    ///
    /// Selection depends only on the remote session, not on what is audible.
    /// After a Replace injection the DJ segment plays on the local engine,
    /// yet while a remote session is active pause, seek and volume still go
    /// to the remote device.
    fn active(&self) -> &dyn PlaybackBackend {
        match self.active_kind() {
            BackendKind::Remote => self.remote.as_ref(),
            BackendKind::Local => &self.engine,
        }
    }

    /// Emit BackendChanged when the selection predicate flipped
    fn notify_backend_change(&self) {
        let current = self.active_kind();
        let mut last = match self.last_backend.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if *last != current {
            info!(backend = current.as_str(), "Active playback backend changed");
            *last = current;
            self.event_bus.emit_lossy(DjmxEvent::BackendChanged {
                backend: current.as_str().to_string(),
                timestamp: Utc::now(),
            });
        }
    }

    // ------------------------------------------------------------------
    // Transport
    // ------------------------------------------------------------------

    pub async fn play(&self) -> Result<()> {
        match self.active_kind() {
            // The device keeps its own context; resuming restarts it
            BackendKind::Remote => self.remote.resume().await,
            BackendKind::Local => PlaybackBackend::play(&self.engine).await,
        }
    }

    pub async fn pause(&self) -> Result<()> {
        self.active().pause().await
    }

    pub async fn resume(&self) -> Result<()> {
        self.active().resume().await
    }

    pub async fn seek(&self, seconds: f64) -> Result<()> {
        self.active().seek(seconds).await
    }

    pub async fn set_volume(&self, volume: f32) -> Result<()> {
        self.active().set_volume(volume).await
    }

    /// Skip forward; always counts as a play
    pub async fn next(self: &Arc<Self>) -> Result<()> {
        self.count_play().await;

        match self.active_kind() {
            BackendKind::Remote => {
                let target = {
                    let catalog = self.catalog.read().await;
                    let index = catalog.index + 1;
                    catalog.tracks.get(index).map(|t| (index, t.uri()))
                };
                match target {
                    Some((index, uri)) => self.play_remote_index(index, &uri).await,
                    None => {
                        debug!("No more catalog tracks");
                        Ok(())
                    }
                }
            }
            BackendKind::Local => {
                self.engine.next().await;
                Ok(())
            }
        }
    }

    pub async fn previous(&self) -> Result<()> {
        match self.active_kind() {
            BackendKind::Remote => {
                let target = {
                    let catalog = self.catalog.read().await;
                    catalog
                        .index
                        .checked_sub(1)
                        .and_then(|i| catalog.tracks.get(i).map(|t| (i, t.uri())))
                };
                match target {
                    Some((index, uri)) => self.play_remote_index(index, &uri).await,
                    None => {
                        debug!("Already at first catalog track");
                        Ok(())
                    }
                }
            }
            BackendKind::Local => {
                self.engine.previous().await;
                Ok(())
            }
        }
    }

    /// Jump to a queue position; counts as a play
    pub async fn play_at_index(self: &Arc<Self>, index: usize) -> Result<()> {
        self.count_play().await;

        match self.active_kind() {
            BackendKind::Remote => {
                let uri = self.catalog.read().await.tracks.get(index).map(|t| t.uri());
                match uri {
                    Some(uri) => self.play_remote_index(index, &uri).await,
                    None => Ok(()),
                }
            }
            BackendKind::Local => {
                self.engine.play_at_index(index).await;
                Ok(())
            }
        }
    }

    async fn play_remote_index(&self, index: usize, uri: &str) -> Result<()> {
        self.remote.play_uri(Some(uri)).await?;
        self.catalog.write().await.index = index;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Queue
    // ------------------------------------------------------------------

    pub async fn set_queue(&self, items: Vec<QueueItem>) {
        self.engine.set_queue(items).await;
    }

    pub async fn append_to_queue(&self, items: Vec<QueueItem>) {
        self.engine.append_to_queue(items).await;
    }

    pub async fn insert_after_current(&self, items: Vec<QueueItem>) {
        self.engine.insert_after_current(items).await;
    }

    /// Replace the queue with catalog tracks
    ///
    /// The tracks also become the remote walk list and the artist pool for
    /// DJ generation.
    pub async fn set_catalog_queue(&self, tracks: Vec<CatalogTrack>) {
        self.injector
            .set_artists(tracks.iter().map(|t| t.artist.as_str()))
            .await;
        let items = tracks.iter().map(CatalogTrack::to_queue_item).collect();
        {
            let mut catalog = self.catalog.write().await;
            catalog.tracks = tracks;
            catalog.index = 0;
        }
        self.engine.set_queue(items).await;
    }

    pub async fn reset_trigger(&self) {
        self.injector.reset().await;
    }

    // ------------------------------------------------------------------
    // Remote lifecycle
    // ------------------------------------------------------------------

    pub async fn install_token(&self, access_token: String, refresh_token: Option<String>) {
        self.tokens.set_tokens(access_token, refresh_token).await;
        self.remote.on_authenticated();
        self.notify_backend_change();
    }

    pub async fn remote_ready(&self, device_id: String) {
        self.remote.on_ready(device_id).await;
        self.notify_backend_change();
    }

    pub async fn remote_not_ready(&self) {
        self.remote.on_not_ready().await;
        self.notify_backend_change();
    }

    pub async fn remote_state_changed(&self, update: RemoteStateUpdate) {
        self.remote.on_state_changed(update).await;
    }

    pub fn remote_auth_error(&self) {
        self.remote.on_auth_error();
        self.notify_backend_change();
    }

    // ------------------------------------------------------------------
    // DJ injection
    // ------------------------------------------------------------------

    async fn count_play(self: &Arc<Self>) {
        if self.injector.register_play().await {
            let controller = Arc::clone(self);
            tokio::spawn(async move {
                controller.run_injection().await;
            });
        }
    }

    /// Generate DJ content and install it on the local engine
    pub async fn run_injection(&self) {
        let content = match self.injector.generate().await {
            Ok(content) => content,
            Err(e) => {
                error!("DJ injection aborted: {}", e);
                return;
            }
        };

        if content.queue.is_empty() {
            warn!(experience_id = %content.experience_id, "Generated DJ content is empty");
            return;
        }

        if self.remote.is_active() && self.remote.is_playing().await {
            info!("Pausing remote playback for DJ segment");
            if let Err(e) = self.remote.pause().await {
                warn!("Failed to pause remote playback: {}", e);
            }
        }

        let mode = self.injector.mode();
        let item_count = content.queue.len();
        match mode {
            InjectionMode::Replace => self.engine.set_queue(content.queue).await,
            InjectionMode::InsertAfterCurrent => {
                if self.engine.queue_len().await == 0 {
                    self.engine.set_queue(content.queue).await;
                } else {
                    self.engine.insert_after_current(content.queue).await;
                }
            }
        }

        info!(
            experience_id = %content.experience_id,
            mode = mode.as_str(),
            item_count,
            "DJ content installed"
        );
        self.event_bus.emit_lossy(DjmxEvent::DjContentInstalled {
            experience_id: content.experience_id,
            mode: mode.as_str().to_string(),
            item_count,
            timestamp: Utc::now(),
        });
    }

    /// Count unattended advances of the local engine as plays
    pub fn spawn_auto_advance_listener(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let controller = Arc::clone(self);
        let mut rx = self.event_bus.subscribe();

        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = rx.recv() => event,
                };
                match event {
                    Ok(DjmxEvent::TrackStarted {
                        reason: StartReason::AutoAdvance,
                        ..
                    }) => controller.count_play().await,
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Auto-advance listener lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    // ------------------------------------------------------------------
    // Status
    // ------------------------------------------------------------------

    pub async fn status(&self) -> PlayerStatus {
        let catalog = self.catalog.read().await;
        PlayerStatus {
            backend: self.active_kind(),
            transport: self.active().status().await,
            local: self.engine.snapshot().await,
            remote: RemoteSummary {
                authenticated: self.remote.is_authenticated(),
                ready: self.remote.is_ready(),
                catalog_index: catalog.index,
                catalog_len: catalog.tracks.len(),
            },
            injection: InjectionSummary {
                play_count: self.injector.play_count(),
                threshold: self.injector.threshold(),
                triggered: self.injector.is_triggered(),
                mode: self.injector.mode(),
                status: self.injector.status().await,
            },
        }
    }
}
