//! Playback engine
//!
//! Single-timeline sequencer over a [`PlaybackQueue`]. Exactly one voice is
//! live except during a crossfade, when the outgoing and incoming voices play
//! together while their gains ramp in opposite directions.
//!
//! Crossfades are driven by a tick loop rather than per-item timers:
//! - every tick the current voice's position is published
//! - once the voice reports its real length the crossfade is armed at
//!   `duration - window` (only if positive and a next item exists)
//! - when the position reaches the armed offset the next item is loaded at
//!   gain 0 and started; the ramp follows the incoming voice's position
//! - at the end of the window the outgoing voice is dropped and the incoming
//!   one becomes current
//!
//! Loads run outside the state lock. Every hard cut bumps an epoch and every
//! crossfade attempt bumps a sequence number, so a load that completes after
//! the engine has moved on is discarded instead of resurrecting a stale voice.

use chrono::Utc;
use djmx_common::events::{DjmxEvent, EventBus, StartReason};
use djmx_common::fade_curves::FadeCurve;
use djmx_common::types::QueueItem;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::queue::PlaybackQueue;
use super::voice::{Voice, VoiceFactory};

/// Initial master volume
pub const DEFAULT_VOLUME: f32 = 0.8;

/// Engine timing parameters
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Driver tick period; also the time-reporting resolution
    pub tick_interval: Duration,
    /// Length of the overlap between adjacent items
    pub crossfade_window: Duration,
    pub fade_curve: FadeCurve,
    /// Emit a progress event every this many playing ticks
    pub progress_every_ticks: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(100),
            crossfade_window: Duration::from_millis(2000),
            fade_curve: FadeCurve::Linear,
            progress_every_ticks: 10,
        }
    }
}

/// Lifecycle of a voice slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotState {
    Idle,
    Loading,
    Playing,
    Paused,
    FadingOut,
    FadingIn,
    Ended,
}

struct Slot {
    voice: Option<Box<dyn Voice>>,
    state: SlotState,
}

impl Slot {
    fn idle() -> Self {
        Self {
            voice: None,
            state: SlotState::Idle,
        }
    }

    fn unload(&mut self) {
        self.voice = None;
        self.state = SlotState::Idle;
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Crossfade {
    /// Not yet armed for the current item
    Idle,
    Armed { at_seconds: f64 },
    /// Incoming item is loading
    Loading { to_index: usize },
    /// Both voices live
    Fading { to_index: usize },
    /// No crossfade for this item; it plays out and hard-advances
    Skipped,
}

struct EngineState {
    queue: PlaybackQueue,
    current: Slot,
    incoming: Slot,
    crossfade: Crossfade,
    /// Bumped on every hard cut
    epoch: u64,
    /// Bumped on every crossfade start or cancel
    crossfade_seq: u64,
    is_playing: bool,
    /// Pause arrived while the current item was loading
    start_paused: bool,
    current_time: f64,
    duration: f64,
    volume: f32,
    playing_ticks: u64,
}

impl EngineState {
    fn new() -> Self {
        Self {
            queue: PlaybackQueue::new(),
            current: Slot::idle(),
            incoming: Slot::idle(),
            crossfade: Crossfade::Idle,
            epoch: 0,
            crossfade_seq: 0,
            is_playing: false,
            start_paused: false,
            current_time: 0.0,
            duration: 0.0,
            volume: DEFAULT_VOLUME,
            playing_ticks: 0,
        }
    }

    fn live_voices(&self) -> usize {
        self.current.voice.is_some() as usize + self.incoming.voice.is_some() as usize
    }

    fn is_crossfading(&self) -> bool {
        matches!(self.crossfade, Crossfade::Fading { .. })
    }

    /// Drop the incoming voice and restore the outgoing one to full gain
    fn cancel_crossfade(&mut self) {
        self.crossfade_seq += 1;
        let was_active = matches!(
            self.crossfade,
            Crossfade::Loading { .. } | Crossfade::Fading { .. }
        );
        self.incoming.unload();
        self.crossfade = Crossfade::Idle;

        if was_active {
            let volume = self.volume;
            let playing = self.is_playing;
            if let Some(voice) = self.current.voice.as_mut() {
                voice.set_volume(volume);
            }
            if self.current.voice.is_some() {
                self.current.state = if playing {
                    SlotState::Playing
                } else {
                    SlotState::Paused
                };
            }
        }
    }
}

/// Read-only view of the engine for API responses
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackSnapshot {
    pub queue: Vec<QueueItem>,
    pub current_index: usize,
    pub is_playing: bool,
    pub current_time_seconds: f64,
    pub duration_seconds: f64,
    pub volume: f32,
    pub current_state: SlotState,
    pub crossfading: bool,
    pub live_voices: usize,
}

struct EngineInner {
    state: Mutex<EngineState>,
    factory: Arc<dyn VoiceFactory>,
    config: EngineConfig,
    event_bus: EventBus,
    shutdown: CancellationToken,
}

/// Crossfading queue player; cheap to clone
#[derive(Clone)]
pub struct PlaybackEngine {
    inner: Arc<EngineInner>,
}

impl PlaybackEngine {
    pub fn new(factory: Arc<dyn VoiceFactory>, config: EngineConfig, event_bus: EventBus) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                state: Mutex::new(EngineState::new()),
                factory,
                config,
                event_bus,
                shutdown: CancellationToken::new(),
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    fn window_seconds(&self) -> f64 {
        self.inner.config.crossfade_window.as_secs_f64()
    }

    fn emit(&self, event: DjmxEvent) {
        self.inner.event_bus.emit_lossy(event);
    }

    fn emit_queue_changed(&self, st: &EngineState) {
        self.emit(DjmxEvent::QueueChanged {
            length: st.queue.len(),
            current_index: st.queue.current_index(),
            timestamp: Utc::now(),
        });
    }

    fn set_playing(&self, st: &mut EngineState, playing: bool) {
        if st.is_playing != playing {
            st.is_playing = playing;
            self.emit(DjmxEvent::PlaybackStateChanged {
                is_playing: playing,
                timestamp: Utc::now(),
            });
        }
    }

    fn emit_track_started(&self, st: &EngineState, reason: StartReason) {
        if let Some(item) = st.queue.current() {
            info!(
                index = st.queue.current_index(),
                item_id = %item.id,
                title = %item.metadata.title,
                ?reason,
                "Track started"
            );
            self.emit(DjmxEvent::TrackStarted {
                index: st.queue.current_index(),
                item_id: item.id.clone(),
                title: item.metadata.title.clone(),
                kind: item.kind,
                reason,
                timestamp: Utc::now(),
            });
        }
    }

    // ------------------------------------------------------------------
    // Queue mutation
    // ------------------------------------------------------------------

    /// Replace the queue and start its first item
    ///
    /// Both voices are unloaded and any crossfade is cancelled. A first item
    /// without audio is not loaded; its declared duration is reported and the
    /// engine stays stopped.
    pub async fn set_queue(&self, items: Vec<QueueItem>) {
        let pending = {
            let mut st = self.inner.state.lock().await;
            st.queue.set(items);
            self.emit_queue_changed(&st);
            self.begin_hard_cut(&mut st, 0)
        };

        if let Some((epoch, item)) = pending {
            self.finish_load(epoch, item, StartReason::QueueStart).await;
        }
    }

    pub async fn append_to_queue(&self, items: Vec<QueueItem>) {
        let mut st = self.inner.state.lock().await;
        debug!(count = items.len(), "Appending to queue");
        st.queue.append(items);
        self.emit_queue_changed(&st);
    }

    /// Insert items right after the current one
    ///
    /// A crossfade toward the old next item is cancelled so the new content
    /// plays next.
    pub async fn insert_after_current(&self, items: Vec<QueueItem>) {
        let mut st = self.inner.state.lock().await;
        debug!(count = items.len(), "Inserting after current");
        st.cancel_crossfade();
        st.queue.insert_after_current(items);
        self.emit_queue_changed(&st);
    }

    // ------------------------------------------------------------------
    // Transport
    // ------------------------------------------------------------------

    /// Start or resume the current item
    pub async fn play(&self) {
        let pending = {
            let mut st = self.inner.state.lock().await;
            match st.current.state {
                SlotState::Paused => {
                    self.resume_voices(&mut st);
                    None
                }
                SlotState::Loading => {
                    st.start_paused = false;
                    None
                }
                SlotState::Playing | SlotState::FadingOut | SlotState::FadingIn => None,
                SlotState::Idle | SlotState::Ended => {
                    let index = st.queue.current_index();
                    self.begin_hard_cut(&mut st, index)
                }
            }
        };

        if let Some((epoch, item)) = pending {
            self.finish_load(epoch, item, StartReason::Play).await;
        }
    }

    fn resume_voices(&self, st: &mut EngineState) {
        let fading = st.is_crossfading();
        let mut failed = None;

        if let Some(voice) = st.current.voice.as_mut() {
            match voice.play() {
                Ok(()) => {
                    st.current.state = if fading {
                        SlotState::FadingOut
                    } else {
                        SlotState::Playing
                    };
                }
                Err(e) => failed = Some(e),
            }
        }
        if let Some(voice) = st.incoming.voice.as_mut() {
            match voice.play() {
                Ok(()) => st.incoming.state = SlotState::FadingIn,
                Err(e) => {
                    warn!(error = %e, "Incoming voice failed to resume; dropping crossfade");
                    st.cancel_crossfade();
                    st.crossfade = Crossfade::Skipped;
                }
            }
        }

        match failed {
            Some(e) => warn!(error = %e, "Failed to resume playback"),
            None => self.set_playing(st, true),
        }
    }

    /// Pause both voices
    ///
    /// While the current item is loading the pause is held and the item
    /// comes up paused.
    pub async fn pause(&self) {
        let mut st = self.inner.state.lock().await;
        if st.current.state == SlotState::Loading {
            debug!("Pause during load; item will start paused");
            st.start_paused = true;
            return;
        }
        if !st.is_playing {
            return;
        }

        let st = &mut *st;
        for slot in [&mut st.current, &mut st.incoming] {
            if let Some(voice) = slot.voice.as_mut() {
                voice.pause();
                slot.state = SlotState::Paused;
            }
        }
        self.set_playing(st, false);
    }

    /// Hard-cut to the next item; no-op at the tail
    pub async fn next(&self) -> bool {
        let index = self.inner.state.lock().await.queue.current_index() + 1;
        self.jump(index, StartReason::Skip).await
    }

    /// Hard-cut to the previous item; no-op at the head
    pub async fn previous(&self) -> bool {
        let current = self.inner.state.lock().await.queue.current_index();
        match current.checked_sub(1) {
            Some(index) => self.jump(index, StartReason::Skip).await,
            None => false,
        }
    }

    /// Hard-cut to `index`; out of bounds is a no-op
    pub async fn play_at_index(&self, index: usize) -> bool {
        self.jump(index, StartReason::Jump).await
    }

    async fn jump(&self, index: usize, reason: StartReason) -> bool {
        let pending = {
            let mut st = self.inner.state.lock().await;
            if index >= st.queue.len() {
                debug!(index, len = st.queue.len(), "Index out of bounds, ignoring");
                return false;
            }
            let pending = self.begin_hard_cut(&mut st, index);
            self.emit_queue_changed(&st);
            pending
        };

        if let Some((epoch, item)) = pending {
            self.finish_load(epoch, item, reason).await;
        }
        true
    }

    /// Relocate the current voice
    ///
    /// A pending crossfade is cancelled and re-armed from the new position.
    pub async fn seek(&self, seconds: f64) {
        let mut st = self.inner.state.lock().await;
        let mut target = seconds.max(0.0);
        if st.duration > 0.0 {
            target = target.min(st.duration);
        }

        st.cancel_crossfade();
        if let Some(voice) = st.current.voice.as_mut() {
            voice.seek(target);
            if st.current.state == SlotState::Ended {
                st.current.state = SlotState::Paused;
            }
        }
        st.current_time = target;
        debug!(seconds = target, "Seek");
    }

    /// Set master volume (clamped to 0.0..=1.0)
    pub async fn set_volume(&self, volume: f32) {
        let mut st = self.inner.state.lock().await;
        st.volume = volume.clamp(0.0, 1.0);

        if st.is_crossfading() {
            self.apply_ramp(&mut st);
        } else {
            let volume = st.volume;
            if let Some(voice) = st.current.voice.as_mut() {
                voice.set_volume(volume);
            }
        }

        self.emit(DjmxEvent::VolumeChanged {
            volume: st.volume,
            timestamp: Utc::now(),
        });
    }

    // ------------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------------

    /// Unload everything and point at `index`
    ///
    /// Returns the item to load, or None when there is nothing playable.
    fn begin_hard_cut(&self, st: &mut EngineState, index: usize) -> Option<(u64, QueueItem)> {
        st.cancel_crossfade();
        st.current.unload();
        st.epoch += 1;
        st.start_paused = false;
        st.current_time = 0.0;
        st.duration = 0.0;
        self.set_playing(st, false);

        if !st.queue.set_current(index) {
            return None;
        }

        let item = st.queue.current().cloned()?;
        st.duration = item.duration_seconds;

        if !item.has_audio() {
            debug!(item_id = %item.id, "Item has no audio, not loading");
            return None;
        }

        st.current.state = SlotState::Loading;
        Some((st.epoch, item))
    }

    async fn finish_load(&self, epoch: u64, item: QueueItem, reason: StartReason) {
        let loaded = self.inner.factory.load(&item).await;

        let mut st = self.inner.state.lock().await;
        if st.epoch != epoch {
            debug!(item_id = %item.id, "Discarding stale load");
            return;
        }
        let start_paused = std::mem::take(&mut st.start_paused);

        let mut voice = match loaded {
            Ok(voice) => voice,
            Err(e) => {
                warn!(item_id = %item.id, error = %e, "Failed to load item");
                st.current.state = SlotState::Idle;
                self.set_playing(&mut st, false);
                return;
            }
        };

        voice.set_volume(st.volume);
        if !start_paused {
            if let Err(e) = voice.play() {
                warn!(item_id = %item.id, error = %e, "Failed to start item");
                st.current.state = SlotState::Idle;
                self.set_playing(&mut st, false);
                return;
            }
        }

        if let Some(duration) = voice.duration_seconds() {
            st.duration = duration;
        }
        st.current = Slot {
            voice: Some(voice),
            state: if start_paused {
                SlotState::Paused
            } else {
                SlotState::Playing
            },
        };
        st.playing_ticks = 0;
        self.set_playing(&mut st, !start_paused);
        self.emit_track_started(&st, reason);
    }

    // ------------------------------------------------------------------
    // Crossfade driver
    // ------------------------------------------------------------------

    /// Run one driver step
    pub async fn tick(&self) {
        let mut crossfade_load = None;
        let mut advance_to = None;

        {
            let mut st = self.inner.state.lock().await;
            if !st.is_playing {
                return;
            }

            st.playing_ticks += 1;
            if st.playing_ticks % self.inner.config.progress_every_ticks == 0 {
                self.emit(DjmxEvent::PlaybackProgress {
                    index: st.queue.current_index(),
                    current_time_seconds: st.current_time,
                    duration_seconds: st.duration,
                    timestamp: Utc::now(),
                });
            }

            if let Crossfade::Fading { to_index } = st.crossfade {
                self.drive_fade(&mut st, to_index);
                return;
            }

            let Some(voice) = st.current.voice.as_ref() else {
                return;
            };
            let position = voice.position_seconds();
            let real_duration = voice.duration_seconds();
            let finished = voice.is_finished();

            st.current_time = position;
            if let Some(duration) = real_duration {
                st.duration = duration;
            }

            if st.crossfade == Crossfade::Idle && st.queue.has_next() {
                if let Some(duration) = real_duration {
                    let at_seconds = duration - self.window_seconds();
                    if at_seconds > 0.0 {
                        debug!(at_seconds, "Crossfade armed");
                        st.crossfade = Crossfade::Armed { at_seconds };
                    }
                }
            }

            if let Crossfade::Armed { at_seconds } = st.crossfade {
                if position >= at_seconds {
                    crossfade_load = self.begin_crossfade(&mut st);
                }
            }

            if finished && !matches!(st.crossfade, Crossfade::Loading { .. }) {
                if st.queue.has_next() {
                    advance_to = Some(st.queue.current_index() + 1);
                } else {
                    info!("Reached end of queue");
                    st.current.state = SlotState::Ended;
                    st.current_time = st.duration;
                    self.set_playing(&mut st, false);
                }
            }
        }

        if let Some((seq, to_index, item)) = crossfade_load {
            let engine = self.clone();
            tokio::spawn(async move {
                engine.finish_crossfade_load(seq, to_index, item).await;
            });
        }

        if let Some(index) = advance_to {
            let pending = {
                let mut st = self.inner.state.lock().await;
                // Another command may have moved the queue meanwhile
                if st.queue.current_index() + 1 != index {
                    None
                } else {
                    let pending = self.begin_hard_cut(&mut st, index);
                    self.emit_queue_changed(&st);
                    if pending.is_none() {
                        self.emit_track_started(&st, StartReason::AutoAdvance);
                    }
                    pending
                }
            };
            if let Some((epoch, item)) = pending {
                self.finish_load(epoch, item, StartReason::AutoAdvance).await;
            }
        }
    }

    fn begin_crossfade(&self, st: &mut EngineState) -> Option<(u64, usize, QueueItem)> {
        let to_index = st.queue.current_index() + 1;
        let next = st.queue.peek_next()?.clone();

        if !next.has_audio() {
            debug!(item_id = %next.id, "Next item has no audio, skipping crossfade");
            st.crossfade = Crossfade::Skipped;
            return None;
        }

        st.crossfade_seq += 1;
        st.crossfade = Crossfade::Loading { to_index };
        st.incoming.state = SlotState::Loading;
        Some((st.crossfade_seq, to_index, next))
    }

    async fn finish_crossfade_load(&self, seq: u64, to_index: usize, item: QueueItem) {
        let loaded = self.inner.factory.load(&item).await;

        let mut st = self.inner.state.lock().await;
        if st.crossfade_seq != seq || st.crossfade != (Crossfade::Loading { to_index }) {
            debug!(item_id = %item.id, "Discarding stale crossfade load");
            return;
        }

        let mut voice = match loaded {
            Ok(voice) => voice,
            Err(e) => {
                warn!(item_id = %item.id, error = %e, "Failed to load crossfade target");
                st.incoming.unload();
                st.crossfade = Crossfade::Skipped;
                return;
            }
        };

        voice.set_volume(0.0);
        if st.is_playing {
            if let Err(e) = voice.play() {
                warn!(item_id = %item.id, error = %e, "Failed to start crossfade target");
                st.incoming.unload();
                st.crossfade = Crossfade::Skipped;
                return;
            }
        }

        let playing = st.is_playing;
        st.incoming = Slot {
            voice: Some(voice),
            state: if playing {
                SlotState::FadingIn
            } else {
                SlotState::Paused
            },
        };
        if playing {
            st.current.state = SlotState::FadingOut;
        }
        st.crossfade = Crossfade::Fading { to_index };

        info!(from = to_index - 1, to = to_index, "Crossfade started");
        self.emit(DjmxEvent::CrossfadeStarted {
            from_index: to_index - 1,
            to_index,
            timestamp: Utc::now(),
        });

        let outgoing_done = st
            .current
            .voice
            .as_ref()
            .map(|v| v.is_finished())
            .unwrap_or(true);
        if outgoing_done {
            self.complete_crossfade(&mut st, to_index);
        }
    }

    /// Ramp progress in 0.0..=1.0, from the incoming voice's position
    fn ramp_progress(&self, st: &EngineState) -> f32 {
        let elapsed = st
            .incoming
            .voice
            .as_ref()
            .map(|v| v.position_seconds())
            .unwrap_or(0.0);
        (elapsed / self.window_seconds()).clamp(0.0, 1.0) as f32
    }

    fn apply_ramp(&self, st: &mut EngineState) {
        let progress = self.ramp_progress(st);
        let (out_gain, in_gain) = self.inner.config.fade_curve.crossfade_gains(progress);
        let volume = st.volume;

        if let Some(voice) = st.current.voice.as_mut() {
            voice.set_volume(out_gain * volume);
        }
        if let Some(voice) = st.incoming.voice.as_mut() {
            voice.set_volume(in_gain * volume);
        }
    }

    fn drive_fade(&self, st: &mut EngineState, to_index: usize) {
        let outgoing_done = match st.current.voice.as_ref() {
            Some(voice) => {
                st.current_time = voice.position_seconds();
                voice.is_finished()
            }
            None => true,
        };

        if st.incoming.voice.is_none() {
            st.crossfade = Crossfade::Skipped;
            return;
        }

        if self.ramp_progress(st) >= 1.0 || outgoing_done {
            self.complete_crossfade(st, to_index);
        } else {
            self.apply_ramp(st);
        }
    }

    fn complete_crossfade(&self, st: &mut EngineState, to_index: usize) {
        // Outgoing voice is dropped here
        st.current = std::mem::replace(&mut st.incoming, Slot::idle());
        st.current.state = if st.is_playing {
            SlotState::Playing
        } else {
            SlotState::Paused
        };

        let volume = st.volume;
        if let Some(voice) = st.current.voice.as_mut() {
            voice.set_volume(volume);
        }

        st.queue.set_current(to_index);
        st.crossfade = Crossfade::Idle;
        st.current_time = 0.0;
        st.duration = st
            .current
            .voice
            .as_ref()
            .and_then(|v| v.duration_seconds())
            .or_else(|| st.queue.current().map(|i| i.duration_seconds))
            .unwrap_or(0.0);

        info!(index = to_index, "Crossfade completed");
        self.emit(DjmxEvent::CrossfadeCompleted {
            index: to_index,
            timestamp: Utc::now(),
        });
        self.emit_track_started(st, StartReason::AutoAdvance);
    }

    /// Tick every `tick_interval` until [`shutdown`](Self::shutdown)
    pub fn spawn_driver(&self) -> JoinHandle<()> {
        let engine = self.clone();
        let cancel = self.inner.shutdown.clone();
        let period = self.inner.config.tick_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => engine.tick().await,
                }
            }
            debug!("Playback driver stopped");
        })
    }

    /// Stop the driver and unload all voices
    pub async fn shutdown(&self) {
        self.inner.shutdown.cancel();
        let mut st = self.inner.state.lock().await;
        st.cancel_crossfade();
        st.current.unload();
        st.epoch += 1;
        self.set_playing(&mut st, false);
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    async fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.inner.state.lock().await
    }

    pub async fn snapshot(&self) -> PlaybackSnapshot {
        let st = self.lock().await;
        PlaybackSnapshot {
            queue: st.queue.items().to_vec(),
            current_index: st.queue.current_index(),
            is_playing: st.is_playing,
            current_time_seconds: st.current_time,
            duration_seconds: st.duration,
            volume: st.volume,
            current_state: st.current.state,
            crossfading: st.is_crossfading(),
            live_voices: st.live_voices(),
        }
    }

    pub async fn current_item(&self) -> Option<QueueItem> {
        self.lock().await.queue.current().cloned()
    }

    pub async fn queue_len(&self) -> usize {
        self.lock().await.queue.len()
    }

    pub async fn is_playing(&self) -> bool {
        self.lock().await.is_playing
    }

    pub async fn volume(&self) -> f32 {
        self.lock().await.volume
    }
}
