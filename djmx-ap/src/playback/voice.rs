//! Playable voice abstraction
//!
//! A voice is one loaded queue item that can be started, paused, relocated and
//! gain-scaled. The engine owns at most two at a time (two only while
//! crossfading). Dropping a voice unloads it.

use async_trait::async_trait;
use djmx_common::types::QueueItem;

use crate::error::Result;

/// One loaded, independently controllable audio stream
pub trait Voice: Send + Sync {
    /// Start or continue output
    fn play(&mut self) -> Result<()>;

    fn pause(&mut self);

    /// Relocate the play head (clamped to the stream)
    fn seek(&mut self, seconds: f64);

    /// Gain in 0.0..=1.0
    fn set_volume(&mut self, volume: f32);

    fn position_seconds(&self) -> f64;

    /// Real stream length, once known
    fn duration_seconds(&self) -> Option<f64>;

    /// True once the play head reached the end of the stream
    fn is_finished(&self) -> bool;
}

/// Loads queue items into voices
#[async_trait]
pub trait VoiceFactory: Send + Sync {
    async fn load(&self, item: &QueueItem) -> Result<Box<dyn Voice>>;
}
