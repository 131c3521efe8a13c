//! Playback queue engine
//!
//! - `queue`: ordered items and current index
//! - `voice`: the loaded-stream abstraction the engine drives
//! - `engine`: sequencing, hard cuts and tick-driven crossfades

pub mod engine;
pub mod queue;
pub mod voice;

pub use engine::{EngineConfig, PlaybackEngine, PlaybackSnapshot, SlotState, DEFAULT_VOLUME};
pub use queue::PlaybackQueue;
pub use voice::{Voice, VoiceFactory};
