//! Local audio backend
//!
//! Fetch -> decode (symphonia) -> resample (rubato) -> mixer -> cpal output.

pub mod decoder;
pub mod local;
pub mod mixer;
pub mod output;
pub mod resampler;
pub mod source;

pub use local::{LocalVoice, LocalVoiceFactory};
pub use mixer::Mixer;
pub use output::AudioOutput;
pub use resampler::TARGET_SAMPLE_RATE;
