//! # DJMX Common Library
//!
//! Shared code for the DJMX services including:
//! - Queue and experience data model
//! - Event types (DjmxEvent enum) and the EventBus
//! - Configuration file discovery and secret resolution
//! - Fade curve definitions used by the crossfader

pub mod config;
pub mod error;
pub mod events;
pub mod fade_curves;
pub mod types;

pub use error::{Error, Result};
pub use fade_curves::FadeCurve;
