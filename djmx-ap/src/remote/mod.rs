//! Remote playback backend

pub mod adapter;
pub mod token;

pub use adapter::{RemotePlaybackAdapter, RemoteStateUpdate, RemoteTrack, DEFAULT_API_BASE};
pub use token::{RefreshCredentials, TokenProvider, TokenStore};
