//! Configuration for djmx-ap
//!
//! Reads the same TOML file as djmx-gen; player settings live in their own
//! sections so one file can serve both services. Example:
//!
//! ```toml
//! [logging]
//! level = "debug"
//!
//! [player]
//! port = 5751
//! audio_device = "pulse"
//!
//! [playback]
//! crossfade_ms = 2000
//! fade_curve = "linear"
//!
//! [injection]
//! threshold = 4
//! mode = "replace"
//! generation_url = "http://127.0.0.1:5750"
//! ```

use djmx_common::config::{resolve_secret, LoggingConfig};
use djmx_common::FadeCurve;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::injector::{
    GenerationService, HttpGenerationService, InjectionMode, StaticGenerationService,
    DEFAULT_TRIGGER_THRESHOLD,
};
use crate::playback::EngineConfig;
use crate::remote::token::{RefreshCredentials, DEFAULT_ACCOUNTS_BASE};
use crate::remote::DEFAULT_API_BASE;

pub const SPOTIFY_CLIENT_ID_ENV: &str = "SPOTIFY_CLIENT_ID";
pub const SPOTIFY_CLIENT_SECRET_ENV: &str = "SPOTIFY_CLIENT_SECRET";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub player: PlayerSection,

    #[serde(default)]
    pub playback: PlaybackSection,

    #[serde(default)]
    pub remote: RemoteSection,

    #[serde(default)]
    pub spotify: SpotifySection,

    #[serde(default)]
    pub injection: InjectionSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlayerSection {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Output device name; default device when unset
    #[serde(default)]
    pub audio_device: Option<String>,

    /// Skip the audio device entirely
    #[serde(default)]
    pub null_output: bool,
}

impl Default for PlayerSection {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_address: default_bind_address(),
            audio_device: None,
            null_output: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaybackSection {
    #[serde(default = "default_crossfade_ms")]
    pub crossfade_ms: u64,

    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,

    #[serde(default)]
    pub fade_curve: FadeCurve,
}

impl Default for PlaybackSection {
    fn default() -> Self {
        Self {
            crossfade_ms: default_crossfade_ms(),
            tick_ms: default_tick_ms(),
            fade_curve: FadeCurve::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteSection {
    #[serde(default = "default_remote_api_base")]
    pub api_base: String,
}

impl Default for RemoteSection {
    fn default() -> Self {
        Self {
            api_base: default_remote_api_base(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpotifySection {
    #[serde(default)]
    pub client_id: Option<String>,

    #[serde(default)]
    pub client_secret: Option<String>,

    #[serde(default = "default_accounts_base")]
    pub accounts_base: String,
}

impl Default for SpotifySection {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            accounts_base: default_accounts_base(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct InjectionSection {
    #[serde(default = "default_threshold")]
    pub threshold: u32,

    #[serde(default)]
    pub mode: InjectionMode,

    /// djmx-gen base URL
    #[serde(default = "default_generation_url")]
    pub generation_url: String,

    /// Directory of pre-rendered intro/song/outro; overrides generation_url
    #[serde(default)]
    pub static_content_dir: Option<PathBuf>,

    #[serde(default)]
    pub genres: Vec<String>,

    #[serde(default)]
    pub mood: Option<String>,

    #[serde(default = "default_injection_poll")]
    pub poll_interval_seconds: u64,

    #[serde(default = "default_injection_max_wait")]
    pub max_wait_seconds: u64,
}

impl Default for InjectionSection {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            mode: InjectionMode::default(),
            generation_url: default_generation_url(),
            static_content_dir: None,
            genres: Vec::new(),
            mood: None,
            poll_interval_seconds: default_injection_poll(),
            max_wait_seconds: default_injection_max_wait(),
        }
    }
}

fn default_port() -> u16 {
    5751
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_crossfade_ms() -> u64 {
    2000
}

fn default_tick_ms() -> u64 {
    100
}

fn default_remote_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_accounts_base() -> String {
    DEFAULT_ACCOUNTS_BASE.to_string()
}

fn default_threshold() -> u32 {
    DEFAULT_TRIGGER_THRESHOLD
}

fn default_generation_url() -> String {
    "http://127.0.0.1:5750".to_string()
}

fn default_injection_poll() -> u64 {
    2
}

fn default_injection_max_wait() -> u64 {
    300
}

impl TomlConfig {
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            tick_interval: Duration::from_millis(self.playback.tick_ms.max(10)),
            crossfade_window: Duration::from_millis(self.playback.crossfade_ms.max(1)),
            fade_curve: self.playback.fade_curve,
            ..EngineConfig::default()
        }
    }

    /// Credentials for refreshing remote tokens, if configured
    pub fn refresh_credentials(&self) -> Option<RefreshCredentials> {
        let id = resolve_secret(SPOTIFY_CLIENT_ID_ENV, self.spotify.client_id.as_deref());
        let secret = resolve_secret(
            SPOTIFY_CLIENT_SECRET_ENV,
            self.spotify.client_secret.as_deref(),
        );

        match (id, secret) {
            (Some((client_id, source)), Some((client_secret, _))) => {
                info!("Spotify client credentials loaded from {}", source);
                Some(RefreshCredentials {
                    client_id,
                    client_secret,
                    accounts_base: self.spotify.accounts_base.trim_end_matches('/').to_string(),
                })
            }
            _ => {
                info!("Spotify client credentials not configured; remote tokens cannot be refreshed");
                None
            }
        }
    }

    pub fn generation_service(&self, http: reqwest::Client) -> Arc<dyn GenerationService> {
        if let Some(dir) = self.injection.static_content_dir.as_ref() {
            info!("DJ injection uses pre-rendered content from {}", dir.display());
            return Arc::new(StaticGenerationService::new(dir.clone()));
        }

        info!("DJ injection uses generation service at {}", self.injection.generation_url);
        Arc::new(
            HttpGenerationService::new(http, self.injection.generation_url.clone()).with_timing(
                Duration::from_secs(self.injection.poll_interval_seconds.max(1)),
                Duration::from_secs(self.injection.max_wait_seconds.max(1)),
            ),
        )
    }
}
