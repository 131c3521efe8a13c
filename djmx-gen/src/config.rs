//! Configuration for djmx-gen
//!
//! Bootstrap settings come from an optional TOML file; secrets are taken from
//! the environment first. Example:
//!
//! ```toml
//! port = 5750
//!
//! [logging]
//! level = "debug"
//!
//! [minimax]
//! base_url = "https://api.minimax.io"
//!
//! [pipeline]
//! poll_interval_seconds = 3
//! poll_timeout_seconds = 180
//! voice = "male_energetic"
//!
//! [store]
//! ttl_seconds = 3600
//! ```

use djmx_common::config::{resolve_secret, LoggingConfig};
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};

use crate::catalog::{CatalogConfig, DEFAULT_ACCOUNTS_BASE, DEFAULT_API_BASE};
use crate::clients::{MiniMaxConfig, VoicePreset, DEFAULT_BASE_URL};
use crate::pipeline::PipelineConfig;

pub const MINIMAX_API_KEY_ENV: &str = "MINIMAX_API_KEY";
pub const SPOTIFY_CLIENT_ID_ENV: &str = "SPOTIFY_CLIENT_ID";
pub const SPOTIFY_CLIENT_SECRET_ENV: &str = "SPOTIFY_CLIENT_SECRET";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub minimax: MiniMaxSection,

    #[serde(default)]
    pub spotify: SpotifySection,

    #[serde(default)]
    pub pipeline: PipelineSection,

    #[serde(default)]
    pub store: StoreSection,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_address: default_bind_address(),
            logging: LoggingConfig::default(),
            minimax: MiniMaxSection::default(),
            spotify: SpotifySection::default(),
            pipeline: PipelineSection::default(),
            store: StoreSection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MiniMaxSection {
    /// Prefer MINIMAX_API_KEY in the environment
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_minimax_base_url")]
    pub base_url: String,
}

impl Default for MiniMaxSection {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_minimax_base_url(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpotifySection {
    #[serde(default)]
    pub client_id: Option<String>,

    #[serde(default)]
    pub client_secret: Option<String>,

    #[serde(default = "default_spotify_api_base")]
    pub api_base: String,

    #[serde(default = "default_spotify_accounts_base")]
    pub accounts_base: String,
}

impl Default for SpotifySection {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            api_base: default_spotify_api_base(),
            accounts_base: default_spotify_accounts_base(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineSection {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,

    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_seconds: u64,

    #[serde(default)]
    pub voice: VoicePreset,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            poll_interval_seconds: default_poll_interval(),
            poll_timeout_seconds: default_poll_timeout(),
            voice: VoicePreset::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreSection {
    /// Evict finished experiences this long after their last update
    #[serde(default)]
    pub ttl_seconds: Option<u64>,

    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            ttl_seconds: None,
            sweep_interval_seconds: default_sweep_interval(),
        }
    }
}

fn default_port() -> u16 {
    5750
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_minimax_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_spotify_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_spotify_accounts_base() -> String {
    DEFAULT_ACCOUNTS_BASE.to_string()
}

fn default_poll_interval() -> u64 {
    3
}

fn default_poll_timeout() -> u64 {
    180
}

fn default_sweep_interval() -> u64 {
    60
}

impl TomlConfig {
    /// MiniMax connection settings; a missing key is logged, not fatal
    pub fn minimax_config(&self) -> MiniMaxConfig {
        let api_key = match resolve_secret(MINIMAX_API_KEY_ENV, self.minimax.api_key.as_deref()) {
            Some((key, source)) => {
                info!("MiniMax API key loaded from {}", source);
                Some(key)
            }
            None => {
                warn!(
                    "{} not set; generation requests will fail until it is configured",
                    MINIMAX_API_KEY_ENV
                );
                None
            }
        };

        MiniMaxConfig::new(api_key).with_base_url(self.minimax.base_url.clone())
    }

    /// Catalog credentials, or None to serve demo tracks
    pub fn catalog_config(&self) -> Option<CatalogConfig> {
        let id = resolve_secret(SPOTIFY_CLIENT_ID_ENV, self.spotify.client_id.as_deref());
        let secret = resolve_secret(
            SPOTIFY_CLIENT_SECRET_ENV,
            self.spotify.client_secret.as_deref(),
        );

        match (id, secret) {
            (Some((id, source)), Some((secret, _))) => {
                info!("Spotify catalog credentials loaded from {}", source);
                let mut config = CatalogConfig::new(id, secret);
                config.api_base = self.spotify.api_base.trim_end_matches('/').to_string();
                config.accounts_base = self.spotify.accounts_base.trim_end_matches('/').to_string();
                Some(config)
            }
            _ => {
                info!("Spotify credentials not configured; catalog routes serve demo tracks");
                None
            }
        }
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            poll_interval: Duration::from_secs(self.pipeline.poll_interval_seconds.max(1)),
            poll_timeout: Duration::from_secs(self.pipeline.poll_timeout_seconds.max(1)),
            voice: self.pipeline.voice,
            ..PipelineConfig::default()
        }
    }

    pub fn store_ttl(&self) -> Option<Duration> {
        self.store.ttl_seconds.map(Duration::from_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.store.sweep_interval_seconds.max(1))
    }
}
