//! Bindings to the MiniMax generative services
//!
//! Three thin call-and-parse clients (script, speech, music) behind traits so
//! the pipeline can run against fakes in tests.

pub mod music;
pub mod script;
pub mod speech;

pub use music::{MiniMaxMusicClient, MusicGenerator, MusicJob, MusicStatus, WaitOptions};
pub use script::{DjScript, MiniMaxScriptClient, ScriptGenerator};
pub use speech::{MiniMaxSpeechClient, SpeechAudio, SpeechSynthesizer, VoicePreset};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Production API host
pub const DEFAULT_BASE_URL: &str = "https://api.minimax.io";

/// Generous timeout: speech and script calls routinely take tens of seconds
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

const USER_AGENT: &str = concat!("djmx-gen/", env!("CARGO_PKG_VERSION"));

/// Generative client errors
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("MiniMax API error ({0}): {1}")]
    Api(u16, String),

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("MINIMAX_API_KEY is not configured")]
    MissingApiKey,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Connection settings shared by the three clients
#[derive(Debug, Clone)]
pub struct MiniMaxConfig {
    pub api_key: Option<String>,
    pub base_url: String,
}

impl MiniMaxConfig {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

/// Provider error envelope: `{"error": {"code": ..., "message": ...}}`
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Authenticated JSON transport used by all three clients
#[derive(Clone)]
pub(crate) struct MiniMaxHttp {
    http: reqwest::Client,
    config: MiniMaxConfig,
}

impl MiniMaxHttp {
    pub(crate) fn new(config: MiniMaxConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ClientError::Network(e.to_string()))?;

        Ok(Self { http, config })
    }

    fn api_key(&self) -> Result<&str, ClientError> {
        self.config
            .api_key
            .as_deref()
            .ok_or(ClientError::MissingApiKey)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    pub(crate) async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R, ClientError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let api_key = self.api_key()?;
        debug!(path = %path, "MiniMax POST");

        let response = self
            .http
            .post(self.url(path))
            .bearer_auth(api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        read_json(response).await
    }

    pub(crate) async fn get_json<R>(&self, path: &str) -> Result<R, ClientError>
    where
        R: DeserializeOwned,
    {
        let api_key = self.api_key()?;
        debug!(path = %path, "MiniMax GET");

        let response = self
            .http
            .get(self.url(path))
            .bearer_auth(api_key)
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        read_json(response).await
    }
}

/// Check status and decode the body, surfacing the provider's error message
async fn read_json<R: DeserializeOwned>(response: reqwest::Response) -> Result<R, ClientError> {
    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorEnvelope>(&text)
            .ok()
            .and_then(|e| e.error)
            .and_then(|e| e.message)
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            });
        return Err(ClientError::Api(status.as_u16(), message));
    }

    response
        .json::<R>()
        .await
        .map_err(|e| ClientError::Parse(e.to_string()))
}
