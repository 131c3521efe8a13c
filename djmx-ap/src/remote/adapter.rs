//! Remote managed playback (Spotify Connect device)
//!
//! The device itself runs elsewhere (a browser playback SDK). This adapter
//! issues Web API control requests on its behalf and mirrors the device's
//! reported state. Readiness, state changes and auth failures arrive as
//! lifecycle notifications through the control API.

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::token::TokenProvider;
use crate::backend::{BackendKind, BackendStatus, NowPlaying, PlaybackBackend};
use crate::error::{Error, Result};

pub const DEFAULT_API_BASE: &str = "https://api.spotify.com/v1";

pub const DEFAULT_REMOTE_VOLUME: f32 = 0.5;

/// Pause between transferring playback and issuing the play request
const TRANSFER_SETTLE: Duration = Duration::from_millis(200);

const POSITION_TICK: Duration = Duration::from_secs(1);

/// Track as reported by the device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteTrack {
    pub id: String,
    #[serde(default)]
    pub uri: String,
    pub name: String,
    /// Artist names joined with ", "
    #[serde(default)]
    pub artist: String,
    #[serde(default)]
    pub album: String,
    #[serde(default)]
    pub album_art: Option<String>,
    #[serde(default)]
    pub duration_ms: u64,
}

/// Authoritative device state notification
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteStateUpdate {
    pub paused: bool,
    pub position_ms: u64,
    pub duration_ms: u64,
    #[serde(default)]
    pub track: Option<RemoteTrack>,
}

#[derive(Debug, Clone)]
struct RemoteState {
    device_id: Option<String>,
    is_playing: bool,
    position_seconds: f64,
    duration_seconds: f64,
    volume: f32,
    track: Option<RemoteTrack>,
}

impl Default for RemoteState {
    fn default() -> Self {
        Self {
            device_id: None,
            is_playing: false,
            position_seconds: 0.0,
            duration_seconds: 0.0,
            volume: DEFAULT_REMOTE_VOLUME,
            track: None,
        }
    }
}

pub struct RemotePlaybackAdapter {
    http: reqwest::Client,
    api_base: String,
    tokens: Arc<dyn TokenProvider>,
    ready: AtomicBool,
    authenticated: AtomicBool,
    state: RwLock<RemoteState>,
}

impl RemotePlaybackAdapter {
    pub fn new(http: reqwest::Client, api_base: impl Into<String>, tokens: Arc<dyn TokenProvider>) -> Self {
        Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            tokens,
            ready: AtomicBool::new(false),
            authenticated: AtomicBool::new(false),
            state: RwLock::new(RemoteState::default()),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::Acquire)
    }

    /// Remote is usable for playback
    pub fn is_active(&self) -> bool {
        self.is_authenticated() && self.is_ready()
    }

    pub async fn device_id(&self) -> Option<String> {
        self.state.read().await.device_id.clone()
    }

    pub async fn is_playing(&self) -> bool {
        self.state.read().await.is_playing
    }

    // ------------------------------------------------------------------
    // Lifecycle notifications
    // ------------------------------------------------------------------

    /// A token was installed
    pub fn on_authenticated(&self) {
        self.authenticated.store(true, Ordering::Release);
    }

    pub async fn on_ready(&self, device_id: String) {
        info!(device_id = %device_id, "Remote player ready");
        self.state.write().await.device_id = Some(device_id);
        self.ready.store(true, Ordering::Release);
    }

    pub async fn on_not_ready(&self) {
        info!("Remote device went offline");
        self.ready.store(false, Ordering::Release);
        self.state.write().await.is_playing = false;
    }

    pub async fn on_state_changed(&self, update: RemoteStateUpdate) {
        let mut state = self.state.write().await;
        state.is_playing = !update.paused;
        state.position_seconds = update.position_ms as f64 / 1000.0;
        state.duration_seconds = update.duration_ms as f64 / 1000.0;
        state.track = update.track;
        debug!(
            is_playing = state.is_playing,
            position = state.position_seconds,
            "Remote state changed"
        );
    }

    pub fn on_auth_error(&self) {
        warn!("Remote authentication error");
        self.authenticated.store(false, Ordering::Release);
    }

    /// Extrapolate position by one second per second while playing
    pub fn spawn_position_ticker(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let adapter = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(POSITION_TICK);
            // First tick completes immediately
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => adapter.advance_position(POSITION_TICK.as_secs_f64()).await,
                }
            }
        })
    }

    async fn advance_position(&self, seconds: f64) {
        let mut state = self.state.write().await;
        if !state.is_playing {
            return;
        }
        state.position_seconds += seconds;
        if state.duration_seconds > 0.0 {
            state.position_seconds = state.position_seconds.min(state.duration_seconds);
        }
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    async fn require_device(&self) -> Result<String> {
        self.device_id()
            .await
            .ok_or_else(|| Error::InvalidState("Remote device not ready".to_string()))
    }

    /// Transfer playback to the device and start `uri`
    ///
    /// Track URIs are played as a one-element list, anything else as a
    /// context (album, playlist). `None` resumes the device's own context.
    pub async fn play_uri(&self, uri: Option<&str>) -> Result<()> {
        let device_id = self.require_device().await?;

        self.send(
            Method::PUT,
            "/me/player",
            Some(json!({ "device_ids": [device_id], "play": false })),
        )
        .await?;

        tokio::time::sleep(TRANSFER_SETTLE).await;

        let body = match uri {
            Some(uri) if uri.contains(":track:") => json!({ "uris": [uri] }),
            Some(uri) => json!({ "context_uri": uri }),
            None => json!({}),
        };
        info!(uri = ?uri, "Remote play");
        self.send(
            Method::PUT,
            &format!("/me/player/play?device_id={}", device_id),
            Some(body),
        )
        .await
    }

    /// Re-issue a control request once after a token refresh
    async fn send(&self, method: Method, path: &str, body: Option<Value>) -> Result<()> {
        let token = match self.tokens.access_token().await {
            Ok(token) => token,
            Err(e) => {
                self.on_auth_error();
                return Err(e);
            }
        };

        let response = self.request(method.clone(), path, body.as_ref(), &token).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Self::check(path, response).await;
        }

        debug!(path, "Remote rejected token, refreshing");
        let token = match self.tokens.refresh().await {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "Token refresh failed");
                self.on_auth_error();
                return Err(Error::AuthExpired);
            }
        };

        let response = self.request(method, path, body.as_ref(), &token).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            self.on_auth_error();
            return Err(Error::AuthExpired);
        }
        Self::check(path, response).await
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        token: &str,
    ) -> Result<reqwest::Response> {
        let mut request = self
            .http
            .request(method, format!("{}{}", self.api_base, path))
            .bearer_auth(token);
        if let Some(body) = body {
            request = request.json(body);
        }

        request.send().await.map_err(|e| {
            warn!(path, error = %e, "Remote request failed");
            Error::RemoteTransport(e.to_string())
        })
    }

    async fn check(path: &str, response: reqwest::Response) -> Result<()> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        warn!(path, %status, "Remote request rejected");
        Err(Error::RemoteTransport(format!("{} {}: {}", path, status, body)))
    }
}

#[async_trait]
impl PlaybackBackend for RemotePlaybackAdapter {
    fn kind(&self) -> BackendKind {
        BackendKind::Remote
    }

    async fn play(&self) -> Result<()> {
        self.play_uri(None).await
    }

    async fn pause(&self) -> Result<()> {
        self.send(Method::PUT, "/me/player/pause", None).await?;
        self.state.write().await.is_playing = false;
        Ok(())
    }

    async fn resume(&self) -> Result<()> {
        let device_id = self.require_device().await?;
        self.send(
            Method::PUT,
            "/me/player",
            Some(json!({ "device_ids": [device_id], "play": true })),
        )
        .await
    }

    async fn next(&self) -> Result<()> {
        self.send(Method::POST, "/me/player/next", None).await
    }

    async fn previous(&self) -> Result<()> {
        self.send(Method::POST, "/me/player/previous", None).await
    }

    async fn seek(&self, seconds: f64) -> Result<()> {
        let seconds = seconds.max(0.0);
        let position_ms = (seconds * 1000.0).round() as u64;
        self.send(
            Method::PUT,
            &format!("/me/player/seek?position_ms={}", position_ms),
            None,
        )
        .await?;
        self.state.write().await.position_seconds = seconds;
        Ok(())
    }

    async fn set_volume(&self, volume: f32) -> Result<()> {
        let volume = volume.clamp(0.0, 1.0);
        let percent = (volume * 100.0).round() as u32;
        self.send(
            Method::PUT,
            &format!("/me/player/volume?volume_percent={}", percent),
            None,
        )
        .await?;
        self.state.write().await.volume = volume;
        Ok(())
    }

    async fn status(&self) -> BackendStatus {
        let state = self.state.read().await;
        BackendStatus {
            kind: BackendKind::Remote,
            is_playing: state.is_playing,
            position_seconds: state.position_seconds,
            duration_seconds: state.duration_seconds,
            volume: state.volume,
            now_playing: state.track.as_ref().map(|t| NowPlaying::Track {
                id: t.id.clone(),
                title: t.name.clone(),
                artist: Some(t.artist.clone()).filter(|a| !a.is_empty()),
                album_art: t.album_art.clone(),
                is_ai_generated: false,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::token::TokenStore;

    fn adapter() -> Arc<RemotePlaybackAdapter> {
        let tokens = Arc::new(TokenStore::new(reqwest::Client::new(), None));
        Arc::new(RemotePlaybackAdapter::new(
            reqwest::Client::new(),
            "http://127.0.0.1:9",
            tokens,
        ))
    }

    #[tokio::test]
    async fn test_activation_requires_auth_and_ready() {
        let remote = adapter();
        assert!(!remote.is_active());

        remote.on_ready("device-1".into()).await;
        assert!(!remote.is_active());

        remote.on_authenticated();
        assert!(remote.is_active());
        assert_eq!(remote.device_id().await.as_deref(), Some("device-1"));

        remote.on_auth_error();
        assert!(!remote.is_active());
    }

    #[tokio::test]
    async fn test_state_update_is_authoritative() {
        let remote = adapter();
        let update: RemoteStateUpdate = serde_json::from_value(json!({
            "paused": false,
            "positionMs": 42500,
            "durationMs": 255000,
            "track": {"id": "t1", "name": "Digital Bath", "artist": "Deftones"}
        }))
        .unwrap();
        remote.on_state_changed(update).await;

        let status = remote.status().await;
        assert!(status.is_playing);
        assert_eq!(status.position_seconds, 42.5);
        assert_eq!(status.duration_seconds, 255.0);
        assert_eq!(status.volume, DEFAULT_REMOTE_VOLUME);
        assert!(matches!(status.now_playing, Some(NowPlaying::Track { ref title, .. }) if title == "Digital Bath"));

        // An update without a track clears the previous one
        remote
            .on_state_changed(RemoteStateUpdate {
                paused: true,
                position_ms: 0,
                duration_ms: 0,
                track: None,
            })
            .await;
        let status = remote.status().await;
        assert!(!status.is_playing);
        assert!(status.now_playing.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_position_extrapolates_while_playing() {
        let remote = adapter();
        remote
            .on_state_changed(RemoteStateUpdate {
                paused: false,
                position_ms: 10_000,
                duration_ms: 200_000,
                track: None,
            })
            .await;

        let cancel = CancellationToken::new();
        let ticker = remote.spawn_position_ticker(cancel.clone());
        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(remote.status().await.position_seconds, 13.0);

        remote
            .on_state_changed(RemoteStateUpdate {
                paused: true,
                position_ms: 20_000,
                duration_ms: 200_000,
                track: None,
            })
            .await;
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(remote.status().await.position_seconds, 20.0);

        cancel.cancel();
        ticker.await.unwrap();
    }

    #[tokio::test]
    async fn test_play_without_device_is_invalid() {
        let remote = adapter();
        remote.on_authenticated();
        let result = remote.play_uri(Some("spotify:track:abc")).await;
        assert!(matches!(result, Err(Error::InvalidState(_))));
    }
}
