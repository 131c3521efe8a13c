//! Music catalog lookups (Spotify Web API, client-credentials flow)
//!
//! Resolves artist names to playable track metadata. When no credentials are
//! configured, or the catalog fails, callers fall back to [`demo_tracks`].

use djmx_common::types::CatalogTrack;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::clients::ClientError;

pub const DEFAULT_API_BASE: &str = "https://api.spotify.com/v1";
pub const DEFAULT_ACCOUNTS_BASE: &str = "https://accounts.spotify.com";

/// Upper bound the catalog accepts per search
pub const MAX_SEARCH_LIMIT: u32 = 10;

/// Refresh tokens this long before the provider's stated expiry
const TOKEN_EXPIRY_BUFFER: Duration = Duration::from_secs(60);

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone)]
pub struct CatalogConfig {
    pub client_id: String,
    pub client_secret: String,
    pub api_base: String,
    pub accounts_base: String,
}

impl CatalogConfig {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            accounts_base: DEFAULT_ACCOUNTS_BASE.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    tracks: Option<TrackPage>,
}

#[derive(Debug, Deserialize)]
struct TrackPage {
    #[serde(default)]
    items: Vec<SpotifyTrack>,
}

#[derive(Debug, Deserialize)]
struct SpotifyTrack {
    id: String,
    name: String,
    #[serde(default)]
    artists: Vec<SpotifyArtist>,
    album: SpotifyAlbum,
    duration_ms: u64,
    preview_url: Option<String>,
    #[serde(default)]
    external_urls: ExternalUrls,
}

#[derive(Debug, Deserialize)]
struct SpotifyArtist {
    name: String,
}

#[derive(Debug, Deserialize)]
struct SpotifyAlbum {
    name: String,
    #[serde(default)]
    images: Vec<SpotifyImage>,
}

#[derive(Debug, Deserialize)]
struct SpotifyImage {
    url: String,
}

#[derive(Debug, Default, Deserialize)]
struct ExternalUrls {
    spotify: Option<String>,
}

impl From<SpotifyTrack> for CatalogTrack {
    fn from(track: SpotifyTrack) -> Self {
        let artist = track
            .artists
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        CatalogTrack {
            id: track.id,
            title: track.name,
            artist,
            album: track.album.name,
            album_art: track.album.images.into_iter().next().map(|i| i.url),
            preview_url: track.preview_url.filter(|u| !u.is_empty()),
            duration: ((track.duration_ms as f64) / 1000.0).round() as u32,
            spotify_url: track.external_urls.spotify.unwrap_or_default(),
        }
    }
}

/// Spotify catalog client with a cached application token
pub struct SpotifyCatalog {
    http: reqwest::Client,
    config: CatalogConfig,
    token: RwLock<Option<CachedToken>>,
}

impl SpotifyCatalog {
    pub fn new(config: CatalogConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ClientError::Network(e.to_string()))?;

        Ok(Self {
            http,
            config,
            token: RwLock::new(None),
        })
    }

    async fn access_token(&self) -> Result<String, ClientError> {
        if let Some(token) = self.token.read().await.as_ref() {
            if Instant::now() < token.expires_at {
                return Ok(token.value.clone());
            }
        }

        let mut slot = self.token.write().await;
        // Another caller may have refreshed while we waited for the lock
        if let Some(token) = slot.as_ref() {
            if Instant::now() < token.expires_at {
                return Ok(token.value.clone());
            }
        }

        debug!("Requesting catalog access token");
        let response = self
            .http
            .post(format!("{}/api/token", self.config.accounts_base))
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Api(status.as_u16(), body));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| ClientError::Parse(e.to_string()))?;

        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_EXPIRY_BUFFER);
        *slot = Some(CachedToken {
            value: token.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });

        Ok(token.access_token)
    }

    /// Free-text track search; `limit` is clamped to 1..=10
    pub async fn search_tracks(
        &self,
        query: &str,
        limit: u32,
    ) -> Result<Vec<CatalogTrack>, ClientError> {
        let limit = limit.clamp(1, MAX_SEARCH_LIMIT);
        let token = self.access_token().await?;
        let limit_param = limit.to_string();

        let response = self
            .http
            .get(format!("{}/search", self.config.api_base))
            .bearer_auth(token)
            .query(&[("q", query), ("type", "track"), ("limit", limit_param.as_str())])
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Api(status.as_u16(), body));
        }

        let search: SearchResponse = response
            .json()
            .await
            .map_err(|e| ClientError::Parse(e.to_string()))?;

        let tracks: Vec<CatalogTrack> = search
            .tracks
            .map(|page| page.items.into_iter().map(CatalogTrack::from).collect())
            .unwrap_or_default();

        debug!(query = %query, count = tracks.len(), "Catalog search complete");
        Ok(tracks)
    }

    /// First `per_artist` tracks for each artist, in artist order
    ///
    /// A failing artist lookup is logged and skipped.
    pub async fn tracks_for_artists(&self, artists: &[String], per_artist: u32) -> Vec<CatalogTrack> {
        let mut tracks = Vec::new();

        for artist in artists {
            let query = format!("artist:\"{}\"", artist);
            match self.search_tracks(&query, per_artist).await {
                Ok(found) => tracks.extend(found.into_iter().take(per_artist as usize)),
                Err(e) => warn!(artist = %artist, error = %e, "Catalog lookup failed"),
            }
        }

        info!(artists = artists.len(), tracks = tracks.len(), "Resolved seed tracks");
        tracks
    }
}

fn demo_track(id: &str, title: &str, artist: &str, album: &str, duration: u32) -> CatalogTrack {
    CatalogTrack {
        id: id.to_string(),
        title: title.to_string(),
        artist: artist.to_string(),
        album: album.to_string(),
        album_art: None,
        preview_url: None,
        duration,
        spotify_url: String::new(),
    }
}

/// Built-in tracks served when the catalog is unavailable
pub fn demo_tracks() -> Vec<CatalogTrack> {
    vec![
        demo_track("demo-deftones-1", "Change (In the House of Flies)", "Deftones", "White Pony", 300),
        demo_track("demo-deftones-2", "My Own Summer (Shove It)", "Deftones", "Around the Fur", 214),
        demo_track("demo-deftones-3", "Be Quiet and Drive (Far Away)", "Deftones", "Around the Fur", 308),
        demo_track("demo-cure-1", "Just Like Heaven", "The Cure", "Kiss Me, Kiss Me, Kiss Me", 212),
        demo_track("demo-cure-2", "Pictures of You", "The Cure", "Disintegration", 447),
        demo_track("demo-cure-3", "Lovesong", "The Cure", "Disintegration", 209),
        demo_track("demo-smiths-1", "There Is a Light That Never Goes Out", "The Smiths", "The Queen Is Dead", 244),
        demo_track("demo-smiths-2", "This Charming Man", "The Smiths", "The Smiths", 162),
    ]
}

/// Demo tracks by the requested artists, or the whole demo set if none match
pub fn demo_tracks_for_artists(artists: &[String], per_artist: u32) -> Vec<CatalogTrack> {
    let all = demo_tracks();
    let mut matched = Vec::new();

    for artist in artists {
        matched.extend(
            all.iter()
                .filter(|t| t.artist.eq_ignore_ascii_case(artist.trim()))
                .take(per_artist as usize)
                .cloned(),
        );
    }

    if matched.is_empty() {
        all
    } else {
        matched
    }
}
