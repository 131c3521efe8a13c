//! Access tokens for the remote playback service
//!
//! The OAuth authorization flow happens outside this process; the resulting
//! tokens are handed in through the control API. A refresh token plus client
//! credentials, when present, allow one refresh when the service rejects the
//! access token.

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

pub const DEFAULT_ACCOUNTS_BASE: &str = "https://accounts.spotify.com";

#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Current access token; `AuthExpired` when none is held
    async fn access_token(&self) -> Result<String>;

    /// Obtain a fresh access token
    async fn refresh(&self) -> Result<String>;
}

/// Client credentials for the refresh-token grant
#[derive(Debug, Clone)]
pub struct RefreshCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub accounts_base: String,
}

#[derive(Debug, Default)]
struct StoredTokens {
    access: Option<String>,
    refresh: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// In-memory token holder
pub struct TokenStore {
    http: reqwest::Client,
    credentials: Option<RefreshCredentials>,
    tokens: RwLock<StoredTokens>,
}

impl TokenStore {
    pub fn new(http: reqwest::Client, credentials: Option<RefreshCredentials>) -> Self {
        Self {
            http,
            credentials,
            tokens: RwLock::new(StoredTokens::default()),
        }
    }

    /// Install tokens from a completed authorization
    ///
    /// A missing refresh token keeps the previously stored one.
    pub async fn set_tokens(&self, access_token: String, refresh_token: Option<String>) {
        let mut tokens = self.tokens.write().await;
        tokens.access = Some(access_token);
        if refresh_token.is_some() {
            tokens.refresh = refresh_token;
        }
        info!("Remote access token installed");
    }

    pub async fn clear(&self) {
        *self.tokens.write().await = StoredTokens::default();
    }

    pub async fn has_access_token(&self) -> bool {
        self.tokens.read().await.access.is_some()
    }
}

#[async_trait]
impl TokenProvider for TokenStore {
    async fn access_token(&self) -> Result<String> {
        self.tokens
            .read()
            .await
            .access
            .clone()
            .ok_or(Error::AuthExpired)
    }

    async fn refresh(&self) -> Result<String> {
        let Some(credentials) = self.credentials.as_ref() else {
            debug!("No client credentials configured; cannot refresh");
            return Err(Error::AuthExpired);
        };
        let Some(refresh_token) = self.tokens.read().await.refresh.clone() else {
            debug!("No refresh token stored");
            return Err(Error::AuthExpired);
        };

        let response = self
            .http
            .post(format!("{}/api/token", credentials.accounts_base))
            .basic_auth(&credentials.client_id, Some(&credentials.client_secret))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token.as_str()),
            ])
            .send()
            .await
            .map_err(|e| Error::RemoteTransport(e.to_string()))?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "Token refresh rejected");
            return Err(Error::AuthExpired);
        }

        let body: RefreshResponse = response
            .json()
            .await
            .map_err(|e| Error::RemoteTransport(format!("Invalid refresh response: {}", e)))?;

        self.set_tokens(body.access_token.clone(), body.refresh_token)
            .await;
        Ok(body.access_token)
    }
}
