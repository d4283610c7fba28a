//! Spotify Web API client.
//!
//! Uses Client Credentials flow for server-to-server authentication.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::error::AppError;
use crate::recommend::{CatalogQuery, TrackCatalog};

pub const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
pub const API_BASE: &str = "https://api.spotify.com/v1";

const SERVICE: &str = "spotify";
const MAX_LIMIT: u32 = 50;

#[derive(Debug, thiserror::Error)]
pub enum SpotifyError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("authentication failed ({status}): {body}")]
    Auth { status: StatusCode, body: String },
    #[error("Spotify API error {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("{0}")]
    Malformed(String),
}

impl From<SpotifyError> for AppError {
    fn from(err: SpotifyError) -> Self {
        let message = err.to_string();
        match err {
            SpotifyError::Transport(_) | SpotifyError::Status { .. } => {
                AppError::UpstreamUnavailable {
                    service: SERVICE,
                    message,
                }
            }
            SpotifyError::Auth { .. } => AppError::AuthFailure {
                service: SERVICE,
                message,
            },
            SpotifyError::Malformed(_) => AppError::ParseFailure {
                service: SERVICE,
                message,
            },
        }
    }
}

/// Spotify API client with token caching.
#[derive(Clone)]
pub struct SpotifyClient {
    client: Client,
    client_id: String,
    client_secret: String,
    token_url: String,
    api_base: String,
    token: Arc<RwLock<Option<CachedToken>>>,
}

#[derive(Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

impl SpotifyClient {
    pub fn new(client: Client, client_id: String, client_secret: String) -> Self {
        Self {
            client,
            client_id,
            client_secret,
            token_url: TOKEN_URL.to_string(),
            api_base: API_BASE.to_string(),
            token: Arc::new(RwLock::new(None)),
        }
    }

    /// Points the client at different accounts and API hosts.
    pub fn with_base_urls(mut self, token_url: impl Into<String>, api_base: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Ensures we have a valid access token, refreshing if needed.
    async fn ensure_token(&self) -> Result<String, SpotifyError> {
        {
            let guard = self.token.read().await;
            if let Some(ref t) = *guard {
                if t.expires_at > Instant::now() {
                    return Ok(t.access_token.clone());
                }
            }
        }

        let token = self.fetch_token().await?;
        {
            let mut guard = self.token.write().await;
            *guard = Some(token.clone());
        }
        Ok(token.access_token)
    }

    async fn invalidate_token(&self) {
        *self.token.write().await = None;
    }

    async fn fetch_token(&self) -> Result<CachedToken, SpotifyError> {
        let params = [("grant_type", "client_credentials")];
        let auth = base64::engine::general_purpose::STANDARD.encode(
            format!("{}:{}", self.client_id, self.client_secret).as_bytes(),
        );

        let res = self
            .client
            .post(&self.token_url)
            .header("Authorization", format!("Basic {}", auth))
            .form(&params)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            // The accounts service answers bad client credentials with 400 invalid_client.
            return Err(match status {
                StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    SpotifyError::Auth { status, body }
                }
                _ => SpotifyError::Status { status, body },
            });
        }

        let body: TokenResponse = res
            .json()
            .await
            .map_err(|e| SpotifyError::Malformed(format!("token parse failed: {}", e)))?;
        let expires_at = Instant::now() + Duration::from_secs(body.expires_in.saturating_sub(60));

        Ok(CachedToken {
            access_token: body.access_token,
            expires_at,
        })
    }

    /// Search for tracks in the Spotify catalog.
    pub async fn search_tracks(
        &self,
        q: &str,
        market: &str,
        limit: u32,
    ) -> Result<Vec<Track>, SpotifyError> {
        let token = self.ensure_token().await?;

        let limit = limit.clamp(1, MAX_LIMIT);
        let url = format!(
            "{}/search?q={}&type=track&market={}&limit={}",
            self.api_base,
            urlencoding::encode(q),
            urlencoding::encode(market),
            limit,
        );

        let res = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", token))
            .send()
            .await?;

        let status = res.status();
        if status == StatusCode::UNAUTHORIZED {
            self.invalidate_token().await;
            let body = res.text().await.unwrap_or_default();
            return Err(SpotifyError::Auth { status, body });
        }
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(SpotifyError::Status { status, body });
        }

        let body: SearchResponse = res
            .json()
            .await
            .map_err(|e| SpotifyError::Malformed(format!("search parse failed: {}", e)))?;
        Ok(body.tracks.items.into_iter().flatten().collect())
    }
}

#[async_trait]
impl TrackCatalog for SpotifyClient {
    async fn search(&self, query: &CatalogQuery) -> Result<Vec<Track>, AppError> {
        let tracks = self.search_tracks(&query.q, &query.market, query.limit).await?;
        tracing::info!(q = %query.q, market = %query.market, count = tracks.len(), "spotify search");
        Ok(tracks)
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Deserialize)]
struct SearchResponse {
    tracks: TracksPage,
}

#[derive(Deserialize)]
struct TracksPage {
    #[serde(default)]
    items: Vec<Option<Track>>,
}

/// A Spotify track (simplified).
#[derive(Clone, Debug, Deserialize)]
pub struct Track {
    pub id: String,
    pub name: String,
    pub uri: String,
    #[serde(default)]
    pub artists: Vec<Artist>,
    #[serde(default)]
    pub album: Album,
    #[serde(default)]
    pub external_urls: ExternalUrls,
    #[serde(default)]
    pub preview_url: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct Artist {
    pub id: Option<String>,
    pub name: String,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct Album {
    pub id: Option<String>,
    pub name: String,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct ExternalUrls {
    pub spotify: Option<String>,
}
