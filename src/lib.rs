//! Mood-driven track recommendations: a free-text query is interpreted by a
//! hosted LLM and turned into a Spotify catalog search.

pub mod config;
pub mod context;
pub mod error;
pub mod handlers;
pub mod recommend;
pub mod spotify;

use std::sync::Arc;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::context::LlmExtractor;
use crate::recommend::Recommender;
use crate::spotify::SpotifyClient;

pub use crate::error::AppError;

/// Wires the production extractor and catalog from configuration.
pub fn build_recommender(config: &Config) -> anyhow::Result<Recommender> {
    let http = reqwest::Client::builder()
        .timeout(config.http_timeout)
        .build()?;

    let extractor = LlmExtractor::new(
        http.clone(),
        config.llm_base_url.clone(),
        config.llm_api_key.clone(),
        config.llm_model.clone(),
    );
    let spotify = SpotifyClient::new(
        http,
        config.spotify_client_id.clone(),
        config.spotify_client_secret.clone(),
    );

    Ok(Recommender::new(
        Arc::new(extractor),
        Arc::new(spotify),
        config.spotify_market.clone(),
        config.spotify_search_limit,
    ))
}

/// Full application router with request tracing.
pub fn build_router(recommender: Recommender) -> Router {
    handlers::router()
        .layer(TraceLayer::new_for_http())
        .with_state(recommender)
}
