//! HTTP handlers for the recommendation API.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::error::AppError;
use crate::recommend::{Recommender, SearchOptions};

/// Body of `POST /recommend`.
#[derive(Debug, Deserialize)]
pub struct RecommendRequest {
    /// Free-text mood query (required).
    #[serde(default)]
    pub text: Option<String>,
    /// Two-letter market code, defaults to the configured market.
    #[serde(default)]
    pub market: Option<String>,
    /// Max results, clamped into 1-50.
    #[serde(default)]
    pub limit: Option<i64>,
}

/// GET / - Service banner.
pub async fn home() -> impl IntoResponse {
    Json(serde_json::json!({
        "message": "Moodify Backend is Running",
        "status": "success",
    }))
}

/// GET /health - Health check.
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// POST /recommend - Recommend tracks for a mood query.
pub async fn recommend(
    State(recommender): State<Recommender>,
    body: Result<Json<RecommendRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = body.map_err(|e| {
        tracing::debug!(error = %e, "rejected recommend body");
        AppError::InvalidInput(e.body_text())
    })?;
    let text = req
        .text
        .ok_or_else(|| AppError::InvalidInput("Please provide input text".into()))?;

    let recommendation = recommender
        .recommend(
            &text,
            SearchOptions {
                market: req.market,
                limit: req.limit,
            },
        )
        .await?;

    Ok((StatusCode::OK, Json(recommendation)))
}

/// Build the API router.
pub fn router() -> Router<Recommender> {
    Router::new()
        .route("/", get(home))
        .route("/health", get(health))
        .route("/recommend", post(recommend))
}
