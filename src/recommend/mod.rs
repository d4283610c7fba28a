//! Recommendation pipeline: validate the query, extract its context, search
//! the catalog and shape the result.

mod query;

pub use query::build_query;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::is_market_code;
use crate::context::{ContextExtractor, ContextInterpretation};
use crate::error::AppError;
use crate::spotify::Track;

pub const MAX_LIMIT: u32 = 50;

/// A catalog search as issued to the music provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogQuery {
    pub q: String,
    pub market: String,
    pub limit: u32,
}

/// Music catalog that can be searched for tracks.
#[async_trait]
pub trait TrackCatalog: Send + Sync {
    /// Tracks matching `query`, in the order the provider ranked them.
    async fn search(&self, query: &CatalogQuery) -> Result<Vec<Track>, AppError>;
}

/// Track descriptor returned to API callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackDescriptor {
    pub song_name: String,
    pub artist: String,
    pub artists: Vec<String>,
    pub album: String,
    pub uri: String,
    pub spotify_url: Option<String>,
    pub preview_url: Option<String>,
}

impl From<Track> for TrackDescriptor {
    fn from(t: Track) -> Self {
        let artists: Vec<String> = t.artists.into_iter().map(|a| a.name).collect();
        TrackDescriptor {
            song_name: t.name,
            artist: artists.first().cloned().unwrap_or_default(),
            artists,
            album: t.album.name,
            uri: t.uri,
            spotify_url: t.external_urls.spotify,
            preview_url: t.preview_url,
        }
    }
}

/// Result of one recommendation request.
#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    pub input_text: String,
    /// The catalog query that was issued.
    pub detected_context: String,
    pub interpretation: ContextInterpretation,
    pub total_recommendations: usize,
    pub recommended_tracks: Vec<TrackDescriptor>,
}

/// Per-request overrides of the configured search defaults.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub market: Option<String>,
    /// Clamped into 1..=50; any integer is accepted.
    pub limit: Option<i64>,
}

#[derive(Clone)]
pub struct Recommender {
    extractor: Arc<dyn ContextExtractor>,
    catalog: Arc<dyn TrackCatalog>,
    market: String,
    limit: u32,
}

impl Recommender {
    pub fn new(
        extractor: Arc<dyn ContextExtractor>,
        catalog: Arc<dyn TrackCatalog>,
        market: impl Into<String>,
        limit: u32,
    ) -> Self {
        Self {
            extractor,
            catalog,
            market: market.into(),
            limit: limit.clamp(1, MAX_LIMIT),
        }
    }

    pub async fn recommend(
        &self,
        text: &str,
        options: SearchOptions,
    ) -> Result<Recommendation, AppError> {
        if text.trim().is_empty() {
            return Err(AppError::InvalidInput("Please provide input text".into()));
        }
        let market = self.resolve_market(options.market.as_deref())?;
        let limit = options
            .limit
            .map(|l| l.clamp(1, i64::from(MAX_LIMIT)) as u32)
            .unwrap_or(self.limit);

        let interpretation = self.extractor.extract(text).await?;
        tracing::debug!(?interpretation, "context extracted");

        let query = CatalogQuery {
            q: build_query(text, &interpretation),
            market,
            limit,
        };
        let tracks = self.catalog.search(&query).await?;

        let recommended_tracks: Vec<TrackDescriptor> =
            tracks.into_iter().map(TrackDescriptor::from).collect();
        Ok(Recommendation {
            input_text: text.to_string(),
            detected_context: query.q,
            interpretation,
            total_recommendations: recommended_tracks.len(),
            recommended_tracks,
        })
    }

    fn resolve_market(&self, requested: Option<&str>) -> Result<String, AppError> {
        match requested.map(str::trim).filter(|m| !m.is_empty()) {
            None => Ok(self.market.clone()),
            Some(m) if is_market_code(m) => Ok(m.to_ascii_uppercase()),
            Some(m) => Err(AppError::InvalidInput(format!(
                "market must be a two-letter country code, got '{m}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::spotify::{Album, Artist, ExternalUrls};

    #[derive(Default)]
    struct FakeExtractor {
        seen: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl ContextExtractor for FakeExtractor {
        async fn extract(&self, text: &str) -> Result<ContextInterpretation, AppError> {
            self.seen.lock().unwrap().push(text.to_string());
            if self.fail {
                return Err(AppError::UpstreamUnavailable {
                    service: "llm",
                    message: "down".into(),
                });
            }
            Ok(ContextInterpretation {
                mood: Some("chill".into()),
                artists: vec!["Drake".into()],
                genres: vec![],
                context: Some("chill music".into()),
            })
        }
    }

    #[derive(Default)]
    struct FakeCatalog {
        queries: Mutex<Vec<CatalogQuery>>,
        tracks: Vec<Track>,
    }

    #[async_trait]
    impl TrackCatalog for FakeCatalog {
        async fn search(&self, query: &CatalogQuery) -> Result<Vec<Track>, AppError> {
            self.queries.lock().unwrap().push(query.clone());
            Ok(self.tracks.clone())
        }
    }

    fn track(name: &str, artists: &[&str]) -> Track {
        Track {
            id: name.to_lowercase(),
            name: name.to_string(),
            uri: format!("spotify:track:{}", name.to_lowercase()),
            artists: artists
                .iter()
                .map(|a| Artist {
                    id: None,
                    name: a.to_string(),
                })
                .collect(),
            album: Album {
                id: None,
                name: "Album".into(),
            },
            external_urls: ExternalUrls { spotify: None },
            preview_url: None,
        }
    }

    fn recommender(
        extractor: Arc<FakeExtractor>,
        catalog: Arc<FakeCatalog>,
    ) -> Recommender {
        Recommender::new(extractor, catalog, "IN", 10)
    }

    #[tokio::test]
    async fn blank_input_makes_no_outbound_calls() {
        let extractor = Arc::new(FakeExtractor::default());
        let catalog = Arc::new(FakeCatalog::default());
        let service = recommender(extractor.clone(), catalog.clone());

        for text in ["", "   ", "\n\t"] {
            let err = service
                .recommend(text, SearchOptions::default())
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::InvalidInput(_)));
        }
        assert!(extractor.seen.lock().unwrap().is_empty());
        assert!(catalog.queries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn text_reaches_extractor_unmodified() {
        let extractor = Arc::new(FakeExtractor::default());
        let catalog = Arc::new(FakeCatalog::default());
        let service = recommender(extractor.clone(), catalog);

        service
            .recommend("  Drake songs for CHILLING ", SearchOptions::default())
            .await
            .unwrap();
        assert_eq!(
            *extractor.seen.lock().unwrap(),
            vec!["  Drake songs for CHILLING ".to_string()]
        );
    }

    #[tokio::test]
    async fn extractor_failure_skips_catalog() {
        let extractor = Arc::new(FakeExtractor {
            fail: true,
            ..Default::default()
        });
        let catalog = Arc::new(FakeCatalog::default());
        let service = recommender(extractor, catalog.clone());

        let err = service
            .recommend("drake songs for chilling", SearchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UpstreamUnavailable { .. }));
        assert!(catalog.queries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_catalog_result_is_success() {
        let service = recommender(
            Arc::new(FakeExtractor::default()),
            Arc::new(FakeCatalog::default()),
        );
        let rec = service
            .recommend("drake songs for chilling", SearchOptions::default())
            .await
            .unwrap();
        assert_eq!(rec.total_recommendations, 0);
        assert!(rec.recommended_tracks.is_empty());
    }

    #[tokio::test]
    async fn drake_example_end_to_end() {
        let extractor = Arc::new(FakeExtractor::default());
        let catalog = Arc::new(FakeCatalog {
            tracks: vec![
                track("Passionfruit", &["Drake"]),
                track("Jaded", &["Drake", "Ty Dolla $ign"]),
            ],
            ..Default::default()
        });
        let service = recommender(extractor, catalog.clone());

        let rec = service
            .recommend("drake songs for chilling", SearchOptions::default())
            .await
            .unwrap();

        assert_eq!(
            *catalog.queries.lock().unwrap(),
            vec![CatalogQuery {
                q: "chill artist:\"Drake\"".into(),
                market: "IN".into(),
                limit: 10,
            }]
        );
        assert_eq!(rec.detected_context, "chill artist:\"Drake\"");
        assert_eq!(rec.total_recommendations, 2);
        let names: Vec<_> = rec
            .recommended_tracks
            .iter()
            .map(|t| t.song_name.as_str())
            .collect();
        assert_eq!(names, ["Passionfruit", "Jaded"]);
        assert_eq!(rec.recommended_tracks[1].artist, "Drake");
        assert_eq!(rec.recommended_tracks[1].artists, ["Drake", "Ty Dolla $ign"]);
    }

    #[tokio::test]
    async fn request_overrides_market_and_clamps_limit() {
        let catalog = Arc::new(FakeCatalog::default());
        let service = recommender(Arc::new(FakeExtractor::default()), catalog.clone());

        service
            .recommend(
                "drake",
                SearchOptions {
                    market: Some("us".into()),
                    limit: Some(500),
                },
            )
            .await
            .unwrap();
        let queries = catalog.queries.lock().unwrap();
        assert_eq!(queries[0].market, "US");
        assert_eq!(queries[0].limit, MAX_LIMIT);
    }

    #[tokio::test]
    async fn zero_and_negative_limits_clamp_to_one() {
        let catalog = Arc::new(FakeCatalog::default());
        let service = recommender(Arc::new(FakeExtractor::default()), catalog.clone());

        for limit in [0, -5] {
            service
                .recommend(
                    "drake",
                    SearchOptions {
                        market: None,
                        limit: Some(limit),
                    },
                )
                .await
                .unwrap();
        }
        let queries = catalog.queries.lock().unwrap();
        assert_eq!(queries.len(), 2);
        assert!(queries.iter().all(|q| q.limit == 1));
    }

    #[tokio::test]
    async fn malformed_market_is_rejected_before_extraction() {
        let extractor = Arc::new(FakeExtractor::default());
        let service = recommender(extractor.clone(), Arc::new(FakeCatalog::default()));

        let err = service
            .recommend(
                "drake",
                SearchOptions {
                    market: Some("india".into()),
                    limit: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
        assert!(extractor.seen.lock().unwrap().is_empty());
    }
}
