use std::env;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_MARKET: &str = "IN";
pub const DEFAULT_SEARCH_LIMIT: u32 = 10;
pub const DEFAULT_LLM_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_LLM_MODEL: &str = "llama-3.1-8b-instant";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Application configuration from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub spotify_client_id: String,
    pub spotify_client_secret: String,
    pub spotify_market: String,
    pub spotify_search_limit: u32,
    pub llm_api_key: String,
    pub llm_base_url: String,
    pub llm_model: String,
    pub http_timeout: Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = var("PORT")
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let spotify_client_id = var("SPOTIFY_CLIENT_ID")
            .ok_or_else(|| anyhow::anyhow!("SPOTIFY_CLIENT_ID is required"))?;

        let spotify_client_secret = var("SPOTIFY_CLIENT_SECRET")
            .ok_or_else(|| anyhow::anyhow!("SPOTIFY_CLIENT_SECRET is required"))?;

        let spotify_market = var("SPOTIFY_MARKET")
            .map(|m| m.trim().to_uppercase())
            .unwrap_or_else(|| DEFAULT_MARKET.to_string());
        if !is_market_code(&spotify_market) {
            anyhow::bail!(
                "SPOTIFY_MARKET must be a two-letter country code, got '{}'",
                spotify_market
            );
        }

        let spotify_search_limit = var("SPOTIFY_SEARCH_LIMIT")
            .and_then(|l| l.parse().ok())
            .unwrap_or(DEFAULT_SEARCH_LIMIT);

        let llm_api_key = var("LLM_API_KEY")
            .or_else(|| var("GROQ_API_KEY"))
            .ok_or_else(|| anyhow::anyhow!("LLM_API_KEY (or GROQ_API_KEY) is required"))?;

        let llm_base_url = var("LLM_BASE_URL")
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_LLM_BASE_URL.to_string());

        let llm_model = var("LLM_MODEL").unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string());

        let http_timeout = var("HTTP_TIMEOUT_SECS")
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS));

        Ok(Self {
            port,
            spotify_client_id,
            spotify_client_secret,
            spotify_market,
            spotify_search_limit,
            llm_api_key,
            llm_base_url,
            llm_model,
            http_timeout,
        })
    }
}

/// Spotify markets are ISO 3166-1 alpha-2 codes.
pub fn is_market_code(market: &str) -> bool {
    market.len() == 2 && market.chars().all(|c| c.is_ascii_alphabetic())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("SPOTIFY_CLIENT_ID", "id"),
        ("SPOTIFY_CLIENT_SECRET", "secret"),
        ("LLM_API_KEY", "key"),
    ];

    #[test]
    fn defaults_apply_when_only_credentials_are_set() {
        let config = Config::from_lookup(lookup(&REQUIRED)).unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.spotify_market, "IN");
        assert_eq!(config.spotify_search_limit, 10);
        assert_eq!(config.llm_base_url, DEFAULT_LLM_BASE_URL);
        assert_eq!(config.llm_model, DEFAULT_LLM_MODEL);
        assert_eq!(config.http_timeout, Duration::from_secs(30));
    }

    #[test]
    fn missing_spotify_secret_is_an_error() {
        let err = Config::from_lookup(lookup(&[
            ("SPOTIFY_CLIENT_ID", "id"),
            ("LLM_API_KEY", "key"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("SPOTIFY_CLIENT_SECRET"));
    }

    #[test]
    fn groq_key_is_accepted_as_llm_key() {
        let config = Config::from_lookup(lookup(&[
            ("SPOTIFY_CLIENT_ID", "id"),
            ("SPOTIFY_CLIENT_SECRET", "secret"),
            ("GROQ_API_KEY", "gsk_123"),
        ]))
        .unwrap();
        assert_eq!(config.llm_api_key, "gsk_123");
    }

    #[test]
    fn malformed_market_fails_at_startup() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("SPOTIFY_MARKET", "India"));
        let err = Config::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(err.to_string().contains("SPOTIFY_MARKET"));
    }

    #[test]
    fn overrides_are_parsed_and_bad_numbers_fall_back() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("PORT", "not-a-port"),
            ("SPOTIFY_MARKET", " us "),
            ("SPOTIFY_SEARCH_LIMIT", "25"),
            ("LLM_BASE_URL", "http://localhost:11434/v1/"),
            ("HTTP_TIMEOUT_SECS", "5"),
        ]);
        let config = Config::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.spotify_market, "US");
        assert_eq!(config.spotify_search_limit, 25);
        assert_eq!(config.llm_base_url, "http://localhost:11434/v1");
        assert_eq!(config.http_timeout, Duration::from_secs(5));
    }
}
