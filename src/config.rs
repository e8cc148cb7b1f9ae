use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Base URLs of every remote collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoints {
    pub zillow: String,
    pub redfin: String,
    pub realtor: String,
    pub geocoder: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            zillow: "https://www.zillow.com".to_string(),
            redfin: "https://www.redfin.com".to_string(),
            realtor: "https://www.realtor.com".to_string(),
            geocoder: "https://parser-external.geo.moveaws.com".to_string(),
        }
    }
}

impl Endpoints {
    /// Every endpoint pointed at one base URL (a local mock server)
    pub fn all_at(base: &str) -> Self {
        let base = base.trim_end_matches('/').to_string();
        Self {
            zillow: base.clone(),
            redfin: base.clone(),
            realtor: base.clone(),
            geocoder: base,
        }
    }
}

/// Tunables for one fetch
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Records requested per page, where the source lets us choose
    pub page_size: usize,
    /// Page ceiling per source
    pub max_pages: usize,
    /// Wall-clock budget per source
    pub source_timeout_secs: u64,
    /// Timeout of a single HTTP request
    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub endpoints: Endpoints,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            page_size: 200,
            max_pages: 20,
            source_timeout_secs: 120,
            request_timeout_secs: 30,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            endpoints: Endpoints::default(),
        }
    }
}

impl FetchConfig {
    /// Defaults overlaid with `HARVEST_*` environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(value) = env_number("HARVEST_PAGE_SIZE") {
            config.page_size = value as usize;
        }
        if let Some(value) = env_number("HARVEST_MAX_PAGES") {
            config.max_pages = value as usize;
        }
        if let Some(value) = env_number("HARVEST_SOURCE_TIMEOUT_SECS") {
            config.source_timeout_secs = value;
        }
        if let Some(value) = env_number("HARVEST_REQUEST_TIMEOUT_SECS") {
            config.request_timeout_secs = value;
        }
        config
    }

    pub fn source_timeout(&self) -> Duration {
        Duration::from_secs(self.source_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn env_number(key: &str) -> Option<u64> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse::<u64>() {
        Ok(value) if value > 0 => Some(value),
        _ => {
            warn!("Ignoring {}={:?}: expected a positive integer", key, raw);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_partial_config_over_defaults() {
        let config: FetchConfig = serde_json::from_str(r#"{"page_size": 50}"#).unwrap();
        assert_eq!(config.page_size, 50);
        assert_eq!(config.max_pages, 20);
        assert_eq!(config.endpoints.redfin, "https://www.redfin.com");
    }

    #[test]
    fn all_at_strips_trailing_slash() {
        let endpoints = Endpoints::all_at("http://127.0.0.1:8080/");
        assert_eq!(endpoints.zillow, "http://127.0.0.1:8080");
        assert_eq!(endpoints.geocoder, "http://127.0.0.1:8080");
    }
}
