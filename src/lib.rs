pub mod config;
pub mod error;
pub mod http;
pub mod location;
pub mod models;
pub mod normalize;
pub mod orchestrator;
pub mod proxy;
pub mod scrapers;

pub use config::{Endpoints, FetchConfig};
pub use error::{HarvestError, SourceError, SourceFailure};
pub use models::{ListingType, Property, PropertyType, ResultTable, SiteName, COLUMNS};
pub use orchestrator::{FetchOrchestrator, SourceOutcome, SourceReport};
pub use proxy::ProxyConfig;

/// One-shot fetch with default tunables overlaid by the environment
pub async fn scrape_property<S: AsRef<str>>(
    location: &str,
    listing_type: &str,
    sites: &[S],
    proxy: Option<&str>,
) -> Result<ResultTable, HarvestError> {
    FetchOrchestrator::new(FetchConfig::from_env())
        .run(location, listing_type, sites, proxy)
        .await
}
