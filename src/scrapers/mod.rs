pub mod realtor;
pub mod redfin;
pub mod traits;
pub mod types;
pub mod zillow;

pub use realtor::RealtorScraper;
pub use redfin::RedfinScraper;
pub use traits::{paginate, Paginator, RecordStream, SourceAdapter};
pub use types::{Page, RawRecord, RecordKind, SearchQuery};
pub use zillow::ZillowScraper;

use crate::config::FetchConfig;
use crate::http::HttpClient;
use crate::location::{Geocoder, SuggestGeocoder};
use crate::models::SiteName;
use std::sync::Arc;

/// Builds the collaborators of one fetch. Construction must not touch the
/// network: adapters are built before inputs are fully validated.
pub trait AdapterRegistry: Send + Sync {
    fn adapter(&self, site: SiteName, http: &HttpClient) -> Arc<dyn SourceAdapter>;

    fn geocoder(&self, http: &HttpClient) -> Arc<dyn Geocoder>;
}

/// Registry of the live HTTP scrapers
#[derive(Debug, Clone)]
pub struct HttpRegistry {
    config: FetchConfig,
}

impl HttpRegistry {
    pub fn new(config: FetchConfig) -> Self {
        Self { config }
    }
}

impl AdapterRegistry for HttpRegistry {
    fn adapter(&self, site: SiteName, http: &HttpClient) -> Arc<dyn SourceAdapter> {
        let endpoints = &self.config.endpoints;
        let max_pages = self.config.max_pages;
        match site {
            SiteName::Zillow => Arc::new(ZillowScraper::new(http.clone(), &endpoints.zillow, max_pages)),
            SiteName::Redfin => Arc::new(RedfinScraper::new(http.clone(), &endpoints.redfin, max_pages)),
            SiteName::Realtor => Arc::new(RealtorScraper::new(
                http.clone(),
                &endpoints.realtor,
                &endpoints.geocoder,
                max_pages,
            )),
        }
    }

    fn geocoder(&self, http: &HttpClient) -> Arc<dyn Geocoder> {
        Arc::new(SuggestGeocoder::new(http.clone(), &self.config.endpoints.geocoder))
    }
}
