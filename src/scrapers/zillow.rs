use crate::error::SourceError;
use crate::http::{classify_response, looks_like_captcha, HttpClient, HttpResponse};
use crate::models::{ListingType, SiteName};
use crate::scrapers::traits::{paginate, Paginator, RecordStream, SourceAdapter};
use crate::scrapers::types::{Page, RawRecord, SearchQuery};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

/// Zillow scraper. Searches by map bounds, so it needs coordinates.
pub struct ZillowScraper {
    http: HttpClient,
    base_url: String,
    max_pages: usize,
}

impl ZillowScraper {
    pub fn new(http: HttpClient, base_url: impl Into<String>, max_pages: usize) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            max_pages,
        }
    }

    /// Zillow's filter toggles for a listing type. Rentals and sold homes are
    /// opt-in: the for-sale filters have to be switched off explicitly.
    fn filter_state(listing_type: ListingType) -> Value {
        let off = json!({ "value": false });
        match listing_type {
            ListingType::ForSale => json!({
                "sortSelection": { "value": "globalrelevanceex" },
                "isAllHomes": { "value": true },
            }),
            ListingType::ForRent => json!({
                "isForRent": { "value": true },
                "isForSaleByAgent": off,
                "isForSaleByOwner": off,
                "isNewConstruction": off,
                "isComingSoon": off,
                "isAuction": off,
                "isForSaleForeclosure": off,
                "isAllHomes": { "value": true },
            }),
            ListingType::Sold => json!({
                "isRecentlySold": { "value": true },
                "isForSaleByAgent": off,
                "isForSaleByOwner": off,
                "isNewConstruction": off,
                "isComingSoon": off,
                "isAuction": off,
                "isForSaleForeclosure": off,
                "isAllHomes": { "value": true },
            }),
        }
    }

    fn search_body(query: &SearchQuery, page: u32) -> Result<Value, SourceError> {
        let bounds = query
            .location
            .bounds
            .ok_or_else(|| SourceError::InvalidResponse("search requires map bounds".to_string()))?;

        Ok(json!({
            "searchQueryState": {
                "pagination": { "currentPage": page },
                "usersSearchTerm": query.location.query,
                "mapBounds": {
                    "west": bounds.west,
                    "east": bounds.east,
                    "south": bounds.south,
                    "north": bounds.north,
                },
                "filterState": Self::filter_state(query.listing_type),
                "isMapVisible": true,
                "isListVisible": true,
            },
            "wants": { "cat1": ["listResults"], "cat2": ["total"] },
            "requestId": page,
        }))
    }
}

#[async_trait]
impl Paginator for ZillowScraper {
    /// 1-based page number
    type Cursor = u32;

    fn first_cursor(&self, _query: &SearchQuery) -> u32 {
        1
    }

    async fn fetch_page(&self, query: &SearchQuery, page: u32) -> Result<Page<u32>, SourceError> {
        let url = format!("{}/search/GetSearchPageState.htm", self.base_url);
        let body = Self::search_body(query, page)?;
        debug!("Zillow page {} for '{}'", page, query.location.query);

        let response = self.http.put_json(&url, &body).await?;
        if let Some(err) = self.classify_failure(&response) {
            return Err(err);
        }

        let json: Value = serde_json::from_str(&response.body)?;
        let results = &json["cat1"]["searchResults"]["listResults"];
        let Some(results) = results.as_array() else {
            return Err(SourceError::InvalidResponse("missing cat1.searchResults.listResults".to_string()));
        };

        let records = results
            .iter()
            .map(|result| {
                let is_building = result["isBuilding"].as_bool().unwrap_or(false) || result["units"].is_array();
                if is_building {
                    RawRecord::building(result.clone())
                } else {
                    RawRecord::listing(result.clone())
                }
            })
            .collect::<Vec<_>>();

        let total_pages = json["cat1"]["searchList"]["totalPages"].as_u64().unwrap_or(1);
        if page == 1 {
            info!(
                "Zillow reports {} result(s) over {} page(s)",
                json["cat2"]["searchList"]["totalResultCount"].as_u64().unwrap_or(records.len() as u64),
                total_pages
            );
        }

        let next = (u64::from(page) < total_pages && !records.is_empty()).then_some(page + 1);
        Ok(Page { records, next })
    }
}

impl SourceAdapter for ZillowScraper {
    fn site(&self) -> SiteName {
        SiteName::Zillow
    }

    fn requires_coordinates(&self) -> bool {
        true
    }

    fn stream(&self, query: Arc<SearchQuery>) -> RecordStream<'_> {
        paginate(self, query, self.max_pages)
    }

    /// Blocked clients get an HTML challenge page, sometimes under a 200
    fn classify_failure(&self, response: &HttpResponse) -> Option<SourceError> {
        let status = response.status.as_u16();
        let is_html = response.body.trim_start().starts_with('<');
        if is_html && (response.status.is_success() || looks_like_captcha(&response.body)) {
            return Some(SourceError::Blocked { status });
        }
        classify_response(response)
    }
}
