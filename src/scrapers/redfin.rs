use crate::error::SourceError;
use crate::http::HttpClient;
use crate::models::{ListingType, SiteName};
use crate::scrapers::traits::{paginate, Paginator, RecordStream, SourceAdapter};
use crate::scrapers::types::{Page, RawRecord, SearchQuery};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Where the next Redfin request goes
#[derive(Debug, Clone, PartialEq)]
pub enum RedfinCursor {
    /// Translate the location into a Redfin region
    Locate,
    /// The location is one street address
    Home { property_id: String },
    /// Search results of a region
    Region {
        region_id: String,
        region_type: &'static str,
        page: usize,
    },
}

/// Redfin scraper over the `stingray` JSON API
pub struct RedfinScraper {
    http: HttpClient,
    base_url: String,
    max_pages: usize,
}

impl RedfinScraper {
    pub fn new(http: HttpClient, base_url: impl Into<String>, max_pages: usize) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            max_pages,
        }
    }

    /// GET a stingray endpoint and strip its `{}&&` anti-hijacking prefix
    async fn get_stingray(&self, path: &str, params: &[(&str, String)]) -> Result<Value, SourceError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.http.get(&url, params).await?;
        if let Some(err) = self.classify_failure(&response) {
            return Err(err);
        }
        let body = response.body.trim_start();
        let body = body.strip_prefix("{}&&").unwrap_or(body);
        Ok(serde_json::from_str(body)?)
    }

    async fn locate(&self, query: &SearchQuery) -> Result<Page<RedfinCursor>, SourceError> {
        let params = [
            ("location", query.location.query.clone()),
            ("v", "2".to_string()),
            ("al", "1".to_string()),
        ];
        let json = self.get_stingray("/stingray/do/location-autocomplete", &params).await?;
        let payload = &json["payload"];

        let target = if payload["exactMatch"].is_object() {
            &payload["exactMatch"]
        } else {
            &payload["sections"][0]["rows"][0]
        };
        let (Some(id), Some(match_type)) = (target["id"].as_str(), match_kind(&target["type"])) else {
            info!("Redfin has no region for '{}'", query.location.query);
            return Ok(Page::empty());
        };

        // ids look like "2_30749"
        let region_id = id.split_once('_').map_or(id, |(_, rest)| rest).to_string();
        let next = match match_type.as_str() {
            "1" => RedfinCursor::Home { property_id: region_id },
            "2" => RedfinCursor::Region { region_id, region_type: "6", page: 1 },
            "3" => RedfinCursor::Region { region_id, region_type: "1", page: 1 },
            "4" => RedfinCursor::Region { region_id, region_type: "2", page: 1 },
            "5" => RedfinCursor::Region { region_id, region_type: "5", page: 1 },
            other => {
                warn!("Redfin returned unsupported match type {}", other);
                return Err(SourceError::InvalidResponse(format!("unsupported region match type '{other}'")));
            }
        };
        debug!("Redfin resolved '{}' to {:?}", query.location.query, next);

        Ok(Page {
            records: Vec::new(),
            next: Some(next),
        })
    }

    async fn home(&self, property_id: &str) -> Result<Page<RedfinCursor>, SourceError> {
        let params = [("propertyId", property_id.to_string()), ("accessLevel", "3".to_string())];
        let json = self.get_stingray("/stingray/api/home/details/aboveTheFold", &params).await?;
        let info = &json["payload"]["addressSectionInfo"];
        if !info.is_object() {
            return Err(SourceError::InvalidResponse("missing payload.addressSectionInfo".to_string()));
        }
        Ok(Page::last(vec![RawRecord::detail(info.clone())]))
    }

    async fn region(
        &self,
        query: &SearchQuery,
        region_id: String,
        region_type: &'static str,
        page: usize,
    ) -> Result<Page<RedfinCursor>, SourceError> {
        let mut params = vec![
            ("al", "1".to_string()),
            ("region_id", region_id.clone()),
            ("region_type", region_type.to_string()),
            ("num_homes", query.page_size.to_string()),
            ("page_number", page.to_string()),
        ];
        params.extend(listing_params(query.listing_type));

        let json = self.get_stingray("/stingray/api/gis", &params).await?;
        let payload = &json["payload"];
        let homes = payload["homes"].as_array().map(Vec::as_slice).unwrap_or_default();

        let mut records: Vec<RawRecord> = homes.iter().cloned().map(RawRecord::listing).collect();
        if let Some(buildings) = payload["buildings"].as_object() {
            records.extend(buildings.values().cloned().map(RawRecord::building));
        }

        let next = (query.page_size > 0 && homes.len() >= query.page_size).then(|| RedfinCursor::Region {
            region_id,
            region_type,
            page: page + 1,
        });
        Ok(Page { records, next })
    }
}

/// Autocomplete match types arrive as strings or numbers
fn match_kind(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Redfin's listing-type filters
fn listing_params(listing_type: ListingType) -> Vec<(&'static str, String)> {
    match listing_type {
        ListingType::ForSale => vec![("status", "9".to_string())],
        ListingType::ForRent => vec![("isRentals", "true".to_string())],
        ListingType::Sold => vec![("sold_within_days", "90".to_string())],
    }
}

#[async_trait]
impl Paginator for RedfinScraper {
    type Cursor = RedfinCursor;

    fn first_cursor(&self, _query: &SearchQuery) -> RedfinCursor {
        RedfinCursor::Locate
    }

    async fn fetch_page(&self, query: &SearchQuery, cursor: RedfinCursor) -> Result<Page<RedfinCursor>, SourceError> {
        match cursor {
            RedfinCursor::Locate => self.locate(query).await,
            RedfinCursor::Home { property_id } => self.home(&property_id).await,
            RedfinCursor::Region {
                region_id,
                region_type,
                page,
            } => self.region(query, region_id, region_type, page).await,
        }
    }
}

impl SourceAdapter for RedfinScraper {
    fn site(&self) -> SiteName {
        SiteName::Redfin
    }

    fn stream(&self, query: Arc<SearchQuery>) -> RecordStream<'_> {
        // the locate step is a request of its own
        paginate(self, query, self.max_pages.saturating_add(1))
    }
}
