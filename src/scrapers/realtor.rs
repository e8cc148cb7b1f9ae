use crate::error::SourceError;
use crate::http::{HttpClient, HttpResponse};
use crate::models::SiteName;
use crate::scrapers::traits::{paginate, Paginator, RecordStream, SourceAdapter};
use crate::scrapers::types::{Page, RawRecord, SearchQuery};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, info};

const SEARCH_PATH: &str = "/api/v1/rdc_search_srp?client_id=rdc-search-new-communities&schema=vesta";

const AREA_TYPES: &str = "city,state,county,postal_code,address,street,neighborhood,school,school_district,university,park";

const HOME_SEARCH_QUERY: &str = r#"query Home_search(
    $city: String,
    $county: [String],
    $state_code: String,
    $postal_code: String,
    $offset: Int,
    $limit: Int
) {
    home_search(
        query: {
            city: $city
            county: $county
            postal_code: $postal_code
            state_code: $state_code
            status: %STATUS%
        }
        limit: $limit
        offset: $offset
    ) {
        count
        total
        results {
            property_id
            permalink
            status
            list_price
            last_sold_price
            price_per_sqft
            description {
                baths
                baths_consolidated
                beds
                lot_sqft
                sqft
                text
                sold_price
                stories
                year_built
                type
            }
            location {
                address {
                    city
                    country
                    line
                    postal_code
                    state_code
                    unit
                    coordinate { lat lon }
                }
            }
            primary_photo { href }
            source { id listing_id }
            advertisers { name }
        }
    }
}"#;

const PROPERTY_QUERY: &str = r#"query Property($property_id: ID!) {
    property(id: $property_id) {
        property_id
        details { permalink year_built stories }
        address { line city country postal_code state_code unit_value }
        basic { baths beds price sqft lot_sqft type sold_price }
        public_record { lot_size sqft stories units year_built assessed_value }
    }
}"#;

/// Where the next Realtor request goes
#[derive(Debug, Clone, PartialEq)]
pub enum RealtorCursor {
    Locate,
    Property { property_id: String },
    Search { area: Map<String, Value>, offset: u64 },
}

/// Realtor.com scraper over its GraphQL search endpoint
pub struct RealtorScraper {
    http: HttpClient,
    base_url: String,
    suggest_url: String,
    max_pages: usize,
}

impl RealtorScraper {
    pub fn new(
        http: HttpClient,
        base_url: impl Into<String>,
        suggest_base_url: impl Into<String>,
        max_pages: usize,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            suggest_url: format!("{}/suggest", suggest_base_url.into()),
            max_pages,
        }
    }

    fn checked(&self, response: HttpResponse) -> Result<Value, SourceError> {
        if let Some(err) = self.classify_failure(&response) {
            return Err(err);
        }
        let json: Value = serde_json::from_str(&response.body)?;
        if json["data"].is_null() {
            let message = json["errors"][0]["message"].as_str().unwrap_or("response has no data");
            return Err(SourceError::InvalidResponse(message.to_string()));
        }
        Ok(json)
    }

    async fn locate(&self, query: &SearchQuery) -> Result<Page<RealtorCursor>, SourceError> {
        let client_id = query.listing_type.as_str().replace('_', "-");
        let params = [
            ("input", query.location.query.as_str()),
            ("client_id", client_id.as_str()),
            ("limit", "1"),
            ("area_types", AREA_TYPES),
        ];
        let response = self.http.get(&self.suggest_url, &params).await?;
        if let Some(err) = self.classify_failure(&response) {
            return Err(err);
        }

        let json: Value = serde_json::from_str(&response.body)?;
        let Some(hit) = json["autocomplete"].as_array().and_then(|hits| hits.first()) else {
            info!("Realtor has no area for '{}'", query.location.query);
            return Ok(Page::empty());
        };

        let next = if hit["area_type"].as_str() == Some("address") {
            let Some(property_id) = hit["mpr_id"].as_str() else {
                return Err(SourceError::InvalidResponse("address match without mpr_id".to_string()));
            };
            RealtorCursor::Property {
                property_id: property_id.to_string(),
            }
        } else {
            let mut area = Map::new();
            for key in ["city", "state_code", "postal_code"] {
                area.insert(key.to_string(), hit[key].clone());
            }
            if let Some(county) = hit["county"].as_str() {
                area.insert("county".to_string(), json!([county]));
            }
            RealtorCursor::Search { area, offset: 0 }
        };
        debug!("Realtor resolved '{}' to {:?}", query.location.query, next);

        Ok(Page {
            records: Vec::new(),
            next: Some(next),
        })
    }

    async fn property(&self, property_id: &str) -> Result<Page<RealtorCursor>, SourceError> {
        let payload = json!({
            "query": PROPERTY_QUERY,
            "variables": { "property_id": property_id },
        });
        let url = format!("{}{}", self.base_url, SEARCH_PATH);
        let json = self.checked(self.http.post_json(&url, &payload).await?)?;

        let property = &json["data"]["property"];
        if !property.is_object() {
            return Ok(Page::empty());
        }
        Ok(Page::last(vec![RawRecord::detail(property.clone())]))
    }

    async fn search(
        &self,
        query: &SearchQuery,
        area: Map<String, Value>,
        offset: u64,
    ) -> Result<Page<RealtorCursor>, SourceError> {
        let mut variables = area.clone();
        variables.insert("offset".to_string(), json!(offset));
        variables.insert("limit".to_string(), json!(query.page_size));

        let payload = json!({
            "query": HOME_SEARCH_QUERY.replace("%STATUS%", query.listing_type.as_str()),
            "variables": variables,
        });
        let url = format!("{}{}", self.base_url, SEARCH_PATH);
        let json = self.checked(self.http.post_json(&url, &payload).await?)?;

        let search = &json["data"]["home_search"];
        let results = search["results"].as_array().map(Vec::as_slice).unwrap_or_default();
        let total = search["total"].as_u64().unwrap_or(0);
        if offset == 0 {
            info!("Realtor reports {} result(s)", total);
        }

        let records: Vec<RawRecord> = results.iter().cloned().map(RawRecord::listing).collect();
        let fetched = offset + records.len() as u64;
        let next = (!records.is_empty() && fetched < total).then_some(RealtorCursor::Search { area, offset: fetched });

        Ok(Page { records, next })
    }
}

#[async_trait]
impl Paginator for RealtorScraper {
    type Cursor = RealtorCursor;

    fn first_cursor(&self, _query: &SearchQuery) -> RealtorCursor {
        RealtorCursor::Locate
    }

    async fn fetch_page(&self, query: &SearchQuery, cursor: RealtorCursor) -> Result<Page<RealtorCursor>, SourceError> {
        match cursor {
            RealtorCursor::Locate => self.locate(query).await,
            RealtorCursor::Property { property_id } => self.property(&property_id).await,
            RealtorCursor::Search { area, offset } => self.search(query, area, offset).await,
        }
    }
}

impl SourceAdapter for RealtorScraper {
    fn site(&self) -> SiteName {
        SiteName::Realtor
    }

    fn stream(&self, query: Arc<SearchQuery>) -> RecordStream<'_> {
        // the locate step is a request of its own
        paginate(self, query, self.max_pages.saturating_add(1))
    }
}
