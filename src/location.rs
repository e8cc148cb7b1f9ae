use crate::error::{HarvestError, SourceError};
use crate::http::{classify_response, HttpClient};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

const STATE_CODES: [&str; 56] = [
    "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DE", "DC", "FL", "GA", "HI", "ID", "IL", "IN", "IA", "KS", "KY",
    "LA", "ME", "MD", "MA", "MI", "MN", "MS", "MO", "MT", "NE", "NV", "NH", "NJ", "NM", "NY", "NC", "ND", "OH",
    "OK", "OR", "PA", "RI", "SC", "SD", "TN", "TX", "UT", "VT", "VA", "WA", "WV", "WI", "WY", "PR", "VI", "GU",
    "AS", "MP",
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub west: f64,
    pub east: f64,
    pub south: f64,
    pub north: f64,
}

impl BoundingBox {
    /// Square box of `span` degrees on each side of `center`
    pub fn around(center: GeoPoint, span: f64) -> Self {
        Self {
            west: center.lon - span,
            east: center.lon + span,
            south: center.lat - span,
            north: center.lat + span,
        }
    }
}

/// How the input text was understood
#[derive(Debug, Clone, PartialEq)]
pub enum LocationKind {
    PostalCode(String),
    CityState { city: String, state: String },
    FreeForm,
}

/// The target area every source searches
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLocation {
    /// Normalized region text handed to each source's own lookup
    pub query: String,
    pub kind: LocationKind,
    pub centroid: Option<GeoPoint>,
    pub bounds: Option<BoundingBox>,
}

/// One geocoding hit
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeMatch {
    pub centroid: GeoPoint,
    pub bounds: Option<BoundingBox>,
}

/// External coordinate lookup
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// `Ok(None)` means the service answered and knows no such place
    async fn geocode(&self, query: &str) -> Result<Option<GeocodeMatch>, SourceError>;
}

/// Geocoder backed by the realtor.com location suggest service
pub struct SuggestGeocoder {
    http: HttpClient,
    base_url: String,
}

impl SuggestGeocoder {
    pub fn new(http: HttpClient, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl Geocoder for SuggestGeocoder {
    async fn geocode(&self, query: &str) -> Result<Option<GeocodeMatch>, SourceError> {
        let url = format!("{}/suggest", self.base_url);
        let params = [
            ("input", query),
            ("client_id", "for-sale"),
            ("limit", "1"),
            ("area_types", "city,state,county,postal_code,address,street,neighborhood"),
        ];
        let response = self.http.get(&url, &params).await?;
        if let Some(err) = classify_response(&response) {
            return Err(err);
        }

        let body: Value = serde_json::from_str(&response.body)?;
        let Some(hit) = body["autocomplete"].as_array().and_then(|hits| hits.first()) else {
            return Ok(None);
        };

        let centroid = match (hit["centroid"]["lat"].as_f64(), hit["centroid"]["lon"].as_f64()) {
            (Some(lat), Some(lon)) => GeoPoint { lat, lon },
            _ => return Ok(None),
        };
        let bounds = hit["bounding_box"].as_object().and_then(|bbox| {
            Some(BoundingBox {
                west: bbox.get("west")?.as_f64()?,
                east: bbox.get("east")?.as_f64()?,
                south: bbox.get("south")?.as_f64()?,
                north: bbox.get("north")?.as_f64()?,
            })
        });

        Ok(Some(GeocodeMatch { centroid, bounds }))
    }
}

pub struct LocationResolver {
    geocoder: Arc<dyn Geocoder>,
}

impl LocationResolver {
    pub fn new(geocoder: Arc<dyn Geocoder>) -> Self {
        Self { geocoder }
    }

    /// Resolve `text` once for the whole fetch. Coordinates are required only
    /// when `needs_coordinates` is set.
    pub async fn resolve(&self, text: &str, needs_coordinates: bool) -> Result<ResolvedLocation, HarvestError> {
        let (query, kind) = parse_location(text)?;
        let mut resolved = ResolvedLocation {
            query,
            kind,
            centroid: None,
            bounds: None,
        };

        if !needs_coordinates {
            debug!("Resolved '{}' as {:?} without geocoding", text, resolved.kind);
            return Ok(resolved);
        }

        let hit = self
            .geocoder
            .geocode(&resolved.query)
            .await
            .map_err(|e| geo_error(text, format!("geocoding failed: {e}")))?
            .ok_or_else(|| geo_error(text, "no coordinates found for this location".to_string()))?;

        let span = match resolved.kind {
            LocationKind::PostalCode(_) => 0.05,
            LocationKind::CityState { .. } => 0.15,
            LocationKind::FreeForm => 0.02,
        };
        resolved.centroid = Some(hit.centroid);
        resolved.bounds = Some(hit.bounds.unwrap_or_else(|| BoundingBox::around(hit.centroid, span)));

        info!(
            "Geocoded '{}' to ({:.4}, {:.4})",
            resolved.query, hit.centroid.lat, hit.centroid.lon
        );
        Ok(resolved)
    }
}

fn geo_error(location: &str, reason: String) -> HarvestError {
    HarvestError::GeoResolution {
        location: location.to_string(),
        reason,
    }
}

/// Structural validation of the input; no network
pub fn parse_location(text: &str) -> Result<(String, LocationKind), HarvestError> {
    let query = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if query.is_empty() {
        return Err(geo_error(text, "location is empty".to_string()));
    }

    if query.chars().all(|c| c.is_ascii_digit() || c == '-') {
        return match parse_zip(&query) {
            Some(zip) => Ok((zip.clone(), LocationKind::PostalCode(zip))),
            None => Err(geo_error(text, "malformed ZIP code".to_string())),
        };
    }

    let parts: Vec<&str> = query.split(',').map(str::trim).collect();
    if parts.iter().any(|part| part.is_empty()) {
        return Err(geo_error(text, "location has an empty component".to_string()));
    }

    if let Some(last) = parts.last().filter(|_| parts.len() > 1) {
        let mut tokens = last.split_whitespace();
        let state = tokens.next().unwrap_or_default();
        let zip = tokens.next();

        if state.len() == 2 && state.chars().all(|c| c.is_ascii_alphabetic()) {
            let state = state.to_ascii_uppercase();
            if !STATE_CODES.contains(&state.as_str()) {
                return Err(geo_error(text, format!("unknown state code '{state}'")));
            }
            if let Some(zip) = zip {
                if parse_zip(zip).is_none() {
                    return Err(geo_error(text, format!("malformed ZIP code '{zip}'")));
                }
            }
            if parts.len() == 2 && zip.is_none() {
                let city = parts[0].to_string();
                return Ok((format!("{city}, {state}"), LocationKind::CityState { city, state }));
            }
        }
    }

    Ok((query, LocationKind::FreeForm))
}

fn parse_zip(raw: &str) -> Option<String> {
    let (zip, plus4) = match raw.split_once('-') {
        Some((zip, plus4)) => (zip, Some(plus4)),
        None => (raw, None),
    };
    let digits = |s: &str, n: usize| s.len() == n && s.chars().all(|c| c.is_ascii_digit());
    if !digits(zip, 5) || plus4.is_some_and(|p| !digits(p, 4)) {
        return None;
    }
    Some(zip.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedGeocoder {
        hit: Option<GeocodeMatch>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Geocoder for FixedGeocoder {
        async fn geocode(&self, _query: &str) -> Result<Option<GeocodeMatch>, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.hit.clone())
        }
    }

    fn resolver(hit: Option<GeocodeMatch>) -> (LocationResolver, Arc<FixedGeocoder>) {
        let geocoder = Arc::new(FixedGeocoder {
            hit,
            calls: AtomicUsize::new(0),
        });
        (LocationResolver::new(geocoder.clone()), geocoder)
    }

    #[test]
    fn accepts_structured_inputs() {
        assert_eq!(
            parse_location("85281").unwrap(),
            ("85281".to_string(), LocationKind::PostalCode("85281".to_string()))
        );
        assert_eq!(parse_location("85281-1234").unwrap().0, "85281");
        assert_eq!(
            parse_location("  dallas ,  tx ").unwrap(),
            (
                "dallas, TX".to_string(),
                LocationKind::CityState {
                    city: "dallas".to_string(),
                    state: "TX".to_string()
                }
            )
        );
        assert_eq!(
            parse_location("2530 Al Lipscomb Way, Dallas, TX 75215").unwrap().1,
            LocationKind::FreeForm
        );
        assert_eq!(parse_location("Brooklyn").unwrap().1, LocationKind::FreeForm);
    }

    #[test]
    fn rejects_invalid_inputs() {
        for input in ["", "   ", "1234", "123456", "85281-12", "Dallas, ZZ", "Dallas,", "Austin, TX 7870"] {
            let err = parse_location(input).unwrap_err();
            assert_eq!(err.code(), "GEO_RESOLUTION", "{input:?} should fail");
        }
    }

    #[tokio::test]
    async fn skips_geocoder_when_coordinates_not_needed() {
        let (resolver, geocoder) = resolver(None);
        let resolved = resolver.resolve("Dallas, TX", false).await.unwrap();
        assert!(resolved.centroid.is_none());
        assert_eq!(geocoder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn derives_bounds_from_centroid() {
        let centroid = GeoPoint { lat: 32.78, lon: -96.8 };
        let (resolver, _) = resolver(Some(GeocodeMatch { centroid, bounds: None }));
        let resolved = resolver.resolve("75201", true).await.unwrap();
        assert_eq!(resolved.centroid, Some(centroid));
        assert_eq!(resolved.bounds, Some(BoundingBox::around(centroid, 0.05)));
    }

    #[tokio::test]
    async fn fails_loudly_when_geocoder_finds_nothing() {
        let (resolver, _) = resolver(None);
        let err = resolver.resolve("00000", true).await.unwrap_err();
        assert!(matches!(err, HarvestError::GeoResolution { .. }));
    }
}
