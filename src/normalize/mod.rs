mod realtor;
mod redfin;
mod zillow;

use crate::error::NormalizeError;
use crate::models::{ListingType, Property, SiteName};
use crate::scrapers::types::RawRecord;
use chrono::{DateTime, Utc};
use scraper::Html;
use serde_json::Value;
use tracing::debug;

/// Inputs shared by every record of one fetch
#[derive(Debug, Clone, Copy)]
pub struct NormalizeContext {
    pub listing_type: ListingType,
    /// Reference instant for relative timestamps such as time-on-market
    pub fetched_at: DateTime<Utc>,
}

/// A field that was present in the raw record but could not be coerced
#[derive(Debug, Clone, PartialEq)]
pub struct FieldAnomaly {
    pub field: &'static str,
    pub raw: String,
}

/// A normalized property and the anomalies met on the way
#[derive(Debug, Clone)]
pub struct Normalized {
    pub property: Property,
    pub anomalies: Vec<FieldAnomaly>,
}

/// Map one raw record from `site` onto the canonical schema
pub fn normalize(raw: &RawRecord, site: SiteName, ctx: &NormalizeContext) -> Result<Normalized, NormalizeError> {
    let mut reader = FieldReader::new(&raw.payload);
    let mut property = match site {
        SiteName::Zillow => zillow::normalize(raw.kind, &mut reader, ctx)?,
        SiteName::Redfin => redfin::normalize(raw.kind, &mut reader, ctx)?,
        SiteName::Realtor => realtor::normalize(raw.kind, &mut reader, ctx)?,
    };

    if property.price.is_some() && property.currency.is_none() {
        property.currency = Some("USD".to_string());
    }
    if property.price_per_sqft.is_none() {
        property.price_per_sqft = match (property.price, property.sqft) {
            (Some(price), Some(sqft)) if sqft > 0.0 => Some((price / sqft * 100.0).round() / 100.0),
            _ => None,
        };
    }

    Ok(Normalized {
        property,
        anomalies: reader.anomalies,
    })
}

/// Typed, failure-tolerant access into a raw JSON record
pub(crate) struct FieldReader<'a> {
    root: &'a Value,
    anomalies: Vec<FieldAnomaly>,
}

impl<'a> FieldReader<'a> {
    fn new(root: &'a Value) -> Self {
        Self {
            root,
            anomalies: Vec::new(),
        }
    }

    /// Value at a dotted path (`a.b.0.c`); missing and `null` are both `None`
    pub(crate) fn get(&self, path: &str) -> Option<&'a Value> {
        let mut current = self.root;
        for segment in path.split('.') {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        (!current.is_null()).then_some(current)
    }

    /// First path that holds a value
    pub(crate) fn first(&self, paths: &[&str]) -> Option<&'a Value> {
        paths.iter().find_map(|path| self.get(path))
    }

    /// Non-empty text; numbers are rendered, anything else is an anomaly
    pub(crate) fn text(&mut self, field: &'static str, paths: &[&str]) -> Option<String> {
        let value = self.first(paths)?;
        let text = match value {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            other => {
                self.report(field, other);
                return None;
            }
        };
        (!text.is_empty()).then_some(text)
    }

    pub(crate) fn number(&mut self, field: &'static str, paths: &[&str]) -> Option<f64> {
        let value = self.first(paths)?;
        let parsed = coerce_number(value);
        if parsed.is_none() && !is_blank(value) {
            self.report(field, value);
        }
        parsed
    }

    pub(crate) fn count(&mut self, field: &'static str, paths: &[&str]) -> Option<u32> {
        let number = self.number(field, paths)?;
        if number < 0.0 || number.fract() != 0.0 || number > f64::from(u32::MAX) {
            self.anomalies.push(FieldAnomaly {
                field,
                raw: number.to_string(),
            });
            return None;
        }
        Some(number as u32)
    }

    pub(crate) fn year(&mut self, field: &'static str, paths: &[&str]) -> Option<i32> {
        let number = self.number(field, paths)?;
        if !(1600.0..=2200.0).contains(&number) || number.fract() != 0.0 {
            self.anomalies.push(FieldAnomaly {
                field,
                raw: number.to_string(),
            });
            return None;
        }
        Some(number as i32)
    }

    /// Plain text with any HTML markup stripped
    pub(crate) fn prose(&mut self, field: &'static str, paths: &[&str]) -> Option<String> {
        self.text(field, paths).map(|t| strip_markup(&t)).filter(|t| !t.is_empty())
    }

    fn report(&mut self, field: &'static str, value: &Value) {
        debug!("Field '{}' could not be coerced from {}", field, value);
        self.anomalies.push(FieldAnomaly {
            field,
            raw: value.to_string(),
        });
    }
}

fn is_blank(value: &Value) -> bool {
    matches!(value, Value::String(s) if s.trim().is_empty() || s.trim() == "--" || s.trim() == "—")
}

/// Numeric value of a JSON number or a formatted numeric string such as
/// `"$1,250,000"`, `"1,234 sqft"` or `"$2,400+/mo"`
pub fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_formatted_number(s),
        Value::Object(map) => map.get("value").and_then(coerce_number),
        _ => None,
    }
}

pub fn parse_formatted_number(raw: &str) -> Option<f64> {
    let lowered = raw.trim().to_ascii_lowercase();
    let mut cleaned = lowered.as_str();
    for suffix in ["/mo", "+", "sq. ft.", "sq ft", "sqft", "ft²", "usd"] {
        cleaned = cleaned.trim_end().trim_end_matches(suffix);
    }
    let cleaned = cleaned.trim();

    let (body, multiplier) = match cleaned.strip_suffix('k') {
        Some(body) => (body, 1_000.0),
        None => match cleaned.strip_suffix('m') {
            Some(body) => (body, 1_000_000.0),
            None => (cleaned, 1.0),
        },
    };

    let digits: String = body
        .trim_start_matches(['$', '€', '£'])
        .chars()
        .filter(|c| !matches!(c, ',' | ' ' | '_'))
        .collect();
    if digits.is_empty() {
        return None;
    }
    digits
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .map(|n| n * multiplier)
}

/// Collapse an HTML fragment to whitespace-normalized text
pub fn strip_markup(raw: &str) -> String {
    if !raw.contains('<') && !raw.contains('&') {
        return raw.split_whitespace().collect::<Vec<_>>().join(" ");
    }
    let fragment = Html::parse_fragment(raw);
    let text: String = fragment.root_element().text().collect::<Vec<_>>().join(" ");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Absolute URL for a possibly site-relative link
pub(crate) fn absolute_url(base: &str, link: &str) -> String {
    if link.starts_with("http://") || link.starts_with("https://") {
        link.to_string()
    } else if link.starts_with('/') {
        format!("{base}{link}")
    } else {
        format!("{base}/{link}")
    }
}

/// Min and max over the values present
pub(crate) fn min_max(values: impl IntoIterator<Item = f64>) -> (Option<f64>, Option<f64>) {
    values.into_iter().fold((None, None), |(min, max), v| {
        (
            Some(min.map_or(v, |m: f64| m.min(v))),
            Some(max.map_or(v, |m: f64| m.max(v))),
        )
    })
}
