use crate::location::ResolvedLocation;
use crate::models::ListingType;
use serde_json::Value;

/// Search parameters shared read-only by every source of one fetch
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub location: ResolvedLocation,
    pub listing_type: ListingType,
    /// Records per page, where the source lets us choose
    pub page_size: usize,
}

/// What a raw record describes, as told by the adapter that produced it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// One entry of a search results page
    Listing,
    /// A single-property detail lookup (the location was a street address)
    Detail,
    /// A multi-unit building or apartment complex
    Building,
}

/// Source-native listing data; only the source's normalizer looks inside
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub kind: RecordKind,
    pub payload: Value,
}

impl RawRecord {
    pub fn listing(payload: Value) -> Self {
        Self {
            kind: RecordKind::Listing,
            payload,
        }
    }

    pub fn detail(payload: Value) -> Self {
        Self {
            kind: RecordKind::Detail,
            payload,
        }
    }

    pub fn building(payload: Value) -> Self {
        Self {
            kind: RecordKind::Building,
            payload,
        }
    }
}

/// One fetched page and where to continue, if anywhere
#[derive(Debug)]
pub struct Page<C> {
    pub records: Vec<RawRecord>,
    pub next: Option<C>,
}

impl<C> Page<C> {
    pub fn last(records: Vec<RawRecord>) -> Self {
        Self { records, next: None }
    }

    pub fn empty() -> Self {
        Self::last(Vec::new())
    }
}
