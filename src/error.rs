use crate::models::SiteName;
use std::fmt;
use thiserror::Error;

/// A per-source failure paired with the source it came from
#[derive(Debug, Clone)]
pub struct SourceFailure {
    pub site: SiteName,
    pub error: SourceError,
}

impl fmt::Display for SourceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.site, self.error)
    }
}

fn join_failures(failures: &[SourceFailure]) -> String {
    failures
        .iter()
        .map(|failure| failure.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Fetch-level errors
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Unsupported site(s): {}", .sites.join(", "))]
    InvalidSite { sites: Vec<String> },

    #[error("Provided listing type, '{value}', does not exist")]
    InvalidListingType { value: String },

    #[error("Could not resolve location '{location}': {reason}")]
    GeoResolution { location: String, reason: String },

    #[error("No results found for '{location}'")]
    NoResultsFound {
        location: String,
        failures: Vec<SourceFailure>,
    },

    #[error("Every selected source failed: {}", join_failures(.failures))]
    AllSourcesFailed { failures: Vec<SourceFailure> },

    #[error("Invalid proxy: {reason}")]
    InvalidProxy { reason: String },

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

impl HarvestError {
    /// Stable code for programmatic handling
    pub fn code(&self) -> &'static str {
        match self {
            HarvestError::InvalidSite { .. } => "INVALID_SITE",
            HarvestError::InvalidListingType { .. } => "INVALID_LISTING_TYPE",
            HarvestError::GeoResolution { .. } => "GEO_RESOLUTION",
            HarvestError::NoResultsFound { .. } => "NO_RESULTS_FOUND",
            HarvestError::AllSourcesFailed { .. } => "ALL_SOURCES_FAILED",
            HarvestError::InvalidProxy { .. } => "INVALID_PROXY",
            HarvestError::Client(_) => "CLIENT",
        }
    }
}

/// Failure of one source's retrieval
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SourceError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("blocked by anti-automation defenses (HTTP {status})")]
    Blocked { status: u16 },

    #[error("rate limited (HTTP {status})")]
    RateLimited { status: u16 },

    #[error("HTTP {status}")]
    Http { status: u16 },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("timed out after {secs}s")]
    Timeout { secs: u64 },
}

impl SourceError {
    /// Whether the source refused to serve us, as opposed to failing for
    /// ordinary network reasons
    pub fn is_blocking(&self) -> bool {
        matches!(self, SourceError::Blocked { .. } | SourceError::RateLimited { .. })
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SourceError::Transport(format!("request timed out: {err}"))
        } else if err.is_decode() {
            SourceError::InvalidResponse(err.to_string())
        } else {
            SourceError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::InvalidResponse(err.to_string())
    }
}

/// A raw record that cannot become a property at all
#[derive(Debug, Clone, Error, PartialEq)]
pub enum NormalizeError {
    #[error("record has no usable listing URL")]
    MissingUrl,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_distinct_per_kind() {
        let errors = [
            HarvestError::InvalidSite { sites: vec!["trulia".into()] },
            HarvestError::InvalidListingType { value: "lease".into() },
            HarvestError::GeoResolution {
                location: "x".into(),
                reason: "y".into(),
            },
            HarvestError::NoResultsFound {
                location: "x".into(),
                failures: vec![],
            },
            HarvestError::AllSourcesFailed { failures: vec![] },
            HarvestError::InvalidProxy { reason: "bad".into() },
        ];
        let mut codes: Vec<_> = errors.iter().map(HarvestError::code).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn aggregate_failure_lists_each_source() {
        let err = HarvestError::AllSourcesFailed {
            failures: vec![
                SourceFailure {
                    site: SiteName::Zillow,
                    error: SourceError::Blocked { status: 403 },
                },
                SourceFailure {
                    site: SiteName::Redfin,
                    error: SourceError::Timeout { secs: 5 },
                },
            ],
        };
        let message = err.to_string();
        assert!(message.contains("zillow: blocked"));
        assert!(message.contains("redfin: timed out after 5s"));
    }

    #[test]
    fn blocking_classification() {
        assert!(SourceError::Blocked { status: 403 }.is_blocking());
        assert!(SourceError::RateLimited { status: 429 }.is_blocking());
        assert!(!SourceError::Transport("reset".into()).is_blocking());
    }
}
