use crate::config::FetchConfig;
use crate::error::{HarvestError, SourceError, SourceFailure};
use crate::http::HttpClient;
use crate::location::LocationResolver;
use crate::models::{ListingType, Property, ResultTable, SiteName};
use crate::normalize::{normalize, NormalizeContext, Normalized};
use crate::proxy::ProxyConfig;
use crate::scrapers::{AdapterRegistry, HttpRegistry, SearchQuery, SourceAdapter};
use chrono::Utc;
use futures::future::join_all;
use futures::StreamExt;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// How one source's unit of work ended
#[derive(Debug, Clone, PartialEq)]
pub enum SourceOutcome {
    /// Stream exhausted and at least one record came back
    Completed,
    /// Stream exhausted without a single record: a legitimate empty answer
    NoResults,
    /// The stream ended on an error; records before it are kept
    Failed(SourceError),
    /// The per-source budget ran out; records before it are kept
    TimedOut,
}

/// Per-source bookkeeping of one fetch
#[derive(Debug, Clone)]
pub struct SourceReport {
    pub site: SiteName,
    pub outcome: SourceOutcome,
    /// Rows this source contributed to the table
    pub records: usize,
    /// Same listing resurfaced by the source's own pagination
    pub duplicates: usize,
    /// Raw records without a usable identity
    pub malformed: usize,
    /// Fields degraded to null
    pub anomalies: usize,
    pub elapsed: Duration,
}

impl SourceReport {
    /// Failure to surface, if the source could not be asked properly
    pub fn failure(&self, budget: Duration) -> Option<SourceError> {
        match &self.outcome {
            SourceOutcome::Failed(e) => Some(e.clone()),
            SourceOutcome::TimedOut => Some(SourceError::Timeout {
                secs: budget.as_secs(),
            }),
            SourceOutcome::Completed | SourceOutcome::NoResults => None,
        }
    }
}

#[derive(Default)]
struct Segment {
    rows: Vec<Property>,
    seen: HashSet<String>,
    duplicates: usize,
    malformed: usize,
    anomalies: usize,
    raw_records: usize,
}

/// Append-only store shared by the source tasks. Rows are kept per source so
/// the frozen table can be laid out in completion order.
#[derive(Default)]
struct Accumulator {
    segments: HashMap<SiteName, Segment>,
    finished: Vec<(SiteName, SourceOutcome, Duration)>,
}

impl Accumulator {
    fn push(&mut self, site: SiteName, normalized: Normalized) {
        let segment = self.segments.entry(site).or_default();
        segment.raw_records += 1;
        segment.anomalies += normalized.anomalies.len();
        if !segment.seen.insert(normalized.property.property_url.clone()) {
            debug!("{} resurfaced {}", site, normalized.property.property_url);
            segment.duplicates += 1;
            return;
        }
        segment.rows.push(normalized.property);
    }

    fn reject(&mut self, site: SiteName) {
        let segment = self.segments.entry(site).or_default();
        segment.raw_records += 1;
        segment.malformed += 1;
    }

    fn raw_records(&self, site: SiteName) -> usize {
        self.segments.get(&site).map_or(0, |s| s.raw_records)
    }

    fn finish(&mut self, site: SiteName, outcome: SourceOutcome, elapsed: Duration) {
        self.finished.push((site, outcome, elapsed));
    }

    /// Rows in completion order, plus one report per finished source
    fn freeze(mut self) -> (Vec<Property>, Vec<SourceReport>) {
        let mut rows = Vec::new();
        let mut reports = Vec::new();
        for (site, outcome, elapsed) in self.finished {
            let segment = self.segments.remove(&site).unwrap_or_default();
            reports.push(SourceReport {
                site,
                outcome,
                records: segment.rows.len(),
                duplicates: segment.duplicates,
                malformed: segment.malformed,
                anomalies: segment.anomalies,
                elapsed,
            });
            rows.extend(segment.rows);
        }
        (rows, reports)
    }
}

fn lock(acc: &Mutex<Accumulator>) -> MutexGuard<'_, Accumulator> {
    acc.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Runs the selected sources for one location and merges their results
pub struct FetchOrchestrator {
    config: FetchConfig,
    registry: Arc<dyn AdapterRegistry>,
}

impl FetchOrchestrator {
    /// Orchestrator over the live HTTP scrapers
    pub fn new(config: FetchConfig) -> Self {
        let registry = Arc::new(HttpRegistry::new(config.clone()));
        Self { config, registry }
    }

    pub fn with_registry(config: FetchConfig, registry: Arc<dyn AdapterRegistry>) -> Self {
        Self { config, registry }
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Fetch `listing_type` listings around `location` from `sites` (all
    /// supported sources when empty), optionally through `proxy`.
    pub async fn run<S: AsRef<str>>(
        &self,
        location: &str,
        listing_type: &str,
        sites: &[S],
        proxy: Option<&str>,
    ) -> Result<ResultTable, HarvestError> {
        let sites = validate_sites(sites)?;
        let listing_type: ListingType = listing_type
            .parse()
            .map_err(|value| HarvestError::InvalidListingType { value })?;
        let proxy = proxy.map(ProxyConfig::parse).transpose()?;

        let http = HttpClient::new(&self.config, proxy.as_ref())?;
        let adapters: Vec<Arc<dyn SourceAdapter>> =
            sites.iter().map(|site| self.registry.adapter(*site, &http)).collect();

        let needs_coordinates = adapters.iter().any(|a| a.requires_coordinates());
        let resolver = LocationResolver::new(self.registry.geocoder(&http));
        let resolved = resolver.resolve(location, needs_coordinates).await?;

        info!(
            "Fetching {} listings for '{}' from {}",
            listing_type,
            resolved.query,
            sites.iter().map(SiteName::as_str).collect::<Vec<_>>().join(", ")
        );

        let query = Arc::new(SearchQuery {
            location: resolved,
            listing_type,
            page_size: self.config.page_size,
        });
        let ctx = NormalizeContext {
            listing_type,
            fetched_at: Utc::now(),
        };
        let budget = self.config.source_timeout();
        let acc = Arc::new(Mutex::new(Accumulator::default()));

        let tasks = adapters.into_iter().map(|adapter| {
            let site = adapter.site();
            let query = Arc::clone(&query);
            let acc = Arc::clone(&acc);
            let handle = tokio::spawn(run_source(adapter, query, ctx, Arc::clone(&acc), budget));
            async move {
                if let Err(e) = handle.await {
                    warn!("{} task aborted: {}", site, e);
                    let outcome = SourceOutcome::Failed(SourceError::Transport(format!("task aborted: {e}")));
                    lock(&acc).finish(site, outcome, Duration::ZERO);
                }
            }
        });
        join_all(tasks).await;

        // every task has joined; nothing else touches the accumulator
        let frozen = std::mem::take(&mut *lock(&acc));
        let (rows, reports) = frozen.freeze();

        if !rows.is_empty() {
            info!("Fetched {} listing(s) from {} source(s)", rows.len(), reports.len());
            return Ok(ResultTable::new(rows, reports));
        }

        let failures: Vec<SourceFailure> = reports
            .iter()
            .filter_map(|r| r.failure(budget).map(|error| SourceFailure { site: r.site, error }))
            .collect();

        if failures.len() == reports.len() {
            warn!("Every selected source failed for '{}'", location);
            Err(HarvestError::AllSourcesFailed { failures })
        } else {
            info!("No listings found for '{}'", location);
            Err(HarvestError::NoResultsFound {
                location: location.to_string(),
                failures,
            })
        }
    }
}

/// Parse and dedupe the requested sites; an empty request means all of them
fn validate_sites<S: AsRef<str>>(requested: &[S]) -> Result<Vec<SiteName>, HarvestError> {
    if requested.is_empty() {
        return Ok(SiteName::ALL.to_vec());
    }

    let mut sites = Vec::new();
    let mut invalid = Vec::new();
    for raw in requested {
        match raw.as_ref().parse::<SiteName>() {
            Ok(site) if !sites.contains(&site) => sites.push(site),
            Ok(_) => {}
            Err(name) => invalid.push(name),
        }
    }

    if invalid.is_empty() {
        Ok(sites)
    } else {
        Err(HarvestError::InvalidSite { sites: invalid })
    }
}

/// One source's unit of work: drain, normalize, append, then report
async fn run_source(
    adapter: Arc<dyn SourceAdapter>,
    query: Arc<SearchQuery>,
    ctx: NormalizeContext,
    acc: Arc<Mutex<Accumulator>>,
    budget: Duration,
) {
    let site = adapter.site();
    let started = Instant::now();

    let drained = timeout(budget, drain(adapter.as_ref(), query, &ctx, &acc)).await;
    let seen = lock(&acc).raw_records(site);

    let outcome = match drained {
        Ok(None) if seen == 0 => SourceOutcome::NoResults,
        Ok(None) => SourceOutcome::Completed,
        Ok(Some(err)) => {
            warn!("{} failed: {}", site, err);
            SourceOutcome::Failed(err)
        }
        Err(_) => {
            warn!("{} exceeded its {}s budget", site, budget.as_secs());
            SourceOutcome::TimedOut
        }
    };

    let elapsed = started.elapsed();
    info!("{} finished in {:.1}s: {:?}", site, elapsed.as_secs_f64(), outcome);
    lock(&acc).finish(site, outcome, elapsed);
}

/// Pull the stream dry; returns the error that ended it early, if any
async fn drain(
    adapter: &dyn SourceAdapter,
    query: Arc<SearchQuery>,
    ctx: &NormalizeContext,
    acc: &Mutex<Accumulator>,
) -> Option<SourceError> {
    let site = adapter.site();
    let mut stream = adapter.stream(query);

    while let Some(item) = stream.next().await {
        let raw = match item {
            Ok(raw) => raw,
            Err(err) => return Some(err),
        };
        match normalize(&raw, site, ctx) {
            Ok(normalized) => {
                for anomaly in &normalized.anomalies {
                    warn!("{}: dropped field '{}' ({})", site, anomaly.field, anomaly.raw);
                }
                lock(acc).push(site, normalized);
            }
            Err(err) => {
                warn!("{}: dropped record: {}", site, err);
                lock(acc).reject(site);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ListingType;

    fn normalized(url: &str) -> Normalized {
        Normalized {
            property: Property::new(url, SiteName::Redfin, ListingType::ForSale),
            anomalies: Vec::new(),
        }
    }

    #[test]
    fn validates_and_dedupes_sites() {
        assert_eq!(validate_sites::<&str>(&[]).unwrap(), SiteName::ALL.to_vec());
        assert_eq!(
            validate_sites(&["redfin", "Redfin", "realtor.com"]).unwrap(),
            vec![SiteName::Redfin, SiteName::Realtor]
        );
        match validate_sites(&["zillow", "trulia", "homes.com"]) {
            Err(HarvestError::InvalidSite { sites }) => assert_eq!(sites, vec!["trulia", "homes.com"]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn accumulator_dedupes_within_a_source_only() {
        let mut acc = Accumulator::default();
        acc.push(SiteName::Redfin, normalized("https://x/1"));
        acc.push(SiteName::Redfin, normalized("https://x/1"));
        acc.push(SiteName::Zillow, normalized("https://x/1"));
        acc.finish(SiteName::Zillow, SourceOutcome::Completed, Duration::ZERO);
        acc.finish(SiteName::Redfin, SourceOutcome::Completed, Duration::ZERO);

        let (rows, reports) = acc.freeze();
        assert_eq!(rows.len(), 2);
        assert_eq!(reports[0].site, SiteName::Zillow);
        assert_eq!(reports[1].duplicates, 1);
        assert_eq!(reports[1].records, 1);
    }

    #[test]
    fn timeouts_surface_as_timeout_failures() {
        let report = SourceReport {
            site: SiteName::Zillow,
            outcome: SourceOutcome::TimedOut,
            records: 3,
            duplicates: 0,
            malformed: 0,
            anomalies: 0,
            elapsed: Duration::from_secs(5),
        };
        assert_eq!(report.failure(Duration::from_secs(5)), Some(SourceError::Timeout { secs: 5 }));
    }
}
