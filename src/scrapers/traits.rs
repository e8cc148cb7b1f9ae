use crate::error::SourceError;
use crate::http::{classify_response, HttpResponse};
use crate::models::SiteName;
use crate::scrapers::types::{Page, RawRecord, SearchQuery};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use std::sync::Arc;
use tracing::debug;

/// Lazy, finite, non-restartable sequence of raw records. An `Err` item is
/// terminal: nothing follows it.
pub type RecordStream<'a> = BoxStream<'a, Result<RawRecord, SourceError>>;

/// Common trait for all listing sources.
/// The orchestrator only ever talks to sources through this.
pub trait SourceAdapter: Send + Sync {
    /// Which source this adapter speaks to
    fn site(&self) -> SiteName;

    /// Whether the resolved location must carry coordinates for this source
    fn requires_coordinates(&self) -> bool {
        false
    }

    /// Start retrieving. Each call re-issues requests from the first page.
    fn stream(&self, query: Arc<SearchQuery>) -> RecordStream<'_>;

    /// Decide whether an HTTP answer is usable data or a failure, and which kind
    fn classify_failure(&self, response: &HttpResponse) -> Option<SourceError> {
        classify_response(response)
    }
}

/// Page-at-a-time retrieval with a source-specific cursor
#[async_trait]
pub trait Paginator: Send + Sync {
    type Cursor: Send + 'static;

    fn first_cursor(&self, query: &SearchQuery) -> Self::Cursor;

    async fn fetch_page(&self, query: &SearchQuery, cursor: Self::Cursor) -> Result<Page<Self::Cursor>, SourceError>;
}

/// Drive a paginator until the source runs out of pages, a page fails, or
/// `max_pages` pages have been fetched.
pub fn paginate<'a, P: Paginator>(paginator: &'a P, query: Arc<SearchQuery>, max_pages: usize) -> RecordStream<'a> {
    let start = Some((paginator.first_cursor(&query), 0usize));

    stream::unfold(start, move |state| {
        let query = Arc::clone(&query);
        async move {
            let (cursor, fetched) = state?;
            if fetched >= max_pages {
                debug!("Page ceiling of {} reached", max_pages);
                return None;
            }

            match paginator.fetch_page(&query, cursor).await {
                Ok(page) => {
                    debug!("Page {} yielded {} records", fetched + 1, page.records.len());
                    let items: Vec<_> = page.records.into_iter().map(Ok).collect();
                    Some((items, page.next.map(|next| (next, fetched + 1))))
                }
                Err(e) => Some((vec![Err(e)], None)),
            }
        }
    })
    .flat_map(stream::iter)
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::{LocationKind, ResolvedLocation};
    use crate::models::ListingType;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        pages: usize,
        fail_at: Option<usize>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Paginator for Counting {
        type Cursor = usize;

        fn first_cursor(&self, _query: &SearchQuery) -> usize {
            0
        }

        async fn fetch_page(&self, _query: &SearchQuery, cursor: usize) -> Result<Page<usize>, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_at == Some(cursor) {
                return Err(SourceError::Http { status: 500 });
            }
            Ok(Page {
                records: vec![RawRecord::listing(json!({ "page": cursor }))],
                next: (cursor + 1 < self.pages).then_some(cursor + 1),
            })
        }
    }

    fn query() -> Arc<SearchQuery> {
        Arc::new(SearchQuery {
            location: ResolvedLocation {
                query: "85281".into(),
                kind: LocationKind::PostalCode("85281".into()),
                centroid: None,
                bounds: None,
            },
            listing_type: ListingType::ForSale,
            page_size: 10,
        })
    }

    #[tokio::test]
    async fn stops_when_source_is_exhausted() {
        let paginator = Counting {
            pages: 3,
            fail_at: None,
            calls: AtomicUsize::new(0),
        };
        let records: Vec<_> = paginate(&paginator, query(), 10).collect().await;
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(Result::is_ok));
        assert_eq!(paginator.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn honors_page_ceiling() {
        let paginator = Counting {
            pages: 100,
            fail_at: None,
            calls: AtomicUsize::new(0),
        };
        let records: Vec<_> = paginate(&paginator, query(), 4).collect().await;
        assert_eq!(records.len(), 4);
        assert_eq!(paginator.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn failure_terminates_the_stream() {
        let paginator = Counting {
            pages: 5,
            fail_at: Some(2),
            calls: AtomicUsize::new(0),
        };
        let records: Vec<_> = paginate(&paginator, query(), 10).collect().await;
        assert_eq!(records.len(), 3);
        assert_eq!(records[2], Err(SourceError::Http { status: 500 }));
        assert_eq!(paginator.calls.load(Ordering::SeqCst), 3);
    }
}
