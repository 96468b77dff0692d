use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;

use super::adapters::SourceAdapter;
use super::fetcher::{Fetch, FetchError};
use super::freshness::should_update_at;
use super::parser::ParseError;
use crate::storage::{DatabaseError, FeedStore};

/// Failure of one source's ingestion cycle.
///
/// None of these are fatal: the source's timestamp is left alone and the
/// next sweep retries it.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Store error: {0}")]
    Store(#[from] DatabaseError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Coarse classification used for logging and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Timeout, connection failure, non-2xx status
    TransientNetwork,
    MalformedFeed,
    /// Store unavailable; persistent occurrences need operator attention
    Persistence,
}

impl IngestError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            IngestError::Store(_) => ErrorKind::Persistence,
            IngestError::Fetch(_) => ErrorKind::TransientNetwork,
            IngestError::Parse(_) => ErrorKind::MalformedFeed,
        }
    }
}

/// What one ingestion cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Refresh interval hasn't elapsed; nothing was fetched
    NotDue,
    Updated { inserted: usize, updated: usize },
}

/// Runs the ingestion cycle for one adapter at a time:
/// resolve source, check freshness, fetch, parse, upsert, stamp.
///
/// Steps run strictly in order and stop at the first failure.
#[derive(Clone)]
pub struct Ingestor {
    store: Arc<dyn FeedStore>,
    fetcher: Arc<dyn Fetch>,
}

impl Ingestor {
    pub fn new(store: Arc<dyn FeedStore>, fetcher: Arc<dyn Fetch>) -> Self {
        Self { store, fetcher }
    }

    pub fn store(&self) -> &Arc<dyn FeedStore> {
        &self.store
    }

    pub async fn ingest(&self, adapter: &dyn SourceAdapter) -> Result<IngestOutcome, IngestError> {
        let name = adapter.source_name();

        // Create-if-absent never resets an existing source, so a restart
        // only refetches what is actually due
        let source = self
            .store
            .create_source(name, adapter.fetch_url())
            .await
            .inspect_err(|e| tracing::warn!(source = %name, error = %e, "Failed to resolve source"))?;

        if !should_update_at(&source, Utc::now()) {
            tracing::debug!(
                source = %name,
                last_updated = %source.last_updated,
                "Source not due, skipping"
            );
            return Ok(IngestOutcome::NotDue);
        }

        let raw = self
            .fetcher
            .fetch(adapter.fetch_url())
            .await
            .inspect_err(|e| {
                tracing::warn!(source = %name, url = %adapter.fetch_url(), error = %e, "Fetch failed")
            })?;

        let items = adapter
            .parse_feed(&raw, source.id)
            .inspect_err(|e| tracing::warn!(source = %name, error = %e, "Parse failed"))?;

        let summary = self
            .store
            .upsert_items(&items)
            .await
            .inspect_err(|e| tracing::warn!(source = %name, error = %e, "Failed to store items"))?;

        self.store
            .update_source_timestamp(source.id, Utc::now())
            .await
            .inspect_err(|e| {
                tracing::warn!(source = %name, error = %e, "Failed to update source timestamp")
            })?;

        tracing::info!(
            source = %name,
            items = items.len(),
            inserted = summary.inserted,
            updated = summary.updated,
            "Ingested source"
        );

        Ok(IngestOutcome::Updated {
            inserted: summary.inserted,
            updated: summary.updated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::adapters::{CommunityAdapter, GenericFeedAdapter};
    use crate::feed::item_id;
    use crate::storage::{never_updated, MemoryStore};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
    <item><title>A</title><link>https://example.com/a</link><description>57 points</description></item>
    <item><title>B</title><link>https://example.com/b</link></item>
</channel></rss>"#;

    /// Serves a fixed body (or error) and counts calls
    struct StubFetcher {
        body: Option<&'static str>,
        calls: AtomicUsize,
    }

    impl StubFetcher {
        fn ok(body: &'static str) -> Arc<Self> {
            Arc::new(Self {
                body: Some(body),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                body: None,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Fetch for StubFetcher {
        async fn fetch(&self, _url: &str) -> Result<Vec<u8>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.body {
                Some(body) => Ok(body.as_bytes().to_vec()),
                None => Err(FetchError::HttpStatus(503)),
            }
        }
    }

    fn generic() -> GenericFeedAdapter {
        GenericFeedAdapter::new("Example", "https://example.com/rss")
    }

    #[tokio::test]
    async fn test_first_ingest_inserts_and_stamps() {
        let store = Arc::new(MemoryStore::new());
        let ingestor = Ingestor::new(store.clone(), StubFetcher::ok(RSS));

        let outcome = ingestor.ingest(&generic()).await.unwrap();
        assert_eq!(
            outcome,
            IngestOutcome::Updated {
                inserted: 2,
                updated: 0
            }
        );

        let source = store.find_source_by_name("Example").await.unwrap().unwrap();
        assert!(source.last_updated > never_updated());
        assert_eq!(store.item_count().await, 2);
    }

    #[tokio::test]
    async fn test_not_due_source_is_not_fetched() {
        let store = Arc::new(MemoryStore::new());
        let fetcher = StubFetcher::ok(RSS);
        let ingestor = Ingestor::new(store.clone(), fetcher.clone());

        ingestor.ingest(&generic()).await.unwrap();
        let outcome = ingestor.ingest(&generic()).await.unwrap();

        assert_eq!(outcome, IngestOutcome::NotDue);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_leaves_timestamp() {
        let store = Arc::new(MemoryStore::new());
        let ingestor = Ingestor::new(store.clone(), StubFetcher::failing());

        let err = ingestor.ingest(&generic()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransientNetwork);

        let source = store.find_source_by_name("Example").await.unwrap().unwrap();
        assert_eq!(source.last_updated, never_updated());
        assert_eq!(store.item_count().await, 0);
    }

    #[tokio::test]
    async fn test_parse_failure_commits_nothing() {
        let store = Arc::new(MemoryStore::new());
        let ingestor = Ingestor::new(store.clone(), StubFetcher::ok("<html>nope</html>"));

        let err = ingestor.ingest(&generic()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedFeed);

        let source = store.find_source_by_name("Example").await.unwrap().unwrap();
        assert_eq!(source.last_updated, never_updated());
        assert_eq!(store.item_count().await, 0);
    }

    #[tokio::test]
    async fn test_reingest_is_idempotent_and_preserves_score() {
        let store = Arc::new(MemoryStore::new());
        let ingestor = Ingestor::new(store.clone(), StubFetcher::ok(RSS));
        let adapter = generic();

        ingestor.ingest(&adapter).await.unwrap();
        store
            .adjust_item_score(&item_id("https://example.com/a"), 42)
            .await
            .unwrap();

        store.reset_all_timestamps().await.unwrap();
        let outcome = ingestor.ingest(&adapter).await.unwrap();
        assert_eq!(
            outcome,
            IngestOutcome::Updated {
                inserted: 0,
                updated: 2
            }
        );
        assert_eq!(store.item_count().await, 2);

        let a = store.get_item(&item_id("https://example.com/a")).await.unwrap();
        assert_eq!(a.score, 42);
    }

    #[tokio::test]
    async fn test_community_adapter_overwrites_score() {
        let store = Arc::new(MemoryStore::new());
        let ingestor = Ingestor::new(store.clone(), StubFetcher::ok(RSS));
        let generic = GenericFeedAdapter::new("Lobster.rs", "https://lobste.rs/rss");

        ingestor.ingest(&generic).await.unwrap();
        store
            .adjust_item_score(&item_id("https://example.com/a"), 42)
            .await
            .unwrap();

        store.reset_all_timestamps().await.unwrap();
        ingestor.ingest(&CommunityAdapter::lobsters()).await.unwrap();

        let a = store.get_item(&item_id("https://example.com/a")).await.unwrap();
        assert_eq!(a.score, 57);
    }
}
