//! Feed ingestion: turning external syndication feeds into stored items.
//!
//! Leaf-first:
//!
//! - [`identity`] - stable item IDs derived from canonical URLs
//! - [`adapters`] - per-family fetch URL, name and parse logic
//! - [`fetcher`] - bounded HTTP retrieval of raw feed bytes
//! - [`registry`] - the set of adapters to sweep
//! - [`freshness`] - whether a source is due for a refresh
//! - [`pipeline`] - one source's resolve, fetch, parse, upsert cycle
//! - [`scheduler`] - recurring concurrent sweeps over the registry
//!
//! # Example
//!
//! ```ignore
//! let store: Arc<dyn FeedStore> = Arc::new(Database::open(path).await?);
//! let fetcher = Arc::new(HttpFetcher::new(FetchSettings::default())?);
//! let registry = Arc::new(SourceRegistry::with_defaults());
//!
//! let scheduler = Scheduler::new(registry, Ingestor::new(store, fetcher), interval);
//! scheduler.start()?;
//! // ...
//! scheduler.stop().await;
//! ```

pub mod adapters;
pub mod fetcher;
pub mod freshness;
pub mod identity;
mod parser;
pub mod pipeline;
pub mod registry;
pub mod scheduler;

pub use adapters::{CommunityAdapter, GenericFeedAdapter, SourceAdapter, SubredditAdapter};
pub use fetcher::{Fetch, FetchError, FetchSettings, HttpFetcher};
pub use freshness::{should_update, should_update_at};
pub use identity::{item_id, ITEM_ID_LEN};
pub use parser::{parse_entries, ParseError, ParsedEntry};
pub use pipeline::{ErrorKind, IngestError, IngestOutcome, Ingestor};
pub use registry::{RegistryError, SourceRegistry};
pub use scheduler::{Scheduler, SchedulerError, SourceOutcome, SourceReport, SweepReport};
