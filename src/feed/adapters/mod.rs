//! Source adapters: one implementation per family of feed origins.
//!
//! The pipeline and scheduler only see `dyn SourceAdapter`, so a new source
//! type plugs in by implementing the trait and registering an instance.

mod community;
mod extract;
mod generic;
mod reddit;

use chrono::{DateTime, Utc};

use super::identity::item_id;
use super::parser::{ParseError, ParsedEntry};
use crate::storage::NewItem;

pub use community::{CommunityAdapter, SignalOptions};
pub use extract::{
    clean_title, extract_comment_count, extract_inner_link, extract_score,
    is_direct_discussion_link,
};
pub use generic::GenericFeedAdapter;
pub use reddit::SubredditAdapter;
pub(crate) use reddit::is_valid_subreddit;

/// Knows where to fetch one source and how to turn its raw content into items.
pub trait SourceAdapter: Send + Sync {
    /// URL the fetcher retrieves
    fn fetch_url(&self) -> &str;

    /// Stable display name; unique across sources and the key a `Source`
    /// record is resolved by
    fn source_name(&self) -> &str;

    /// Parse raw feed bytes into normalized items owned by `source_id`.
    ///
    /// Malformed content fails the whole batch.
    fn parse_feed(&self, raw: &[u8], source_id: i64) -> Result<Vec<NewItem>, ParseError>;
}

impl std::fmt::Debug for dyn SourceAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceAdapter")
            .field("name", &self.source_name())
            .field("url", &self.fetch_url())
            .finish()
    }
}

/// Standard fields only. Items without a date get `now`; score and comment
/// count stay unset so stored values survive re-ingestion.
pub(crate) fn base_item(entry: ParsedEntry, source_id: i64, now: DateTime<Utc>) -> NewItem {
    NewItem {
        id: item_id(&entry.link),
        source_id,
        title: entry.title,
        url: entry.link,
        description: entry.description,
        author: entry.author,
        published_at: entry.published.unwrap_or(now),
        score: None,
        comments_count: None,
        ingested_at: now,
    }
}
