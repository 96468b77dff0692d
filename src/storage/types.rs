use chrono::{DateTime, TimeDelta, Utc};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors with user-friendly messages
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another process holds the database lock
    #[error("Database is locked by another process. Please close it and try again.")]
    InstanceLocked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Caller-supplied query was rejected before execution
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// A row the caller referenced does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Check if a sqlx error indicates database locking
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        let error_string = err.to_string().to_lowercase();

        // SQLITE_BUSY (5), SQLITE_LOCKED (6), SQLITE_CANTOPEN (14)
        if error_string.contains("database is locked")
            || error_string.contains("database table is locked")
            || error_string.contains("sqlite_busy")
            || error_string.contains("sqlite_locked")
            || error_string.contains("unable to open database file")
        {
            return DatabaseError::InstanceLocked;
        }

        DatabaseError::Other(err)
    }
}

// ============================================================================
// Constants
// ============================================================================

/// Refresh interval given to sources created without an explicit one (1 hour).
pub const DEFAULT_REFRESH_INTERVAL_SECS: i64 = 3600;

/// Longest refresh interval a source may be given (one year)
pub const MAX_REFRESH_INTERVAL_SECS: i64 = 365 * 24 * 60 * 60;

/// Unix timestamp of the "never updated" sentinel (2000-01-01T00:00:00Z).
pub const NEVER_UPDATED_TIMESTAMP: i64 = 946_684_800;

/// The "never updated" sentinel. Far enough in the past that any realistic
/// refresh interval has elapsed.
pub fn never_updated() -> DateTime<Utc> {
    DateTime::from_timestamp(NEVER_UPDATED_TIMESTAMP, 0).unwrap_or_default()
}

pub(crate) fn from_unix(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_else(never_updated)
}

// ============================================================================
// Data Structures
// ============================================================================

/// One external feed origin.
///
/// `name` is unique across all sources and is the key adapters resolve by.
/// `last_updated` only moves forward through a completed ingestion cycle
/// (or back to the sentinel through [`FeedStore::reset_all_timestamps`]).
///
/// [`FeedStore::reset_all_timestamps`]: super::FeedStore::reset_all_timestamps
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub last_updated: DateTime<Utc>,
    pub refresh_interval: TimeDelta,
}

/// A normalized item as produced by a source adapter, ready to upsert.
///
/// `score` and `comments_count` are `None` when the adapter has no
/// authoritative value; the store then keeps whatever it already holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewItem {
    pub id: String,
    pub source_id: i64,
    pub title: String,
    pub url: String,
    pub description: String,
    pub author: String,
    pub published_at: DateTime<Utc>,
    pub score: Option<i64>,
    pub comments_count: Option<i64>,
    pub ingested_at: DateTime<Utc>,
}

/// A stored item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub id: String,
    pub source_id: i64,
    /// Populated by read paths that join against `feed_sources`.
    pub source_name: Option<String>,
    pub title: String,
    pub url: String,
    pub description: String,
    pub author: String,
    pub published_at: DateTime<Utc>,
    pub score: i64,
    pub comments_count: i64,
    pub created_at: DateTime<Utc>,
}

/// Counts reported by a batch upsert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertSummary {
    pub inserted: usize,
    pub updated: usize,
}

impl UpsertSummary {
    pub fn total(&self) -> usize {
        self.inserted + self.updated
    }
}

// ============================================================================
// Row Types
// ============================================================================

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct SourceDbRow {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub last_updated: i64,
    pub update_interval: i64,
}

impl SourceDbRow {
    pub(crate) fn into_source(self) -> Source {
        Source {
            id: self.id,
            name: self.name,
            url: self.url,
            last_updated: from_unix(self.last_updated),
            refresh_interval: TimeDelta::try_seconds(self.update_interval)
                .unwrap_or(TimeDelta::MAX),
        }
    }
}

/// Row type for item queries; `source_name` is NULL-able so the same row
/// type serves both joined and unjoined selects.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ItemDbRow {
    pub id: String,
    pub source_id: i64,
    pub source_name: Option<String>,
    pub title: String,
    pub url: String,
    pub description: Option<String>,
    pub author: Option<String>,
    pub published_at: i64,
    pub score: i64,
    pub comments_count: i64,
    pub created_at: i64,
}

impl ItemDbRow {
    pub(crate) fn into_item(self) -> Item {
        Item {
            id: self.id,
            source_id: self.source_id,
            source_name: self.source_name,
            title: self.title,
            url: self.url,
            description: self.description.unwrap_or_default(),
            author: self.author.unwrap_or_default(),
            published_at: from_unix(self.published_at),
            score: self.score,
            comments_count: self.comments_count,
            created_at: from_unix(self.created_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_is_2000_01_01() {
        assert_eq!(never_updated().to_rfc3339(), "2000-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_source_row_conversion() {
        let row = SourceDbRow {
            id: 7,
            name: "Hacker News".to_string(),
            url: "https://hnrss.org/frontpage".to_string(),
            last_updated: NEVER_UPDATED_TIMESTAMP,
            update_interval: 900,
        };
        let source = row.into_source();
        assert_eq!(source.id, 7);
        assert_eq!(source.last_updated, never_updated());
        assert_eq!(source.refresh_interval, TimeDelta::minutes(15));
    }

    #[test]
    fn test_source_row_out_of_range_interval_saturates() {
        let row = SourceDbRow {
            id: 1,
            name: "Broken".to_string(),
            url: "https://example.com/rss".to_string(),
            last_updated: NEVER_UPDATED_TIMESTAMP,
            update_interval: 10_000_000_000_000_000,
        };
        assert_eq!(row.into_source().refresh_interval, TimeDelta::MAX);
    }

    #[test]
    fn test_item_row_null_text_becomes_empty() {
        let row = ItemDbRow {
            id: "abc".to_string(),
            source_id: 1,
            source_name: None,
            title: "t".to_string(),
            url: "u".to_string(),
            description: None,
            author: None,
            published_at: 0,
            score: 3,
            comments_count: 1,
            created_at: 0,
        };
        let item = row.into_item();
        assert_eq!(item.description, "");
        assert_eq!(item.author, "");
        assert_eq!(item.score, 3);
    }
}
