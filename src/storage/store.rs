use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::schema::Database;
use super::types::{DatabaseError, NewItem, Source, UpsertSummary};

/// The persistence operations the ingestion engine depends on.
///
/// The pipeline and scheduler only ever see `Arc<dyn FeedStore>`, so tests
/// can swap the SQLite [`Database`] for [`MemoryStore`](super::MemoryStore).
#[async_trait]
pub trait FeedStore: Send + Sync {
    async fn find_source_by_name(&self, name: &str) -> Result<Option<Source>, DatabaseError>;

    /// Create-if-absent. Must return an existing source unchanged.
    async fn create_source(&self, name: &str, url: &str) -> Result<Source, DatabaseError>;

    async fn update_source_timestamp(
        &self,
        source_id: i64,
        at: DateTime<Utc>,
    ) -> Result<(), DatabaseError>;

    /// Batch upsert, atomic per call. `None` score/comment values preserve
    /// whatever is stored.
    async fn upsert_items(&self, items: &[NewItem]) -> Result<UpsertSummary, DatabaseError>;

    async fn list_sources(&self) -> Result<Vec<Source>, DatabaseError>;

    /// Force every source to be due on the next sweep.
    async fn reset_all_timestamps(&self) -> Result<u64, DatabaseError>;
}

#[async_trait]
impl FeedStore for Database {
    async fn find_source_by_name(&self, name: &str) -> Result<Option<Source>, DatabaseError> {
        Database::find_source_by_name(self, name).await
    }

    async fn create_source(&self, name: &str, url: &str) -> Result<Source, DatabaseError> {
        Database::create_source(self, name, url).await
    }

    async fn update_source_timestamp(
        &self,
        source_id: i64,
        at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        Database::update_source_timestamp(self, source_id, at).await
    }

    async fn upsert_items(&self, items: &[NewItem]) -> Result<UpsertSummary, DatabaseError> {
        Database::upsert_items(self, items).await
    }

    async fn list_sources(&self) -> Result<Vec<Source>, DatabaseError> {
        Database::list_sources(self).await
    }

    async fn reset_all_timestamps(&self) -> Result<u64, DatabaseError> {
        Database::reset_all_timestamps(self).await
    }
}
