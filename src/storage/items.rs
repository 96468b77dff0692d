use super::schema::Database;
use super::types::{DatabaseError, Item, ItemDbRow, NewItem, UpsertSummary};

// ============================================================================
// Query Limit Constants
// ============================================================================

/// Maximum number of items to return from any single query (OOM protection)
pub(crate) const MAX_ITEMS: i64 = 2000;

/// Page size used when callers don't specify one
pub const DEFAULT_PAGE_SIZE: i64 = 50;

/// Column list shared by every joined item select.
pub(crate) const ITEM_COLUMNS: &str = "fi.id, fi.source_id, fs.name AS source_name, fi.title, fi.url, \
     fi.description, fi.author, fi.published_at, fi.score, fi.comments_count, fi.created_at";

impl Database {
    // ========================================================================
    // Item Operations
    // ========================================================================

    /// Upsert a batch of items keyed by their stable ID, atomically.
    ///
    /// New rows are inserted with `score`/`comments_count` defaulting to 0.
    /// Existing rows get their descriptive fields (title, url, description,
    /// author, published_at) refreshed, while:
    ///
    /// - `score` and `comments_count` are only overwritten when the incoming
    ///   item carries a value (`Some`), so a generic feed never clobbers
    ///   locally accrued votes
    /// - `created_at` and `source_id` keep their first-seen values
    ///
    /// Either every item in the batch is written or none is.
    pub async fn upsert_items(&self, items: &[NewItem]) -> Result<UpsertSummary, DatabaseError> {
        let mut summary = UpsertSummary::default();
        if items.is_empty() {
            return Ok(summary);
        }

        // Deferred read-to-write upgrades fail without waiting on busy_timeout
        let mut tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;

        for item in items {
            let exists: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM feed_items WHERE id = ?")
                .bind(&item.id)
                .fetch_optional(&mut *tx)
                .await?;

            sqlx::query(
                r#"
                INSERT INTO feed_items
                    (id, source_id, title, url, description, author, published_at,
                     score, comments_count, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, COALESCE(?, 0), COALESCE(?, 0), ?)
                ON CONFLICT(id) DO UPDATE SET
                    title = excluded.title,
                    url = excluded.url,
                    description = excluded.description,
                    author = excluded.author,
                    published_at = excluded.published_at,
                    score = COALESCE(?, feed_items.score),
                    comments_count = COALESCE(?, feed_items.comments_count)
            "#,
            )
            .bind(&item.id)
            .bind(item.source_id)
            .bind(&item.title)
            .bind(&item.url)
            .bind(&item.description)
            .bind(&item.author)
            .bind(item.published_at.timestamp())
            .bind(item.score)
            .bind(item.comments_count)
            .bind(item.ingested_at.timestamp())
            .bind(item.score)
            .bind(item.comments_count)
            .execute(&mut *tx)
            .await?;

            if exists.is_some() {
                summary.updated += 1;
            } else {
                summary.inserted += 1;
            }
        }

        tx.commit().await?;
        Ok(summary)
    }

    /// Apply a local score change (a vote) to an item, returning the new score.
    ///
    /// This is the writer that ingestion must not clobber.
    pub async fn adjust_item_score(&self, item_id: &str, delta: i64) -> Result<i64, DatabaseError> {
        let row: Option<(i64,)> =
            sqlx::query_as("UPDATE feed_items SET score = score + ? WHERE id = ? RETURNING score")
                .bind(delta)
                .bind(item_id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(|(score,)| score)
            .ok_or_else(|| DatabaseError::NotFound(format!("item '{}'", item_id)))
    }

    // ========================================================================
    // Item Queries
    // ========================================================================

    /// Get a single item by its stable ID
    pub async fn get_item(&self, item_id: &str) -> Result<Option<Item>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM feed_items fi JOIN feed_sources fs ON fi.source_id = fs.id WHERE fi.id = ?",
            ITEM_COLUMNS
        );
        let row = sqlx::query_as::<_, ItemDbRow>(&sql)
            .bind(item_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(ItemDbRow::into_item))
    }

    /// Get items for one source, newest first
    /// PERF: hard cap at MAX_ITEMS
    pub async fn get_items_for_source(
        &self,
        source_id: i64,
        limit: Option<i64>,
    ) -> Result<Vec<Item>, DatabaseError> {
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(0, MAX_ITEMS);
        let sql = format!(
            "SELECT {} FROM feed_items fi JOIN feed_sources fs ON fi.source_id = fs.id \
             WHERE fi.source_id = ? ORDER BY fi.published_at DESC, fi.created_at DESC LIMIT ?",
            ITEM_COLUMNS
        );
        let rows = sqlx::query_as::<_, ItemDbRow>(&sql)
            .bind(source_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(ItemDbRow::into_item).collect())
    }

    /// Get the most recent items across all sources, paginated
    pub async fn get_recent_items(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Item>, DatabaseError> {
        let limit = limit.clamp(0, MAX_ITEMS);
        let offset = offset.max(0);
        tracing::debug!(limit = limit, offset = offset, "get_recent_items");

        let sql = format!(
            "SELECT {} FROM feed_items fi JOIN feed_sources fs ON fi.source_id = fs.id \
             ORDER BY fi.published_at DESC, fi.created_at DESC LIMIT ? OFFSET ?",
            ITEM_COLUMNS
        );
        let rows = sqlx::query_as::<_, ItemDbRow>(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(ItemDbRow::into_item).collect())
    }

    /// Count stored items, optionally restricted to one source
    pub async fn count_items(&self, source_id: Option<i64>) -> Result<i64, DatabaseError> {
        let (count,): (i64,) = match source_id {
            Some(id) => {
                sqlx::query_as("SELECT COUNT(*) FROM feed_items WHERE source_id = ?")
                    .bind(id)
                    .fetch_one(&self.pool)
                    .await?
            }
            None => {
                sqlx::query_as("SELECT COUNT(*) FROM feed_items")
                    .fetch_one(&self.pool)
                    .await?
            }
        };
        Ok(count)
    }
}
