use super::items::{ITEM_COLUMNS, MAX_ITEMS};
use super::schema::Database;
use super::types::{DatabaseError, Item, ItemDbRow};

/// Queries longer than this are rejected before touching the database
pub const MAX_SEARCH_QUERY_LENGTH: usize = 256;

/// Escape LIKE metacharacters so user input matches literally.
fn escape_like(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len());
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

impl Database {
    // ========================================================================
    // Search Operations
    // ========================================================================

    /// Case-insensitive substring search over title, description and author.
    ///
    /// Empty or whitespace-only queries return no results. Queries over
    /// [`MAX_SEARCH_QUERY_LENGTH`] are rejected.
    pub async fn search_items(
        &self,
        query: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Item>, DatabaseError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        if query.len() > MAX_SEARCH_QUERY_LENGTH {
            return Err(DatabaseError::InvalidQuery(format!(
                "search query exceeds maximum length of {} characters",
                MAX_SEARCH_QUERY_LENGTH
            )));
        }

        let pattern = format!("%{}%", escape_like(&query.to_lowercase()));
        let limit = limit.clamp(0, MAX_ITEMS);
        tracing::debug!(query = %query, limit = limit, "search_items");

        let sql = format!(
            "SELECT {} FROM feed_items fi JOIN feed_sources fs ON fi.source_id = fs.id \
             WHERE LOWER(fi.title) LIKE ?1 ESCAPE '\\' \
                OR LOWER(COALESCE(fi.description, '')) LIKE ?1 ESCAPE '\\' \
                OR LOWER(COALESCE(fi.author, '')) LIKE ?1 ESCAPE '\\' \
             ORDER BY fi.published_at DESC LIMIT ?2 OFFSET ?3",
            ITEM_COLUMNS
        );
        let rows = sqlx::query_as::<_, ItemDbRow>(&sql)
            .bind(&pattern)
            .bind(limit)
            .bind(offset.max(0))
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(ItemDbRow::into_item).collect())
    }
}
