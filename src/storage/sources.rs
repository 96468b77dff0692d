use chrono::{DateTime, Utc};

use super::schema::Database;
use super::types::{
    DatabaseError, Source, SourceDbRow, MAX_REFRESH_INTERVAL_SECS, NEVER_UPDATED_TIMESTAMP,
};

impl Database {
    // ========================================================================
    // Source Operations
    // ========================================================================

    /// Look up a source by its unique display name
    pub async fn find_source_by_name(&self, name: &str) -> Result<Option<Source>, DatabaseError> {
        let row = sqlx::query_as::<_, SourceDbRow>(
            "SELECT id, name, url, last_updated, update_interval FROM feed_sources WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(SourceDbRow::into_source))
    }

    /// Get a source by ID
    pub async fn get_source(&self, source_id: i64) -> Result<Option<Source>, DatabaseError> {
        let row = sqlx::query_as::<_, SourceDbRow>(
            "SELECT id, name, url, last_updated, update_interval FROM feed_sources WHERE id = ?",
        )
        .bind(source_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(SourceDbRow::into_source))
    }

    /// Create a source if no source with this name exists, and return the stored row.
    ///
    /// New sources start at the "never updated" sentinel with the database's
    /// default interval. An existing source is returned unchanged: its URL,
    /// timestamp and interval are never reset here, so restarting the process
    /// does not force a refetch of every source.
    pub async fn create_source(&self, name: &str, url: &str) -> Result<Source, DatabaseError> {
        let result = sqlx::query(
            r#"
            INSERT INTO feed_sources (name, url, last_updated, update_interval)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(name) DO NOTHING
        "#,
        )
        .bind(name)
        .bind(url)
        .bind(NEVER_UPDATED_TIMESTAMP)
        .bind(self.default_interval_secs)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            tracing::info!(source = %name, url = %url, "Created feed source");
        }

        self.find_source_by_name(name)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("source '{}'", name)))
    }

    /// Record a successful ingestion of a source
    pub async fn update_source_timestamp(
        &self,
        source_id: i64,
        at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        let result = sqlx::query("UPDATE feed_sources SET last_updated = ? WHERE id = ?")
            .bind(at.timestamp())
            .bind(source_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("source id {}", source_id)));
        }
        Ok(())
    }

    /// Get all sources ordered by name
    pub async fn list_sources(&self) -> Result<Vec<Source>, DatabaseError> {
        let rows = sqlx::query_as::<_, SourceDbRow>(
            "SELECT id, name, url, last_updated, update_interval FROM feed_sources ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(SourceDbRow::into_source).collect())
    }

    /// Reset every source to the "never updated" sentinel.
    ///
    /// Administrative recovery: the next sweep treats every source as due.
    /// Returns the number of sources reset.
    pub async fn reset_all_timestamps(&self) -> Result<u64, DatabaseError> {
        let result = sqlx::query("UPDATE feed_sources SET last_updated = ?")
            .bind(NEVER_UPDATED_TIMESTAMP)
            .execute(&self.pool)
            .await?;

        tracing::info!(
            sources = result.rows_affected(),
            "Reset all feed timestamps to force updates"
        );
        Ok(result.rows_affected())
    }

    /// Change the refresh interval of one source, clamped to
    /// `0..=MAX_REFRESH_INTERVAL_SECS`
    pub async fn set_source_interval(
        &self,
        source_id: i64,
        interval_secs: i64,
    ) -> Result<(), DatabaseError> {
        sqlx::query("UPDATE feed_sources SET update_interval = ? WHERE id = ?")
            .bind(interval_secs.clamp(0, MAX_REFRESH_INTERVAL_SECS))
            .bind(source_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
