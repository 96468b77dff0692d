use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use std::str::FromStr;
use std::time::Duration;

use super::types::{DatabaseError, DEFAULT_REFRESH_INTERVAL_SECS, MAX_REFRESH_INTERVAL_SECS};

// ============================================================================
// Database
// ============================================================================

/// SQLite-backed store for sources and items.
///
/// Cheap to clone: clones share the same connection pool.
#[derive(Clone)]
pub struct Database {
    pub(crate) pool: SqlitePool,
    /// Interval (seconds) given to sources created through `create_source`
    pub(crate) default_interval_secs: i64,
}

impl Database {
    /// Open a database connection and run migrations
    ///
    /// `":memory:"` opens a private in-memory database, which is what the
    /// test suites use.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::InstanceLocked` if another process holds the
    /// database lock (SQLITE_BUSY, SQLITE_LOCKED, SQLITE_CANTOPEN).
    /// Returns `DatabaseError::Migration` if the schema could not be created.
    pub async fn open(path: &str) -> Result<Self, DatabaseError> {
        let url = format!("sqlite:{}?mode=rwc", path);

        // busy_timeout=5000: concurrent ingestion tasks write through the same
        // file, so writers wait for the lock instead of failing immediately.
        let options = SqliteConnectOptions::from_str(&url)
            .map_err(DatabaseError::from_sqlx)?
            .foreign_keys(true)
            .pragma("busy_timeout", "5000");
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(DatabaseError::from_sqlx)?;
        let db = Self {
            pool,
            default_interval_secs: DEFAULT_REFRESH_INTERVAL_SECS,
        };
        db.migrate().await.map_err(|e| match DatabaseError::from_sqlx(e) {
            DatabaseError::InstanceLocked => DatabaseError::InstanceLocked,
            other => DatabaseError::Migration(other.to_string()),
        })?;
        Ok(db)
    }

    /// Set the refresh interval assigned to newly created sources.
    ///
    /// Existing sources keep whatever interval they were created with.
    /// Values outside `0..=MAX_REFRESH_INTERVAL_SECS` are clamped.
    pub fn with_default_interval(mut self, secs: i64) -> Self {
        self.default_interval_secs = secs.clamp(0, MAX_REFRESH_INTERVAL_SECS);
        self
    }

    /// Run database migrations atomically within a transaction.
    ///
    /// All statements use `IF NOT EXISTS`, so re-running on an existing
    /// database is a no-op.
    async fn migrate(&self) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS feed_sources (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT UNIQUE NOT NULL,
                url TEXT NOT NULL,
                last_updated INTEGER NOT NULL,
                update_interval INTEGER NOT NULL DEFAULT 3600
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS feed_items (
                id TEXT PRIMARY KEY,
                source_id INTEGER NOT NULL REFERENCES feed_sources(id),
                title TEXT NOT NULL,
                url TEXT NOT NULL,
                description TEXT,
                author TEXT,
                published_at INTEGER NOT NULL,
                score INTEGER NOT NULL DEFAULT 0,
                comments_count INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        // Items by source, newest first
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_feed_items_source_published ON feed_items(source_id, published_at DESC)",
        )
        .execute(&mut *tx)
        .await?;

        // Front page: newest across all sources
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_feed_items_published ON feed_items(published_at DESC)",
        )
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(())
    }
}
