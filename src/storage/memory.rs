use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;

use super::store::FeedStore;
use super::types::{
    never_updated, DatabaseError, Item, NewItem, Source, UpsertSummary,
    DEFAULT_REFRESH_INTERVAL_SECS,
};

#[derive(Default)]
struct Inner {
    sources: Vec<Source>,
    items: HashMap<String, Item>,
    next_source_id: i64,
}

/// In-process [`FeedStore`] with the same upsert semantics as [`Database`].
///
/// Used by tests and by embedders that don't need durability.
///
/// [`Database`]: super::Database
pub struct MemoryStore {
    inner: Mutex<Inner>,
    default_interval: TimeDelta,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            default_interval: TimeDelta::seconds(DEFAULT_REFRESH_INTERVAL_SECS),
        }
    }

    pub fn with_default_interval(mut self, interval: TimeDelta) -> Self {
        self.default_interval = interval;
        self
    }

    pub async fn get_item(&self, item_id: &str) -> Option<Item> {
        self.inner.lock().await.items.get(item_id).cloned()
    }

    /// All items of one source, newest first
    pub async fn items_for_source(&self, source_id: i64) -> Vec<Item> {
        let inner = self.inner.lock().await;
        let mut items: Vec<Item> = inner
            .items
            .values()
            .filter(|i| i.source_id == source_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        items
    }

    pub async fn item_count(&self) -> usize {
        self.inner.lock().await.items.len()
    }

    /// Local score change, mirroring `Database::adjust_item_score`
    pub async fn adjust_item_score(&self, item_id: &str, delta: i64) -> Result<i64, DatabaseError> {
        let mut inner = self.inner.lock().await;
        let item = inner
            .items
            .get_mut(item_id)
            .ok_or_else(|| DatabaseError::NotFound(format!("item '{}'", item_id)))?;
        item.score += delta;
        Ok(item.score)
    }
}

#[async_trait]
impl FeedStore for MemoryStore {
    async fn find_source_by_name(&self, name: &str) -> Result<Option<Source>, DatabaseError> {
        let inner = self.inner.lock().await;
        Ok(inner.sources.iter().find(|s| s.name == name).cloned())
    }

    async fn create_source(&self, name: &str, url: &str) -> Result<Source, DatabaseError> {
        let mut inner = self.inner.lock().await;
        if let Some(existing) = inner.sources.iter().find(|s| s.name == name) {
            return Ok(existing.clone());
        }

        inner.next_source_id += 1;
        let source = Source {
            id: inner.next_source_id,
            name: name.to_string(),
            url: url.to_string(),
            last_updated: never_updated(),
            refresh_interval: self.default_interval,
        };
        inner.sources.push(source.clone());
        Ok(source)
    }

    async fn update_source_timestamp(
        &self,
        source_id: i64,
        at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        let mut inner = self.inner.lock().await;
        let source = inner
            .sources
            .iter_mut()
            .find(|s| s.id == source_id)
            .ok_or_else(|| DatabaseError::NotFound(format!("source id {}", source_id)))?;
        source.last_updated = at;
        Ok(())
    }

    async fn upsert_items(&self, items: &[NewItem]) -> Result<UpsertSummary, DatabaseError> {
        let mut inner = self.inner.lock().await;

        // Validate the whole batch first so a bad row leaves nothing behind
        if let Some(orphan) = items
            .iter()
            .find(|i| !inner.sources.iter().any(|s| s.id == i.source_id))
        {
            return Err(DatabaseError::NotFound(format!(
                "source id {}",
                orphan.source_id
            )));
        }

        let mut summary = UpsertSummary::default();
        for new in items {
            match inner.items.get_mut(&new.id) {
                Some(existing) => {
                    existing.title = new.title.clone();
                    existing.url = new.url.clone();
                    existing.description = new.description.clone();
                    existing.author = new.author.clone();
                    existing.published_at = new.published_at;
                    if let Some(score) = new.score {
                        existing.score = score;
                    }
                    if let Some(comments) = new.comments_count {
                        existing.comments_count = comments;
                    }
                    summary.updated += 1;
                }
                None => {
                    inner.items.insert(
                        new.id.clone(),
                        Item {
                            id: new.id.clone(),
                            source_id: new.source_id,
                            source_name: None,
                            title: new.title.clone(),
                            url: new.url.clone(),
                            description: new.description.clone(),
                            author: new.author.clone(),
                            published_at: new.published_at,
                            score: new.score.unwrap_or(0),
                            comments_count: new.comments_count.unwrap_or(0),
                            created_at: new.ingested_at,
                        },
                    );
                    summary.inserted += 1;
                }
            }
        }
        Ok(summary)
    }

    async fn list_sources(&self) -> Result<Vec<Source>, DatabaseError> {
        let inner = self.inner.lock().await;
        let mut sources = inner.sources.clone();
        sources.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(sources)
    }

    async fn reset_all_timestamps(&self) -> Result<u64, DatabaseError> {
        let mut inner = self.inner.lock().await;
        for source in inner.sources.iter_mut() {
            source.last_updated = never_updated();
        }
        Ok(inner.sources.len() as u64)
    }
}
