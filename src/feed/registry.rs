use std::sync::{Arc, RwLock};
use thiserror::Error;

use super::adapters::{CommunityAdapter, GenericFeedAdapter, SourceAdapter, SubredditAdapter};
use crate::storage::Source;
use crate::util::{validate_feed_url, FeedUrlError};

/// Subreddits registered by [`SourceRegistry::with_defaults`]
pub const DEFAULT_SUBREDDITS: &[&str] = &["programming", "technology"];

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("A source named '{0}' is already registered")]
    DuplicateName(String),
    #[error("Invalid feed URL: {0}")]
    InvalidUrl(#[from] FeedUrlError),
    #[error("Invalid subreddit name: '{0}'")]
    InvalidSubreddit(String),
    #[error("Source name must not be empty")]
    EmptyName,
}

/// The set of adapters the scheduler sweeps over.
///
/// Adapters can be added while the scheduler runs; each sweep works on a
/// [`snapshot`](Self::snapshot) taken when it starts.
#[derive(Default)]
pub struct SourceRegistry {
    adapters: RwLock<Vec<Arc<dyn SourceAdapter>>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in sources: the default subreddits,
    /// Hacker News and Lobsters.
    pub fn with_defaults() -> Self {
        let mut adapters: Vec<Arc<dyn SourceAdapter>> = DEFAULT_SUBREDDITS
            .iter()
            .map(|name| Arc::new(SubredditAdapter::new(*name)) as Arc<dyn SourceAdapter>)
            .collect();
        adapters.push(Arc::new(CommunityAdapter::hacker_news()));
        adapters.push(Arc::new(CommunityAdapter::lobsters()));

        Self {
            adapters: RwLock::new(adapters),
        }
    }

    /// Register an adapter. Names are unique: a second adapter with the same
    /// [`source_name`](SourceAdapter::source_name) is refused.
    pub fn register(&self, adapter: Arc<dyn SourceAdapter>) -> Result<(), RegistryError> {
        let mut adapters = self.adapters.write().unwrap_or_else(|e| e.into_inner());
        let name = adapter.source_name();
        if adapters.iter().any(|a| a.source_name() == name) {
            return Err(RegistryError::DuplicateName(name.to_string()));
        }
        tracing::debug!(source = %name, url = %adapter.fetch_url(), "Registered source adapter");
        adapters.push(adapter);
        Ok(())
    }

    /// Register a user-added syndication feed after validating its URL.
    pub fn add_generic(
        &self,
        name: &str,
        url: &str,
    ) -> Result<Arc<dyn SourceAdapter>, RegistryError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        let url = validate_feed_url(url)?;
        let adapter: Arc<dyn SourceAdapter> =
            Arc::new(GenericFeedAdapter::new(name, url.as_str()));
        self.register(Arc::clone(&adapter))?;
        Ok(adapter)
    }

    /// Register a subreddit adapter by subreddit name (without the `r/`).
    pub fn add_subreddit(&self, subreddit: &str) -> Result<Arc<dyn SourceAdapter>, RegistryError> {
        let subreddit = subreddit.trim().trim_start_matches("r/");
        if !super::adapters::is_valid_subreddit(subreddit) {
            return Err(RegistryError::InvalidSubreddit(subreddit.to_string()));
        }
        let adapter: Arc<dyn SourceAdapter> = Arc::new(SubredditAdapter::new(subreddit));
        self.register(Arc::clone(&adapter))?;
        Ok(adapter)
    }

    /// Rebuild adapters for stored sources that nothing registered yet.
    ///
    /// Subreddit feed URLs get a [`SubredditAdapter`]; everything else a
    /// [`GenericFeedAdapter`]. Returns how many adapters were added.
    pub fn restore_from(&self, sources: &[Source]) -> usize {
        let mut restored = 0;
        for source in sources {
            let adapter: Arc<dyn SourceAdapter> = match SubredditAdapter::from_feed_url(&source.url)
            {
                Some(sub) if sub.source_name() == source.name => Arc::new(sub),
                _ => Arc::new(GenericFeedAdapter::new(&source.name, &source.url)),
            };
            if self.register(adapter).is_ok() {
                restored += 1;
            }
        }
        if restored > 0 {
            tracing::info!(restored = restored, "Restored source adapters from store");
        }
        restored
    }

    /// The adapters registered right now
    pub fn snapshot(&self) -> Vec<Arc<dyn SourceAdapter>> {
        self.adapters
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn names(&self) -> Vec<String> {
        self.adapters
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|a| a.source_name().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.adapters.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::never_updated;
    use chrono::TimeDelta;
    use pretty_assertions::assert_eq;

    fn stored(name: &str, url: &str) -> Source {
        Source {
            id: 1,
            name: name.to_string(),
            url: url.to_string(),
            last_updated: never_updated(),
            refresh_interval: TimeDelta::hours(1),
        }
    }

    #[test]
    fn test_defaults() {
        let registry = SourceRegistry::with_defaults();
        assert_eq!(
            registry.names(),
            vec![
                "Reddit - r/programming",
                "Reddit - r/technology",
                "Hacker News",
                "Lobster.rs",
            ]
        );
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let registry = SourceRegistry::with_defaults();
        let result = registry.register(Arc::new(GenericFeedAdapter::new(
            "Hacker News",
            "https://example.com/rss",
        )));
        assert!(matches!(result, Err(RegistryError::DuplicateName(_))));
        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn test_add_generic_validates_url() {
        let registry = SourceRegistry::new();
        assert!(matches!(
            registry.add_generic("Local", "http://127.0.0.1/rss"),
            Err(RegistryError::InvalidUrl(_))
        ));
        assert!(matches!(
            registry.add_generic("  ", "https://example.com/rss"),
            Err(RegistryError::EmptyName)
        ));

        let adapter = registry
            .add_generic("Example", "https://example.com/rss")
            .unwrap();
        assert_eq!(adapter.fetch_url(), "https://example.com/rss");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_add_subreddit() {
        let registry = SourceRegistry::new();
        let adapter = registry.add_subreddit("r/rust").unwrap();
        assert_eq!(adapter.source_name(), "Reddit - r/rust");

        assert!(matches!(
            registry.add_subreddit("rust"),
            Err(RegistryError::DuplicateName(_))
        ));
        assert!(matches!(
            registry.add_subreddit("no/slashes"),
            Err(RegistryError::InvalidSubreddit(_))
        ));
    }

    #[test]
    fn test_restore_from_skips_registered_and_picks_adapter() {
        let registry = SourceRegistry::with_defaults();
        let restored = registry.restore_from(&[
            stored("Hacker News", "https://hnrss.org/frontpage"),
            stored("Reddit - r/rust", "https://www.reddit.com/r/rust/.rss"),
            stored("Blog", "https://blog.example.com/feed.xml"),
        ]);

        assert_eq!(restored, 2);
        let snapshot = registry.snapshot();
        let rust = snapshot
            .iter()
            .find(|a| a.source_name() == "Reddit - r/rust")
            .unwrap();
        assert_eq!(rust.fetch_url(), "https://www.reddit.com/r/rust/.rss");
        assert!(snapshot.iter().any(|a| a.source_name() == "Blog"));
    }

    #[test]
    fn test_snapshot_is_detached() {
        let registry = SourceRegistry::new();
        let before = registry.snapshot();
        registry.add_subreddit("rust").unwrap();
        assert!(before.is_empty());
        assert_eq!(registry.snapshot().len(), 1);
    }
}
