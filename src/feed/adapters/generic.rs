use chrono::Utc;

use super::{base_item, SourceAdapter};
use crate::feed::parser::{parse_entries, ParseError};
use crate::storage::NewItem;

/// Any standard RSS/Atom feed, parsed without source-specific extraction.
///
/// Used for user-added feeds and for restored sources whose URL doesn't
/// match a more specific adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericFeedAdapter {
    name: String,
    url: String,
}

impl GenericFeedAdapter {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

impl SourceAdapter for GenericFeedAdapter {
    fn fetch_url(&self) -> &str {
        &self.url
    }

    fn source_name(&self) -> &str {
        &self.name
    }

    fn parse_feed(&self, raw: &[u8], source_id: i64) -> Result<Vec<NewItem>, ParseError> {
        let now = Utc::now();
        Ok(parse_entries(raw)?
            .into_iter()
            .map(|entry| base_item(entry, source_id, now))
            .collect())
    }
}
