use chrono::Utc;

use super::extract::{
    clean_title, extract_comment_count, extract_inner_link, extract_score,
    is_direct_discussion_link,
};
use super::{base_item, SourceAdapter};
use crate::feed::parser::{parse_entries, ParseError, ParsedEntry};
use crate::storage::NewItem;

/// Which aggregator signals an adapter pulls out of item descriptions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SignalOptions {
    /// Extract "N comments" as an authoritative comment count
    pub comments: bool,
    /// Replace the displayed URL with the best link embedded in the description
    pub inner_links: bool,
    /// Point entries that only link to their own discussion page at the
    /// local post view instead
    pub local_discussion: bool,
    /// Strip leading `[tag] ` prefixes from titles
    pub clean_titles: bool,
}

/// A community link aggregator whose RSS descriptions carry a score
/// (and optionally a comment count) as free text.
///
/// The extracted score is always authoritative: it overwrites whatever is
/// stored, defaulting to 0 when the description carries none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommunityAdapter {
    name: String,
    url: String,
    options: SignalOptions,
}

impl CommunityAdapter {
    pub fn new(name: impl Into<String>, url: impl Into<String>, options: SignalOptions) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            options,
        }
    }

    /// Hacker News front page via hnrss: score and comment count.
    pub fn hacker_news() -> Self {
        Self::new(
            "Hacker News",
            "https://hnrss.org/frontpage",
            SignalOptions {
                comments: true,
                ..SignalOptions::default()
            },
        )
    }

    /// Lobsters: score only.
    pub fn lobsters() -> Self {
        Self::new("Lobster.rs", "https://lobste.rs/rss", SignalOptions::default())
    }

    pub fn options(&self) -> SignalOptions {
        self.options
    }

    pub(crate) fn build_item(
        &self,
        entry: ParsedEntry,
        source_id: i64,
        now: chrono::DateTime<Utc>,
    ) -> NewItem {
        let opts = self.options;
        let mut item = base_item(entry, source_id, now);

        item.score = Some(extract_score(&item.description));
        if opts.comments {
            item.comments_count = Some(extract_comment_count(&item.description));
        }
        if opts.clean_titles {
            item.title = clean_title(&item.title);
        }

        // `id` stays derived from the entry link; only the displayed URL moves
        let inner = if opts.inner_links {
            extract_inner_link(&item.description)
        } else {
            None
        };
        match inner {
            Some(link) => item.url = link,
            None if opts.local_discussion && is_direct_discussion_link(&item.url) => {
                item.url = format!("/post/{}", item.id);
            }
            None => {}
        }

        item
    }
}

impl SourceAdapter for CommunityAdapter {
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
            .map(|entry| self.build_item(entry, source_id, now))
            .collect())
    }
}
