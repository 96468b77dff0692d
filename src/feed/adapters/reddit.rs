use super::community::{CommunityAdapter, SignalOptions};
use super::SourceAdapter;
use crate::feed::parser::ParseError;
use crate::storage::NewItem;

const FEED_URL_PREFIX: &str = "https://www.reddit.com/r/";
const FEED_URL_SUFFIX: &str = "/.rss";

/// One subreddit's RSS feed.
///
/// The subreddit name derives both the fetch URL and the display name.
/// Everything the community extraction offers is switched on: score and
/// comment count, inner links, local discussion rewrite and title cleaning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubredditAdapter {
    subreddit: String,
    inner: CommunityAdapter,
}

impl SubredditAdapter {
    pub fn new(subreddit: impl Into<String>) -> Self {
        let subreddit = subreddit.into();
        let inner = CommunityAdapter::new(
            format!("Reddit - r/{}", subreddit),
            format!("{}{}{}", FEED_URL_PREFIX, subreddit, FEED_URL_SUFFIX),
            SignalOptions {
                comments: true,
                inner_links: true,
                local_discussion: true,
                clean_titles: true,
            },
        );
        Self { subreddit, inner }
    }

    /// Recognize a stored subreddit feed URL, e.g. when restoring sources.
    pub fn from_feed_url(url: &str) -> Option<Self> {
        let name = url
            .strip_prefix(FEED_URL_PREFIX)?
            .strip_suffix(FEED_URL_SUFFIX)?;
        is_valid_subreddit(name).then(|| Self::new(name))
    }

    pub fn subreddit(&self) -> &str {
        &self.subreddit
    }
}

/// Subreddit names are 2 to 21 ASCII letters, digits or underscores.
pub(crate) fn is_valid_subreddit(name: &str) -> bool {
    (2..=21).contains(&name.len()) && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl SourceAdapter for SubredditAdapter {
    fn fetch_url(&self) -> &str {
        self.inner.fetch_url()
    }

    fn source_name(&self) -> &str {
        self.inner.source_name()
    }

    fn parse_feed(&self, raw: &[u8], source_id: i64) -> Result<Vec<NewItem>, ParseError> {
        self.inner.parse_feed(raw, source_id)
    }
}
