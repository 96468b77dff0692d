//! Input validation shared by the CLI and the source registry.

mod feed_url;

pub use feed_url::{validate_feed_url, FeedUrlError, MAX_FEED_URL_LENGTH};
