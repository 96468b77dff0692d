use chrono::{DateTime, Utc};
use feed_rs::parser;
use thiserror::Error;

/// Feed content could not be parsed as RSS or Atom.
///
/// Terminal for the ingestion cycle: no partial entry list is ever returned.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Malformed feed: {0}")]
    Malformed(String),
}

/// The standard fields of one syndication entry, before any source-specific
/// extraction is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedEntry {
    /// Canonical link; the item identity is derived from this
    pub link: String,
    pub title: String,
    /// Raw description (RSS `description` / Atom `summary`, falling back to content)
    pub description: String,
    pub author: String,
    /// `None` when the entry carries neither a published nor an updated date
    pub published: Option<DateTime<Utc>>,
}

/// Parse raw feed bytes into entries.
///
/// Entries without a usable link are dropped with a warning, since they have
/// no identity to upsert under.
pub fn parse_entries(bytes: &[u8]) -> Result<Vec<ParsedEntry>, ParseError> {
    let feed = parser::parse(bytes).map_err(|e| ParseError::Malformed(e.to_string()))?;

    let mut skipped = 0usize;
    let entries: Vec<ParsedEntry> = feed
        .entries
        .into_iter()
        .filter_map(|entry| {
            let link = entry
                .links
                .first()
                .map(|l| l.href.trim().to_string())
                .filter(|href| !href.is_empty())
                // Atom ids and RSS permalink guids are often the URL itself;
                // generated ids are not, so only accept ones that look like one
                .or_else(|| {
                    let id = entry.id.trim();
                    (id.starts_with("http://") || id.starts_with("https://"))
                        .then(|| id.to_string())
                });

            let Some(link) = link else {
                skipped += 1;
                return None;
            };

            let description = entry
                .summary
                .map(|s| s.content)
                .or_else(|| entry.content.and_then(|c| c.body))
                .unwrap_or_default();

            Some(ParsedEntry {
                link,
                title: entry.title.map(|t| t.content).unwrap_or_default(),
                description,
                author: entry
                    .authors
                    .into_iter()
                    .next()
                    .map(|p| p.name)
                    .unwrap_or_default(),
                published: entry.published.or(entry.updated),
            })
        })
        .collect();

    if skipped > 0 {
        tracing::warn!(skipped = skipped, "Feed entries without a link skipped");
    }

    Ok(entries)
}
