//! Signal extraction from the free-text/HTML fragments link aggregators put
//! in item descriptions.

use regex::Regex;
use scraper::{Html, Selector};
use std::sync::LazyLock;

static SCORE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+)\s*points?").expect("valid score regex"));

static COMMENTS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+)\s*comments?").expect("valid comments regex"));

static TAG_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[.*?\]\s*").expect("valid tag prefix regex"));

static ANCHOR_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("valid anchor selector"));

/// Preferred inner-link hosts, highest priority first. Each tier is tried
/// across all anchors before the next one.
const INNER_LINK_TIERS: &[&[&str]] = &[
    &["i.reddit.com", "i.redd.it"],
    &["imgur.com"],
    &["v.redd.it", "youtube.com", "youtu.be", "gfycat.com"],
];

fn first_number(re: &Regex, text: &str) -> i64 {
    re.captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}

/// First integer followed by "point"/"points", or 0.
pub fn extract_score(description: &str) -> i64 {
    first_number(&SCORE_RE, description)
}

/// First integer followed by "comment"/"comments", or 0.
pub fn extract_comment_count(description: &str) -> i64 {
    first_number(&COMMENTS_RE, description)
}

/// Strip a leading bracketed tag such as `"[discussion] "`.
pub fn clean_title(title: &str) -> String {
    TAG_PREFIX_RE.replace(title, "").into_owned()
}

/// Pick the best link embedded in an HTML description.
///
/// Image and video hosts win over everything else; otherwise the first
/// anchor is used. Returns `None` when the description has no anchors.
pub fn extract_inner_link(description: &str) -> Option<String> {
    let fragment = Html::parse_fragment(description);
    let links: Vec<&str> = fragment
        .select(&ANCHOR_SELECTOR)
        .filter_map(|a| a.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty())
        .collect();

    INNER_LINK_TIERS
        .iter()
        .find_map(|hosts| {
            links
                .iter()
                .find(|link| hosts.iter().any(|host| link.contains(host)))
        })
        .or_else(|| links.first())
        .map(|link| link.to_string())
}

/// Whether a URL points at an aggregator's own discussion page rather than
/// at the content being discussed.
pub fn is_direct_discussion_link(url: &str) -> bool {
    url.contains("reddit.com/r/") && url.contains("/comments/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_score() {
        assert_eq!(extract_score("<p>123 points by alice</p>"), 123);
        assert_eq!(extract_score("1 point"), 1);
        assert_eq!(extract_score("Score: 9001points"), 9001);
        assert_eq!(extract_score("no signal here"), 0);
    }

    #[test]
    fn test_extract_comment_count() {
        assert_eq!(extract_comment_count("<a href=\"x\">45 comments</a>"), 45);
        assert_eq!(extract_comment_count("1 comment"), 1);
        assert_eq!(extract_comment_count("no signal here"), 0);
    }

    #[test]
    fn test_score_and_comments_are_independent() {
        let text = "12 points | 34 comments";
        assert_eq!(extract_score(text), 12);
        assert_eq!(extract_comment_count(text), 34);
    }

    #[test]
    fn test_first_match_wins() {
        assert_eq!(extract_score("5 points, later 7 points"), 5);
    }

    #[test]
    fn test_clean_title() {
        assert_eq!(
            clean_title("[discussion] Something happened"),
            "Something happened"
        );
        assert_eq!(clean_title("Something happened"), "Something happened");
        assert_eq!(clean_title("A [tag] in the middle"), "A [tag] in the middle");
    }

    #[test]
    fn test_inner_link_prefers_image_host() {
        let html = r#"<a href="https://www.reddit.com/user/bob">bob</a>
            <a href="https://imgur.com/abc">[link]</a>
            <a href="https://i.redd.it/xyz.png">img</a>"#;
        assert_eq!(
            extract_inner_link(html).as_deref(),
            Some("https://i.redd.it/xyz.png")
        );
    }

    #[test]
    fn test_inner_link_imgur_over_video() {
        let html = r#"<a href="https://youtu.be/v">v</a><a href="https://imgur.com/abc">i</a>"#;
        assert_eq!(
            extract_inner_link(html).as_deref(),
            Some("https://imgur.com/abc")
        );
    }

    #[test]
    fn test_inner_link_falls_back_to_first_anchor() {
        let html = r#"<p><a href="https://blog.example.com/post">[link]</a>
            <a href="https://www.reddit.com/r/rust/comments/1/x/">[comments]</a></p>"#;
        assert_eq!(
            extract_inner_link(html).as_deref(),
            Some("https://blog.example.com/post")
        );
    }

    #[test]
    fn test_inner_link_none_without_anchors() {
        assert_eq!(extract_inner_link("plain text"), None);
        assert_eq!(extract_inner_link(""), None);
    }

    #[test]
    fn test_is_direct_discussion_link() {
        assert!(is_direct_discussion_link(
            "https://www.reddit.com/r/rust/comments/abc/title/"
        ));
        assert!(!is_direct_discussion_link("https://www.reddit.com/r/rust/"));
        assert!(!is_direct_discussion_link("https://example.com/comments/1"));
    }
}
