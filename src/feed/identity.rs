use sha2::{Digest, Sha256};

/// Length of an item identifier in hex characters (64 bits of SHA-256).
pub const ITEM_ID_LEN: usize = 16;

/// Stable identifier for an item, derived from its canonical URL.
///
/// This is the upsert key: the same URL always maps to the same ID, so
/// re-ingesting a feed updates rows instead of duplicating them.
pub fn item_id(url: &str) -> String {
    let hash = Sha256::digest(url.as_bytes());
    let mut hex = format!("{:x}", hash);
    hex.truncate(ITEM_ID_LEN);
    hex
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_pinned_identifiers() {
        assert_eq!(item_id("https://example.com/a"), "2dce0a4c50441bfc");
        assert_eq!(item_id("https://example.com/b"), "d7fe568b31ae0fb9");
    }

    #[test]
    fn test_empty_url_still_hashes() {
        let id = item_id("");
        assert_eq!(id.len(), ITEM_ID_LEN);
    }

    proptest! {
        #[test]
        fn prop_item_id_is_deterministic(url in ".*") {
            prop_assert_eq!(item_id(&url), item_id(&url));
        }

        #[test]
        fn prop_item_id_is_fixed_length_lowercase_hex(url in ".*") {
            let id = item_id(&url);
            prop_assert_eq!(id.len(), ITEM_ID_LEN);
            prop_assert!(id.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
        }

        #[test]
        fn prop_distinct_urls_get_distinct_ids(
            a in "https://[a-z]{1,12}\\.com/[a-z0-9/]{0,24}",
            b in "https://[a-z]{1,12}\\.com/[a-z0-9/]{0,24}",
        ) {
            prop_assume!(a != b);
            prop_assert_ne!(item_id(&a), item_id(&b));
        }
    }
}
