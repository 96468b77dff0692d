use std::net::{IpAddr, Ipv4Addr};
use thiserror::Error;
use url::Url;

/// Longest feed URL accepted from user input
pub const MAX_FEED_URL_LENGTH: usize = 2048;

/// Why a user-supplied feed URL was refused.
#[derive(Error, Debug)]
pub enum FeedUrlError {
    #[error("Invalid URL: {0}")]
    Unparseable(#[from] url::ParseError),
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    #[error("URL has no host")]
    MissingHost,
    #[error("URL exceeds {MAX_FEED_URL_LENGTH} characters")]
    TooLong,
    /// Loopback, private, link-local or unspecified address
    #[error("Internal address not allowed: {0}")]
    InternalAddress(String),
}

/// Check a URL before it becomes a source the scheduler will poll.
///
/// Accepts only `http`/`https` URLs with a host, and refuses hosts that
/// resolve syntactically to internal addresses (`localhost`, loopback,
/// RFC 1918, link-local, unique-local IPv6, and IPv4-mapped forms of those).
/// Hostnames are not resolved here.
pub fn validate_feed_url(input: &str) -> Result<Url, FeedUrlError> {
    let input = input.trim();
    if input.len() > MAX_FEED_URL_LENGTH {
        return Err(FeedUrlError::TooLong);
    }

    let url = Url::parse(input)?;
    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(FeedUrlError::UnsupportedScheme(scheme.to_owned())),
    }

    let host = url.host_str().ok_or(FeedUrlError::MissingHost)?;
    if host.eq_ignore_ascii_case("localhost") || host.ends_with(".localhost") {
        return Err(FeedUrlError::InternalAddress(host.to_owned()));
    }

    let bare = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    if let Ok(ip) = bare.parse::<IpAddr>() {
        if is_internal(&ip) {
            return Err(FeedUrlError::InternalAddress(ip.to_string()));
        }
    }

    Ok(url)
}

fn is_internal_v4(ip: &Ipv4Addr) -> bool {
    ip.is_private() || ip.is_loopback() || ip.is_link_local() || ip.is_unspecified()
}

fn is_internal(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_internal_v4(v4),
        IpAddr::V6(v6) => {
            if v6.is_loopback() || v6.is_unspecified() {
                return true;
            }
            if let Some(mapped) = v6.to_ipv4_mapped() {
                return is_internal_v4(&mapped);
            }
            let first = v6.segments()[0];
            // fc00::/7 unique local, fe80::/10 link local
            (first & 0xfe00) == 0xfc00 || (first & 0xffc0) == 0xfe80
        }
    }
}
