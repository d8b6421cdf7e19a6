//! Listing references discovered while scrolling the results feed.

use std::sync::LazyLock;

use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use regex::Regex;

/// Origin relative listing links are resolved against.
pub const SEARCH_ORIGIN: &str = "https://www.google.com";

static FEATURE_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(0x[0-9a-fA-F]+:0x[0-9a-fA-F]+)").expect("valid regex"));

/// A discovered listing: where to navigate, when it was first seen, and the
/// best identifier known for it at discovery time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceRef {
    pub href: String,
    /// Zero-based order of first sighting. Unique within a job.
    pub discovery_index: usize,
    pub dedup_key: String,
}

impl PlaceRef {
    /// Builds a reference from a raw `href`, normalizing it first.
    #[must_use]
    pub fn new(raw_href: &str, discovery_index: usize) -> Self {
        let href = normalize_href(raw_href);
        let dedup_key = dedup_key(&href);
        Self {
            href,
            discovery_index,
            dedup_key,
        }
    }
}

/// Decodes markup entities, resolves against [`SEARCH_ORIGIN`], drops the
/// query and fragment, and lowercases scheme and host.
#[must_use]
pub fn normalize_href(raw: &str) -> String {
    let decoded = raw
        .trim()
        .replace("&amp;", "&")
        .replace("&#39;", "'")
        .replace("&quot;", "\"");

    let absolute = if decoded.starts_with("//") {
        format!("https:{decoded}")
    } else if decoded.starts_with('/') {
        format!("{SEARCH_ORIGIN}{decoded}")
    } else {
        decoded
    };

    let end = absolute.find(['?', '#']).unwrap_or(absolute.len());
    let without_query = &absolute[..end];

    match without_query.split_once("://") {
        Some((scheme, rest)) => {
            let (host, path) = rest.find('/').map_or((rest, ""), |i| rest.split_at(i));
            format!(
                "{}://{}{}",
                scheme.to_ascii_lowercase(),
                host.to_ascii_lowercase(),
                path
            )
        }
        None => without_query.to_string(),
    }
}

/// The provider feature id (`0x…:0x…`) embedded in `href`, lower-cased.
#[must_use]
pub fn feature_id(href: &str) -> Option<String> {
    FEATURE_ID_RE
        .captures(href)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().to_ascii_lowercase())
}

/// Feature id when present, else the normalized reference itself.
#[must_use]
pub fn dedup_key(normalized_href: &str) -> String {
    feature_id(normalized_href).unwrap_or_else(|| normalized_href.to_string())
}

/// `{base_url}?q={query}&hl={lang}` with both values percent-encoded.
#[must_use]
pub fn search_url(base_url: &str, query: &str, lang: &str) -> String {
    format!(
        "{base_url}?q={}&hl={}",
        utf8_percent_encode(query, NON_ALPHANUMERIC),
        utf8_percent_encode(lang, NON_ALPHANUMERIC)
    )
}
