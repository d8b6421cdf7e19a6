//! Markup-to-text helpers shared by the field strategies.

use std::sync::LazyLock;

use regex::Regex;

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));
static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Decodes the handful of entities the provider emits in attribute values.
#[must_use]
pub fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

/// Strips tags, decodes entities and collapses whitespace. `None` when
/// nothing is left.
#[must_use]
pub fn clean_html_text(raw: &str) -> Option<String> {
    let stripped = TAG_RE.replace_all(raw, "");
    let decoded = decode_entities(&stripped);
    let collapsed = WS_RE.replace_all(&decoded, " ");
    let trimmed = collapsed.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
