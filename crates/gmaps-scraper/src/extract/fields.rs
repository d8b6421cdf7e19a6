//! Per-field strategy chains.
//!
//! Chains are ordered from the most to the least change-resistant source:
//! the embedded state blob, then accessibility labels, item ids, document
//! metadata and protocol links, then generic structure, and finally the
//! provider's obfuscated class names and action ids.

use std::sync::LazyLock;

use gmaps_core::{Coordinates, Tier};
use percent_encoding::percent_decode_str;
use regex::Regex;

use super::strategy::{PageContext, Strategy};
use super::text::{clean_html_text, decode_entities};
use crate::types::normalize_href;

const PLACE_PATH: &str = "/maps/place/";
const MAX_REVIEWS: u64 = 10_000_000;
const MIN_PHONE_DIGITS: usize = 10;

/// Labels the page renders as buttons next to categories.
const UI_CHROME: [&str; 33] = [
    "save",
    "share",
    "send",
    "directions",
    "website",
    "call",
    "menu",
    "order",
    "reserve",
    "learn more",
    "show more",
    "show less",
    "show slider",
    "photos",
    "reviews",
    "overview",
    "about",
    "updates",
    "show",
    "hide",
    "more",
    "less",
    "see",
    "view",
    "edit",
    "suggest",
    "claim",
    "add",
    "report",
    "nearby",
    "similar",
    "copy",
    "close",
];
const UI_ACTION_WORDS: [&str; 5] = ["click", "button", "open", "show", "hide"];

static LAT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""latitude"\s*:\s*(-?\d+\.\d+)"#).expect("valid regex"));
static LNG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""longitude"\s*:\s*(-?\d+\.\d+)"#).expect("valid regex"));
static URL_COORDS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!3d(-?\d+(?:\.\d+)?)!4d(-?\d+(?:\.\d+)?)").expect("valid regex"));

/// One strategy chain per record field.
pub struct FieldChains {
    pub name: Vec<Strategy<String>>,
    pub place_id: Vec<Strategy<String>>,
    pub cid: Vec<Strategy<String>>,
    pub coordinates: Vec<Strategy<Coordinates>>,
    pub address: Vec<Strategy<String>>,
    pub rating: Vec<Strategy<f64>>,
    pub reviews_count: Vec<Strategy<u64>>,
    pub categories: Vec<Strategy<Vec<String>>>,
    pub website: Vec<Strategy<String>>,
    pub phone: Vec<Strategy<String>>,
    pub thumbnail: Vec<Strategy<String>>,
    pub hours: Vec<Strategy<Vec<String>>>,
    pub link: Vec<Strategy<String>>,
}

pub static CHAINS: LazyLock<FieldChains> = LazyLock::new(FieldChains::build);

impl FieldChains {
    #[allow(clippy::too_many_lines)]
    fn build() -> Self {
        use Tier::{Legacy, Semantic, Structural};

        Self {
            name: vec![
                Strategy::structured("state.name", |s| s.name.clone()),
                Strategy::first(
                    "title",
                    Semantic,
                    r"<title>([^<]+?)\s*-\s*Google Maps\s*</title>",
                    clean_name,
                ),
                Strategy::first(
                    "h1.text",
                    Structural,
                    r"<h1[^>]*>(?:\s*<(?:[^/>][^>]*|/[^h>][^>]*)>)*\s*([^<\s][^<]*)<",
                    clean_name,
                ),
                Strategy::first(
                    "class.DUwDvf",
                    Legacy,
                    r#"class="[^"]*\bDUwDvf\b[^"]*"[^>]*>(?:\s*<(?:[^/>][^>]*|/span)>)*\s*([^<\s][^<]*)<"#,
                    clean_name,
                ),
            ],
            place_id: vec![
                Strategy::structured("state.place_id", |s| s.place_id.clone()),
                Strategy::first("chij", Structural, r"(?-i:(ChIJ[A-Za-z0-9_-]{20,}))", |s| {
                    Some(s.to_string())
                }),
            ],
            cid: vec![
                Strategy::structured("state.cid", |s| s.cid.clone()),
                Strategy::first("feature_id", Structural, r"(0x[0-9a-f]+:0x[0-9a-f]+)", |s| {
                    Some(s.to_ascii_lowercase())
                }),
            ],
            coordinates: vec![
                Strategy::structured("state.coordinates", |s| s.coordinates),
                Strategy::page("json.lat_lng", Structural, coordinates_from_json_keys),
                Strategy::page("url.3d4d", Structural, coordinates_from_url),
            ],
            address: vec![
                Strategy::first(
                    "aria.address",
                    Semantic,
                    r#"aria-label="Address:\s*([^"]+)""#,
                    clean_address,
                ),
                Strategy::first(
                    "item.address.label",
                    Semantic,
                    r#"data-item-id="address"[^>]*aria-label="([^"]+)""#,
                    clean_address,
                ),
                Strategy::first(
                    "item.address.text",
                    Semantic,
                    r#"<button[^>]*data-item-id="address"[^>]*>(?:\s*<[^>]+>)*\s*([^<]+)<"#,
                    clean_address,
                ),
                Strategy::first(
                    "json.formatted_address",
                    Structural,
                    r#""formatted_address"\s*:\s*"([^"]+)""#,
                    clean_address,
                ),
                Strategy::first(
                    "button.numeric_label",
                    Structural,
                    r#"<button[^>]*aria-label="[^"]*?(\d+[^",]{15,80})""#,
                    clean_address,
                ),
            ],
            rating: vec![
                Strategy::first(
                    "aria.stars",
                    Semantic,
                    r#"aria-label="\s*([\d.]+)\s+stars?\b"#,
                    |s| parse_rating(s, 1.0),
                ),
                Strategy::first("text.out_of_5", Structural, r"(\d\.\d)\s+out of 5 stars", |s| {
                    parse_rating(s, 0.0)
                }),
            ],
            reviews_count: vec![
                Strategy::first(
                    "aria.stars_reviews",
                    Semantic,
                    r#"aria-label="[\d.]+\s+stars?[^"]*?([\d,]+)\s+reviews?""#,
                    parse_reviews,
                ),
                Strategy::first(
                    "aria.reviews",
                    Semantic,
                    r#"aria-label="\s*([\d,]+)\s+reviews?""#,
                    parse_reviews,
                ),
                Strategy::first(
                    "text.reviews",
                    Structural,
                    r"([\d,]+)\s+reviews?\b",
                    parse_reviews,
                ),
                Strategy::first(
                    "text.google_reviews",
                    Structural,
                    r"([\d,]+)\s*Google reviews?",
                    parse_reviews,
                ),
            ],
            categories: vec![
                Strategy::all(
                    "aria.category",
                    Semantic,
                    r#"aria-label="Category:\s*([^"]+)""#,
                    collect_categories,
                ),
                Strategy::all(
                    "item.category",
                    Semantic,
                    r#"data-item-id="category"[^>]*aria-label="([^"]+)""#,
                    collect_categories,
                ),
                Strategy::all(
                    "jsaction.category",
                    Legacy,
                    r#"jsaction="pane\.[^"]*category[^>]*>([^<]+)</button>"#,
                    collect_categories,
                ),
            ],
            website: vec![
                Strategy::first(
                    "item.authority",
                    Semantic,
                    r#"data-item-id="authority"[^>]*href="([^"]+)""#,
                    clean_website,
                ),
                Strategy::first(
                    "item.authority.rev",
                    Semantic,
                    r#"href="([^"]+)"[^>]*data-item-id="authority""#,
                    clean_website,
                ),
                Strategy::first(
                    "aria.website",
                    Semantic,
                    r#"aria-label="Website:\s*([^"]+)""#,
                    clean_website,
                ),
                Strategy::first(
                    "a.website_label",
                    Semantic,
                    r#"<a[^>]*aria-label="[^"]*website[^"]*"[^>]*href="([^"]+)""#,
                    clean_website,
                ),
                Strategy::first(
                    "tooltip.open_website",
                    Structural,
                    r#"data-tooltip="Open website"[^>]*href="([^"]+)""#,
                    clean_website,
                ),
            ],
            phone: vec![
                Strategy::first(
                    "aria.phone",
                    Semantic,
                    r#"aria-label="Phone:\s*([^"]+)""#,
                    clean_phone,
                ),
                Strategy::first("href.tel", Semantic, r#"href="tel:([^"]+)""#, clean_phone),
                Strategy::first(
                    "item.phone",
                    Semantic,
                    r#"data-item-id="phone:tel:([^"]+)""#,
                    clean_phone,
                ),
                Strategy::first(
                    "tooltip.call",
                    Structural,
                    r#"data-tooltip="Call"[^>]*href="tel:([^"]+)""#,
                    clean_phone,
                ),
                Strategy::first(
                    "button.phone_label",
                    Structural,
                    r#"<button[^>]*aria-label="[^"]*?(\+?1?\s*\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4})[^"]*""#,
                    clean_phone,
                ),
            ],
            thumbnail: vec![
                Strategy::first(
                    "meta.og_image",
                    Semantic,
                    r#"<meta[^>]*property="og:image"[^>]*content="([^"]+)""#,
                    clean_thumbnail,
                ),
                Strategy::first(
                    "img.alt_photo",
                    Structural,
                    r#"<img[^>]*alt="[^"]*(?:photo|image)[^"]*"[^>]*src="([^"]+)""#,
                    clean_thumbnail,
                ),
                Strategy::first(
                    "img.cdn",
                    Structural,
                    r#"<img[^>]*src="(https://lh\d+\.googleusercontent\.com/[^"]+)""#,
                    clean_thumbnail,
                ),
                Strategy::first(
                    "jsaction.hero_image",
                    Legacy,
                    r#"jsaction="pane\.[^"]*hero[^"]*image[^>]*>\s*<img[^>]+src="([^"]+)""#,
                    clean_thumbnail,
                ),
                Strategy::first(
                    "class.kSOdnb",
                    Legacy,
                    r#"<img[^>]*class="[^"]*\bkSOdnb\b[^"]*"[^>]+src="([^"]+)""#,
                    clean_thumbnail,
                ),
            ],
            hours: vec![
                Strategy::all(
                    "aria.day_hours",
                    Semantic,
                    r#"aria-label="(?-i:([A-Z][a-z]+day,\s+(?:\d{1,2}(?::\d{2})?\s*[AP]M\s+to\s+\d{1,2}(?::\d{2})?\s*[AP]M|Open 24 hours|Closed)))[^"]*""#,
                    collect_hours,
                ),
                Strategy::first("aria.hours", Semantic, r#"aria-label="Hours:\s*([^"]+)""#, |s| {
                    clean_html_text(s)
                        .filter(|h| h.chars().count() > 5)
                        .map(|h| vec![h])
                }),
            ],
            link: vec![
                Strategy::first(
                    "link.canonical",
                    Semantic,
                    r#"<link[^>]*rel="canonical"[^>]*href="([^"]+)""#,
                    place_link,
                ),
                Strategy::first(
                    "meta.og_url",
                    Semantic,
                    r#"<meta[^>]*property="og:url"[^>]*content="([^"]+)""#,
                    place_link,
                ),
                Strategy::page("snapshot.url", Structural, |ctx| place_link(ctx.url)),
            ],
        }
    }
}

fn clean_name(raw: &str) -> Option<String> {
    clean_html_text(raw)
}

fn clean_address(raw: &str) -> Option<String> {
    let cleaned = clean_html_text(raw)?;
    let cleaned = cleaned
        .strip_prefix("Address:")
        .map_or(cleaned.as_str(), str::trim)
        .to_string();
    (cleaned.chars().count() > 10 && cleaned.chars().any(|c| c.is_ascii_digit())).then_some(cleaned)
}

fn parse_rating(raw: &str, min: f64) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|r| (min..=5.0).contains(r))
}

fn parse_reviews(raw: &str) -> Option<u64> {
    raw.replace(',', "")
        .parse::<u64>()
        .ok()
        .filter(|n| *n > 0 && *n < MAX_REVIEWS)
}

fn collect_categories(hits: Vec<&str>) -> Option<Vec<String>> {
    let mut categories: Vec<String> = Vec::new();
    for hit in hits {
        let Some(cleaned) = clean_html_text(hit) else {
            continue;
        };
        let len = cleaned.chars().count();
        if len <= 2 || len >= 50 {
            continue;
        }
        let lower = cleaned.to_lowercase();
        if UI_CHROME.contains(&lower.as_str())
            || UI_ACTION_WORDS.iter().any(|w| lower.contains(w))
        {
            continue;
        }
        for part in cleaned.split([',', '·', '•']).map(str::trim) {
            let part_lower = part.to_lowercase();
            if part.chars().count() <= 2 || UI_CHROME.contains(&part_lower.as_str()) {
                continue;
            }
            if !categories.iter().any(|c| c.to_lowercase() == part_lower) {
                categories.push(part.to_string());
            }
        }
    }
    (!categories.is_empty()).then_some(categories)
}

fn clean_website(raw: &str) -> Option<String> {
    let mut url = clean_html_text(raw)?;
    if let Some(idx) = url.find("/url?q=") {
        let target = &url[idx + "/url?q=".len()..];
        let target = target.split('&').next().unwrap_or(target);
        url = percent_decode_str(target).decode_utf8_lossy().into_owned();
    }
    if !(url.contains("http://") || url.contains("https://") || url.contains('.')) {
        return None;
    }
    if !url.starts_with("http") {
        url = format!("https://{url}");
    }
    Some(url)
}

fn clean_phone(raw: &str) -> Option<String> {
    let cleaned = clean_html_text(&percent_decode_str(raw).decode_utf8_lossy())?;
    let digits: String = cleaned.chars().filter(char::is_ascii_digit).collect();
    if digits.len() < MIN_PHONE_DIGITS {
        return None;
    }
    if cleaned.trim_start().starts_with('+') {
        Some(format!("+{digits}"))
    } else {
        Some(digits)
    }
}

fn clean_thumbnail(raw: &str) -> Option<String> {
    let url = decode_entities(raw.trim());
    let lower = url.to_ascii_lowercase();
    let absolute = lower.starts_with("http://") || lower.starts_with("https://");
    let image = [".jpg", ".jpeg", ".png", ".webp", "googleusercontent"]
        .iter()
        .any(|marker| lower.contains(marker));
    (absolute && image).then_some(url)
}

fn collect_hours(hits: Vec<&str>) -> Option<Vec<String>> {
    let mut hours: Vec<String> = Vec::new();
    for hit in hits {
        if let Some(cleaned) = clean_html_text(hit) {
            if !hours.contains(&cleaned) {
                hours.push(cleaned);
            }
        }
    }
    (!hours.is_empty()).then_some(hours)
}

fn place_link(raw: &str) -> Option<String> {
    let decoded = decode_entities(raw.trim());
    decoded.contains(PLACE_PATH).then(|| normalize_href(&decoded))
}

fn coordinates_from_json_keys(ctx: &PageContext<'_>) -> Option<Coordinates> {
    valid_coordinates(
        capture_f64(&LAT_RE, ctx.html)?,
        capture_f64(&LNG_RE, ctx.html)?,
    )
}

fn capture_f64(re: &Regex, haystack: &str) -> Option<f64> {
    re.captures(haystack)?.get(1)?.as_str().parse().ok()
}

fn coordinates_from_url(ctx: &PageContext<'_>) -> Option<Coordinates> {
    let cap = URL_COORDS_RE.captures(ctx.url)?;
    let latitude = cap.get(1)?.as_str().parse::<f64>().ok()?;
    let longitude = cap.get(2)?.as_str().parse::<f64>().ok()?;
    valid_coordinates(latitude, longitude)
}

fn valid_coordinates(latitude: f64, longitude: f64) -> Option<Coordinates> {
    ((-90.0..=90.0).contains(&latitude) && (-180.0..=180.0).contains(&longitude)).then_some(
        Coordinates {
            latitude,
            longitude,
        },
    )
}
