//! End-to-end jobs through `run_search` on the in-memory browser.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{fast_config, feed_batch, place_page, place_url, FakeDriver, FakeWeb, FEED_CSS};
use gmaps_core::{ConsentState, JobState, ScraperConfig, SearchRequest, SearchResult};
use gmaps_scraper::run_search;

const NAMES: [&str; 10] = [
    "Alpha", "Bravo", "Charlie", "Delta", "Echo", "Foxtrot", "Golf", "Hotel", "India", "Juliet",
];

/// A web with `count` places split across feed batches of three.
fn web_with_places(count: usize) -> FakeWeb {
    let slugs: Vec<(String, usize)> = NAMES[..count]
        .iter()
        .enumerate()
        .map(|(i, name)| (name.to_ascii_lowercase(), i + 1))
        .collect();
    let batches = slugs
        .chunks(3)
        .map(|chunk| {
            let refs: Vec<(&str, usize)> = chunk.iter().map(|(s, n)| (s.as_str(), *n)).collect();
            feed_batch(&refs)
        })
        .collect();
    slugs
        .iter()
        .zip(NAMES)
        .fold(FakeWeb::new().with_feed(FEED_CSS, batches), |web, ((slug, n), name)| {
            web.with_place(&place_url(slug, *n), place_page(name, slug))
        })
}

fn names(result: &SearchResult) -> Vec<&str> {
    result
        .results
        .iter()
        .filter_map(|r| r.name.as_deref())
        .collect()
}

async fn run(
    driver: &Arc<FakeDriver>,
    request: SearchRequest,
    config: &ScraperConfig,
) -> SearchResult {
    let result = run_search(driver.clone(), request, config).await;
    assert_eq!(driver.open_now(), 0, "every session must be closed");
    result
}

#[tokio::test]
async fn all_discovered_places_are_extracted_in_discovery_order() {
    let driver = FakeDriver::new(web_with_places(5));
    let request = SearchRequest::new("coffee austin").unwrap();
    let result = run(&driver, request, &fast_config()).await;

    assert!(result.success, "error: {:?}", result.error);
    assert_eq!(result.total_results, 5);
    assert_eq!(names(&result), vec!["Alpha", "Bravo", "Charlie", "Delta", "Echo"]);
    assert_eq!(result.metadata.discovered, 5);
    assert_eq!(result.metadata.state, JobState::Completed);
    assert_eq!(result.metadata.consent, ConsentState::NotPresent);
    assert!(result.error.is_none());
    assert_eq!(
        result.results[0].link,
        "https://www.google.com/maps/place/alpha/"
    );
}

#[tokio::test]
async fn max_places_caps_discovery_and_extraction() {
    let driver = FakeDriver::new(web_with_places(10));
    let request = SearchRequest::new("coffee").unwrap().with_max_places(3).unwrap();
    let result = run(&driver, request, &fast_config()).await;

    assert!(result.success);
    assert_eq!(names(&result), vec!["Alpha", "Bravo", "Charlie"]);
    assert!(driver.place_visits() <= 3);
    assert_eq!(result.metadata.discovered, 3);
}

#[tokio::test]
async fn spanish_consent_is_dismissed_before_discovery() {
    let web = web_with_places(2).with_consent(r#"css:button[aria-label="Aceptar todo"]"#);
    let driver = FakeDriver::new(web);
    let request = SearchRequest::new("cafeteria").unwrap().with_lang("es").unwrap();
    let result = run(&driver, request, &fast_config()).await;

    assert!(result.success);
    assert_eq!(result.metadata.consent, ConsentState::Dismissed);
    assert_eq!(result.total_results, 2);
}

#[tokio::test]
async fn undismissable_consent_does_not_fail_the_job() {
    let web = web_with_places(2)
        .with_consent(r#"css:button[aria-label="Accept all"]"#)
        .with_sticky_consent();
    let driver = FakeDriver::new(web);
    let result = run(&driver, SearchRequest::new("cafe").unwrap(), &fast_config()).await;

    assert!(result.success);
    assert_eq!(result.metadata.consent, ConsentState::NotHandled);
    assert_eq!(result.total_results, 2);
}

#[tokio::test]
async fn missing_feed_fails_the_job_with_no_results() {
    let driver = FakeDriver::new(FakeWeb::new());
    let result = run(&driver, SearchRequest::new("nowhere").unwrap(), &fast_config()).await;

    assert!(!result.success);
    assert!(result.results.is_empty());
    assert_eq!(result.total_results, 0);
    let error = result.error.as_deref().unwrap_or_default();
    assert!(error.contains("feed element not found"), "{error}");
    assert_eq!(result.metadata.state, JobState::Failed);
    assert_eq!(driver.place_visits(), 0);
}

#[tokio::test]
async fn unidentifiable_place_is_skipped_and_the_rest_returned() {
    let web = web_with_places(5).with_blocked(&place_url("charlie", 3));
    let driver = FakeDriver::new(web);
    let result = run(&driver, SearchRequest::new("coffee").unwrap(), &fast_config()).await;

    assert!(result.success);
    assert_eq!(result.total_results, 4);
    assert_eq!(names(&result), vec!["Alpha", "Bravo", "Delta", "Echo"]);
    assert_eq!(result.metadata.skipped, 1);
    assert_eq!(result.metadata.extracted, 4);
}

#[tokio::test]
async fn failed_extraction_writes_a_diagnostic_snapshot() {
    let dir = std::env::temp_dir().join(format!("gmaps-orch-{}", uuid::Uuid::new_v4()));
    let config = ScraperConfig {
        diagnostics_dir: Some(dir.clone()),
        ..fast_config()
    };
    let web = web_with_places(2).with_blocked(&place_url("bravo", 2));
    let driver = FakeDriver::new(web);
    let result = run(&driver, SearchRequest::new("coffee").unwrap(), &config).await;

    assert_eq!(result.total_results, 1);
    let files: Vec<String> = std::fs::read_dir(&dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert!(files.iter().any(|f| f.ends_with(".html")), "{files:?}");
    assert!(files.iter().any(|f| f.ends_with(".png")), "{files:?}");
    std::fs::remove_dir_all(dir).unwrap();
}

#[tokio::test]
async fn navigation_timeout_is_retried_once_then_skipped() {
    let slow = place_url("bravo", 2);
    let web = web_with_places(3).with_slow(&slow);
    let driver = FakeDriver::new(web);
    let result = run(&driver, SearchRequest::new("coffee").unwrap(), &fast_config()).await;

    assert!(result.success);
    assert_eq!(names(&result), vec!["Alpha", "Charlie"]);
    let attempts = driver.visited().iter().filter(|u| **u == slow).count();
    assert_eq!(attempts, 2);
}

#[tokio::test]
async fn concurrent_sessions_never_exceed_the_requested_bound() {
    let web = web_with_places(8).with_place_delay(Duration::from_millis(20));
    let driver = FakeDriver::new(web);
    let request = SearchRequest::new("coffee").unwrap().with_concurrency(2);
    let result = run(&driver, request, &fast_config()).await;

    assert!(result.success);
    assert_eq!(result.total_results, 8);
    assert!(driver.max_open() <= 2, "max open sessions: {}", driver.max_open());
}

#[tokio::test]
async fn job_timeout_returns_partial_results() {
    let config = ScraperConfig {
        job_timeout: Duration::from_millis(400),
        ..fast_config()
    };
    let web = web_with_places(6).with_place_delay(Duration::from_millis(150));
    let driver = FakeDriver::new(web);
    let request = SearchRequest::new("coffee").unwrap().with_concurrency(1);
    let result = run(&driver, request, &config).await;

    assert!(!result.success);
    assert!(result.metadata.timed_out);
    assert_eq!(result.metadata.state, JobState::Completed);
    assert!(!result.results.is_empty());
    assert!(result.results.len() < 6);
    let error = result.error.as_deref().unwrap_or_default();
    assert!(error.contains("timed out"), "{error}");
}

#[tokio::test]
async fn all_sessions_failing_fails_the_job() {
    let driver = FakeDriver::new(web_with_places(2));
    driver.fail_next_opens(1_000);
    let request = SearchRequest::new("coffee").unwrap().with_concurrency(2);
    let result = run(&driver, request, &fast_config()).await;

    assert!(!result.success);
    assert!(result.results.is_empty());
    let error = result.error.as_deref().unwrap_or_default();
    assert!(error.contains("failed to initialise"), "{error}");
}

#[tokio::test]
async fn duplicate_listings_collapse_to_one_record() {
    // Two feed entries with different data paths resolve to the same canonical page.
    let first = place_url("twin", 1);
    let second = place_url("twin", 2);
    let web = FakeWeb::new()
        .with_feed(FEED_CSS, vec![feed_batch(&[("twin", 1), ("twin", 2)])])
        .with_place(&first, place_page("Twin Cafe", "twin"))
        .with_place(&second, place_page("Twin Cafe", "twin"));
    let driver = FakeDriver::new(web);
    let result = run(&driver, SearchRequest::new("twin").unwrap(), &fast_config()).await;

    assert_eq!(result.metadata.discovered, 2);
    assert_eq!(result.total_results, 1);
    assert_eq!(result.metadata.deduped, 1);
}

#[tokio::test]
async fn job_timeout_during_discovery_keeps_the_discovered_count() {
    let config = ScraperConfig {
        job_timeout: Duration::from_millis(400),
        pacing_min: Duration::from_millis(150),
        pacing_max: Duration::from_millis(150),
        stall_scrolls: 50,
        ..fast_config()
    };
    let driver = FakeDriver::new(web_with_places(9));
    let result = run(&driver, SearchRequest::new("coffee").unwrap(), &config).await;

    assert!(!result.success);
    assert!(result.metadata.timed_out);
    assert_eq!(result.metadata.state, JobState::Completed);
    assert!(
        result.metadata.discovered >= 3,
        "discovered {}",
        result.metadata.discovered
    );
    assert!(result.results.is_empty());
    assert_eq!(driver.place_visits(), 0);
    let error = result.error.as_deref().unwrap_or_default();
    assert!(error.contains("timed out"), "{error}");
}

#[tokio::test]
async fn cap_holds_when_duplicates_finish_out_of_order() {
    let first_twin = place_url("twin", 1);
    let second_twin = place_url("twin", 2);
    let web = FakeWeb::new()
        .with_feed(
            FEED_CSS,
            vec![feed_batch(&[("twin", 1), ("twin", 2), ("alpha", 3), ("bravo", 4)])],
        )
        .with_place(&first_twin, place_page("Twin Cafe", "twin"))
        .with_place(&second_twin, place_page("Twin Cafe", "twin"))
        .with_place(&place_url("alpha", 3), place_page("Alpha", "alpha"))
        .with_place(&place_url("bravo", 4), place_page("Bravo", "bravo"))
        .with_delay_for(&first_twin, Duration::from_millis(80));
    let driver = FakeDriver::new(web);
    let request = SearchRequest::new("twin")
        .unwrap()
        .with_max_places(3)
        .unwrap()
        .with_concurrency(3);
    let result = run(&driver, request, &fast_config()).await;

    assert!(result.success);
    assert!(result.results.len() <= 3);
    assert_eq!(names(&result), vec!["Twin Cafe", "Alpha"]);
    assert_eq!(result.metadata.discovered, 3);
    assert_eq!(result.metadata.deduped, 1);
}
