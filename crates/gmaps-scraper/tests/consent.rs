//! Integration tests for `ConsentHandler` against scripted search pages.

mod common;

use std::time::Duration;

use common::{fast_config, FakeDriver, FakeWeb, SEARCH_BASE};
use gmaps_core::{ConsentState, SearchRequest};
use gmaps_scraper::types::search_url;
use gmaps_scraper::{ConsentHandler, SessionPool};

const WINDOW: Duration = Duration::from_millis(50);

async fn run_consent(web: FakeWeb, lang: &str) -> ConsentState {
    let driver = FakeDriver::new(web);
    let pool = SessionPool::new(driver, 1, true, &fast_config());
    let mut session = pool.acquire().await.unwrap();
    session
        .navigate(&search_url(SEARCH_BASE, "cafe", lang))
        .await
        .unwrap();

    let request = SearchRequest::new("cafe").unwrap().with_lang(lang).unwrap();
    let mut handler = ConsentHandler::for_request(&request, WINDOW);
    let state = handler.run(&mut session).await;
    assert_eq!(handler.state(), state);

    session.release().await;
    pool.shutdown().await;
    state
}

#[tokio::test]
async fn spanish_dialog_is_dismissed() {
    let web = FakeWeb::new().with_consent(r#"css:button[aria-label="Aceptar todo"]"#);
    assert_eq!(run_consent(web, "es").await, ConsentState::Dismissed);
}

#[tokio::test]
async fn regional_language_tag_uses_its_primary_labels() {
    let web = FakeWeb::new().with_consent(r#"css:button[aria-label="Aceptar todo"]"#);
    assert_eq!(run_consent(web, "es-419").await, ConsentState::Dismissed);
}

#[tokio::test]
async fn missing_dialog_is_not_present() {
    assert_eq!(run_consent(FakeWeb::new(), "en").await, ConsentState::NotPresent);
}

#[tokio::test]
async fn dialog_in_another_language_is_still_found() {
    // A German dialog served to an English request.
    let web = FakeWeb::new().with_consent(r#"css:input[type="submit"][value="Alle akzeptieren"]"#);
    assert_eq!(run_consent(web, "en").await, ConsentState::Dismissed);
}

#[tokio::test]
async fn text_only_button_is_matched_by_text() {
    let web = FakeWeb::new().with_consent("text:button:I agree");
    assert_eq!(run_consent(web, "fr").await, ConsentState::Dismissed);
}

#[tokio::test]
async fn dialog_that_will_not_close_is_not_handled() {
    let web = FakeWeb::new()
        .with_consent(r#"css:button[aria-label="Accept all"]"#)
        .with_sticky_consent();
    assert_eq!(run_consent(web, "en").await, ConsentState::NotHandled);
}
