//! In-memory browser used by the integration tests.
//!
//! A [`FakeWeb`] describes one search results page (feed batches revealed
//! one per scroll, an optional consent dialog) plus a set of place pages.
//! [`FakeDriver`] serves it and counts how many sessions are open at once.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use gmaps_core::ScraperConfig;
use gmaps_scraper::{
    BrowserDriver, BrowserSession, ClientIdentity, DriverError, Selector, Snapshot,
};

pub const SEARCH_BASE: &str = "https://www.google.com/maps/search/";
pub const FEED_CSS: &str = r#"[role="feed"]"#;
pub const BLOCKED_URL: &str = "https://www.google.com/sorry/index";

/// Engine settings with pacing off and every wait cut short.
pub fn fast_config() -> ScraperConfig {
    ScraperConfig {
        base_url: SEARCH_BASE.to_string(),
        nav_timeout: Duration::from_secs(2),
        job_timeout: Duration::from_secs(10),
        discovery_timeout: Duration::from_secs(5),
        consent_timeout: Duration::from_millis(50),
        feed_timeout: Duration::from_millis(10),
        place_settle_timeout: Duration::from_millis(10),
        pacing_min: Duration::ZERO,
        pacing_max: Duration::ZERO,
        stall_scrolls: 2,
        session_init_retries: 1,
        session_backoff: Duration::ZERO,
        diagnostics_dir: None,
    }
}

/// Absolute place URL as discovery normalizes it.
pub fn place_url(slug: &str, n: usize) -> String {
    format!("https://www.google.com/maps/place/{slug}/data=!4m2!3m1!1s0x{n:x}1:0x{n:x}2")
}

/// Feed markup listing `slugs` as result anchors.
pub fn feed_batch(slugs: &[(&str, usize)]) -> String {
    slugs
        .iter()
        .map(|(slug, n)| {
            format!(
                r#"<div class="Nv2PK"><a class="hfpxzc" aria-label="{slug}" href="{}?authuser=0&amp;hl=en"></a></div>"#,
                place_url(slug, *n)
            )
        })
        .collect()
}

/// A place page whose name, link, and contact fields come from semantic markup.
pub fn place_page(name: &str, slug: &str) -> String {
    format!(
        r#"<html><head>
<title>{name} - Google Maps</title>
<link rel="canonical" href="https://www.google.com/maps/place/{slug}/">
<meta property="og:image" content="https://lh3.googleusercontent.com/p/{slug}=w400">
</head><body>
<h1 class="DUwDvf">{name}</h1>
<span aria-label="4.6 stars "></span><span aria-label="212 reviews"></span>
<button aria-label="Category: Coffee shop"></button>
<button data-item-id="address" aria-label="Address: 1 Main St, Austin, TX 78701"></button>
<a data-item-id="authority" href="https://{slug}.example.com/">site</a>
<a href="tel:+15125550100">call</a>
</body></html>"#
    )
}

#[derive(Debug, Clone)]
struct Page {
    landing: String,
    html: String,
}

/// Scripted pages served by [`FakeDriver`].
#[derive(Debug, Clone, Default)]
pub struct FakeWeb {
    feed_css: Option<String>,
    batches: Vec<String>,
    end_after_scrolls: Option<usize>,
    consent: Option<String>,
    sticky_consent: bool,
    search_redirect: Option<String>,
    pages: HashMap<String, Page>,
    slow: HashSet<String>,
    place_delay: Duration,
    delays: HashMap<String, Duration>,
    scroll_failure_after: Option<usize>,
    waits_out_misses: bool,
}

impl FakeWeb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed container matched by `css`; batch `i` appears after `i` scrolls.
    pub fn with_feed(mut self, css: &str, batches: Vec<String>) -> Self {
        self.feed_css = Some(css.to_string());
        self.batches = batches;
        self
    }

    pub fn with_end_marker_after(mut self, scrolls: usize) -> Self {
        self.end_after_scrolls = Some(scrolls);
        self
    }

    /// A consent button shown on the search page, identified by the
    /// rendering of its selector (e.g. `css:button[aria-label="Accept all"]`).
    pub fn with_consent(mut self, selector: &str) -> Self {
        self.consent = Some(selector.to_string());
        self
    }

    /// Clicking the consent button does nothing.
    pub fn with_sticky_consent(mut self) -> Self {
        self.sticky_consent = true;
        self
    }

    /// The search lands straight on `url` instead of a results page.
    pub fn with_search_redirect(mut self, url: &str, html: String) -> Self {
        self.search_redirect = Some(url.to_string());
        self.pages.insert(
            url.to_string(),
            Page {
                landing: url.to_string(),
                html,
            },
        );
        self
    }

    pub fn with_place(mut self, url: &str, html: String) -> Self {
        self.pages.insert(
            url.to_string(),
            Page {
                landing: url.to_string(),
                html,
            },
        );
        self
    }

    /// `url` bounces to an interstitial with no place content.
    pub fn with_blocked(mut self, url: &str) -> Self {
        self.pages.insert(
            url.to_string(),
            Page {
                landing: BLOCKED_URL.to_string(),
                html: "<html><body><p>Our systems have detected unusual traffic.</p></body></html>"
                    .to_string(),
            },
        );
        self
    }

    /// Navigation to `url` always times out.
    pub fn with_slow(mut self, url: &str) -> Self {
        self.slow.insert(url.to_string());
        self
    }

    /// Delay before each place page finishes loading.
    pub fn with_place_delay(mut self, delay: Duration) -> Self {
        self.place_delay = delay;
        self
    }

    /// Delay for `url` alone, overriding the shared place delay.
    pub fn with_delay_for(mut self, url: &str, delay: Duration) -> Self {
        self.delays.insert(url.to_string(), delay);
        self
    }

    /// Every feed scroll after the first `scrolls` fails.
    pub fn with_scroll_failure_after(mut self, scrolls: usize) -> Self {
        self.scroll_failure_after = Some(scrolls);
        self
    }

    /// A `wait_for` that finds nothing blocks for its whole timeout.
    pub fn with_slow_misses(mut self) -> Self {
        self.waits_out_misses = true;
        self
    }
}

#[derive(Debug, Default)]
pub struct Counters {
    pub open: AtomicUsize,
    pub max_open: AtomicUsize,
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
    pub place_visits: AtomicUsize,
    pub failing_opens: AtomicUsize,
}

pub struct FakeDriver {
    web: Arc<FakeWeb>,
    counters: Arc<Counters>,
    visited: Arc<Mutex<Vec<String>>>,
}

impl FakeDriver {
    pub fn new(web: FakeWeb) -> Arc<Self> {
        Arc::new(Self {
            web: Arc::new(web),
            counters: Arc::new(Counters::default()),
            visited: Arc::new(Mutex::new(Vec::new())),
        })
    }

    /// The next `n` session opens fail.
    pub fn fail_next_opens(&self, n: usize) {
        self.counters.failing_opens.store(n, Ordering::SeqCst);
    }

    pub fn max_open(&self) -> usize {
        self.counters.max_open.load(Ordering::SeqCst)
    }

    pub fn open_now(&self) -> usize {
        self.counters.open.load(Ordering::SeqCst)
    }

    pub fn opened(&self) -> usize {
        self.counters.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.counters.closed.load(Ordering::SeqCst)
    }

    pub fn place_visits(&self) -> usize {
        self.counters.place_visits.load(Ordering::SeqCst)
    }

    /// Every URL navigated to, in call order.
    pub fn visited(&self) -> Vec<String> {
        self.visited.lock().unwrap().clone()
    }
}

#[async_trait]
impl BrowserDriver for FakeDriver {
    type Session = FakeSession;

    async fn open_session(
        &self,
        _headless: bool,
        _identity: &ClientIdentity,
    ) -> Result<FakeSession, DriverError> {
        let failing = self.counters.failing_opens.load(Ordering::SeqCst);
        if failing > 0 {
            self.counters.failing_opens.store(failing - 1, Ordering::SeqCst);
            return Err(DriverError::Launch("browser crashed on startup".to_string()));
        }
        let now = self.counters.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.max_open.fetch_max(now, Ordering::SeqCst);
        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        Ok(FakeSession {
            web: Arc::clone(&self.web),
            counters: Arc::clone(&self.counters),
            visited: Arc::clone(&self.visited),
            url: "about:blank".to_string(),
            html: String::new(),
            on_search: false,
            consent_visible: false,
            scrolls: 0,
            closed: false,
        })
    }
}

pub struct FakeSession {
    web: Arc<FakeWeb>,
    counters: Arc<Counters>,
    visited: Arc<Mutex<Vec<String>>>,
    url: String,
    html: String,
    on_search: bool,
    consent_visible: bool,
    scrolls: usize,
    closed: bool,
}

impl FakeSession {
    fn ensure_open(&self) -> Result<(), DriverError> {
        if self.closed {
            Err(DriverError::Closed)
        } else {
            Ok(())
        }
    }

    fn is_feed(&self, selector: &Selector) -> bool {
        self.on_search
            && matches!(selector, Selector::Css(css) if Some(css) == self.web.feed_css.as_ref())
    }

    fn feed_markup(&self) -> String {
        let shown = (self.scrolls + 1).min(self.web.batches.len());
        self.web.batches[..shown].concat()
    }
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<Snapshot, DriverError> {
        self.ensure_open()?;
        self.visited.lock().unwrap().push(url.to_string());
        if self.web.slow.contains(url) {
            return Err(DriverError::Timeout {
                action: "navigate",
                timeout,
            });
        }

        if url.starts_with(SEARCH_BASE) {
            if let Some(redirect) = &self.web.search_redirect {
                let page = &self.web.pages[redirect];
                self.url.clone_from(&page.landing);
                self.html.clone_from(&page.html);
                self.on_search = false;
            } else {
                self.url = url.to_string();
                self.html = "<html><body><div role=\"feed\"></div></body></html>".to_string();
                self.on_search = true;
                self.consent_visible = self.web.consent.is_some();
                self.scrolls = 0;
            }
            return Ok(Snapshot::new(&self.url, &self.html));
        }

        self.counters.place_visits.fetch_add(1, Ordering::SeqCst);
        let delay = self
            .web
            .delays
            .get(url)
            .copied()
            .unwrap_or(self.web.place_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.on_search = false;
        self.consent_visible = false;
        match self.web.pages.get(url) {
            Some(page) => {
                self.url.clone_from(&page.landing);
                self.html.clone_from(&page.html);
            }
            None => {
                self.url = url.to_string();
                self.html = "<html><body></body></html>".to_string();
            }
        }
        Ok(Snapshot::new(&self.url, &self.html))
    }

    async fn wait_for(
        &mut self,
        selector: &Selector,
        timeout: Duration,
    ) -> Result<bool, DriverError> {
        self.ensure_open()?;
        if self.consent_visible && self.web.consent.as_deref() == Some(&selector.to_string()) {
            return Ok(true);
        }
        if self.is_feed(selector) {
            return Ok(true);
        }
        let found =
            matches!(selector, Selector::Css(css) if css == "h1") && self.html.contains("<h1");
        if !found && self.web.waits_out_misses {
            tokio::time::sleep(timeout).await;
        }
        Ok(found)
    }

    async fn click(&mut self, selector: &Selector) -> Result<bool, DriverError> {
        self.ensure_open()?;
        if self.consent_visible && self.web.consent.as_deref() == Some(&selector.to_string()) {
            if !self.web.sticky_consent {
                self.consent_visible = false;
            }
            return Ok(true);
        }
        Ok(false)
    }

    async fn scroll(
        &mut self,
        selector: &Selector,
        _amount: Option<u32>,
    ) -> Result<(), DriverError> {
        self.ensure_open()?;
        if self.is_feed(selector) {
            if self
                .web
                .scroll_failure_after
                .is_some_and(|after| self.scrolls >= after)
            {
                return Err(DriverError::Protocol("target crashed".to_string()));
            }
            self.scrolls += 1;
        }
        Ok(())
    }

    async fn evaluate_text(&mut self, selector: &Selector) -> Result<Option<String>, DriverError> {
        self.ensure_open()?;
        if !self.is_feed(selector) {
            return Ok(None);
        }
        let at_end = self
            .web
            .end_after_scrolls
            .is_some_and(|after| self.scrolls >= after);
        Ok(Some(if at_end {
            "Results  You've reached the end of the list.".to_string()
        } else {
            "Results".to_string()
        }))
    }

    async fn inner_html(&mut self, selector: &Selector) -> Result<Option<String>, DriverError> {
        self.ensure_open()?;
        Ok(self.is_feed(selector).then(|| self.feed_markup()))
    }

    async fn snapshot(&mut self) -> Result<Snapshot, DriverError> {
        self.ensure_open()?;
        Ok(Snapshot::new(&self.url, &self.html))
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>, DriverError> {
        self.ensure_open()?;
        Ok(vec![0x89, b'P', b'N', b'G'])
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        if self.closed {
            return Err(DriverError::Closed);
        }
        self.closed = true;
        self.counters.open.fetch_sub(1, Ordering::SeqCst);
        self.counters.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
