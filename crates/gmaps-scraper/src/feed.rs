//! Results-feed pagination and listing discovery.

use std::collections::HashSet;
use std::sync::LazyLock;
use std::time::Duration;

use gmaps_core::ScraperConfig;
use regex::Regex;
use tokio::time::Instant;

use crate::driver::{BrowserSession, Selector};
use crate::error::ScraperError;
use crate::session_pool::PooledSession;
use crate::types::{normalize_href, PlaceRef};

/// Feed container selectors, semantic first.
pub const FEED_SELECTORS: [&str; 3] = [
    r#"[role="feed"]"#,
    r#"div[aria-label^="Results for"]"#,
    r#"div[role="main"] div[tabindex="-1"]"#,
];

const END_OF_LIST_MARKERS: [&str; 3] = [
    "You've reached the end of the list",
    "Has llegado al final de la lista",
    "Vous êtes arrivé à la fin de la liste",
];

const PLACE_PATH: &str = "/maps/place/";

static PLACE_HREF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"href\s*=\s*["']([^"']*/maps/place/[^"']*)["']"#).expect("valid regex")
});

/// Why discovery stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// `max_places` references collected.
    Cap,
    /// Several scrolls in a row surfaced nothing new.
    Stalled,
    /// The feed showed its end-of-list marker.
    EndOfList,
    /// The discovery deadline passed.
    Timeout,
    /// The search landed directly on a single place page.
    SinglePlace,
    /// The session failed mid-scroll; whatever was found is kept.
    Interrupted,
}

#[derive(Debug, Clone)]
pub struct Discovery {
    pub refs: Vec<PlaceRef>,
    pub stop: StopReason,
    pub scrolls: u32,
}

/// Scrolls one feed and indexes each listing the first time it is seen.
pub struct FeedPaginator {
    max_places: Option<usize>,
    stall_scrolls: u32,
    feed_timeout: Duration,
    discovery_timeout: Duration,
    until: Option<Instant>,
    seen: HashSet<String>,
    refs: Vec<PlaceRef>,
}

impl FeedPaginator {
    #[must_use]
    pub fn new(max_places: Option<usize>, config: &ScraperConfig) -> Self {
        Self {
            max_places,
            stall_scrolls: config.stall_scrolls.max(1),
            feed_timeout: config.feed_timeout,
            discovery_timeout: config.discovery_timeout,
            until: None,
            seen: HashSet::new(),
            refs: Vec::new(),
        }
    }

    /// Also stop at `until` if it comes before the discovery timeout.
    #[must_use]
    pub fn with_deadline(mut self, until: Instant) -> Self {
        self.until = Some(until);
        self
    }

    fn deadline(&self) -> Instant {
        let own = Instant::now() + self.discovery_timeout;
        self.until.map_or(own, |until| own.min(until))
    }

    fn cap_reached(&self) -> bool {
        self.max_places.is_some_and(|max| self.refs.len() >= max)
    }

    /// References discovered so far, in discovery order.
    #[must_use]
    pub fn refs(&self) -> &[PlaceRef] {
        &self.refs
    }

    /// Scans feed markup and appends every listing not seen before.
    /// Returns how many were new. Stops early once the cap is reached.
    pub fn ingest(&mut self, markup: &str) -> usize {
        let before = self.refs.len();
        for cap in PLACE_HREF_RE.captures_iter(markup) {
            if self.cap_reached() {
                break;
            }
            let Some(raw) = cap.get(1) else { continue };
            let normalized = normalize_href(raw.as_str());
            if !self.seen.insert(normalized.clone()) {
                continue;
            }
            let place = PlaceRef::new(&normalized, self.refs.len());
            tracing::trace!(
                discovery_index = place.discovery_index,
                href = %place.href,
                "listing discovered"
            );
            self.refs.push(place);
        }
        self.refs.len() - before
    }

    fn finish(self, stop: StopReason, scrolls: u32) -> Discovery {
        tracing::info!(
            discovered = self.refs.len(),
            scrolls,
            stop = ?stop,
            "discovery finished"
        );
        Discovery {
            refs: self.refs,
            stop,
            scrolls,
        }
    }

    /// Locates the first feed selector that matches.
    async fn locate_feed<S: BrowserSession>(
        &self,
        session: &mut PooledSession<S>,
    ) -> Result<Option<Selector>, ScraperError> {
        for css in FEED_SELECTORS {
            let selector = Selector::css(css);
            if session.wait_for(&selector, self.feed_timeout).await? {
                tracing::debug!(selector = css, "feed located");
                return Ok(Some(selector));
            }
            tracing::debug!(selector = css, "feed selector missed");
        }
        Ok(None)
    }

    /// Drives discovery on a session already showing the search results.
    ///
    /// # Errors
    ///
    /// [`ScraperError::FeedNotFound`] when no feed selector matches before
    /// the deadline and the page is not a single place. Driver failures
    /// while locating the feed propagate; failures after that end discovery
    /// with what was found.
    pub async fn discover<S: BrowserSession>(
        mut self,
        session: &mut PooledSession<S>,
    ) -> Result<Discovery, ScraperError> {
        let deadline = self.deadline();

        let located = match tokio::time::timeout_at(deadline, self.locate_feed(session)).await {
            Ok(located) => located?,
            Err(_) => {
                tracing::warn!("discovery deadline passed while locating the feed");
                None
            }
        };
        let Some(feed) = located else {
            let current = session.snapshot().await?;
            if current.url.contains(PLACE_PATH) {
                tracing::info!(url = %current.url, "search resolved to a single place");
                self.ingest(&format!(r#"href="{}""#, current.url));
                return Ok(self.finish(StopReason::SinglePlace, 0));
            }
            return Err(ScraperError::FeedNotFound {
                tried: FEED_SELECTORS.join(", "),
            });
        };

        match tokio::time::timeout_at(deadline, session.inner_html(&feed)).await {
            Ok(Ok(markup)) => {
                self.ingest(markup.as_deref().unwrap_or_default());
            }
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "initial feed scan failed");
                return Ok(self.finish(StopReason::Interrupted, 0));
            }
            Err(_) => return Ok(self.finish(StopReason::Timeout, 0)),
        }

        let mut scrolls = 0u32;
        let mut stalls = 0u32;
        loop {
            if self.cap_reached() {
                return Ok(self.finish(StopReason::Cap, scrolls));
            }
            if Instant::now() >= deadline {
                return Ok(self.finish(StopReason::Timeout, scrolls));
            }

            let step = tokio::time::timeout_at(deadline, self.scroll_once(session, &feed)).await;
            scrolls += 1;
            let (new, at_end) = match step {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(err)) => {
                    tracing::warn!(error = %err, scrolls, "feed scroll failed");
                    return Ok(self.finish(StopReason::Interrupted, scrolls));
                }
                Err(_) => return Ok(self.finish(StopReason::Timeout, scrolls)),
            };

            tracing::debug!(
                scrolls,
                new,
                discovered = self.refs.len(),
                "feed scrolled"
            );
            if self.cap_reached() {
                return Ok(self.finish(StopReason::Cap, scrolls));
            }
            if at_end {
                return Ok(self.finish(StopReason::EndOfList, scrolls));
            }
            stalls = if new == 0 { stalls + 1 } else { 0 };
            if stalls >= self.stall_scrolls {
                return Ok(self.finish(StopReason::Stalled, scrolls));
            }
        }
    }

    /// One paced scroll followed by a rescan. Returns the number of new
    /// references and whether the end-of-list marker is showing.
    async fn scroll_once<S: BrowserSession>(
        &mut self,
        session: &mut PooledSession<S>,
        feed: &Selector,
    ) -> Result<(usize, bool), ScraperError> {
        session.scroll(feed).await?;
        let markup = session.inner_html(feed).await?.unwrap_or_default();
        let new = self.ingest(&markup);
        let text = session.evaluate_text(feed).await?.unwrap_or_default();
        let at_end = END_OF_LIST_MARKERS
            .iter()
            .any(|marker| text.contains(marker));
        Ok((new, at_end))
    }
}
