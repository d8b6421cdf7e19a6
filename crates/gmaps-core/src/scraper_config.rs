//! Tunables for one scraping engine instance.

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://www.google.com/maps/search/";

/// Engine settings. [`Default`] mirrors the env-var defaults in
/// [`crate::load_app_config`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScraperConfig {
    pub base_url: String,
    /// Per-navigation timeout.
    pub nav_timeout: Duration,
    /// Global job deadline; on expiry in-flight extraction is cancelled and
    /// partial results are returned.
    pub job_timeout: Duration,
    /// Deadline for the discovery (feed scrolling) phase.
    pub discovery_timeout: Duration,
    /// Window in which a consent dialog is looked for.
    pub consent_timeout: Duration,
    /// Wait per feed selector in the fallback chain.
    pub feed_timeout: Duration,
    /// Wait for the place heading after navigating to a listing.
    pub place_settle_timeout: Duration,
    pub pacing_min: Duration,
    pub pacing_max: Duration,
    /// Consecutive scrolls without new references that mean end-of-list.
    pub stall_scrolls: u32,
    /// Additional attempts when opening a session fails.
    pub session_init_retries: u32,
    /// Backoff base; doubled on every retry.
    pub session_backoff: Duration,
    /// Where diagnostic snapshots go; `None` disables them.
    pub diagnostics_dir: Option<PathBuf>,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            nav_timeout: Duration::from_secs(30),
            job_timeout: Duration::from_secs(600),
            discovery_timeout: Duration::from_secs(180),
            consent_timeout: Duration::from_millis(5_000),
            feed_timeout: Duration::from_millis(10_000),
            place_settle_timeout: Duration::from_millis(5_000),
            pacing_min: Duration::from_millis(1_000),
            pacing_max: Duration::from_millis(2_000),
            stall_scrolls: 3,
            session_init_retries: 3,
            session_backoff: Duration::from_millis(500),
            diagnostics_dir: None,
        }
    }
}
