use std::path::PathBuf;
use std::time::Duration;

use crate::scraper_config::ScraperConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub log_level: String,
    pub base_url: String,
    pub chrome_executable: Option<PathBuf>,
    pub diagnostics_dir: Option<PathBuf>,
    pub nav_timeout_secs: u64,
    pub job_timeout_secs: u64,
    pub discovery_timeout_secs: u64,
    pub consent_timeout_ms: u64,
    pub feed_timeout_ms: u64,
    pub place_settle_timeout_ms: u64,
    pub pacing_min_ms: u64,
    pub pacing_max_ms: u64,
    pub stall_scrolls: u32,
    pub session_init_retries: u32,
    pub session_backoff_ms: u64,
}

impl AppConfig {
    /// Engine-facing subset of the configuration.
    #[must_use]
    pub fn scraper_config(&self) -> ScraperConfig {
        ScraperConfig {
            base_url: self.base_url.clone(),
            nav_timeout: Duration::from_secs(self.nav_timeout_secs),
            job_timeout: Duration::from_secs(self.job_timeout_secs),
            discovery_timeout: Duration::from_secs(self.discovery_timeout_secs),
            consent_timeout: Duration::from_millis(self.consent_timeout_ms),
            feed_timeout: Duration::from_millis(self.feed_timeout_ms),
            place_settle_timeout: Duration::from_millis(self.place_settle_timeout_ms),
            pacing_min: Duration::from_millis(self.pacing_min_ms),
            pacing_max: Duration::from_millis(self.pacing_max_ms),
            stall_scrolls: self.stall_scrolls,
            session_init_retries: self.session_init_retries,
            session_backoff: Duration::from_millis(self.session_backoff_ms),
            diagnostics_dir: self.diagnostics_dir.clone(),
        }
    }
}
