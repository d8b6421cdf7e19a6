use std::time::Duration;

use thiserror::Error;

/// Failures reported by a browser automation driver.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("browser launch failed: {0}")]
    Launch(String),

    #[error("timed out after {timeout:?} during {action}")]
    Timeout {
        action: &'static str,
        timeout: Duration,
    },

    #[error("browser protocol error: {0}")]
    Protocol(String),

    #[error("session already closed")]
    Closed,
}

impl DriverError {
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("could not open a browser session after {attempts} attempt(s): {reason}")]
    SessionInit { attempts: u32, reason: String },

    #[error("all {slots} browser session slot(s) failed to initialise")]
    AllSessionsFailed { slots: usize },

    #[error("session pool is shut down")]
    PoolClosed,

    #[error("feed element not found (tried {tried})")]
    FeedNotFound { tried: String },

    #[error("consent dialog not handled: {0}")]
    ConsentNotHandled(String),

    #[error("navigation to {url} timed out")]
    NavigationTimeout { url: String },

    #[error("extraction failed for {link}: {reason}")]
    ExtractionFailed { link: String, reason: String },

    #[error("job timed out after {}s", .0.as_secs())]
    JobTimeout(Duration),

    #[error("driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("diagnostic snapshot write failed for {path}: {source}")]
    Diagnostics {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl ScraperError {
    /// Whether this failure ends the whole job rather than one slot or place.
    #[must_use]
    pub fn is_job_fatal(&self) -> bool {
        matches!(
            self,
            Self::FeedNotFound { .. } | Self::AllSessionsFailed { .. } | Self::PoolClosed
        )
    }
}
