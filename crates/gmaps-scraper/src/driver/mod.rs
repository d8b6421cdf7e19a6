//! Browser automation capability set.
//!
//! The engine only ever talks to a browser through [`BrowserDriver`] and
//! [`BrowserSession`]. [`chromium::ChromiumDriver`] is the production
//! implementation; tests plug in an in-memory fake.

pub mod chromium;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::DriverError;

pub use chromium::ChromiumDriver;

/// How to locate an element on the page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    /// A CSS selector.
    Css(String),
    /// First `tag` element whose trimmed visible text (or `value`) is exactly `text`.
    Text { tag: String, text: String },
}

impl Selector {
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    #[must_use]
    pub fn text(tag: impl Into<String>, text: impl Into<String>) -> Self {
        Self::Text {
            tag: tag.into(),
            text: text.into(),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css(css) => write!(f, "css:{css}"),
            Self::Text { tag, text } => write!(f, "text:{tag}:{text}"),
        }
    }
}

/// Raw page capture: markup plus the URL the browser ended up on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub url: String,
    pub html: String,
}

impl Snapshot {
    #[must_use]
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            html: html.into(),
        }
    }
}

/// Synthetic client identity applied to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientIdentity {
    pub user_agent: &'static str,
    pub viewport: (u32, u32),
}

/// Fixed identity pool sessions rotate through.
pub const IDENTITY_POOL: [ClientIdentity; 3] = [
    ClientIdentity {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        viewport: (1366, 768),
    },
    ClientIdentity {
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        viewport: (1440, 900),
    },
    ClientIdentity {
        user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        viewport: (1920, 1080),
    },
];

/// Opens browser sessions.
#[async_trait]
pub trait BrowserDriver: Send + Sync + 'static {
    type Session: BrowserSession;

    async fn open_session(
        &self,
        headless: bool,
        identity: &ClientIdentity,
    ) -> Result<Self::Session, DriverError>;

    /// Releases driver-wide resources (the browser process). Called once
    /// after every session has been closed.
    async fn shutdown(&self) {}
}

/// One browser tab/context.
#[async_trait]
pub trait BrowserSession: Send + 'static {
    /// Navigates and returns the page once the document has loaded.
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<Snapshot, DriverError>;

    /// Waits up to `timeout` for `selector` to match. `Ok(false)` means it
    /// never appeared. A zero timeout checks exactly once.
    async fn wait_for(&mut self, selector: &Selector, timeout: Duration)
        -> Result<bool, DriverError>;

    /// Clicks the first match. `Ok(false)` when nothing matched.
    async fn click(&mut self, selector: &Selector) -> Result<bool, DriverError>;

    /// Scrolls the matched container by `amount` pixels, or to its bottom
    /// when `amount` is `None`.
    async fn scroll(&mut self, selector: &Selector, amount: Option<u32>)
        -> Result<(), DriverError>;

    /// Visible text of the first match.
    async fn evaluate_text(&mut self, selector: &Selector) -> Result<Option<String>, DriverError>;

    /// Inner markup of the first match.
    async fn inner_html(&mut self, selector: &Selector) -> Result<Option<String>, DriverError>;

    /// Current page markup and URL.
    async fn snapshot(&mut self) -> Result<Snapshot, DriverError>;

    async fn screenshot(&mut self) -> Result<Vec<u8>, DriverError>;

    /// Closes the session. Further calls fail with [`DriverError::Closed`].
    async fn close(&mut self) -> Result<(), DriverError>;
}
