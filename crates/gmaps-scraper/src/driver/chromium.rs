//! Chrome DevTools Protocol driver backed by `chromiumoxide`.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use super::{BrowserDriver, BrowserSession, ClientIdentity, Selector, Snapshot};
use crate::error::DriverError;

const POLL_INTERVAL: Duration = Duration::from_millis(250);
const LAUNCH_ARGS: [&str; 3] = [
    "--disable-dev-shm-usage",
    "--no-sandbox",
    "--disable-setuid-sandbox",
];

fn protocol(err: impl std::fmt::Display) -> DriverError {
    DriverError::Protocol(err.to_string())
}

/// One browser serves every session, so a later request for the other
/// display mode cannot be honoured. Returns whether the modes differ.
fn warn_on_headless_mismatch(running: bool, requested: bool) -> bool {
    if running == requested {
        return false;
    }
    tracing::warn!(
        requested,
        running,
        "browser already running with a different headless flag; reusing it"
    );
    true
}

struct LaunchedBrowser {
    browser: Browser,
    handler: JoinHandle<()>,
    headless: bool,
}

/// Launches one Chromium process lazily on the first session request and
/// hands out one tab per session.
pub struct ChromiumDriver {
    chrome_executable: Option<PathBuf>,
    browser: Mutex<Option<LaunchedBrowser>>,
}

impl ChromiumDriver {
    #[must_use]
    pub fn new(chrome_executable: Option<PathBuf>) -> Self {
        Self {
            chrome_executable,
            browser: Mutex::new(None),
        }
    }

    async fn launch(&self, headless: bool) -> Result<LaunchedBrowser, DriverError> {
        let mut builder = BrowserConfig::builder().args(LAUNCH_ARGS);
        if !headless {
            builder = builder.with_head();
        }
        if let Some(path) = &self.chrome_executable {
            builder = builder.chrome_executable(path);
        }
        let config = builder.build().map_err(DriverError::Launch)?;

        let (browser, mut events) = Browser::launch(config)
            .await
            .map_err(|e| DriverError::Launch(e.to_string()))?;
        let handler = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if let Err(err) = event {
                    tracing::debug!(error = %err, "browser event loop ended");
                    break;
                }
            }
        });

        tracing::info!(headless, "launched chromium");
        Ok(LaunchedBrowser {
            browser,
            handler,
            headless,
        })
    }
}

#[async_trait]
impl BrowserDriver for ChromiumDriver {
    type Session = ChromiumSession;

    async fn open_session(
        &self,
        headless: bool,
        identity: &ClientIdentity,
    ) -> Result<ChromiumSession, DriverError> {
        let mut guard = self.browser.lock().await;
        if guard.is_none() {
            *guard = Some(self.launch(headless).await?);
        }
        let launched = guard.as_ref().ok_or(DriverError::Closed)?;
        warn_on_headless_mismatch(launched.headless, headless);

        let page = launched
            .browser
            .new_page("about:blank")
            .await
            .map_err(protocol)?;
        drop(guard);

        page.set_user_agent(SetUserAgentOverrideParams::new(identity.user_agent))
            .await
            .map_err(protocol)?;
        let (width, height) = identity.viewport;
        page.execute(SetDeviceMetricsOverrideParams::new(
            i64::from(width),
            i64::from(height),
            1.0,
            false,
        ))
        .await
        .map_err(protocol)?;

        Ok(ChromiumSession { page: Some(page) })
    }

    async fn shutdown(&self) {
        let Some(mut launched) = self.browser.lock().await.take() else {
            return;
        };
        if let Err(err) = launched.browser.close().await {
            tracing::warn!(error = %err, "failed to close chromium cleanly");
        }
        if let Err(err) = launched.browser.wait().await {
            tracing::debug!(error = %err, "waiting for chromium exit failed");
        }
        launched.handler.abort();
    }
}

/// JS expression evaluating to the first element matching `selector`, or `null`.
fn js_query(selector: &Selector) -> String {
    let lit = |s: &str| serde_json::Value::from(s).to_string();
    match selector {
        Selector::Css(css) => format!("document.querySelector({})", lit(css)),
        Selector::Text { tag, text } => format!(
            "(Array.from(document.querySelectorAll({})).find(e => String(e.innerText || e.value || '').trim() === {}) || null)",
            lit(tag),
            lit(text)
        ),
    }
}

pub struct ChromiumSession {
    page: Option<Page>,
}

impl ChromiumSession {
    fn page(&self) -> Result<&Page, DriverError> {
        self.page.as_ref().ok_or(DriverError::Closed)
    }

    async fn eval<T: DeserializeOwned>(&self, expression: String) -> Result<T, DriverError> {
        self.page()?
            .evaluate(expression)
            .await
            .map_err(protocol)?
            .into_value::<T>()
            .map_err(protocol)
    }

    async fn exists(&self, selector: &Selector) -> Result<bool, DriverError> {
        self.eval(format!("{} !== null", js_query(selector))).await
    }
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<Snapshot, DriverError> {
        let page = self.page()?;
        tokio::time::timeout(timeout, page.goto(url))
            .await
            .map_err(|_| DriverError::Timeout {
                action: "navigate",
                timeout,
            })?
            .map_err(protocol)?;
        self.snapshot().await
    }

    async fn wait_for(
        &mut self,
        selector: &Selector,
        timeout: Duration,
    ) -> Result<bool, DriverError> {
        let started = Instant::now();
        loop {
            if self.exists(selector).await? {
                return Ok(true);
            }
            let elapsed = started.elapsed();
            if elapsed >= timeout {
                return Ok(false);
            }
            tokio::time::sleep(POLL_INTERVAL.min(timeout - elapsed)).await;
        }
    }

    async fn click(&mut self, selector: &Selector) -> Result<bool, DriverError> {
        self.eval(format!(
            "(() => {{ const el = {}; if (!el) return false; el.click(); return true; }})()",
            js_query(selector)
        ))
        .await
    }

    async fn scroll(
        &mut self,
        selector: &Selector,
        amount: Option<u32>,
    ) -> Result<(), DriverError> {
        let step = amount.map_or_else(|| "el.scrollHeight".to_string(), |px| px.to_string());
        let scrolled: bool = self
            .eval(format!(
                "(() => {{ const el = {}; if (!el) return false; el.scrollTop = el.scrollTop + {step}; return true; }})()",
                js_query(selector)
            ))
            .await?;
        if scrolled {
            Ok(())
        } else {
            Err(DriverError::Protocol(format!(
                "scroll target {selector} not found"
            )))
        }
    }

    async fn evaluate_text(&mut self, selector: &Selector) -> Result<Option<String>, DriverError> {
        self.eval(format!(
            "(() => {{ const el = {}; return el ? String(el.innerText || el.value || '') : null; }})()",
            js_query(selector)
        ))
        .await
    }

    async fn inner_html(&mut self, selector: &Selector) -> Result<Option<String>, DriverError> {
        self.eval(format!(
            "(() => {{ const el = {}; return el ? el.innerHTML : null; }})()",
            js_query(selector)
        ))
        .await
    }

    async fn snapshot(&mut self) -> Result<Snapshot, DriverError> {
        let page = self.page()?;
        let html = page.content().await.map_err(protocol)?;
        let url = page.url().await.map_err(protocol)?.unwrap_or_default();
        Ok(Snapshot { url, html })
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>, DriverError> {
        self.page()?
            .screenshot(ScreenshotParams::builder().full_page(true).build())
            .await
            .map_err(protocol)
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        match self.page.take() {
            Some(page) => page.close().await.map_err(protocol),
            None => Ok(()),
        }
    }
}
