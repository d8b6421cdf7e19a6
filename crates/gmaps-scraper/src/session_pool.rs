//! Bounded supply of browser sessions.
//!
//! A [`SessionPool`] hands out at most `capacity` sessions at a time. Each
//! session gets the next identity from the rotation and paces its scroll and
//! navigation actions. A slot whose session cannot be opened after the
//! configured retries is retired, shrinking effective concurrency; once
//! every slot is retired the pool fails all acquisitions.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use gmaps_core::ScraperConfig;
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};

use crate::driver::{
    BrowserDriver, BrowserSession, ClientIdentity, Selector, Snapshot, IDENTITY_POOL,
};
use crate::error::{DriverError, ScraperError};
use crate::rate_limit::{retry_with_backoff, Pacing};

const DRAIN_TIMEOUT: Duration = Duration::from_secs(15);

/// Live-session bookkeeping shared between the pool and its sessions.
#[derive(Default)]
struct Outstanding {
    count: AtomicUsize,
    drained: Notify,
}

impl Outstanding {
    fn checkout(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }

    fn checkin(&self) {
        if self.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.drained.notify_waiters();
        }
    }
}

pub struct SessionPool<D: BrowserDriver> {
    driver: Arc<D>,
    permits: Arc<Semaphore>,
    capacity: usize,
    headless: bool,
    pacing: Pacing,
    nav_timeout: Duration,
    init_retries: u32,
    init_backoff: Duration,
    identity_cursor: AtomicUsize,
    failed_slots: AtomicUsize,
    closed: AtomicBool,
    outstanding: Arc<Outstanding>,
}

impl<D: BrowserDriver> SessionPool<D> {
    /// Creates a pool of `capacity` slots (at least one).
    pub fn new(driver: Arc<D>, capacity: usize, headless: bool, config: &ScraperConfig) -> Self {
        let capacity = capacity.max(1);
        Self {
            driver,
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
            headless,
            pacing: Pacing::new(config.pacing_min, config.pacing_max),
            nav_timeout: config.nav_timeout,
            init_retries: config.session_init_retries,
            init_backoff: config.session_backoff,
            identity_cursor: AtomicUsize::new(rand::random_range(0..IDENTITY_POOL.len())),
            failed_slots: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
            outstanding: Arc::new(Outstanding::default()),
        }
    }

    /// Slots that have not been retired by initialisation failures.
    #[must_use]
    pub fn live_slots(&self) -> usize {
        self.capacity
            .saturating_sub(self.failed_slots.load(Ordering::SeqCst))
    }

    /// Sessions currently checked out.
    #[must_use]
    pub fn active(&self) -> usize {
        self.outstanding.count.load(Ordering::SeqCst)
    }

    fn next_identity(&self) -> ClientIdentity {
        let i = self.identity_cursor.fetch_add(1, Ordering::Relaxed);
        IDENTITY_POOL[i % IDENTITY_POOL.len()]
    }

    fn closed_error(&self) -> ScraperError {
        if self.live_slots() == 0 {
            ScraperError::AllSessionsFailed {
                slots: self.capacity,
            }
        } else {
            ScraperError::PoolClosed
        }
    }

    /// Waits for a free slot and opens a session in it.
    ///
    /// # Errors
    ///
    /// - [`ScraperError::SessionInit`] when this slot's session could not be
    ///   opened; the slot is retired but the pool stays usable.
    /// - [`ScraperError::AllSessionsFailed`] once every slot is retired.
    /// - [`ScraperError::PoolClosed`] after [`SessionPool::shutdown`].
    pub async fn acquire(&self) -> Result<PooledSession<D::Session>, ScraperError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(self.closed_error());
        }
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| self.closed_error())?;

        let identity = self.next_identity();
        let driver = &self.driver;
        let headless = self.headless;
        let identity_ref = &identity;
        let opened = retry_with_backoff(self.init_retries, self.init_backoff, move || {
            driver.open_session(headless, identity_ref)
        })
        .await;

        match opened {
            Ok(session) => {
                self.outstanding.checkout();
                tracing::debug!(
                    user_agent = identity.user_agent,
                    active = self.active(),
                    "session acquired"
                );
                Ok(PooledSession {
                    session: Some(session),
                    permit: Some(permit),
                    outstanding: Arc::clone(&self.outstanding),
                    pacing: self.pacing,
                    nav_timeout: self.nav_timeout,
                    identity,
                })
            }
            Err((err, attempts)) => {
                permit.forget();
                let failed = self.failed_slots.fetch_add(1, Ordering::SeqCst) + 1;
                tracing::warn!(
                    attempts,
                    failed_slots = failed,
                    capacity = self.capacity,
                    error = %err,
                    "session slot retired"
                );
                if failed >= self.capacity {
                    self.permits.close();
                }
                Err(ScraperError::SessionInit {
                    attempts,
                    reason: err.to_string(),
                })
            }
        }
    }

    /// Acquires, skipping past retired slots while any live slot remains.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::AllSessionsFailed`] or
    /// [`ScraperError::PoolClosed`] when no session can be had.
    pub async fn acquire_live(&self) -> Result<PooledSession<D::Session>, ScraperError> {
        loop {
            match self.acquire().await {
                Err(ScraperError::SessionInit { .. }) if self.live_slots() > 0 => {}
                Err(ScraperError::SessionInit { .. }) => {
                    return Err(ScraperError::AllSessionsFailed {
                        slots: self.capacity,
                    })
                }
                other => return other,
            }
        }
    }

    /// Closes `session` and frees its slot.
    pub async fn release(&self, session: PooledSession<D::Session>) {
        session.release().await;
    }

    /// Stops new acquisitions, waits for checked-out sessions to come back,
    /// then shuts the driver down. Safe to call more than once.
    pub async fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.permits.close();

        let drain = async {
            loop {
                let notified = self.outstanding.drained.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();
                if self.active() == 0 {
                    break;
                }
                notified.await;
            }
        };
        if tokio::time::timeout(DRAIN_TIMEOUT, drain).await.is_err() {
            tracing::warn!(
                active = self.active(),
                "sessions still checked out at shutdown"
            );
        }

        self.driver.shutdown().await;
        tracing::debug!("session pool shut down");
    }
}

/// A session on loan from a [`SessionPool`].
///
/// Dropping it without [`PooledSession::release`] still closes the session
/// and frees the slot from a background task, so cancelled workers never
/// leak a slot. The slot is freed only after the close completes.
pub struct PooledSession<S: BrowserSession> {
    session: Option<S>,
    permit: Option<OwnedSemaphorePermit>,
    outstanding: Arc<Outstanding>,
    pacing: Pacing,
    nav_timeout: Duration,
    identity: ClientIdentity,
}

impl<S: BrowserSession> PooledSession<S> {
    fn inner(&mut self) -> Result<&mut S, ScraperError> {
        self.session
            .as_mut()
            .ok_or(ScraperError::Driver(DriverError::Closed))
    }

    #[must_use]
    pub fn identity(&self) -> &ClientIdentity {
        &self.identity
    }

    /// Paced navigation.
    ///
    /// # Errors
    ///
    /// [`ScraperError::NavigationTimeout`] when the page does not load in
    /// time, [`ScraperError::Driver`] for anything else.
    pub async fn navigate(&mut self, url: &str) -> Result<Snapshot, ScraperError> {
        self.pacing.pause().await;
        let nav_timeout = self.nav_timeout;
        match self.inner()?.navigate(url, nav_timeout).await {
            Ok(snapshot) => Ok(snapshot),
            Err(err) if err.is_timeout() => Err(ScraperError::NavigationTimeout {
                url: url.to_string(),
            }),
            Err(err) => Err(err.into()),
        }
    }

    /// Paced scroll of the matched container to its bottom.
    ///
    /// # Errors
    ///
    /// Propagates driver failures.
    pub async fn scroll(&mut self, selector: &Selector) -> Result<(), ScraperError> {
        self.pacing.pause().await;
        Ok(self.inner()?.scroll(selector, None).await?)
    }

    /// # Errors
    ///
    /// Propagates driver failures.
    pub async fn wait_for(
        &mut self,
        selector: &Selector,
        timeout: Duration,
    ) -> Result<bool, ScraperError> {
        Ok(self.inner()?.wait_for(selector, timeout).await?)
    }

    /// # Errors
    ///
    /// Propagates driver failures.
    pub async fn click(&mut self, selector: &Selector) -> Result<bool, ScraperError> {
        Ok(self.inner()?.click(selector).await?)
    }

    /// # Errors
    ///
    /// Propagates driver failures.
    pub async fn evaluate_text(
        &mut self,
        selector: &Selector,
    ) -> Result<Option<String>, ScraperError> {
        Ok(self.inner()?.evaluate_text(selector).await?)
    }

    /// # Errors
    ///
    /// Propagates driver failures.
    pub async fn inner_html(
        &mut self,
        selector: &Selector,
    ) -> Result<Option<String>, ScraperError> {
        Ok(self.inner()?.inner_html(selector).await?)
    }

    /// # Errors
    ///
    /// Propagates driver failures.
    pub async fn snapshot(&mut self) -> Result<Snapshot, ScraperError> {
        Ok(self.inner()?.snapshot().await?)
    }

    /// # Errors
    ///
    /// Propagates driver failures.
    pub async fn screenshot(&mut self) -> Result<Vec<u8>, ScraperError> {
        Ok(self.inner()?.screenshot().await?)
    }

    /// Closes the session, then frees the slot.
    pub async fn release(mut self) {
        if let Some(mut session) = self.session.take() {
            if let Err(err) = session.close().await {
                tracing::debug!(error = %err, "session close failed");
            }
            self.outstanding.checkin();
        }
        self.permit.take();
    }
}

impl<S: BrowserSession> Drop for PooledSession<S> {
    fn drop(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        let permit = self.permit.take();
        let outstanding = Arc::clone(&self.outstanding);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(err) = session.close().await {
                        tracing::debug!(error = %err, "session close after drop failed");
                    }
                    outstanding.checkin();
                    drop(permit);
                });
            }
            Err(_) => {
                outstanding.checkin();
                drop(permit);
            }
        }
    }
}
