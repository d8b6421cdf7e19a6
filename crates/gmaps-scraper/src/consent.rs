//! Consent interstitial detection and dismissal.
//!
//! Run once on the discovery session right after the search page loads.
//! Absence of a dialog, and failure to dismiss one, are both non-fatal.

use std::time::Duration;

use gmaps_core::{ConsentState, SearchRequest};
use tokio::time::Instant;

use crate::driver::{BrowserSession, Selector};
use crate::error::ScraperError;
use crate::session_pool::PooledSession;

const POLL_INTERVAL: Duration = Duration::from_millis(250);
const VERIFY_WINDOW: Duration = Duration::from_secs(2);
const DISMISS_ATTEMPTS: u32 = 2;

/// `(language, accept label, reject label)`.
const LOCALE_LABELS: [(&str, &str, &str); 7] = [
    ("en", "Accept all", "Reject all"),
    ("es", "Aceptar todo", "Rechazar todo"),
    ("fr", "Tout accepter", "Tout refuser"),
    ("de", "Alle akzeptieren", "Alle ablehnen"),
    ("it", "Accetta tutto", "Rifiuta tutto"),
    ("pt", "Aceitar tudo", "Rejeitar tudo"),
    ("nl", "Alles accepteren", "Alles afwijzen"),
];
const GENERIC_LABELS: [&str; 3] = ["Accept", "I agree", "Agree"];

/// Ordered label list for the primary language subtag `primary`: its own
/// accept/reject labels, the other languages', then the generic ones.
fn labels_for(primary: &str) -> Vec<&'static str> {
    let (own, others): (Vec<_>, Vec<_>) = LOCALE_LABELS
        .iter()
        .partition(|(code, _, _)| code.eq_ignore_ascii_case(primary));

    own.iter()
        .chain(others.iter())
        .flat_map(|(_, accept, reject)| [*accept, *reject])
        .chain(GENERIC_LABELS)
        .collect()
}

/// Every way a consent button with `label` may be rendered.
fn selectors_for(label: &str) -> [Selector; 3] {
    [
        Selector::css(format!(r#"button[aria-label="{label}"]"#)),
        Selector::css(format!(r#"input[type="submit"][value="{label}"]"#)),
        Selector::text("button", label),
    ]
}

pub struct ConsentHandler {
    strategies: Vec<Selector>,
    timeout: Duration,
    state: ConsentState,
}

impl ConsentHandler {
    /// Builds the detection chain for the request's language with a
    /// `timeout` detection window.
    #[must_use]
    pub fn for_request(request: &SearchRequest, timeout: Duration) -> Self {
        Self::new(&request.primary_lang(), timeout)
    }

    /// Builds the detection chain for a primary language subtag.
    #[must_use]
    pub fn new(primary_lang: &str, timeout: Duration) -> Self {
        let strategies = labels_for(primary_lang)
            .into_iter()
            .flat_map(selectors_for)
            .collect();
        Self {
            strategies,
            timeout,
            state: ConsentState::NotChecked,
        }
    }

    /// Detection selectors in the order they are tried.
    #[must_use]
    pub fn strategies(&self) -> &[Selector] {
        &self.strategies
    }

    #[must_use]
    pub fn state(&self) -> ConsentState {
        self.state
    }

    fn transition(&mut self, next: ConsentState) {
        tracing::debug!(from = ?self.state, to = ?next, "consent state");
        self.state = next;
    }

    /// Detects and dismisses a consent dialog on the current page.
    ///
    /// Always returns a terminal state: [`ConsentState::NotPresent`],
    /// [`ConsentState::Dismissed`], or [`ConsentState::NotHandled`].
    pub async fn run<S: BrowserSession>(
        &mut self,
        session: &mut PooledSession<S>,
    ) -> ConsentState {
        match self.drive(session).await {
            Ok(state) => state,
            Err(err) => {
                tracing::warn!(error = %err, "consent handling aborted");
                self.transition(ConsentState::NotHandled);
                self.state
            }
        }
    }

    async fn drive<S: BrowserSession>(
        &mut self,
        session: &mut PooledSession<S>,
    ) -> Result<ConsentState, ScraperError> {
        let Some(found) = self.detect(session).await? else {
            self.transition(ConsentState::NotPresent);
            return Ok(self.state);
        };
        self.transition(ConsentState::ConsentPresent);
        tracing::info!(selector = %found, "consent dialog detected");

        for attempt in 1..=DISMISS_ATTEMPTS {
            session.click(&found).await?;
            if wait_until_gone(session, &found, VERIFY_WINDOW.min(self.timeout)).await? {
                tracing::info!(attempt, "consent dialog dismissed");
                self.transition(ConsentState::Dismissed);
                return Ok(self.state);
            }
            tracing::debug!(attempt, "consent dialog still visible after click");
        }

        let err = ScraperError::ConsentNotHandled(format!(
            "{found} still present after {DISMISS_ATTEMPTS} attempts"
        ));
        tracing::warn!(error = %err, "continuing without dismissing consent dialog");
        self.transition(ConsentState::NotHandled);
        Ok(self.state)
    }

    /// Polls every strategy until one matches or the window closes.
    async fn detect<S: BrowserSession>(
        &self,
        session: &mut PooledSession<S>,
    ) -> Result<Option<Selector>, ScraperError> {
        let deadline = Instant::now() + self.timeout;
        loop {
            for selector in &self.strategies {
                if session.wait_for(selector, Duration::ZERO).await? {
                    return Ok(Some(selector.clone()));
                }
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
        }
    }
}

async fn wait_until_gone<S: BrowserSession>(
    session: &mut PooledSession<S>,
    selector: &Selector,
    window: Duration,
) -> Result<bool, ScraperError> {
    let deadline = Instant::now() + window;
    loop {
        if !session.wait_for(selector, Duration::ZERO).await? {
            return Ok(true);
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(false);
        }
        tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
    }
}
