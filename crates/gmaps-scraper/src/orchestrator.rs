//! Job lifecycle: discovery on one session, extraction across the pool.
//!
//! [`run_search`] never fails. Job-level errors become a failed
//! [`SearchResult`]; a job timeout returns whatever was collected so far.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use gmaps_core::{JobState, PlaceRecord, ScraperConfig, SearchMeta, SearchRequest, SearchResult};
use tokio::time::Instant;
use uuid::Uuid;

use crate::aggregate::{Aggregate, ResultAggregator};
use crate::consent::ConsentHandler;
use crate::diagnostics::DiagnosticSink;
use crate::driver::{BrowserDriver, BrowserSession, Selector, Snapshot};
use crate::error::ScraperError;
use crate::extract::{ExtractionOutcome, ExtractionPipeline};
use crate::feed::FeedPaginator;
use crate::session_pool::{PooledSession, SessionPool};
use crate::types::{search_url, PlaceRef};

const PLACE_HEADING: &str = "h1";

/// Runs one search job to completion with a fresh session pool.
pub async fn run_search<D: BrowserDriver>(
    driver: Arc<D>,
    request: SearchRequest,
    config: &ScraperConfig,
) -> SearchResult {
    Orchestrator::new(driver, config.clone()).run(&request).await
}

/// What a single extraction task produced.
enum PlaceOutcome {
    Extracted(PlaceRecord),
    Skipped(String),
    /// No session can be had any more; the job cannot continue.
    Fatal(ScraperError),
}

/// Per-job state: identity, request, the bounded pool and the metadata
/// reported back to the caller.
struct Job<'r, D: BrowserDriver> {
    request: &'r SearchRequest,
    pool: SessionPool<D>,
    meta: SearchMeta,
    started: Instant,
    deadline: Instant,
}

impl<D: BrowserDriver> Job<'_, D> {
    fn transition(&mut self, next: JobState) {
        tracing::info!(
            job_id = %self.meta.job_id,
            query = self.request.query(),
            from = ?self.meta.state,
            to = ?next,
            "job state"
        );
        self.meta.state = next;
    }

    fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

pub struct Orchestrator<D: BrowserDriver> {
    driver: Arc<D>,
    config: ScraperConfig,
    pipeline: ExtractionPipeline,
    diagnostics: Option<DiagnosticSink>,
}

impl<D: BrowserDriver> Orchestrator<D> {
    #[must_use]
    pub fn new(driver: Arc<D>, config: ScraperConfig) -> Self {
        let diagnostics = config.diagnostics_dir.clone().map(DiagnosticSink::new);
        Self {
            driver,
            config,
            pipeline: ExtractionPipeline::new(),
            diagnostics,
        }
    }

    /// Runs `request` and always returns a well-formed result. Every
    /// session is released before this returns.
    pub async fn run(&self, request: &SearchRequest) -> SearchResult {
        let started = Instant::now();
        let mut job = Job {
            request,
            pool: SessionPool::new(
                Arc::clone(&self.driver),
                request.concurrency(),
                request.headless(),
                &self.config,
            ),
            meta: SearchMeta::new(Uuid::new_v4()),
            started,
            deadline: started + self.config.job_timeout,
        };
        tracing::info!(
            job_id = %job.meta.job_id,
            query = request.query(),
            max_places = ?request.max_places(),
            concurrency = request.concurrency(),
            "job created"
        );

        let outcome = self.execute(&mut job).await;
        job.pool.shutdown().await;
        job.meta.elapsed_ms = job.elapsed_ms();

        match outcome {
            Ok(aggregate) => self.completed(job, aggregate),
            Err(err) => {
                tracing::error!(job_id = %job.meta.job_id, error = %err, "job failed");
                job.transition(JobState::Failed);
                SearchResult::failed(request.query(), err.to_string(), job.meta)
            }
        }
    }

    fn completed(&self, mut job: Job<'_, D>, aggregate: Aggregate) -> SearchResult {
        job.transition(JobState::Completed);
        let Aggregate {
            records,
            counts,
            legacy_fields,
        } = aggregate;
        job.meta.discovered = counts.discovered;
        job.meta.extracted = counts.extracted;
        job.meta.skipped = counts.skipped;
        job.meta.deduped = counts.deduped;
        job.meta.legacy_fields = legacy_fields;

        let error = job
            .meta
            .timed_out
            .then(|| ScraperError::JobTimeout(self.config.job_timeout).to_string());
        tracing::info!(
            job_id = %job.meta.job_id,
            results = records.len(),
            discovered = counts.discovered,
            skipped = counts.skipped,
            deduped = counts.deduped,
            timed_out = job.meta.timed_out,
            elapsed_ms = job.meta.elapsed_ms,
            "job completed"
        );
        SearchResult {
            success: !job.meta.timed_out,
            query: job.request.query().to_string(),
            total_results: records.len(),
            results: records,
            error,
            metadata: job.meta,
        }
    }

    async fn execute(&self, job: &mut Job<'_, D>) -> Result<Aggregate, ScraperError> {
        job.transition(JobState::Discovering);
        let refs = self.discover(job).await?;
        job.meta.discovered = refs.len();
        if Instant::now() >= job.deadline {
            tracing::warn!(
                job_id = %job.meta.job_id,
                discovered = refs.len(),
                "job timed out during discovery"
            );
            job.meta.timed_out = true;
            return Ok(ResultAggregator::new(refs.len(), job.request.max_places()).finish());
        }

        job.transition(JobState::Extracting);
        self.extract_all(job, refs).await
    }

    /// Opens the search page, clears consent, and scrolls the feed. Stops at
    /// the job deadline with whatever listings were found by then.
    async fn discover(&self, job: &mut Job<'_, D>) -> Result<Vec<PlaceRef>, ScraperError> {
        let deadline = job.deadline;
        let mut session = match tokio::time::timeout_at(deadline, self.open_search(job)).await {
            Ok(session) => session?,
            Err(_) => return Ok(Vec::new()),
        };

        let discovery = FeedPaginator::new(job.request.max_places(), &self.config)
            .with_deadline(deadline)
            .discover(&mut session)
            .await;
        session.release().await;
        match discovery {
            Ok(discovery) => Ok(discovery.refs),
            // The feed lookup was cut short by the job deadline, not missing.
            Err(ScraperError::FeedNotFound { .. }) if Instant::now() >= deadline => Ok(Vec::new()),
            Err(err) => Err(err),
        }
    }

    /// A session showing the search results with consent handled.
    async fn open_search(
        &self,
        job: &mut Job<'_, D>,
    ) -> Result<PooledSession<D::Session>, ScraperError> {
        let request = job.request;
        let mut session = job.pool.acquire_live().await?;
        let url = search_url(&self.config.base_url, request.query(), request.lang());
        tracing::debug!(
            job_id = %job.meta.job_id,
            url = %url,
            user_agent = session.identity().user_agent,
            "opening search page"
        );
        navigate_with_retry(&mut session, &url).await?;

        let mut consent = ConsentHandler::for_request(request, self.config.consent_timeout);
        job.meta.consent = consent.run(&mut session).await;
        Ok(session)
    }

    async fn extract_all(
        &self,
        job: &mut Job<'_, D>,
        refs: Vec<PlaceRef>,
    ) -> Result<Aggregate, ScraperError> {
        let mut aggregator = ResultAggregator::new(refs.len(), job.request.max_places());
        let pool = &job.pool;
        let mut tasks = stream::iter(refs)
            .map(|place| async move {
                let index = place.discovery_index;
                (index, self.extract_place(pool, place).await)
            })
            .buffer_unordered(job.request.concurrency());

        let mut fatal = None;
        let mut timed_out = false;
        loop {
            match tokio::time::timeout_at(job.deadline, tasks.next()).await {
                Ok(Some((index, PlaceOutcome::Extracted(record)))) => {
                    aggregator.record(index, record);
                }
                Ok(Some((index, PlaceOutcome::Skipped(reason)))) => {
                    aggregator.skip(index, &reason);
                }
                Ok(Some((_, PlaceOutcome::Fatal(err)))) => {
                    fatal = Some(err);
                    break;
                }
                Ok(None) => break,
                Err(_) => {
                    timed_out = true;
                    break;
                }
            }
        }
        drop(tasks);

        if let Some(err) = fatal {
            return Err(err);
        }
        if timed_out {
            let counts = aggregator.counts();
            tracing::warn!(
                job_id = %job.meta.job_id,
                extracted = counts.extracted,
                skipped = counts.skipped,
                "job timed out; cancelled in-flight extractions"
            );
            job.meta.timed_out = true;
        }
        Ok(aggregator.finish())
    }

    /// Extracts one place on its own pooled session.
    async fn extract_place(&self, pool: &SessionPool<D>, place: PlaceRef) -> PlaceOutcome {
        let mut session = match pool.acquire_live().await {
            Ok(session) => session,
            Err(err) if err.is_job_fatal() => return PlaceOutcome::Fatal(err),
            Err(err) => return PlaceOutcome::Skipped(err.to_string()),
        };

        let outcome = match self.load_place(&mut session, &place.href).await {
            Ok(snapshot) => self.extract_snapshot(&mut session, &place, &snapshot).await,
            Err(err) => {
                tracing::warn!(
                    discovery_index = place.discovery_index,
                    link = %place.href,
                    error = %err,
                    "place skipped"
                );
                PlaceOutcome::Skipped(err.to_string())
            }
        };
        session.release().await;
        outcome
    }

    /// Navigates to the place (one retry on timeout), lets the heading
    /// render, and captures the page.
    async fn load_place(
        &self,
        session: &mut PooledSession<D::Session>,
        href: &str,
    ) -> Result<Snapshot, ScraperError> {
        navigate_with_retry(session, href).await?;
        let heading = Selector::css(PLACE_HEADING);
        if !session
            .wait_for(&heading, self.config.place_settle_timeout)
            .await?
        {
            tracing::debug!(link = href, "place heading did not appear");
        }
        session.snapshot().await
    }

    async fn extract_snapshot(
        &self,
        session: &mut PooledSession<D::Session>,
        place: &PlaceRef,
        snapshot: &Snapshot,
    ) -> PlaceOutcome {
        match self.pipeline.extract(snapshot, Some(&place.href)) {
            ExtractionOutcome::Failed { reason } => {
                let err = ScraperError::ExtractionFailed {
                    link: place.href.clone(),
                    reason,
                };
                tracing::warn!(
                    discovery_index = place.discovery_index,
                    error = %err,
                    "extraction failed"
                );
                self.capture(session, &place.href, snapshot).await;
                PlaceOutcome::Skipped(err.to_string())
            }
            outcome => {
                if let ExtractionOutcome::Partial { missing, .. } = &outcome {
                    tracing::debug!(
                        discovery_index = place.discovery_index,
                        missing = missing.len(),
                        "partial record"
                    );
                }
                match outcome.into_record() {
                    Some(record) => PlaceOutcome::Extracted(record),
                    None => PlaceOutcome::Skipped("no record".to_string()),
                }
            }
        }
    }

    /// Best-effort diagnostic snapshot; failures are only logged.
    async fn capture<S: BrowserSession>(
        &self,
        session: &mut PooledSession<S>,
        link: &str,
        snapshot: &Snapshot,
    ) {
        let Some(sink) = &self.diagnostics else {
            return;
        };
        let screenshot = match session.screenshot().await {
            Ok(png) => Some(png),
            Err(err) => {
                tracing::debug!(link, error = %err, "screenshot unavailable");
                None
            }
        };
        if let Err(err) = sink.write(link, &snapshot.html, screenshot.as_deref()).await {
            tracing::warn!(link, error = %err, "could not write diagnostic snapshot");
        }
    }
}

/// Navigates, retrying once if the first attempt times out.
async fn navigate_with_retry<S: BrowserSession>(
    session: &mut PooledSession<S>,
    url: &str,
) -> Result<Snapshot, ScraperError> {
    match session.navigate(url).await {
        Err(ScraperError::NavigationTimeout { .. }) => {
            tracing::debug!(url, "navigation timed out, retrying once");
            session.navigate(url).await
        }
        other => other,
    }
}
