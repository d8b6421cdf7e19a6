//! Search job inputs and the response envelope handed back to the caller.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::place::{PlaceField, PlaceRecord};
use crate::CoreError;

pub const DEFAULT_LANG: &str = "en";
pub const DEFAULT_CONCURRENCY: usize = 5;
pub const MIN_CONCURRENCY: usize = 1;
pub const MAX_CONCURRENCY: usize = 20;

/// A validated search job request. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawSearchRequest")]
pub struct SearchRequest {
    query: String,
    max_places: Option<usize>,
    lang: String,
    headless: bool,
    concurrency: usize,
}

/// Wire shape accepted from callers before validation.
#[derive(Debug, Deserialize)]
struct RawSearchRequest {
    query: String,
    #[serde(default)]
    max_places: Option<usize>,
    #[serde(default)]
    lang: Option<String>,
    #[serde(default)]
    headless: Option<bool>,
    #[serde(default)]
    concurrency: Option<usize>,
}

impl TryFrom<RawSearchRequest> for SearchRequest {
    type Error = CoreError;

    fn try_from(raw: RawSearchRequest) -> Result<Self, Self::Error> {
        let mut request = Self::new(raw.query)?;
        if let Some(max) = raw.max_places {
            request = request.with_max_places(max)?;
        }
        if let Some(lang) = raw.lang {
            request = request.with_lang(lang)?;
        }
        if let Some(headless) = raw.headless {
            request = request.with_headless(headless);
        }
        if let Some(concurrency) = raw.concurrency {
            request = request.with_concurrency(concurrency);
        }
        Ok(request)
    }
}

impl SearchRequest {
    /// Builds a request with defaults: unbounded, `lang = "en"`, headless,
    /// concurrency 5.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::EmptyQuery`] when `query` is blank.
    pub fn new(query: impl Into<String>) -> Result<Self, CoreError> {
        let query = query.into().trim().to_string();
        if query.is_empty() {
            return Err(CoreError::EmptyQuery);
        }
        Ok(Self {
            query,
            max_places: None,
            lang: DEFAULT_LANG.to_string(),
            headless: true,
            concurrency: DEFAULT_CONCURRENCY,
        })
    }

    /// # Errors
    ///
    /// Returns [`CoreError::InvalidMaxPlaces`] for `0`.
    pub fn with_max_places(mut self, max_places: usize) -> Result<Self, CoreError> {
        if max_places == 0 {
            return Err(CoreError::InvalidMaxPlaces(max_places));
        }
        self.max_places = Some(max_places);
        Ok(self)
    }

    /// # Errors
    ///
    /// Returns [`CoreError::InvalidLang`] unless `lang` is 2–8 ASCII letters,
    /// optionally followed by a `-`/`_` region subtag.
    pub fn with_lang(mut self, lang: impl Into<String>) -> Result<Self, CoreError> {
        let lang = lang.into().trim().to_string();
        let valid = !lang.is_empty()
            && lang.len() <= 8
            && lang
                .split(['-', '_'])
                .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_alphanumeric()));
        if !valid {
            return Err(CoreError::InvalidLang(lang));
        }
        self.lang = lang;
        Ok(self)
    }

    #[must_use]
    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Sets the worker/session bound, clamped to `[1, 20]`.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.clamp(MIN_CONCURRENCY, MAX_CONCURRENCY);
        self
    }

    #[must_use]
    pub fn query(&self) -> &str {
        &self.query
    }

    #[must_use]
    pub fn max_places(&self) -> Option<usize> {
        self.max_places
    }

    #[must_use]
    pub fn lang(&self) -> &str {
        &self.lang
    }

    /// Primary language subtag, lower-cased (`"es-419"` → `"es"`).
    #[must_use]
    pub fn primary_lang(&self) -> String {
        self.lang
            .split(['-', '_'])
            .next()
            .unwrap_or(DEFAULT_LANG)
            .to_ascii_lowercase()
    }

    #[must_use]
    pub fn headless(&self) -> bool {
        self.headless
    }

    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }
}

/// Job lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Created,
    Discovering,
    Extracting,
    Completed,
    Failed,
}

/// Consent dialog handling state for the discovery session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsentState {
    NotChecked,
    ConsentPresent,
    Dismissed,
    NotPresent,
    /// Dialog was found but would not go away after one retry.
    NotHandled,
}

/// Diagnostics reported alongside the results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchMeta {
    pub job_id: Uuid,
    pub state: JobState,
    pub timed_out: bool,
    pub consent: ConsentState,
    pub discovered: usize,
    pub extracted: usize,
    pub skipped: usize,
    pub deduped: usize,
    pub elapsed_ms: u64,
    /// Fields that some returned record obtained only from legacy markers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub legacy_fields: Vec<PlaceField>,
}

impl SearchMeta {
    #[must_use]
    pub fn new(job_id: Uuid) -> Self {
        Self {
            job_id,
            state: JobState::Created,
            timed_out: false,
            consent: ConsentState::NotChecked,
            discovered: 0,
            extracted: 0,
            skipped: 0,
            deduped: 0,
            elapsed_ms: 0,
            legacy_fields: Vec::new(),
        }
    }
}

/// Response envelope. Always well-formed, even when the job failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub success: bool,
    pub query: String,
    pub total_results: usize,
    pub results: Vec<PlaceRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub metadata: SearchMeta,
}

impl SearchResult {
    /// A failed job: no results, `error` set.
    #[must_use]
    pub fn failed(query: &str, error: impl Into<String>, metadata: SearchMeta) -> Self {
        Self {
            success: false,
            query: query.to_string(),
            total_results: 0,
            results: Vec::new(),
            error: Some(error.into()),
            metadata,
        }
    }
}
