//! Extraction strategies as data.
//!
//! A field's chain is a `Vec<Strategy<T>>` ordered by priority. Each
//! strategy is a pure probe over a [`PageContext`]; [`first_hit`] walks the
//! chain and stops at the first probe that yields a value.

use gmaps_core::Tier;
use regex::Regex;

use super::structured::StructuredPlace;

/// Everything a probe may look at for one place page.
#[derive(Debug)]
pub struct PageContext<'a> {
    pub html: &'a str,
    /// URL the browser ended up on.
    pub url: &'a str,
    pub structured: Option<StructuredPlace>,
}

impl<'a> PageContext<'a> {
    #[must_use]
    pub fn new(html: &'a str, url: &'a str) -> Self {
        Self {
            html,
            url,
            structured: StructuredPlace::from_html(html),
        }
    }
}

enum Probe<T> {
    /// Read a value from the embedded structured blob.
    Structured(fn(&StructuredPlace) -> Option<T>),
    /// Refine group 1 of each match in turn; the first refined value wins.
    First {
        regex: Regex,
        refine: fn(&str) -> Option<T>,
    },
    /// Hand group 1 of every match to `collect` at once.
    All {
        regex: Regex,
        collect: fn(Vec<&str>) -> Option<T>,
    },
    /// Arbitrary inspection of the page.
    Page(fn(&PageContext<'_>) -> Option<T>),
}

pub struct Strategy<T> {
    pub label: &'static str,
    pub tier: Tier,
    probe: Probe<T>,
}

/// Compiles `pattern` with dot-all and case-insensitive matching.
fn compile(pattern: &str) -> Regex {
    Regex::new(&format!("(?is){pattern}")).expect("valid regex")
}

impl<T> Strategy<T> {
    pub fn structured(label: &'static str, read: fn(&StructuredPlace) -> Option<T>) -> Self {
        Self {
            label,
            tier: Tier::Structured,
            probe: Probe::Structured(read),
        }
    }

    pub fn first(
        label: &'static str,
        tier: Tier,
        pattern: &str,
        refine: fn(&str) -> Option<T>,
    ) -> Self {
        Self {
            label,
            tier,
            probe: Probe::First {
                regex: compile(pattern),
                refine,
            },
        }
    }

    pub fn all(
        label: &'static str,
        tier: Tier,
        pattern: &str,
        collect: fn(Vec<&str>) -> Option<T>,
    ) -> Self {
        Self {
            label,
            tier,
            probe: Probe::All {
                regex: compile(pattern),
                collect,
            },
        }
    }

    pub fn page(
        label: &'static str,
        tier: Tier,
        inspect: fn(&PageContext<'_>) -> Option<T>,
    ) -> Self {
        Self {
            label,
            tier,
            probe: Probe::Page(inspect),
        }
    }

    /// Runs this strategy alone.
    pub fn apply(&self, ctx: &PageContext<'_>) -> Option<T> {
        match &self.probe {
            Probe::Structured(read) => ctx.structured.as_ref().and_then(read),
            Probe::First { regex, refine } => regex
                .captures_iter(ctx.html)
                .filter_map(|cap| cap.get(1))
                .find_map(|m| refine(m.as_str())),
            Probe::All { regex, collect } => {
                let hits: Vec<&str> = regex
                    .captures_iter(ctx.html)
                    .filter_map(|cap| cap.get(1))
                    .map(|m| m.as_str())
                    .collect();
                if hits.is_empty() {
                    None
                } else {
                    collect(hits)
                }
            }
            Probe::Page(inspect) => inspect(ctx),
        }
    }
}

/// First value produced by `chain`, with the strategy that produced it.
pub fn first_hit<'s, T>(
    chain: &'s [Strategy<T>],
    ctx: &PageContext<'_>,
) -> Option<(T, &'s Strategy<T>)> {
    chain
        .iter()
        .find_map(|strategy| strategy.apply(ctx).map(|value| (value, strategy)))
}
