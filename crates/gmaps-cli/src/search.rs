//! `search` subcommand.

use std::process::ExitCode;
use std::sync::Arc;

use gmaps_core::{AppConfig, SearchRequest};
use gmaps_scraper::{run_search, ChromiumDriver};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SearchArgs {
    pub query: String,
    pub max_places: Option<usize>,
    pub lang: String,
    pub headless: bool,
    pub concurrency: usize,
    pub pretty: bool,
}

/// Validates the arguments into a request.
///
/// # Errors
///
/// Returns an error for an empty query, a zero `max_places`, or a
/// malformed language code.
pub(crate) fn build_request(args: &SearchArgs) -> anyhow::Result<SearchRequest> {
    let mut request = SearchRequest::new(args.query.as_str())?
        .with_lang(args.lang.as_str())?
        .with_headless(args.headless)
        .with_concurrency(args.concurrency);
    if let Some(max) = args.max_places {
        request = request.with_max_places(max)?;
    }
    Ok(request)
}

/// Runs one job on a locally launched Chromium and prints the result.
/// Exits non-zero when the job did not succeed.
///
/// # Errors
///
/// Returns an error if the arguments are invalid or the result cannot be
/// serialized. Scraping failures are reported inside the printed result.
pub(crate) async fn run_search_command(
    config: &AppConfig,
    args: SearchArgs,
) -> anyhow::Result<ExitCode> {
    let request = build_request(&args)?;
    let driver = Arc::new(ChromiumDriver::new(config.chrome_executable.clone()));

    tracing::info!(query = request.query(), "starting search");
    let result = run_search(driver, request, &config.scraper_config()).await;

    let json = if args.pretty {
        serde_json::to_string_pretty(&result)?
    } else {
        serde_json::to_string(&result)?
    };
    println!("{json}");

    Ok(if result.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
