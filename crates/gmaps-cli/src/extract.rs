//! `extract` subcommand: the extraction pipeline over a saved page.

use std::path::Path;
use std::process::ExitCode;

use gmaps_scraper::{ExtractionOutcome, ExtractionPipeline, Snapshot};
use serde_json::{json, Value};

/// Shapes an outcome as JSON: `status`, plus the record and missing fields,
/// or the failure reason.
pub(crate) fn outcome_json(outcome: &ExtractionOutcome) -> Value {
    match outcome {
        ExtractionOutcome::Complete(record) => json!({
            "status": "complete",
            "record": record,
        }),
        ExtractionOutcome::Partial { record, missing } => json!({
            "status": "partial",
            "record": record,
            "missing": missing,
        }),
        ExtractionOutcome::Failed { reason } => json!({
            "status": "failed",
            "reason": reason,
        }),
    }
}

/// # Errors
///
/// Returns an error if the file cannot be read or the output cannot be
/// serialized.
pub(crate) async fn run_extract_command(
    file: &Path,
    link: Option<&str>,
) -> anyhow::Result<ExitCode> {
    let html = tokio::fs::read_to_string(file)
        .await
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", file.display()))?;
    let url = link.map_or_else(|| format!("file://{}", file.display()), str::to_string);

    let outcome = ExtractionPipeline::new().extract(&Snapshot::new(url, html), link);
    println!("{}", serde_json::to_string_pretty(&outcome_json(&outcome))?);

    Ok(if outcome.is_failed() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
