//! Validate command implementation.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Result, bail};
use chrono::Utc;
use granary::{Pipeline, PipelineConfig};
use serde_json::json;

use crate::input::{InputArgs, load_events, load_sources};
use crate::output::{self, OutputFormat};

/// Score the history and run every validation check.
///
/// Failed checks are reported, not raised, unless `strict` is set.
pub(crate) fn validate(
    input: &InputArgs,
    config: PipelineConfig,
    events: Option<&Path>,
    format: OutputFormat,
    strict: bool,
) -> Result<()> {
    let sources = load_sources(input)?;
    let events = load_events(events)?;
    let pipeline = Pipeline::new(config)?;
    let result = pipeline.run(&sources, &events)?;
    let report = &result.report;

    let body = match format {
        OutputFormat::Json => serde_json::to_string_pretty(&json!({
            "generated_at": Utc::now(),
            "weights": result.run.active_weights,
            "summary": result.run.summary,
            "quality": result.run.quality,
            "report": report,
            "pass_rate": report.pass_rate(),
        }))?,
        OutputFormat::Csv => bail!("csv output is not available for validation reports"),
        OutputFormat::Text => {
            let mut out = String::new();
            output::banner(&mut out, "SRI Validation");
            let _ = writeln!(
                out,
                "Weights: {}  Events: {}\n",
                result.run.active_weights.name,
                events.len()
            );
            output::coverage_text(&mut out, &result.run.coverage, &result.run.quality);
            out.push_str(&result.run.summary.to_string());
            out.push('\n');
            out.push_str(&report.to_string());
            out
        }
    };
    output::emit(None, &body)?;

    if strict && !report.all_passed() {
        bail!(
            "{} of {} validation checks failed",
            report.failed(),
            report.tests.len()
        );
    }
    Ok(())
}
