//! Score command implementation.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::Result;
use chrono::Utc;
use granary::{Pipeline, PipelineConfig};
use tracing::info;

use crate::input::{InputArgs, load_sources};
use crate::output::{self, OutputFormat, ScoreFile};

/// Merge, score and classify, then render the scores.
pub(crate) fn score(
    input: &InputArgs,
    config: PipelineConfig,
    period: Option<i32>,
    top: usize,
    format: OutputFormat,
    dest: Option<&Path>,
) -> Result<()> {
    let sources = load_sources(input)?;
    let pipeline = Pipeline::new(config)?;
    let run = pipeline.score(&sources)?;

    let shown: Vec<_> = run
        .scores
        .iter()
        .filter(|s| period.is_none_or(|p| s.key.period == p))
        .cloned()
        .collect();
    info!(scored = run.scores.len(), shown = shown.len(), "rendering scores");

    let body = match format {
        OutputFormat::Json => serde_json::to_string_pretty(&ScoreFile {
            generated_at: Utc::now(),
            weights: run.active_weights,
            coverage: run.coverage,
            quality: run.quality,
            summary: run.summary,
            scores: shown,
        })?,
        OutputFormat::Csv => output::to_csv(output::scores_frame(&shown)?)?,
        OutputFormat::Text => {
            let mut out = String::new();
            output::banner(&mut out, "Stock Risk Index");
            let _ = writeln!(out, "Weights: {}\n", run.active_weights.name);
            output::coverage_text(&mut out, &run.coverage, &run.quality);
            out.push_str(&run.summary.to_string());
            out.push('\n');
            output::scores_text(&mut out, &shown, top);
            out
        }
    };
    output::emit(dest, &body)
}
