//! Compare command implementation.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::Result;
use chrono::Utc;
use granary::PipelineConfig;
use granary::eval::{TrendSummary, compare_sets};
use serde_json::json;

use crate::input::load_scores;
use crate::output::{self, OutputFormat};

/// Compare two scored runs by region and commodity.
pub(crate) fn compare(
    current: &Path,
    previous: &Path,
    config: &PipelineConfig,
    format: OutputFormat,
    dest: Option<&Path>,
) -> Result<()> {
    let current = load_scores(current)?;
    let previous = load_scores(previous)?;
    let rows = compare_sets(&current.scores, &previous.scores, &config.validation)?;
    let summary = TrendSummary::from_comparisons(&rows, &config.validation);

    let body = match format {
        OutputFormat::Json => serde_json::to_string_pretty(&json!({
            "generated_at": Utc::now(),
            "summary": summary,
            "comparisons": rows,
        }))?,
        OutputFormat::Csv => output::to_csv(output::comparisons_frame(&rows)?)?,
        OutputFormat::Text => {
            let mut out = String::new();
            output::banner(&mut out, "SRI Comparison");
            let _ = writeln!(
                out,
                "Increasing: {}  Stable: {}  Decreasing: {}  New: {}  Significant: {}\n",
                summary.increasing,
                summary.stable,
                summary.decreasing,
                summary.new,
                summary.significant
            );
            let _ = writeln!(
                out,
                "{:<16} {:<12} {:>6} {:>8} {:>8} {:>8}  {}",
                "Region", "Commodity", "Period", "Current", "Previous", "Change", "Trend"
            );
            let _ = writeln!(out, "{}", "-".repeat(80));
            for r in &rows {
                let fmt = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |x| format!("{x:.1}"));
                let _ = writeln!(
                    out,
                    "{:<16} {:<12} {:>6} {:>8.1} {:>8} {:>8}  {}{}",
                    r.region,
                    r.commodity,
                    r.period,
                    r.current,
                    fmt(r.previous),
                    fmt(r.change),
                    r.trend,
                    if r.significant { " *" } else { "" }
                );
            }
            if !summary.region_changes.is_empty() {
                let _ = writeln!(out, "\nRegions outside the stable band:");
                for (region, change) in &summary.region_changes {
                    let _ = writeln!(out, "  {region:<16} {change:+.1}");
                }
            }
            out
        }
    };
    output::emit(dest, &body)
}
