//! Rendering of scored runs as text, JSON or CSV.

use std::fmt::Write as _;
use std::fs;
use std::io::{self, Write as _};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::ValueEnum;
use granary::eval::{ScoreSummary, YearComparison};
use granary::merge::{DataQuality, MergeCoverage};
use granary::traits::WeightConfig;
use granary::{Component, RiskScore};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    /// Human-readable tables
    #[default]
    Text,
    /// Pretty-printed JSON
    Json,
    /// One row per record
    Csv,
}

/// A scored run as written by `score --format json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ScoreFile {
    pub(crate) generated_at: DateTime<Utc>,
    pub(crate) weights: WeightConfig,
    pub(crate) coverage: MergeCoverage,
    #[serde(default)]
    pub(crate) quality: DataQuality,
    pub(crate) summary: ScoreSummary,
    pub(crate) scores: Vec<RiskScore>,
}

/// Write to a file, or stdout when no path is given.
pub(crate) fn emit(dest: Option<&Path>, body: &str) -> Result<()> {
    match dest {
        Some(path) => fs::write(path, body)
            .with_context(|| format!("failed to write {}", path.display())),
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(body.as_bytes())?;
            if !body.ends_with('\n') {
                stdout.write_all(b"\n")?;
            }
            Ok(())
        }
    }
}

pub(crate) fn banner(out: &mut String, title: &str) {
    let _ = writeln!(out, "\n╔══════════════════════════════════════════════════════════════╗");
    let _ = writeln!(out, "║{title:^62}║");
    let _ = writeln!(out, "╚══════════════════════════════════════════════════════════════╝\n");
}

fn opt(value: Option<f64>, precision: usize) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.precision$}"))
}

/// Score table, highest composite first.
pub(crate) fn scores_text(out: &mut String, scores: &[RiskScore], top: usize) {
    let mut ranked: Vec<&RiskScore> = scores.iter().collect();
    ranked.sort_by(|a, b| b.composite_score.total_cmp(&a.composite_score));

    let _ = writeln!(
        out,
        "{:<16} {:<12} {:>6} {:>8} {:>7} {:>7} {:>7} {:>7} {:>7}  {:<10} {:<9}",
        "Region",
        "Commodity",
        "Period",
        "Yield",
        "SRI",
        "Yield",
        "Weather",
        "Drought",
        "Econ",
        "Tier",
        "Driver"
    );
    let _ = writeln!(out, "{}", "-".repeat(112));
    for s in ranked.iter().take(top) {
        let tier = s.risk_category.map_or("-", |c| c.label());
        let driver = s.dominant_component.map_or("-", |c| c.name());
        let _ = writeln!(
            out,
            "{:<16} {:<12} {:>6} {:>8.1} {:>7.1} {:>7} {:>7} {:>7} {:>7}  {:<10} {:<9}",
            s.key.region,
            s.key.commodity,
            s.key.period,
            s.yield_value,
            s.composite_score,
            opt(s.components.get(Component::Yield), 1),
            opt(s.components.get(Component::Weather), 1),
            opt(s.components.get(Component::Drought), 1),
            opt(s.components.get(Component::Economic), 1),
            tier,
            driver,
        );
    }
    if ranked.len() > top {
        let _ = writeln!(out, "... {} more (use --top or --format csv)", ranked.len() - top);
    }
}

pub(crate) fn coverage_text(out: &mut String, coverage: &MergeCoverage, quality: &DataQuality) {
    let _ = writeln!(
        out,
        "Merged {} records ({} regions, {} commodities, {} yield rows dropped)",
        coverage.records, coverage.regions, coverage.commodities, coverage.dropped_yield_rows
    );
    for (source, fraction) in coverage.fractions() {
        let _ = writeln!(out, "  {source:<10} coverage {:>6.1}%", fraction * 100.0);
    }
    if !quality.sources.is_empty() {
        let _ = writeln!(out, "Input quality:");
        let _ = write!(out, "{quality}");
    }
    let _ = writeln!(out);
}

/// Scores as a DataFrame, one row per record.
pub(crate) fn scores_frame(scores: &[RiskScore]) -> PolarsResult<DataFrame> {
    let text = |f: fn(&RiskScore) -> Option<String>| scores.iter().map(f).collect::<Vec<_>>();
    let num = |f: fn(&RiskScore) -> Option<f64>| scores.iter().map(f).collect::<Vec<_>>();
    let component = |c: Component| {
        scores
            .iter()
            .map(|s| s.components.get(c))
            .collect::<Vec<_>>()
    };
    let periods: Vec<i32> = scores.iter().map(|s| s.key.period).collect();

    DataFrame::new(vec![
        Column::new("region".into(), text(|s| Some(s.key.region.clone()))),
        Column::new("commodity".into(), text(|s| Some(s.key.commodity.clone()))),
        Column::new("period".into(), periods),
        Column::new("yield_value".into(), num(|s| Some(s.yield_value))),
        Column::new("yoy_delta".into(), num(|s| s.yoy_delta)),
        Column::new("composite_score".into(), num(|s| Some(s.composite_score))),
        Column::new(
            "risk_category".into(),
            text(|s| s.risk_category.map(|c| c.label().to_string())),
        ),
        Column::new("yield_risk".into(), component(Component::Yield)),
        Column::new("weather_risk".into(), component(Component::Weather)),
        Column::new("drought_risk".into(), component(Component::Drought)),
        Column::new("economic_risk".into(), component(Component::Economic)),
        Column::new(
            "dominant_component".into(),
            text(|s| s.dominant_component.map(|c| c.name().to_string())),
        ),
        Column::new(
            "confidence".into(),
            text(|s| Some(format!("{:?}", s.confidence).to_lowercase())),
        ),
        Column::new("recommendation".into(), text(|s| s.recommendation.clone())),
    ])
}

/// Comparisons as a DataFrame.
pub(crate) fn comparisons_frame(rows: &[YearComparison]) -> PolarsResult<DataFrame> {
    let regions: Vec<String> = rows.iter().map(|r| r.region.clone()).collect();
    let commodities: Vec<String> = rows.iter().map(|r| r.commodity.clone()).collect();
    let trends: Vec<String> = rows.iter().map(|r| r.trend.to_string()).collect();

    DataFrame::new(vec![
        Column::new("region".into(), regions),
        Column::new("commodity".into(), commodities),
        Column::new("period".into(), rows.iter().map(|r| r.period).collect::<Vec<_>>()),
        Column::new("current".into(), rows.iter().map(|r| r.current).collect::<Vec<_>>()),
        Column::new("previous".into(), rows.iter().map(|r| r.previous).collect::<Vec<_>>()),
        Column::new("change".into(), rows.iter().map(|r| r.change).collect::<Vec<_>>()),
        Column::new("trend".into(), trends),
        Column::new("significant".into(), rows.iter().map(|r| r.significant).collect::<Vec<_>>()),
    ])
}

/// Serialize a DataFrame as CSV with a header row.
pub(crate) fn to_csv(mut df: DataFrame) -> Result<String> {
    let mut buf = Vec::new();
    CsvWriter::new(&mut buf).include_header(true).finish(&mut df)?;
    Ok(String::from_utf8(buf)?)
}
