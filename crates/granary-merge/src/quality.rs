//! Input data-quality summary, one entry per source.
//!
//! Like [`crate::MergeCoverage`] the summary is advisory: an error-level
//! issue is logged and reported, but the merge still runs.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::RangeInclusive;

use granary_traits::types::normalize_name;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::sources::Sources;
use crate::table::SourceKind;

/// A column with more nulls than this fraction is an error.
pub const NULL_ERROR_FRACTION: f64 = 0.2;
/// A column with more nulls than this fraction is a warning.
pub const NULL_WARNING_FRACTION: f64 = 0.05;
/// Yields outside this range are implausible but kept.
pub const PLAUSIBLE_YIELD: RangeInclusive<f64> = 10.0..=500.0;
/// Valid DSCI range.
pub const DSCI_RANGE: RangeInclusive<f64> = 0.0..=500.0;
/// Plausible growing-season mean temperature, °C.
pub const PLAUSIBLE_TEMPERATURE: RangeInclusive<f64> = -45.0..=50.0;

/// How serious a quality issue is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Suspicious but usable.
    Warning,
    /// The source should be fixed before its scores are trusted.
    Error,
}

/// One finding about a source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityIssue {
    /// Severity level.
    pub severity: Severity,
    /// What was found.
    pub message: String,
}

impl QualityIssue {
    const fn error(message: String) -> Self {
        Self {
            severity: Severity::Error,
            message,
        }
    }

    const fn warning(message: String) -> Self {
        Self {
            severity: Severity::Warning,
            message,
        }
    }
}

/// Quality summary of one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceQuality {
    /// Which source.
    pub source: SourceKind,
    /// Input rows, including yield rows dropped for a missing value.
    pub rows: usize,
    /// Distinct normalized regions; region-less economic rows count as none.
    pub regions: usize,
    /// Null fraction per measurement column.
    pub null_fractions: BTreeMap<String, f64>,
    /// Findings in check order.
    pub issues: Vec<QualityIssue>,
}

impl SourceQuality {
    const fn new(source: SourceKind, rows: usize, regions: usize) -> Self {
        Self {
            source,
            rows,
            regions,
            null_fractions: BTreeMap::new(),
            issues: Vec::new(),
        }
    }

    /// Whether the source has no error-level issue.
    pub fn passed(&self) -> bool {
        self.count(Severity::Error) == 0
    }

    /// Number of issues at `severity`.
    pub fn count(&self, severity: Severity) -> usize {
        self.issues.iter().filter(|i| i.severity == severity).count()
    }

    fn null_column(&mut self, column: &str, nulls: usize) {
        let fraction = if self.rows == 0 {
            0.0
        } else {
            nulls as f64 / self.rows as f64
        };
        self.null_fractions.insert(column.to_string(), fraction);

        let message = || format!("column '{column}' is {:.1}% null", fraction * 100.0);
        if fraction > NULL_ERROR_FRACTION {
            self.issues.push(QualityIssue::error(message()));
        } else if fraction > NULL_WARNING_FRACTION {
            self.issues.push(QualityIssue::warning(message()));
        }
    }

    fn region_coverage(&mut self, covered: &BTreeSet<String>, expected: &BTreeSet<String>) {
        let missing = expected.difference(covered).count();
        if missing > 0 {
            self.issues.push(QualityIssue::warning(format!(
                "no rows for {missing} of {} yield regions",
                expected.len()
            )));
        }
    }
}

/// Quality of every supplied source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataQuality {
    /// Per-source summaries: yield, weather, drought, then economic if
    /// supplied.
    pub sources: Vec<SourceQuality>,
}

impl DataQuality {
    /// Check null fractions, value ranges and region coverage of each source.
    ///
    /// # Example
    ///
    /// ```
    /// use granary_merge::{DataQuality, SourceKind, Sources};
    /// use granary_traits::YieldObservation;
    ///
    /// let sources = Sources::new(
    ///     vec![YieldObservation {
    ///         region: "Iowa".into(),
    ///         period: 2012,
    ///         commodity: "Corn".into(),
    ///         yield_value: -5.0,
    ///     }],
    ///     vec![],
    ///     vec![],
    ///     None,
    /// );
    /// let quality = DataQuality::assess(&sources);
    /// assert!(!quality.passed());
    /// assert!(!quality.get(SourceKind::Yield).unwrap().passed());
    /// ```
    pub fn assess(sources: &Sources) -> Self {
        let yield_regions: BTreeSet<String> = sources
            .yields
            .iter()
            .map(|y| normalize_name(&y.region))
            .collect();

        let mut out = vec![
            yield_quality(sources, &yield_regions),
            weather_quality(sources, &yield_regions),
            drought_quality(sources, &yield_regions),
        ];
        if sources.economic.is_some() {
            out.push(economic_quality(sources));
        }
        Self { sources: out }
    }

    /// Whether no source has an error-level issue.
    pub fn passed(&self) -> bool {
        self.sources.iter().all(SourceQuality::passed)
    }

    /// Total issues at `severity` across sources.
    pub fn count(&self, severity: Severity) -> usize {
        self.sources.iter().map(|s| s.count(severity)).sum()
    }

    /// Summary of one source.
    pub fn get(&self, source: SourceKind) -> Option<&SourceQuality> {
        self.sources.iter().find(|s| s.source == source)
    }

    /// Emit the summary as tracing events.
    pub fn log(&self) {
        for source in &self.sources {
            for issue in &source.issues {
                match issue.severity {
                    Severity::Error => {
                        error!(source = %source.source, issue = %issue.message, "data quality")
                    }
                    Severity::Warning => {
                        warn!(source = %source.source, issue = %issue.message, "data quality")
                    }
                }
            }
        }
        info!(
            sources = self.sources.len(),
            errors = self.count(Severity::Error),
            warnings = self.count(Severity::Warning),
            "data quality checked"
        );
    }
}

impl fmt::Display for DataQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for source in &self.sources {
            let status = if source.passed() { "ok" } else { "ERRORS" };
            writeln!(
                f,
                "  {:<10} {:>6} rows {:>4} regions  {status}",
                source.source.name(),
                source.rows,
                source.regions
            )?;
            for issue in &source.issues {
                let label = match issue.severity {
                    Severity::Error => "error",
                    Severity::Warning => "warning",
                };
                writeln!(f, "    {label}: {}", issue.message)?;
            }
        }
        Ok(())
    }
}

fn distinct<'a>(regions: impl Iterator<Item = &'a str>) -> BTreeSet<String> {
    regions.map(normalize_name).collect()
}

fn yield_quality(sources: &Sources, regions: &BTreeSet<String>) -> SourceQuality {
    let rows = sources.yields.len() + sources.dropped_yield_rows;
    let mut quality = SourceQuality::new(SourceKind::Yield, rows, regions.len());
    quality.null_column("yield_value", sources.dropped_yield_rows);

    if sources.yields.is_empty() {
        quality
            .issues
            .push(QualityIssue::error("no usable yield rows".to_string()));
        return quality;
    }

    let negative = sources.yields.iter().filter(|y| y.yield_value < 0.0).count();
    if negative > 0 {
        quality
            .issues
            .push(QualityIssue::error(format!("{negative} negative yield values")));
    }
    let implausible = sources
        .yields
        .iter()
        .filter(|y| y.yield_value >= 0.0 && !PLAUSIBLE_YIELD.contains(&y.yield_value))
        .count();
    if implausible > 0 {
        quality.issues.push(QualityIssue::warning(format!(
            "{implausible} yield values outside {}-{}",
            PLAUSIBLE_YIELD.start(),
            PLAUSIBLE_YIELD.end()
        )));
    }
    quality
}

fn weather_quality(sources: &Sources, expected: &BTreeSet<String>) -> SourceQuality {
    let rows = &sources.weather;
    let covered = distinct(rows.iter().map(|w| w.region.as_str()));
    let mut quality = SourceQuality::new(SourceKind::Weather, rows.len(), covered.len());

    let temperatures: Vec<f64> = rows.iter().filter_map(|w| w.mean_temperature).collect();
    let precipitation: Vec<f64> = rows.iter().filter_map(|w| w.total_precipitation).collect();
    quality.null_column("mean_temperature", rows.len() - temperatures.len());
    quality.null_column("total_precipitation", rows.len() - precipitation.len());

    let hot_or_cold = temperatures
        .iter()
        .filter(|t| !PLAUSIBLE_TEMPERATURE.contains(t))
        .count();
    if hot_or_cold > 0 {
        quality.issues.push(QualityIssue::warning(format!(
            "{hot_or_cold} mean temperatures outside {} to {} C",
            PLAUSIBLE_TEMPERATURE.start(),
            PLAUSIBLE_TEMPERATURE.end()
        )));
    }
    let negative = precipitation.iter().filter(|p| **p < 0.0).count();
    if negative > 0 {
        quality
            .issues
            .push(QualityIssue::error(format!("{negative} negative precipitation totals")));
    }
    quality.region_coverage(&covered, expected);
    quality
}

fn drought_quality(sources: &Sources, expected: &BTreeSet<String>) -> SourceQuality {
    let rows = &sources.drought;
    let covered = distinct(rows.iter().map(|d| d.region.as_str()));
    let mut quality = SourceQuality::new(SourceKind::Drought, rows.len(), covered.len());

    let dsci: Vec<f64> = rows.iter().filter_map(|d| d.drought_severity_index).collect();
    quality.null_column("drought_severity_index", rows.len() - dsci.len());

    let out_of_range = dsci.iter().filter(|d| !DSCI_RANGE.contains(d)).count();
    if out_of_range > 0 {
        quality.issues.push(QualityIssue::error(format!(
            "{out_of_range} DSCI values outside {}-{}",
            DSCI_RANGE.start(),
            DSCI_RANGE.end()
        )));
    }
    quality.region_coverage(&covered, expected);
    quality
}

fn economic_quality(sources: &Sources) -> SourceQuality {
    let rows = sources.economic.as_deref().unwrap_or_default();
    let covered = distinct(rows.iter().filter_map(|e| e.region.as_deref()));
    let mut quality = SourceQuality::new(SourceKind::Economic, rows.len(), covered.len());

    let nulls = rows.iter().filter(|e| e.economic_delta.is_none()).count();
    quality.null_column("economic_delta", nulls);
    quality
}
