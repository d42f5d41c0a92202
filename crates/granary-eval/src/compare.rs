//! Period-over-period comparison of scores.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use granary_traits::stats::mean;
use granary_traits::{GranaryError, GroupKey, Period, Result, RiskCategory, RiskScore};
use serde::{Deserialize, Serialize};

use crate::validator::ValidatorConfig;

/// Direction of a score change between two periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    /// Change inside the stable band
    Stable,
    /// Score rose by at least the stable band
    IncreasingRisk,
    /// Score fell by at least the stable band
    DecreasingRisk,
    /// No score in the earlier set
    New,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Stable => "Stable",
            Self::IncreasingRisk => "Increasing Risk",
            Self::DecreasingRisk => "Decreasing Risk",
            Self::New => "New",
        })
    }
}

/// One (region, commodity) matched across two score sets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearComparison {
    /// Region
    pub region: String,
    /// Commodity
    pub commodity: String,
    /// Period of the current score
    pub period: Period,
    /// Current composite
    pub current: f64,
    /// Earlier composite, `None` when the group was not scored
    pub previous: Option<f64>,
    /// `current - previous`
    pub change: Option<f64>,
    /// Tier of the current score
    pub current_category: Option<RiskCategory>,
    /// Tier of the earlier score
    pub previous_category: Option<RiskCategory>,
    /// Direction of the change
    pub trend: Trend,
    /// `|change| >= significant_change`
    pub significant: bool,
}

/// Match two score sets on (region, commodity).
///
/// Every group of `current` appears once; groups only in `previous` are
/// ignored. Output is sorted by change, largest increase first, with new
/// groups last.
///
/// # Errors
///
/// Returns [`GranaryError::DuplicateKey`] if a set holds two scores for the
/// same group.
pub fn compare_sets(
    current: &[RiskScore],
    previous: &[RiskScore],
    config: &ValidatorConfig,
) -> Result<Vec<YearComparison>> {
    let earlier = index_by_group(previous, "previous")?;
    index_by_group(current, "current")?;

    let mut comparisons: Vec<YearComparison> = current
        .iter()
        .map(|score| {
            let before = earlier.get(&score.key.group()).copied();
            let previous = before.map(|b| b.composite_score);
            let change = previous.map(|p| score.composite_score - p);
            YearComparison {
                region: score.key.region.clone(),
                commodity: score.key.commodity.clone(),
                period: score.key.period,
                current: score.composite_score,
                previous,
                change,
                current_category: score.risk_category,
                previous_category: before.and_then(|b| b.risk_category),
                trend: trend(change, config.stable_band),
                significant: change.is_some_and(|c| c.abs() >= config.significant_change),
            }
        })
        .collect();

    comparisons.sort_by(|a, b| match (a.change, b.change) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => (&a.region, &a.commodity).cmp(&(&b.region, &b.commodity)),
    });
    Ok(comparisons)
}

/// Compare two periods of one scored history.
///
/// # Errors
///
/// See [`compare_sets`].
pub fn compare_periods(
    history: &[RiskScore],
    current_period: Period,
    previous_period: Period,
    config: &ValidatorConfig,
) -> Result<Vec<YearComparison>> {
    let pick = |period: Period| -> Vec<RiskScore> {
        history
            .iter()
            .filter(|s| s.key.period == period)
            .cloned()
            .collect()
    };
    compare_sets(&pick(current_period), &pick(previous_period), config)
}

fn trend(change: Option<f64>, stable_band: f64) -> Trend {
    match change {
        None => Trend::New,
        Some(c) if c.abs() < stable_band => Trend::Stable,
        Some(c) if c > 0.0 => Trend::IncreasingRisk,
        Some(_) => Trend::DecreasingRisk,
    }
}

fn index_by_group<'a>(
    scores: &'a [RiskScore],
    table: &str,
) -> Result<HashMap<GroupKey, &'a RiskScore>> {
    let mut index = HashMap::with_capacity(scores.len());
    for score in scores {
        if index.insert(score.key.group(), score).is_some() {
            return Err(GranaryError::DuplicateKey {
                table: table.to_string(),
                region: score.key.region.clone(),
                period: score.key.period,
                commodity: score.key.commodity.clone(),
            });
        }
    }
    Ok(index)
}

/// Counts and per-region average change over a comparison.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrendSummary {
    /// Groups whose risk increased
    pub increasing: usize,
    /// Groups inside the stable band
    pub stable: usize,
    /// Groups whose risk decreased
    pub decreasing: usize,
    /// Groups without an earlier score
    pub new: usize,
    /// Groups with a significant change
    pub significant: usize,
    /// Mean change per region, for regions outside the stable band
    pub region_changes: BTreeMap<String, f64>,
}

impl TrendSummary {
    /// Summarize comparisons.
    pub fn from_comparisons(comparisons: &[YearComparison], config: &ValidatorConfig) -> Self {
        let mut summary = Self::default();
        let mut by_region: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
        for c in comparisons {
            match c.trend {
                Trend::IncreasingRisk => summary.increasing += 1,
                Trend::Stable => summary.stable += 1,
                Trend::DecreasingRisk => summary.decreasing += 1,
                Trend::New => summary.new += 1,
            }
            summary.significant += usize::from(c.significant);
            if let Some(change) = c.change {
                by_region.entry(c.region.as_str()).or_default().push(change);
            }
        }
        summary.region_changes = by_region
            .into_iter()
            .filter_map(|(region, changes)| mean(&changes).map(|m| (region.to_string(), m)))
            .filter(|(_, m)| m.abs() >= config.stable_band)
            .collect();
        summary
    }
}
