//! Backtest checks over a scored history.
//!
//! Each check returns a [`TestResult`]; none of them can fail the caller.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use granary_combine::RiskClassifier;
use granary_traits::stats::{mean, sample_std};
use granary_traits::{Component, GroupKey, GroupSeries, RiskScore};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::correlation::{pearson, spearman};
use crate::report::TestResult;

/// Scored history split into (region, commodity) series.
pub type ScoreGroups<'a> = BTreeMap<GroupKey, GroupSeries<'a, RiskScore>>;

/// Closed interval a summary statistic is expected to fall in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
    /// Lower bound.
    pub min: f64,
    /// Upper bound.
    pub max: f64,
}

impl Band {
    /// Create a band.
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Whether `value` lies inside the band; NaN never does.
    pub fn contains(&self, value: f64) -> bool {
        (self.min..=self.max).contains(&value)
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.min, self.max)
    }
}

fn composites(history: &[RiskScore]) -> Vec<f64> {
    history.iter().map(|s| s.composite_score).collect()
}

/// Fractional decline from `current` to `next`; positive means yield fell.
fn fractional_decline(current: f64, next: f64) -> Option<f64> {
    (current > 0.0).then(|| (current - next) / current)
}

/// Correlation between SRI at `t` and the yield decline from `t` to `t+1`.
///
/// Pairs are taken within a group and only across adjacent periods; they are
/// pooled over all groups. Passes when at least `min_pairs` pairs exist and
/// Pearson r reaches `min_correlation`.
pub fn lead_correlation(
    groups: &ScoreGroups<'_>,
    min_correlation: f64,
    min_pairs: usize,
) -> TestResult {
    const NAME: &str = "lead_correlation";

    let (scores, declines): (Vec<f64>, Vec<f64>) = groups
        .values()
        .flat_map(|series| {
            (0..series.len()).filter_map(move |i| {
                let current = series.get(i)?;
                let next = series.next(i)?;
                let decline = fractional_decline(current.yield_value, next.yield_value)?;
                Some((current.composite_score, decline))
            })
        })
        .unzip();

    if scores.len() < min_pairs {
        return TestResult::inconclusive(
            NAME,
            min_correlation,
            format!("{} lead pairs, need at least {min_pairs}", scores.len()),
        );
    }

    let x = Array1::from(scores);
    let y = Array1::from(declines);
    match pearson(&x, &y) {
        Some(r) => {
            let rho = spearman(&x, &y)
                .map_or_else(|| "n/a".to_string(), |v| format!("{v:.4}"));
            TestResult::measured(
                NAME,
                r >= min_correlation,
                r,
                min_correlation,
                format!("pearson over {} pairs, spearman {rho}", x.len()),
            )
        }
        None => {
            TestResult::inconclusive(NAME, min_correlation, "scores or declines have no variance")
        }
    }
}

/// Mean per-commodity correlation between SRI and same-period yield.
///
/// Yields of different commodities are on different scales, so r is computed
/// per commodity and averaged. Passes when the mean r is negative.
pub fn concurrent_yield_correlation(history: &[RiskScore]) -> TestResult {
    const NAME: &str = "concurrent_yield_correlation";

    let mut by_commodity: BTreeMap<&str, (Vec<f64>, Vec<f64>)> = BTreeMap::new();
    for score in history {
        let entry = by_commodity.entry(score.key.commodity.as_str()).or_default();
        entry.0.push(score.composite_score);
        entry.1.push(score.yield_value);
    }

    let per_commodity: Vec<(&str, f64)> = by_commodity
        .into_iter()
        .filter_map(|(commodity, (s, y))| {
            pearson(&Array1::from(s), &Array1::from(y)).map(|r| (commodity, r))
        })
        .collect();

    let rs: Vec<f64> = per_commodity.iter().map(|(_, r)| *r).collect();
    match mean(&rs) {
        Some(r) => {
            let detail = per_commodity
                .iter()
                .map(|(c, r)| format!("{c} r={r:.3}"))
                .collect::<Vec<_>>()
                .join(", ");
            TestResult::measured(NAME, r < 0.0, r, 0.0, detail)
        }
        None => TestResult::inconclusive(NAME, 0.0, "no commodity has enough varying records"),
    }
}

/// Next-period yield change (%) for high-risk versus low-risk records.
///
/// Records scoring at least `high_score` form the high bucket and records
/// below `low_score` the low bucket. Per commodity the spread is the low
/// bucket's mean change minus the high bucket's. The metric is the mean
/// spread; the test passes when every commodity with both buckets populated
/// shows a positive spread.
pub fn predictive_spread(
    groups: &ScoreGroups<'_>,
    high_score: f64,
    low_score: f64,
) -> TestResult {
    const NAME: &str = "predictive_spread";

    let mut buckets: BTreeMap<&str, (Vec<f64>, Vec<f64>)> = BTreeMap::new();
    for (key, series) in groups {
        for i in 0..series.len() {
            let (Some(current), Some(next)) = (series.get(i), series.next(i)) else {
                continue;
            };
            let Some(decline) = fractional_decline(current.yield_value, next.yield_value) else {
                continue;
            };
            let change_pct = -decline * 100.0;
            let entry = buckets.entry(key.commodity.as_str()).or_default();
            if current.composite_score >= high_score {
                entry.0.push(change_pct);
            } else if current.composite_score < low_score {
                entry.1.push(change_pct);
            }
        }
    }

    let spreads: Vec<(&str, f64)> = buckets
        .into_iter()
        .filter_map(|(commodity, (high, low))| Some((commodity, mean(&low)? - mean(&high)?)))
        .collect();

    if spreads.is_empty() {
        return TestResult::inconclusive(
            NAME,
            0.0,
            format!(
                "no commodity has both records scoring >= {high_score} and < {low_score} \
                 with a following period"
            ),
        );
    }

    let values: Vec<f64> = spreads.iter().map(|(_, s)| *s).collect();
    let metric = mean(&values).unwrap_or(0.0);
    let detail = spreads
        .iter()
        .map(|(c, s)| format!("{c} spread={s:.2}pp"))
        .collect::<Vec<_>>()
        .join(", ");
    let passed = spreads.iter().all(|(_, s)| *s > 0.0);
    TestResult::measured(NAME, passed, metric, 0.0, detail)
}

/// SRI in years of a major yield drop versus years of yield growth.
///
/// A major drop is a period-over-period decline of more than `drop_pct`
/// percent. Passes when the drop years score higher on average.
pub fn major_yield_drops(history: &[RiskScore], drop_pct: f64) -> TestResult {
    const NAME: &str = "major_yield_drops";

    let mut drops = Vec::new();
    let mut growth = Vec::new();
    for score in history {
        let Some(delta) = score.yoy_delta else { continue };
        let previous = score.yield_value - delta;
        if previous <= 0.0 {
            continue;
        }
        let change_pct = delta / previous * 100.0;
        if change_pct < -drop_pct {
            drops.push(score.composite_score);
        } else if change_pct > 0.0 {
            growth.push(score.composite_score);
        }
    }

    match (mean(&drops), mean(&growth)) {
        (Some(d), Some(g)) => TestResult::measured(
            NAME,
            d > g,
            d - g,
            0.0,
            format!(
                "{} drop records mean {d:.2} vs {} growth records mean {g:.2}",
                drops.len(),
                growth.len()
            ),
        ),
        _ => TestResult::inconclusive(
            NAME,
            0.0,
            format!("{} drop records and {} growth records", drops.len(), growth.len()),
        ),
    }
}

/// Every composite must be finite and inside `[0, 100]`.
pub fn score_range(history: &[RiskScore]) -> TestResult {
    let violations = history
        .iter()
        .filter(|s| !(0.0..=100.0).contains(&s.composite_score))
        .count();
    TestResult::measured(
        "score_range",
        violations == 0,
        violations as f64,
        0.0,
        format!("{violations} of {} scores outside [0, 100]", history.len()),
    )
}

/// Scores should occupy more than one tier.
pub fn tier_diversity(history: &[RiskScore], classifier: &RiskClassifier) -> TestResult {
    const MIN_TIERS: usize = 2;

    let tiers: BTreeSet<_> = history
        .iter()
        .map(|s| classifier.tier(s.composite_score))
        .collect();
    let labels = tiers.iter().map(|t| t.label()).collect::<Vec<_>>().join(", ");
    TestResult::measured(
        "tier_diversity",
        tiers.len() >= MIN_TIERS,
        tiers.len() as f64,
        MIN_TIERS as f64,
        format!("tiers present: {labels}"),
    )
}

/// Share of scores more than `sigma` sample standard deviations above the
/// mean. Passes while the share stays at or below `max_share`.
pub fn score_outliers(history: &[RiskScore], sigma: f64, max_share: f64) -> TestResult {
    const NAME: &str = "score_outliers";

    let scores = composites(history);
    let (Some(m), Some(sd)) = (mean(&scores), sample_std(&scores)) else {
        return TestResult::inconclusive(
            NAME,
            max_share,
            format!("{} scores, need at least 2", scores.len()),
        );
    };
    let cutoff = m + sigma * sd;
    let outliers = scores.iter().filter(|s| **s > cutoff).count();
    let share = outliers as f64 / scores.len() as f64;
    TestResult::measured(
        NAME,
        share <= max_share,
        share,
        max_share,
        format!(
            "{outliers} of {} scores above {cutoff:.2} (mean + {sigma} sd)",
            scores.len()
        ),
    )
}

/// Scores that barely vary usually mean a flat component or a scaling
/// mistake. Passes when the sample standard deviation reaches `min_std`.
pub fn score_variance(history: &[RiskScore], min_std: f64) -> TestResult {
    const NAME: &str = "score_variance";

    let scores = composites(history);
    match sample_std(&scores) {
        Some(sd) => TestResult::measured(
            NAME,
            sd >= min_std,
            sd,
            min_std,
            format!("standard deviation over {} scores", scores.len()),
        ),
        None => TestResult::inconclusive(
            NAME,
            min_std,
            format!("{} scores, need at least 2", scores.len()),
        ),
    }
}

/// Every defined component score must be finite and inside `[0, 100]`.
pub fn component_range(history: &[RiskScore]) -> TestResult {
    let mut checked = 0_usize;
    let mut offenders: BTreeMap<Component, usize> = BTreeMap::new();
    for score in history {
        for (component, value) in score.components.defined() {
            checked += 1;
            if !(0.0..=100.0).contains(&value) {
                *offenders.entry(component).or_default() += 1;
            }
        }
    }

    let violations: usize = offenders.values().sum();
    let detail = if offenders.is_empty() {
        format!("{checked} component scores inside [0, 100]")
    } else {
        offenders
            .iter()
            .map(|(c, n)| format!("{c}: {n} outside [0, 100]"))
            .collect::<Vec<_>>()
            .join(", ")
    };
    TestResult::measured(
        "component_range",
        violations == 0,
        violations as f64,
        0.0,
        detail,
    )
}

/// The mean score should sit in `expected`. The threshold reported is the
/// band's lower bound.
pub fn mean_score(history: &[RiskScore], expected: Band) -> TestResult {
    const NAME: &str = "mean_score";

    match mean(&composites(history)) {
        Some(m) => TestResult::measured(
            NAME,
            expected.contains(m),
            m,
            expected.min,
            format!("mean {m:.2}, expected {expected}"),
        ),
        None => TestResult::inconclusive(NAME, expected.min, "no finite scores"),
    }
}

/// Share of records scoring at least `high_score` should sit in `expected`.
pub fn high_risk_share(history: &[RiskScore], high_score: f64, expected: Band) -> TestResult {
    const NAME: &str = "high_risk_share";

    if history.is_empty() {
        return TestResult::inconclusive(NAME, expected.min, "no scores");
    }
    let high = history
        .iter()
        .filter(|s| s.composite_score >= high_score)
        .count();
    let share = high as f64 / history.len() as f64;
    TestResult::measured(
        NAME,
        expected.contains(share),
        share,
        expected.min,
        format!(
            "{high} of {} records score >= {high_score}, expected share {expected}",
            history.len()
        ),
    )
}

/// No commodity should be consistently very high or very low risk: each
/// commodity's mean score must sit in `expected`. The metric counts the
/// commodities outside the band.
pub fn commodity_means(history: &[RiskScore], expected: Band) -> TestResult {
    const NAME: &str = "commodity_means";

    let mut by_commodity: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for score in history {
        by_commodity
            .entry(score.key.commodity.as_str())
            .or_default()
            .push(score.composite_score);
    }
    let means: Vec<(&str, f64)> = by_commodity
        .into_iter()
        .filter_map(|(commodity, scores)| mean(&scores).map(|m| (commodity, m)))
        .collect();
    if means.is_empty() {
        return TestResult::inconclusive(NAME, 0.0, "no finite scores");
    }

    let outside = means.iter().filter(|(_, m)| !expected.contains(*m)).count();
    let detail = means
        .iter()
        .map(|(c, m)| format!("{c} mean={m:.2}"))
        .collect::<Vec<_>>()
        .join(", ");
    TestResult::measured(
        NAME,
        outside == 0,
        outside as f64,
        0.0,
        format!("{detail}; expected {expected}"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use granary_traits::{ComponentScores, Confidence, Period, RecordKey, group_by_key};

    fn scored_as(region: &str, commodity: &str, period: Period, sri: f64) -> RiskScore {
        let mut score = scored(region, period, 150.0, sri);
        score.key = RecordKey::new(region, period, commodity);
        score
    }

    fn scored(region: &str, period: Period, yield_value: f64, sri: f64) -> RiskScore {
        RiskScore {
            key: RecordKey::new(region, period, "CORN"),
            yield_value,
            yoy_delta: None,
            composite_score: sri,
            components: ComponentScores::default(),
            effective_weights: BTreeMap::new(),
            dominant_component: None,
            confidence: Confidence::High,
            risk_category: None,
            recommendation: None,
        }
    }

    fn with_deltas(mut scores: Vec<RiskScore>) -> Vec<RiskScore> {
        for i in 1..scores.len() {
            if scores[i].key.group() == scores[i - 1].key.group() {
                scores[i].yoy_delta = Some(scores[i].yield_value - scores[i - 1].yield_value);
            }
        }
        scores
    }

    fn predictive_history() -> Vec<RiskScore> {
        vec![
            scored("IOWA", 2010, 150.0, 10.0),
            scored("IOWA", 2011, 160.0, 60.0),
            scored("IOWA", 2012, 110.0, 20.0),
            scored("IOWA", 2013, 150.0, 70.0),
            scored("IOWA", 2014, 120.0, 30.0),
        ]
    }

    #[test]
    fn test_lead_correlation_positive() {
        let history = predictive_history();
        let groups = group_by_key(&history, "scores").unwrap();
        let result = lead_correlation(&groups, 0.1, 3);
        assert!(result.passed, "{result}");
        assert!(result.metric_value.unwrap() > 0.7);
    }

    #[test]
    fn test_lead_correlation_needs_adjacent_periods() {
        let history = vec![
            scored("IOWA", 2010, 150.0, 10.0),
            scored("IOWA", 2012, 110.0, 60.0),
            scored("IOWA", 2014, 150.0, 20.0),
        ];
        let groups = group_by_key(&history, "scores").unwrap();
        let result = lead_correlation(&groups, 0.1, 1);
        assert_eq!(result.metric_value, None);
        assert!(result.detail.starts_with("0 lead pairs"));
    }

    #[test]
    fn test_predictive_spread() {
        let history = predictive_history();
        let groups = group_by_key(&history, "scores").unwrap();
        let result = predictive_spread(&groups, 50.0, 25.0);
        // high: 2011 -> -31.25 %, 2013 -> -20 %; low: 2010 -> +6.67 %, 2012 -> +36.36 %
        let high = (-31.25 - 20.0) / 2.0;
        let low = (100.0 / 15.0 + 4000.0 / 110.0) / 2.0;
        assert!(result.passed);
        assert_relative_eq!(result.metric_value.unwrap(), low - high, epsilon = 1e-9);
    }

    #[test]
    fn test_predictive_spread_inconclusive_without_buckets() {
        let history = vec![scored("IOWA", 2010, 150.0, 30.0), scored("IOWA", 2011, 150.0, 40.0)];
        let groups = group_by_key(&history, "scores").unwrap();
        let result = predictive_spread(&groups, 50.0, 25.0);
        assert!(!result.passed);
        assert_eq!(result.metric_value, None);
    }

    #[test]
    fn test_concurrent_correlation_negative() {
        // yields fall as scores rise
        let history = vec![
            scored("IOWA", 2010, 150.0, 10.0),
            scored("IOWA", 2011, 140.0, 30.0),
            scored("IOWA", 2012, 120.0, 50.0),
            scored("IOWA", 2013, 100.0, 70.0),
        ];
        let result = concurrent_yield_correlation(&history);
        assert!(result.passed, "{result}");
        let r = result.metric_value.unwrap();
        assert!(r < -0.9, "r = {r}");
        assert!(result.detail.contains("CORN"));
    }

    #[test]
    fn test_concurrent_correlation_positive_fails() {
        let history = vec![
            scored("IOWA", 2010, 100.0, 10.0),
            scored("IOWA", 2011, 120.0, 30.0),
            scored("IOWA", 2012, 140.0, 50.0),
        ];
        let result = concurrent_yield_correlation(&history);
        assert!(!result.passed);
        assert!(result.metric_value.unwrap() > 0.0);
    }

    #[test]
    fn test_major_yield_drops() {
        let history = with_deltas(predictive_history());
        // 2012 drop of 31 % scores 20, growth years 2011 and 2013 score 60 and 70
        let result = major_yield_drops(&history, 20.0);
        assert!(!result.passed);
        assert_relative_eq!(result.metric_value.unwrap(), 20.0 - 65.0, epsilon = 1e-9);
    }

    #[test]
    fn test_score_range_counts_violations() {
        let history = vec![
            scored("IOWA", 2010, 150.0, 10.0),
            scored("IOWA", 2011, 150.0, 120.0),
            scored("IOWA", 2012, 150.0, f64::NAN),
        ];
        let result = score_range(&history);
        assert!(!result.passed);
        assert_eq!(result.metric_value, Some(2.0));
    }

    #[test]
    fn test_tier_diversity() {
        let classifier = RiskClassifier::default();
        let flat = vec![scored("IOWA", 2010, 150.0, 10.0), scored("IOWA", 2011, 150.0, 12.0)];
        assert!(!tier_diversity(&flat, &classifier).passed);

        let mixed = predictive_history();
        let result = tier_diversity(&mixed, &classifier);
        assert!(result.passed);
        assert_eq!(result.metric_value, Some(3.0));
    }

    #[test]
    fn test_score_outliers() {
        // 19 records at 20 and one at 95: the spike sits above mean + 3 sd
        let mut history: Vec<RiskScore> = (0..19)
            .map(|i| scored("IOWA", 2000 + i, 150.0, 20.0))
            .collect();
        history.push(scored("IOWA", 2019, 150.0, 95.0));

        let result = score_outliers(&history, 3.0, 0.05);
        assert_relative_eq!(result.metric_value.unwrap(), 0.05);
        assert!(result.passed, "{result}");

        let result = score_outliers(&history, 3.0, 0.01);
        assert!(!result.passed);

        let result = score_outliers(&history[..1], 3.0, 0.05);
        assert_eq!(result.metric_value, None);
    }

    #[test]
    fn test_score_variance() {
        let flat = vec![
            scored("IOWA", 2010, 150.0, 30.0),
            scored("IOWA", 2011, 150.0, 31.0),
            scored("IOWA", 2012, 150.0, 32.0),
        ];
        let result = score_variance(&flat, 5.0);
        assert!(!result.passed);
        assert_relative_eq!(result.metric_value.unwrap(), 1.0, epsilon = 1e-12);

        assert!(score_variance(&predictive_history(), 5.0).passed);
    }

    #[test]
    fn test_component_range() {
        let mut history = predictive_history();
        history[0].components = ComponentScores::default()
            .with(Component::Yield, Some(40.0))
            .with(Component::Drought, Some(101.0));
        history[1].components = ComponentScores::default().with(Component::Weather, Some(-2.0));
        history[2].components = ComponentScores::default().with(Component::Weather, Some(55.0));

        let result = component_range(&history);
        assert!(!result.passed);
        assert_eq!(result.metric_value, Some(2.0));
        assert_eq!(result.detail, "weather: 1 outside [0, 100], drought: 1 outside [0, 100]");

        history[0].components = ComponentScores::default();
        history[1].components = ComponentScores::default();
        assert!(component_range(&history).passed);
    }

    #[test]
    fn test_mean_score_band() {
        // predictive history mean is 38
        let history = predictive_history();
        let result = mean_score(&history, Band::new(20.0, 40.0));
        assert!(result.passed);
        assert_relative_eq!(result.metric_value.unwrap(), 38.0);

        assert!(!mean_score(&history, Band::new(10.0, 30.0)).passed);
        assert_eq!(mean_score(&[], Band::new(20.0, 40.0)).metric_value, None);
    }

    #[test]
    fn test_high_risk_share() {
        // 2 of 5 records score >= 50
        let history = predictive_history();
        let result = high_risk_share(&history, 50.0, Band::new(0.05, 0.30));
        assert!(!result.passed);
        assert_relative_eq!(result.metric_value.unwrap(), 0.4);

        assert!(high_risk_share(&history, 65.0, Band::new(0.05, 0.30)).passed);
    }

    #[test]
    fn test_commodity_means() {
        let history = vec![
            scored_as("IOWA", "CORN", 2011, 30.0),
            scored_as("IOWA", "CORN", 2012, 50.0),
            scored_as("KANSAS", "WHEAT", 2011, 80.0),
            scored_as("KANSAS", "WHEAT", 2012, 90.0),
        ];
        let result = commodity_means(&history, Band::new(10.0, 70.0));
        assert!(!result.passed);
        assert_eq!(result.metric_value, Some(1.0));
        assert!(result.detail.starts_with("CORN mean=40.00, WHEAT mean=85.00"));
    }
}
