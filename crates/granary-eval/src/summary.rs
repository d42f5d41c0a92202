//! Descriptive statistics of a scored dataset.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use granary_combine::RiskClassifier;
use granary_traits::stats::{mean, median};
use granary_traits::{Component, RiskCategory, RiskScore};
use serde::{Deserialize, Serialize};

/// Distribution of composite scores, tiers and components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreSummary {
    /// Number of scored records
    pub count: usize,
    /// Mean composite
    pub mean: Option<f64>,
    /// Median composite
    pub median: Option<f64>,
    /// Lowest composite
    pub min: Option<f64>,
    /// Highest composite
    pub max: Option<f64>,
    /// Records per tier, every tier present
    pub tier_distribution: BTreeMap<RiskCategory, usize>,
    /// Distinct regions with at least one score in High or above
    pub high_risk_regions: usize,
    /// Mean score of each component over the records where it is defined
    pub component_means: BTreeMap<Component, f64>,
}

impl ScoreSummary {
    /// Summarize scores, tiering them with `classifier`.
    pub fn from_scores(scores: &[RiskScore], classifier: &RiskClassifier) -> Self {
        let composites: Vec<f64> = scores.iter().map(|s| s.composite_score).collect();

        let mut tier_distribution: BTreeMap<RiskCategory, usize> =
            RiskCategory::ALL.into_iter().map(|t| (t, 0)).collect();
        for score in scores {
            *tier_distribution
                .entry(classifier.tier(score.composite_score))
                .or_default() += 1;
        }

        let high_risk_regions = scores
            .iter()
            .filter(|s| classifier.tier(s.composite_score) >= RiskCategory::High)
            .map(|s| s.key.region.as_str())
            .collect::<BTreeSet<_>>()
            .len();

        let component_means = Component::ALL
            .into_iter()
            .filter_map(|c| {
                let values: Vec<f64> = scores.iter().filter_map(|s| s.components.get(c)).collect();
                mean(&values).map(|m| (c, m))
            })
            .collect();

        Self {
            count: scores.len(),
            mean: mean(&composites),
            median: median(&composites),
            min: composites.iter().copied().reduce(f64::min),
            max: composites.iter().copied().reduce(f64::max),
            tier_distribution,
            high_risk_regions,
            component_means,
        }
    }
}

impl fmt::Display for ScoreSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |v: Option<f64>| v.map_or_else(|| "n/a".to_string(), |x| format!("{x:.2}"));
        writeln!(f, "Records: {}", self.count)?;
        writeln!(
            f,
            "Composite: mean {} median {} min {} max {}",
            show(self.mean),
            show(self.median),
            show(self.min),
            show(self.max)
        )?;
        for (tier, n) in &self.tier_distribution {
            writeln!(f, "  {:<10} {n}", tier.label())?;
        }
        writeln!(f, "Regions at High or above: {}", self.high_risk_regions)?;
        for (component, m) in &self.component_means {
            writeln!(f, "  {:<10} mean {m:.2}", component.name())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use granary_traits::{ComponentScores, Confidence, RecordKey};

    fn scored(region: &str, sri: f64, drought: Option<f64>) -> RiskScore {
        RiskScore {
            key: RecordKey::new(region, 2012, "CORN"),
            yield_value: 150.0,
            yoy_delta: None,
            composite_score: sri,
            components: ComponentScores::default().with(Component::Drought, drought),
            effective_weights: BTreeMap::new(),
            dominant_component: None,
            confidence: Confidence::High,
            risk_category: None,
            recommendation: None,
        }
    }

    #[test]
    fn test_summary() {
        let scores = vec![
            scored("IOWA", 80.0, Some(90.0)),
            scored("KANSAS", 50.0, Some(30.0)),
            scored("OHIO", 10.0, None),
            scored("TEXAS", 25.0, None),
        ];
        let summary = ScoreSummary::from_scores(&scores, &RiskClassifier::default());
        assert_eq!(summary.count, 4);
        assert_relative_eq!(summary.mean.unwrap(), 41.25);
        assert_relative_eq!(summary.median.unwrap(), 37.5);
        assert_eq!(summary.min, Some(10.0));
        assert_eq!(summary.max, Some(80.0));
        assert_eq!(summary.tier_distribution[&RiskCategory::Moderate], 1);
        assert_eq!(summary.tier_distribution[&RiskCategory::VeryHigh], 1);
        assert_eq!(summary.high_risk_regions, 2);
        assert_relative_eq!(summary.component_means[&Component::Drought], 60.0);
        assert!(!summary.component_means.contains_key(&Component::Yield));
    }

    #[test]
    fn test_empty_summary() {
        let summary = ScoreSummary::from_scores(&[], &RiskClassifier::default());
        assert_eq!(summary.mean, None);
        assert_eq!(summary.max, None);
        assert_eq!(summary.tier_distribution.len(), 4);
        assert!(summary.to_string().contains("Records: 0"));
    }
}
