//! Risk-tier classification and stockpile recommendations.

use granary_traits::{Component, Result, RiskCategory, RiskScore, TierBoundaries};
use tracing::info;

/// Maps composite scores onto ordered tiers.
///
/// Tiers are half-open on the right: with the default boundaries a score of
/// exactly 25.0 is Moderate, 50.0 is High and 75.0 is Very High.
///
/// # Example
///
/// ```
/// use granary_combine::RiskClassifier;
/// use granary_traits::{Component, RiskCategory};
///
/// let classifier = RiskClassifier::default();
/// assert_eq!(classifier.tier(24.999), RiskCategory::Low);
/// assert_eq!(classifier.tier(25.0), RiskCategory::Moderate);
/// assert_eq!(
///     RiskClassifier::recommendation(RiskCategory::VeryHigh, Some(Component::Drought)),
///     "Critical: Increase stockpile by +25% (primary driver: drought)"
/// );
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct RiskClassifier {
    tiers: TierBoundaries,
}

impl RiskClassifier {
    /// Create a classifier.
    ///
    /// # Errors
    ///
    /// Returns [`granary_traits::GranaryError::InvalidConfig`] unless the
    /// boundaries are strictly ascending inside (0, 100).
    pub fn new(tiers: TierBoundaries) -> Result<Self> {
        tiers.validate()?;
        Ok(Self { tiers })
    }

    /// The tier boundaries.
    pub const fn tiers(&self) -> &TierBoundaries {
        &self.tiers
    }

    /// Tier of a composite score. Non-finite scores fall into Low.
    pub fn tier(&self, score: f64) -> RiskCategory {
        if score >= self.tiers.very_high {
            RiskCategory::VeryHigh
        } else if score >= self.tiers.high {
            RiskCategory::High
        } else if score >= self.tiers.moderate {
            RiskCategory::Moderate
        } else {
            RiskCategory::Low
        }
    }

    /// Base stockpile action for a tier.
    pub const fn action(category: RiskCategory) -> &'static str {
        match category {
            RiskCategory::Low => "Normal inventory",
            RiskCategory::Moderate => "Monitor closely, consider +5% stockpile",
            RiskCategory::High => "Increase stockpile by +15%",
            RiskCategory::VeryHigh => "Critical: Increase stockpile by +25%",
        }
    }

    /// Recommendation text for a tier and its dominant component.
    pub fn recommendation(category: RiskCategory, dominant: Option<Component>) -> String {
        let action = Self::action(category);
        match dominant {
            Some(component) => format!("{action} (primary driver: {component})"),
            None => action.to_string(),
        }
    }

    /// Return a copy of the scores with tier and recommendation set.
    pub fn classify(&self, scores: &[RiskScore]) -> Vec<RiskScore> {
        let classified: Vec<RiskScore> = scores
            .iter()
            .map(|score| {
                let category = self.tier(score.composite_score);
                RiskScore {
                    risk_category: Some(category),
                    recommendation: Some(Self::recommendation(category, score.dominant_component)),
                    ..score.clone()
                }
            })
            .collect();

        let count = |c: RiskCategory| {
            classified
                .iter()
                .filter(|s| s.risk_category == Some(c))
                .count()
        };
        info!(
            records = classified.len(),
            low = count(RiskCategory::Low),
            moderate = count(RiskCategory::Moderate),
            high = count(RiskCategory::High),
            very_high = count(RiskCategory::VeryHigh),
            "classified scores"
        );
        classified
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use granary_traits::{ComponentScores, Confidence, GranaryError, RecordKey};
    use std::collections::BTreeMap;

    fn score(value: f64, dominant: Option<Component>) -> RiskScore {
        RiskScore {
            key: RecordKey::new("IOWA", 2012, "CORN"),
            yield_value: 105.0,
            yoy_delta: None,
            composite_score: value,
            components: ComponentScores::default(),
            effective_weights: BTreeMap::new(),
            dominant_component: dominant,
            confidence: Confidence::High,
            risk_category: None,
            recommendation: None,
        }
    }

    #[test]
    fn test_boundaries_belong_to_upper_tier() {
        let classifier = RiskClassifier::default();
        assert_eq!(classifier.tier(0.0), RiskCategory::Low);
        assert_eq!(classifier.tier(25.0), RiskCategory::Moderate);
        assert_eq!(classifier.tier(49.999_999), RiskCategory::Moderate);
        assert_eq!(classifier.tier(50.0), RiskCategory::High);
        assert_eq!(classifier.tier(75.0), RiskCategory::VeryHigh);
        assert_eq!(classifier.tier(100.0), RiskCategory::VeryHigh);
        assert_eq!(classifier.tier(f64::NAN), RiskCategory::Low);
    }

    #[test]
    fn test_custom_boundaries() {
        let tiers = TierBoundaries {
            moderate: 20.0,
            high: 40.0,
            very_high: 60.0,
        };
        let classifier = RiskClassifier::new(tiers).unwrap();
        assert_eq!(classifier.tier(20.0), RiskCategory::Moderate);
        assert_eq!(classifier.tier(59.0), RiskCategory::High);
    }

    #[test]
    fn test_rejects_unordered_boundaries() {
        let tiers = TierBoundaries {
            moderate: 50.0,
            high: 25.0,
            very_high: 75.0,
        };
        assert!(matches!(
            RiskClassifier::new(tiers),
            Err(GranaryError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_classify_returns_new_copy() {
        let input = vec![
            score(10.0, Some(Component::Yield)),
            score(80.0, Some(Component::Drought)),
            score(30.0, None),
        ];
        let classified = RiskClassifier::default().classify(&input);

        assert!(input.iter().all(|s| s.risk_category.is_none()));
        assert_eq!(classified[0].risk_category, Some(RiskCategory::Low));
        assert_eq!(
            classified[0].recommendation.as_deref(),
            Some("Normal inventory (primary driver: yield)")
        );
        assert_eq!(classified[1].risk_category, Some(RiskCategory::VeryHigh));
        assert_eq!(
            classified[2].recommendation.as_deref(),
            Some("Monitor closely, consider +5% stockpile")
        );
    }
}
