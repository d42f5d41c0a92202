//! Weighted composite scoring with proportional weight redistribution.

use std::borrow::Cow;
use std::collections::BTreeMap;

use granary_traits::stats::finite_or_zero;
use granary_traits::{Component, ComponentScores, FeatureVector, Result, RiskScore, WeightConfig};
use ndarray::Array1;
use rayon::prelude::*;
use tracing::{debug, info, warn};

/// A composite score with the weights that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Composite {
    /// Weighted sum, clamped to `[0, 100]`.
    pub score: f64,
    /// Post-redistribution weights; empty when no component was active.
    pub effective_weights: BTreeMap<Component, f64>,
    /// Component with the largest weighted contribution.
    pub dominant: Option<Component>,
}

/// Combine component scores under a weight set.
///
/// A component is active when it carries a positive weight and a defined
/// score. Inactive components contribute nothing and their weight is shared
/// out proportionally over the active ones, so the effective weights always
/// sum to 1.0 (or are empty when nothing is active, giving a composite of 0).
///
/// Non-finite component scores are treated as 0 and every score is clamped
/// to `[0, 100]` before weighting.
///
/// Ties for the dominant component go to the earlier component in
/// [`Component::ALL`] order.
///
/// # Example
///
/// ```
/// use granary_combine::compose;
/// use granary_traits::{Component, ComponentScores, WeightConfig};
///
/// let scores = ComponentScores::default()
///     .with(Component::Yield, Some(60.0))
///     .with(Component::Drought, Some(90.0));
/// let composite = compose(&WeightConfig::three_component(), &scores);
///
/// // Weather is missing: 0.4 / 0.7 and 0.3 / 0.7
/// assert!((composite.score - (0.4 * 60.0 + 0.3 * 90.0) / 0.7).abs() < 1e-9);
/// assert_eq!(composite.dominant, Some(Component::Drought));
/// ```
pub fn compose(weights: &WeightConfig, components: &ComponentScores) -> Composite {
    let effective = weights.redistribute(|c| components.get(c).is_some());
    if effective.is_empty() {
        return Composite {
            score: 0.0,
            effective_weights: effective,
            dominant: None,
        };
    }

    let active: Vec<Component> = effective.keys().copied().collect();
    let w: Array1<f64> = active.iter().map(|c| effective[c]).collect();
    let s: Array1<f64> = active
        .iter()
        .map(|c| sanitize(components.get(*c).unwrap_or(0.0)))
        .collect();

    let contributions = &w * &s;
    let score = finite_or_zero(w.dot(&s)).clamp(0.0, 100.0);

    let mut dominant: Option<(Component, f64)> = None;
    for (component, &contribution) in active.iter().zip(contributions.iter()) {
        match dominant {
            Some((_, best)) if contribution <= best => {}
            _ => dominant = Some((*component, contribution)),
        }
    }

    Composite {
        score,
        effective_weights: effective,
        dominant: dominant.map(|(c, _)| c),
    }
}

fn sanitize(score: f64) -> f64 {
    finite_or_zero(score).clamp(0.0, 100.0)
}

/// Combines feature vectors into composite risk scores.
///
/// The weight set is validated at construction, so an invalid configuration
/// fails before any record is scored.
///
/// When the weight set includes the economic component but no feature vector
/// in the dataset has an economic score, the scorer drops economic and
/// renormalizes the rest for the whole run. With the four-component preset
/// this is exactly the three-component preset.
#[derive(Debug, Clone)]
pub struct RiskScorer {
    weights: WeightConfig,
}

impl RiskScorer {
    /// Create a scorer.
    ///
    /// # Errors
    ///
    /// Returns [`granary_traits::GranaryError::InvalidWeightConfig`] if the
    /// weights are negative, non-finite or do not sum to 1.0.
    pub fn new(weights: WeightConfig) -> Result<Self> {
        weights.validate()?;
        Ok(Self { weights })
    }

    /// The configured weight set.
    pub const fn weights(&self) -> &WeightConfig {
        &self.weights
    }

    /// Weight set used for a dataset, after the economic fallback.
    pub fn active_weights(&self, features: &[FeatureVector]) -> Cow<'_, WeightConfig> {
        let has_economic = features
            .iter()
            .any(|f| f.components.get(Component::Economic).is_some());
        if has_economic || !self.weights.includes(Component::Economic) {
            return Cow::Borrowed(&self.weights);
        }

        match self.weights.without(Component::Economic) {
            Ok(fallback) => {
                info!(
                    configured = %self.weights.name,
                    active = %fallback.name,
                    "economic data absent, scoring without the economic component"
                );
                Cow::Owned(fallback)
            }
            Err(err) => {
                warn!(error = %err, "economic data absent and no other component is weighted");
                Cow::Borrowed(&self.weights)
            }
        }
    }

    /// Score every feature vector. Output order follows input order.
    pub fn score(&self, features: &[FeatureVector]) -> Vec<RiskScore> {
        let weights = self.active_weights(features);

        let scores: Vec<RiskScore> = features
            .par_iter()
            .map(|f| score_one(&weights, f))
            .collect();

        let unscored = scores.iter().filter(|s| s.effective_weights.is_empty()).count();
        if unscored > 0 {
            warn!(unscored, "records without any weighted component scored as 0");
        }
        info!(records = scores.len(), weights = %weights.name, "scored records");
        scores
    }
}

fn score_one(weights: &WeightConfig, features: &FeatureVector) -> RiskScore {
    let composite = compose(weights, &features.components);
    debug!(
        record = %features.key,
        score = composite.score,
        dominant = ?composite.dominant,
        "composite"
    );

    RiskScore {
        key: features.key.clone(),
        yield_value: features.yield_value,
        yoy_delta: features.yoy_delta,
        composite_score: composite.score,
        components: features.components,
        effective_weights: composite.effective_weights,
        dominant_component: composite.dominant,
        confidence: features.confidence,
        risk_category: None,
        recommendation: None,
    }
}
