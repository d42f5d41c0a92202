//! Yield risk from trailing volatility and shortfall.

use granary_traits::stats::MIN_STD_THRESHOLD;
use granary_traits::{Component, FeatureConfig, FeatureVector, LinearScale, RiskSignal};
use serde::{Deserialize, Serialize};

/// Configuration for the yield risk signal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct YieldRiskConfig {
    /// Share of the volatility sub-score; shortfall gets the rest.
    pub volatility_share: f64,
    /// Scale for the coefficient of variation.
    pub volatility_scale: LinearScale,
    /// Scale for the fractional shortfall.
    pub shortfall_scale: LinearScale,
}

impl From<&FeatureConfig> for YieldRiskConfig {
    fn from(config: &FeatureConfig) -> Self {
        Self {
            volatility_share: config.yield_volatility_share,
            volatility_scale: config.scales.volatility,
            shortfall_scale: config.scales.yield_shortfall,
        }
    }
}

impl Default for YieldRiskConfig {
    fn default() -> Self {
        Self::from(&FeatureConfig::default())
    }
}

/// Yield risk signal.
///
/// Volatility is measured relative to the level of yields (coefficient of
/// variation) so that crops with very different yield units share one scale.
/// Shortfall is the fraction by which the current yield falls below the
/// trailing mean of prior periods; a yield above that mean has no shortfall.
#[derive(Debug, Clone, Default)]
pub struct YieldRisk {
    config: YieldRiskConfig,
}

impl YieldRisk {
    /// Create a new yield risk signal.
    #[must_use]
    pub const fn new(config: YieldRiskConfig) -> Self {
        Self { config }
    }

    /// Coefficient of variation of the trailing window, 0 for a zero mean.
    pub fn coefficient_of_variation(volatility: f64, window_mean: f64) -> f64 {
        if !volatility.is_finite()
            || !window_mean.is_finite()
            || window_mean.abs() < MIN_STD_THRESHOLD
        {
            return 0.0;
        }
        volatility / window_mean.abs()
    }

    /// Fractional shortfall of `current` below `trailing_mean`.
    ///
    /// `None` when there is no trailing mean or it is not positive.
    pub fn shortfall(current: f64, trailing_mean: Option<f64>) -> Option<f64> {
        let mean = trailing_mean.filter(|m| m.is_finite() && *m > MIN_STD_THRESHOLD)?;
        Some(((mean - current) / mean).max(0.0))
    }
}

impl RiskSignal for YieldRisk {
    fn name(&self) -> &str {
        "yield_risk"
    }

    fn component(&self) -> Component {
        Component::Yield
    }

    fn required_fields(&self) -> &[&str] {
        &["volatility", "window_mean", "yield_shortfall"]
    }

    fn score(&self, features: &FeatureVector) -> Option<f64> {
        let cv = Self::coefficient_of_variation(features.volatility, features.window_mean);
        let volatility = self.config.volatility_scale.apply(cv);
        let shortfall = features
            .yield_shortfall
            .map(|s| self.config.shortfall_scale.apply(s));

        super::blend(&[
            (self.config.volatility_share, Some(volatility)),
            (1.0 - self.config.volatility_share, shortfall),
        ])
    }

    fn description(&self) -> &str {
        "Trailing yield volatility and shortfall against the trailing mean"
    }
}
