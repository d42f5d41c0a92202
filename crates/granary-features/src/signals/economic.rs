//! Economic risk from ending-stocks drawdown.

use granary_traits::{Component, FeatureConfig, FeatureVector, LinearScale, RiskSignal};
use serde::{Deserialize, Serialize};

/// Configuration for the economic risk signal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EconomicRiskConfig {
    /// Scale for the drawdown fraction.
    pub drawdown_scale: LinearScale,
}

impl From<&FeatureConfig> for EconomicRiskConfig {
    fn from(config: &FeatureConfig) -> Self {
        Self {
            drawdown_scale: config.scales.economic_stress,
        }
    }
}

impl Default for EconomicRiskConfig {
    fn default() -> Self {
        Self::from(&FeatureConfig::default())
    }
}

/// Economic risk signal.
///
/// Only falling stocks are stressful; a build-up scores zero.
#[derive(Debug, Clone, Default)]
pub struct EconomicRisk {
    config: EconomicRiskConfig,
}

impl EconomicRisk {
    /// Create a new economic risk signal.
    #[must_use]
    pub const fn new(config: EconomicRiskConfig) -> Self {
        Self { config }
    }

    /// Drawdown implied by a stocks delta.
    pub fn stress(economic_delta: f64) -> f64 {
        (-economic_delta).max(0.0)
    }
}

impl RiskSignal for EconomicRisk {
    fn name(&self) -> &str {
        "economic_risk"
    }

    fn component(&self) -> Component {
        Component::Economic
    }

    fn required_fields(&self) -> &[&str] {
        &["economic_stress"]
    }

    fn score(&self, features: &FeatureVector) -> Option<f64> {
        features
            .economic_stress
            .map(|s| self.config.drawdown_scale.apply(s))
    }

    fn description(&self) -> &str {
        "Drawdown of ending stocks"
    }
}
