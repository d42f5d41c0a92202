//! Drought risk from DSCI severity and persistence.

use granary_traits::{Component, FeatureConfig, FeatureVector, LinearScale, RiskSignal};
use serde::{Deserialize, Serialize};

/// Configuration for the drought risk signal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DroughtRiskConfig {
    /// DSCI value above which a period counts as high drought.
    pub high_threshold: f64,
    /// Points per consecutive high period beyond the first.
    pub persistence_bonus: f64,
    /// Maximum persistence bonus.
    pub persistence_cap: f64,
    /// Scale for the DSCI value.
    pub severity_scale: LinearScale,
}

impl From<&FeatureConfig> for DroughtRiskConfig {
    fn from(config: &FeatureConfig) -> Self {
        Self {
            high_threshold: config.drought_high_threshold,
            persistence_bonus: config.drought_persistence_bonus,
            persistence_cap: config.drought_persistence_cap,
            severity_scale: config.scales.drought_severity,
        }
    }
}

impl Default for DroughtRiskConfig {
    fn default() -> Self {
        Self::from(&FeatureConfig::default())
    }
}

/// Drought risk signal.
#[derive(Debug, Clone, Default)]
pub struct DroughtRisk {
    config: DroughtRiskConfig,
}

impl DroughtRisk {
    /// Create a new drought risk signal.
    #[must_use]
    pub const fn new(config: DroughtRiskConfig) -> Self {
        Self { config }
    }

    /// Whether a DSCI value counts as high drought.
    pub fn is_high(&self, dsci: Option<f64>) -> bool {
        dsci.is_some_and(|d| d > self.config.high_threshold)
    }

    /// Persistence bonus for a run of consecutive high periods.
    ///
    /// Zero for runs shorter than two periods.
    pub fn persistence_bonus(&self, run: u32) -> f64 {
        if run < 2 {
            return 0.0;
        }
        (self.config.persistence_bonus * f64::from(run - 1)).min(self.config.persistence_cap)
    }
}

impl RiskSignal for DroughtRisk {
    fn name(&self) -> &str {
        "drought_risk"
    }

    fn component(&self) -> Component {
        Component::Drought
    }

    fn required_fields(&self) -> &[&str] {
        &["drought_severity", "drought_run"]
    }

    fn score(&self, features: &FeatureVector) -> Option<f64> {
        let severity = features.drought_severity.filter(|d| d.is_finite())?;
        let base = self.config.severity_scale.apply(severity);
        Some((base + self.persistence_bonus(features.drought_run)).min(100.0))
    }

    fn description(&self) -> &str {
        "DSCI severity with a bonus for consecutive high-drought periods"
    }
}
