//! Immutable configuration objects shared by every stage.
//!
//! A run loads these once, validates them, and threads them by reference
//! through each stage call. Nothing in the pipeline keeps a mutable default.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{GranaryError, Result};
use crate::stats::MIN_STD_THRESHOLD;
use crate::types::Component;

/// Allowed deviation of a weight sum from 1.0.
pub const WEIGHT_TOLERANCE: f64 = 1e-6;

/// Named assignment of weights over risk components.
///
/// Weights must be finite, non-negative and sum to 1.0 within
/// [`WEIGHT_TOLERANCE`]. Components with no entry (or a zero entry) are not
/// part of the composite.
///
/// # Example
///
/// ```
/// use granary_traits::{Component, WeightConfig};
///
/// let weights = WeightConfig::four_component();
/// let fallback = weights.without(Component::Economic).unwrap();
/// assert!((fallback.weight(Component::Yield) - 0.40).abs() < 1e-9);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightConfig {
    /// Display name of the weight set.
    pub name: String,
    /// Weight per component.
    pub weights: BTreeMap<Component, f64>,
}

impl WeightConfig {
    /// Build and validate a weight set.
    ///
    /// # Errors
    ///
    /// Returns [`GranaryError::InvalidWeightConfig`] when a weight is negative
    /// or non-finite, when every weight is zero, or when the sum is not 1.0.
    pub fn new(
        name: impl Into<String>,
        weights: impl IntoIterator<Item = (Component, f64)>,
    ) -> Result<Self> {
        let config = Self {
            name: name.into(),
            weights: weights.into_iter().collect(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Yield 40 %, weather 30 %, drought 30 %.
    pub fn three_component() -> Self {
        Self {
            name: "three_component".to_string(),
            weights: BTreeMap::from([
                (Component::Yield, 0.40),
                (Component::Weather, 0.30),
                (Component::Drought, 0.30),
            ]),
        }
    }

    /// Economic 15 %, with the three-component weights scaled by 0.85.
    ///
    /// Dropping economic from this preset and renormalizing proportionally
    /// gives back [`WeightConfig::three_component`].
    pub fn four_component() -> Self {
        Self {
            name: "four_component".to_string(),
            weights: BTreeMap::from([
                (Component::Yield, 0.34),
                (Component::Weather, 0.255),
                (Component::Drought, 0.255),
                (Component::Economic, 0.15),
            ]),
        }
    }

    /// Look up a preset by name (`three_component` or `four_component`).
    pub fn preset(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "three_component" | "three" | "3" => Some(Self::three_component()),
            "four_component" | "four" | "4" => Some(Self::four_component()),
            _ => None,
        }
    }

    /// Check the weight-set invariants.
    ///
    /// # Errors
    ///
    /// See [`WeightConfig::new`].
    pub fn validate(&self) -> Result<()> {
        for (component, &weight) in &self.weights {
            if !weight.is_finite() {
                return Err(GranaryError::InvalidWeightConfig(format!(
                    "{}: weight for {component} is not finite",
                    self.name
                )));
            }
            if weight < 0.0 {
                return Err(GranaryError::InvalidWeightConfig(format!(
                    "{}: weight for {component} is negative ({weight})",
                    self.name
                )));
            }
        }

        let sum: f64 = self.weights.values().sum();
        if sum <= 0.0 {
            return Err(GranaryError::InvalidWeightConfig(format!(
                "{}: no component has a positive weight",
                self.name
            )));
        }
        if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(GranaryError::InvalidWeightConfig(format!(
                "{}: weights sum to {sum}, expected 1.0",
                self.name
            )));
        }
        Ok(())
    }

    /// Weight of a component (0.0 when absent).
    pub fn weight(&self, component: Component) -> f64 {
        self.weights.get(&component).copied().unwrap_or(0.0)
    }

    /// Whether the component carries a positive weight.
    pub fn includes(&self, component: Component) -> bool {
        self.weight(component) > 0.0
    }

    /// Components with a positive weight, in precedence order.
    pub fn components(&self) -> impl Iterator<Item = Component> + '_ {
        Component::ALL.into_iter().filter(|c| self.includes(*c))
    }

    /// Proportionally redistribute weight onto the available components.
    ///
    /// Each available component keeps `w_i / Σ w_available`; unavailable ones
    /// drop out. Returns an empty map when no weighted component is available.
    pub fn redistribute(&self, available: impl Fn(Component) -> bool) -> BTreeMap<Component, f64> {
        let active: Vec<(Component, f64)> = self
            .components()
            .filter(|c| available(*c))
            .map(|c| (c, self.weight(c)))
            .collect();

        let total: f64 = active.iter().map(|(_, w)| w).sum();
        if total <= 0.0 {
            return BTreeMap::new();
        }

        active.into_iter().map(|(c, w)| (c, w / total)).collect()
    }

    /// Weight set with one component removed and the rest renormalized.
    ///
    /// # Errors
    ///
    /// Returns [`GranaryError::InvalidWeightConfig`] if nothing is left.
    pub fn without(&self, component: Component) -> Result<Self> {
        let weights = self.redistribute(|c| c != component);
        if weights.is_empty() {
            return Err(GranaryError::InvalidWeightConfig(format!(
                "{}: removing {component} leaves no weighted component",
                self.name
            )));
        }
        Ok(Self {
            name: format!("{}_without_{component}", self.name),
            weights,
        })
    }
}

impl Default for WeightConfig {
    fn default() -> Self {
        Self::three_component()
    }
}

/// Linear map from raw units onto the 0-100 component scale.
///
/// `lower` maps to 0, `upper` maps to 100, values outside are clamped.
/// Non-finite inputs and a degenerate span resolve to 0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearScale {
    /// Raw value that maps to 0.
    pub lower: f64,
    /// Raw value that maps to 100.
    pub upper: f64,
}

impl LinearScale {
    /// Create a scale.
    pub const fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    /// Scale a raw value.
    pub fn apply(&self, raw: f64) -> f64 {
        let span = self.upper - self.lower;
        if !raw.is_finite() || !span.is_finite() || span.abs() < MIN_STD_THRESHOLD {
            return 0.0;
        }
        ((raw - self.lower) / span * 100.0).clamp(0.0, 100.0)
    }

    fn validate(&self, name: &str) -> Result<()> {
        if !self.lower.is_finite() || !self.upper.is_finite() || self.upper <= self.lower {
            return Err(GranaryError::InvalidConfig(format!(
                "scale `{name}` needs finite bounds with upper > lower (got {}..{})",
                self.lower, self.upper
            )));
        }
        Ok(())
    }
}

/// Raw-to-score bounds for every derived feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScaleConfig {
    /// Coefficient of variation of the trailing yield window.
    pub volatility: LinearScale,
    /// Fractional yield shortfall against the trailing mean.
    pub yield_shortfall: LinearScale,
    /// Degrees Celsius outside the optimal band.
    pub temperature_stress: LinearScale,
    /// Absolute precipitation z-score.
    pub precipitation_anomaly: LinearScale,
    /// DSCI value.
    pub drought_severity: LinearScale,
    /// Ending-stocks drawdown fraction.
    pub economic_stress: LinearScale,
}

impl Default for ScaleConfig {
    fn default() -> Self {
        Self {
            volatility: LinearScale::new(0.0, 0.25),
            yield_shortfall: LinearScale::new(0.0, 0.5),
            temperature_stress: LinearScale::new(0.0, 10.0),
            precipitation_anomaly: LinearScale::new(0.0, 3.0),
            drought_severity: LinearScale::new(0.0, 500.0),
            economic_stress: LinearScale::new(0.0, 0.3),
        }
    }
}

impl ScaleConfig {
    fn validate(&self) -> Result<()> {
        self.volatility.validate("volatility")?;
        self.yield_shortfall.validate("yield_shortfall")?;
        self.temperature_stress.validate("temperature_stress")?;
        self.precipitation_anomaly.validate("precipitation_anomaly")?;
        self.drought_severity.validate("drought_severity")?;
        self.economic_stress.validate("economic_stress")
    }
}

/// Feature-engineering parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Trailing window length W, in periods.
    pub volatility_window: usize,
    /// Centre of the optimal growing temperature band, °C.
    pub optimal_temperature_c: f64,
    /// Half-width of the optimal band, °C.
    pub temperature_band_c: f64,
    /// DSCI value above which a period counts as high drought.
    pub drought_high_threshold: f64,
    /// Points added per consecutive high-drought period beyond the first.
    pub drought_persistence_bonus: f64,
    /// Maximum persistence bonus.
    pub drought_persistence_cap: f64,
    /// Share of volatility in the yield component (the rest is shortfall).
    pub yield_volatility_share: f64,
    /// Share of temperature in the weather component (the rest is precipitation).
    pub temperature_share: f64,
    /// Scaling bounds.
    pub scales: ScaleConfig,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            volatility_window: 3,
            optimal_temperature_c: 21.0,
            temperature_band_c: 3.0,
            drought_high_threshold: 250.0,
            drought_persistence_bonus: 10.0,
            drought_persistence_cap: 20.0,
            yield_volatility_share: 0.5,
            temperature_share: 0.5,
            scales: ScaleConfig::default(),
        }
    }
}

impl FeatureConfig {
    /// Check parameter domains.
    ///
    /// # Errors
    ///
    /// Returns [`GranaryError::InvalidConfig`] naming the first bad field.
    pub fn validate(&self) -> Result<()> {
        if self.volatility_window < 2 {
            return Err(GranaryError::InvalidConfig(format!(
                "volatility_window must be at least 2 (got {})",
                self.volatility_window
            )));
        }
        let finite_non_negative = [
            ("temperature_band_c", self.temperature_band_c),
            ("drought_high_threshold", self.drought_high_threshold),
            ("drought_persistence_bonus", self.drought_persistence_bonus),
            ("drought_persistence_cap", self.drought_persistence_cap),
        ];
        for (name, value) in finite_non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(GranaryError::InvalidConfig(format!(
                    "{name} must be finite and non-negative (got {value})"
                )));
            }
        }
        if !self.optimal_temperature_c.is_finite() {
            return Err(GranaryError::InvalidConfig(
                "optimal_temperature_c must be finite".to_string(),
            ));
        }
        for (name, share) in [
            ("yield_volatility_share", self.yield_volatility_share),
            ("temperature_share", self.temperature_share),
        ] {
            if !(0.0..=1.0).contains(&share) {
                return Err(GranaryError::InvalidConfig(format!(
                    "{name} must lie in [0, 1] (got {share})"
                )));
            }
        }
        self.scales.validate()
    }
}

/// Lower bounds of the Moderate, High and Very High tiers.
///
/// Tiers are half-open `[lower, next)` except Very High, which is closed at 100.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierBoundaries {
    /// Lower bound of Moderate.
    pub moderate: f64,
    /// Lower bound of High.
    pub high: f64,
    /// Lower bound of Very High.
    pub very_high: f64,
}

impl Default for TierBoundaries {
    fn default() -> Self {
        Self {
            moderate: 25.0,
            high: 50.0,
            very_high: 75.0,
        }
    }
}

impl TierBoundaries {
    /// Check that boundaries are strictly ascending inside (0, 100).
    ///
    /// # Errors
    ///
    /// Returns [`GranaryError::InvalidConfig`] otherwise.
    pub fn validate(&self) -> Result<()> {
        let ordered = 0.0 < self.moderate
            && self.moderate < self.high
            && self.high < self.very_high
            && self.very_high < 100.0;
        if !ordered {
            return Err(GranaryError::InvalidConfig(format!(
                "tier boundaries must satisfy 0 < {} < {} < {} < 100",
                self.moderate, self.high, self.very_high
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_presets_are_valid() {
        WeightConfig::three_component().validate().unwrap();
        WeightConfig::four_component().validate().unwrap();
    }

    #[test]
    fn test_four_component_reduces_to_three_component() {
        let reduced = WeightConfig::four_component()
            .without(Component::Economic)
            .unwrap();
        let three = WeightConfig::three_component();
        for c in [Component::Yield, Component::Weather, Component::Drought] {
            assert_abs_diff_eq!(reduced.weight(c), three.weight(c), epsilon = 1e-12);
        }
        assert!(!reduced.includes(Component::Economic));
    }

    #[test]
    fn test_negative_weight_rejected() {
        let err = WeightConfig::new(
            "bad",
            [(Component::Yield, 1.2), (Component::Weather, -0.2)],
        )
        .unwrap_err();
        assert!(matches!(err, GranaryError::InvalidWeightConfig(_)));
    }

    #[test]
    fn test_sum_must_be_one() {
        let err = WeightConfig::new("short", [(Component::Yield, 0.5), (Component::Drought, 0.4)])
            .unwrap_err();
        assert!(err.to_string().contains("sum"));

        WeightConfig::new(
            "close_enough",
            [(Component::Yield, 0.5), (Component::Drought, 0.5 + 1e-9)],
        )
        .unwrap();
    }

    #[test]
    fn test_nan_weight_rejected() {
        let err = WeightConfig::new("nan", [(Component::Yield, f64::NAN)]).unwrap_err();
        assert!(err.to_string().contains("not finite"));
    }

    #[test]
    fn test_redistribute_proportional() {
        let weights = WeightConfig::three_component();
        let effective = weights.redistribute(|c| c != Component::Weather);
        assert_abs_diff_eq!(effective[&Component::Yield], 0.4 / 0.7, epsilon = 1e-12);
        assert_abs_diff_eq!(effective[&Component::Drought], 0.3 / 0.7, epsilon = 1e-12);
        assert_abs_diff_eq!(effective.values().sum::<f64>(), 1.0, epsilon = 1e-12);
        assert!(weights.redistribute(|_| false).is_empty());
    }

    #[test]
    fn test_preset_lookup() {
        assert_eq!(
            WeightConfig::preset("four-component"),
            Some(WeightConfig::four_component())
        );
        assert_eq!(WeightConfig::preset("3"), Some(WeightConfig::three_component()));
        assert!(WeightConfig::preset("five").is_none());
    }

    #[test]
    fn test_linear_scale() {
        let scale = LinearScale::new(0.0, 500.0);
        assert_abs_diff_eq!(scale.apply(250.0), 50.0);
        assert_abs_diff_eq!(scale.apply(900.0), 100.0);
        assert_abs_diff_eq!(scale.apply(-5.0), 0.0);
        assert_eq!(scale.apply(f64::NAN), 0.0);
        assert_eq!(LinearScale::new(1.0, 1.0).apply(3.0), 0.0);
    }

    #[test]
    fn test_feature_config_validation() {
        FeatureConfig::default().validate().unwrap();

        let config = FeatureConfig {
            volatility_window: 1,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let mut config = FeatureConfig::default();
        config.scales.drought_severity = LinearScale::new(10.0, 0.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_tier_boundaries_validation() {
        TierBoundaries::default().validate().unwrap();
        let bad = TierBoundaries {
            moderate: 50.0,
            high: 25.0,
            very_high: 75.0,
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_weight_config_json() {
        let json = r#"{"name":"custom","weights":{"yield":0.5,"drought":0.5}}"#;
        let config: WeightConfig = serde_json::from_str(json).unwrap();
        config.validate().unwrap();
        assert_eq!(config.weight(Component::Drought), 0.5);
        assert_eq!(config.weight(Component::Weather), 0.0);
    }
}
