//! Record types flowing between pipeline stages.
//!
//! Each stage consumes a slice of the previous stage's records and returns a
//! freshly owned collection; nothing here is mutated after construction except
//! by the stage that creates it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{Component, Confidence, Period, RecordKey, RiskCategory};

/// Crop yield observation, the driving (left) side of the merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YieldObservation {
    /// Region (state) name as delivered by the collector.
    pub region: String,
    /// Crop year.
    pub period: Period,
    /// Commodity name.
    pub commodity: String,
    /// Yield per unit area.
    pub yield_value: f64,
}

/// Weather observation.
///
/// `commodity = None` marks a region-wide row that applies to every commodity
/// grown in the region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherObservation {
    /// Region name.
    pub region: String,
    /// Crop year.
    pub period: Period,
    /// Commodity, or `None` for a region-wide row.
    pub commodity: Option<String>,
    /// Growing-season mean temperature in °C.
    pub mean_temperature: Option<f64>,
    /// Growing-season total precipitation.
    pub total_precipitation: Option<f64>,
}

/// Drought observation (DSCI, 0-500).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DroughtObservation {
    /// Region name.
    pub region: String,
    /// Crop year.
    pub period: Period,
    /// Commodity, or `None` for a region-wide row.
    pub commodity: Option<String>,
    /// Drought Severity and Coverage Index.
    pub drought_severity_index: Option<f64>,
}

/// Economic observation.
///
/// `region = None` marks a national row that applies to every region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EconomicObservation {
    /// Region, or `None` for a national row.
    pub region: Option<String>,
    /// Crop year.
    pub period: Period,
    /// Commodity name.
    pub commodity: String,
    /// Fractional change in ending stocks (negative = drawdown).
    pub economic_delta: Option<f64>,
}

/// One denormalized row per yield observation.
///
/// Fields from sources without a matching row stay `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedRecord {
    /// Normalized join key.
    #[serde(flatten)]
    pub key: RecordKey,
    /// Yield per unit area.
    pub yield_value: f64,
    /// Mean temperature in °C.
    pub mean_temperature: Option<f64>,
    /// Total precipitation.
    pub total_precipitation: Option<f64>,
    /// DSCI value.
    pub drought_severity_index: Option<f64>,
    /// Ending-stocks delta.
    pub economic_delta: Option<f64>,
}

impl MergedRecord {
    /// A record carrying only the yield measurement.
    pub const fn yield_only(key: RecordKey, yield_value: f64) -> Self {
        Self {
            key,
            yield_value,
            mean_temperature: None,
            total_precipitation: None,
            drought_severity_index: None,
            economic_delta: None,
        }
    }
}

/// Per-component severity on the 0-100 scale.
///
/// `None` means the component could not be computed for the record because
/// all of its inputs were null.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentScores {
    /// Yield risk.
    pub yield_risk: Option<f64>,
    /// Weather risk.
    pub weather_risk: Option<f64>,
    /// Drought risk.
    pub drought_risk: Option<f64>,
    /// Economic risk.
    pub economic_risk: Option<f64>,
}

impl ComponentScores {
    /// Score for a component.
    pub const fn get(&self, component: Component) -> Option<f64> {
        match component {
            Component::Yield => self.yield_risk,
            Component::Weather => self.weather_risk,
            Component::Drought => self.drought_risk,
            Component::Economic => self.economic_risk,
        }
    }

    /// Copy with one component replaced.
    #[must_use]
    pub const fn with(mut self, component: Component, value: Option<f64>) -> Self {
        match component {
            Component::Yield => self.yield_risk = value,
            Component::Weather => self.weather_risk = value,
            Component::Drought => self.drought_risk = value,
            Component::Economic => self.economic_risk = value,
        }
        self
    }

    /// Components with a defined score, in precedence order.
    pub fn defined(&self) -> impl Iterator<Item = (Component, f64)> + '_ {
        Component::ALL
            .into_iter()
            .filter_map(|c| self.get(c).map(|v| (c, v)))
    }
}

/// Non-fatal condition raised while deriving features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeatureWarning {
    /// The trailing volatility window held fewer than two periods; the
    /// commodity fallback volatility was used instead.
    InsufficientHistory {
        /// Periods present in the window.
        available: usize,
        /// Configured window length.
        window: usize,
        /// Substituted volatility.
        fallback: f64,
    },
    /// First period of its group: no year-over-year delta exists.
    NoPriorPeriod,
    /// Every input of a component was null for this record.
    MissingInputs {
        /// The component left undefined.
        component: Component,
    },
}

/// Engineered features for one merged record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Normalized join key.
    #[serde(flatten)]
    pub key: RecordKey,
    /// Yield per unit area.
    pub yield_value: f64,
    /// Trailing standard deviation of yield (or its fallback).
    pub volatility: f64,
    /// Mean yield of the trailing volatility window, current period included.
    pub window_mean: f64,
    /// Mean yield over the prior periods of the trailing window.
    pub trailing_mean: Option<f64>,
    /// Current minus previous yield; `None` for a group's first period.
    pub yoy_delta: Option<f64>,
    /// Fractional shortfall of current yield against `trailing_mean`.
    pub yield_shortfall: Option<f64>,
    /// Degrees outside the optimal temperature band.
    pub temperature_stress: Option<f64>,
    /// Z-score of precipitation against the group's prior periods.
    pub precipitation_anomaly: Option<f64>,
    /// DSCI value.
    pub drought_severity: Option<f64>,
    /// Consecutive periods (ending here) above the high drought threshold.
    pub drought_run: u32,
    /// Ending-stocks drawdown (positive when stocks fall).
    pub economic_stress: Option<f64>,
    /// Component scores on the 0-100 scale.
    pub components: ComponentScores,
    /// `Low` when the volatility fallback was used.
    pub confidence: Confidence,
    /// Non-fatal conditions met while deriving this vector.
    pub warnings: Vec<FeatureWarning>,
}

impl FeatureVector {
    /// A vector with only key and yield set: zero volatility, no derived
    /// features and no component scores.
    pub const fn bare(key: RecordKey, yield_value: f64) -> Self {
        Self {
            key,
            yield_value,
            volatility: 0.0,
            window_mean: yield_value,
            trailing_mean: None,
            yoy_delta: None,
            yield_shortfall: None,
            temperature_stress: None,
            precipitation_anomaly: None,
            drought_severity: None,
            drought_run: 0,
            economic_stress: None,
            components: ComponentScores {
                yield_risk: None,
                weather_risk: None,
                drought_risk: None,
                economic_risk: None,
            },
            confidence: Confidence::High,
            warnings: Vec::new(),
        }
    }
}

/// Composite stock risk index for one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskScore {
    /// Normalized join key.
    #[serde(flatten)]
    pub key: RecordKey,
    /// Yield per unit area, kept for backtesting.
    pub yield_value: f64,
    /// Year-over-year yield delta, kept for backtesting.
    pub yoy_delta: Option<f64>,
    /// Weighted composite in `[0, 100]`.
    pub composite_score: f64,
    /// Component scores that entered the composite.
    pub components: ComponentScores,
    /// Post-redistribution weights actually applied; they sum to 1.0.
    pub effective_weights: BTreeMap<Component, f64>,
    /// Component with the largest weighted contribution.
    pub dominant_component: Option<Component>,
    /// Confidence inherited from the feature vector.
    pub confidence: Confidence,
    /// Tier, set by the classifier.
    pub risk_category: Option<RiskCategory>,
    /// Recommendation text, set by the classifier.
    pub recommendation: Option<String>,
}

impl RiskScore {
    /// Weighted contribution of a component to the composite.
    pub fn contribution(&self, component: Component) -> f64 {
        let weight = self.effective_weights.get(&component).copied().unwrap_or(0.0);
        weight * self.components.get(component).unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_scores_accessors() {
        let scores = ComponentScores::default()
            .with(Component::Yield, Some(40.0))
            .with(Component::Drought, Some(80.0));

        assert_eq!(scores.get(Component::Yield), Some(40.0));
        assert_eq!(scores.get(Component::Weather), None);

        let defined: Vec<_> = scores.defined().collect();
        assert_eq!(
            defined,
            vec![(Component::Yield, 40.0), (Component::Drought, 80.0)]
        );
    }

    #[test]
    fn test_merged_record_serializes_flat_key() {
        let record = MergedRecord::yield_only(RecordKey::new("iowa", 2012, "corn"), 105.0);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["region"], "IOWA");
        assert_eq!(json["period"], 2012);
        assert_eq!(json["commodity"], "CORN");
        assert!(json["mean_temperature"].is_null());
    }

    #[test]
    fn test_contribution() {
        let mut weights = BTreeMap::new();
        weights.insert(Component::Yield, 0.5);
        weights.insert(Component::Drought, 0.5);
        let score = RiskScore {
            key: RecordKey::new("KANSAS", 2020, "WHEAT"),
            yield_value: 50.0,
            yoy_delta: None,
            composite_score: 30.0,
            components: ComponentScores::default()
                .with(Component::Yield, Some(20.0))
                .with(Component::Drought, Some(40.0)),
            effective_weights: weights,
            dominant_component: Some(Component::Drought),
            confidence: Confidence::High,
            risk_category: None,
            recommendation: None,
        };
        assert!((score.contribution(Component::Drought) - 20.0).abs() < 1e-12);
        assert_eq!(score.contribution(Component::Economic), 0.0);
    }
}
