//! Rolling-window feature derivation.

use std::collections::BTreeMap;
use std::fmt;

use granary_traits::stats::{mean, sample_std};
use granary_traits::{
    Confidence, FeatureConfig, FeatureVector, FeatureWarning, GroupSeries, MergedRecord, Result,
    RiskSignal, group_by_key,
};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::registry::component_signals;
use crate::signals::{DroughtRisk, EconomicRisk, WeatherRisk, YieldRisk};

/// Derives per-record features and component scores from merged records.
///
/// Records are grouped by `(region, commodity)` and processed in period
/// order. Groups are independent and run in parallel; the output is ordered
/// by group key, then period, whatever the thread schedule.
///
/// # Insufficient history
///
/// When the trailing window holds fewer than two periods the record's own
/// volatility is undefined. The record then takes the mean volatility of all
/// records of the same commodity that did have enough history (0.0 if there
/// are none), is marked [`Confidence::Low`] and carries a
/// [`FeatureWarning::InsufficientHistory`].
///
/// # Example
///
/// ```
/// use granary_features::FeatureEngineer;
/// use granary_traits::{Confidence, FeatureConfig, MergedRecord, RecordKey};
///
/// let merged = vec![
///     MergedRecord::yield_only(RecordKey::new("IOWA", 2010, "CORN"), 150.0),
///     MergedRecord::yield_only(RecordKey::new("IOWA", 2011, "CORN"), 140.0),
/// ];
/// let engineer = FeatureEngineer::new(FeatureConfig::default()).unwrap();
/// let features = engineer.derive(&merged).unwrap();
///
/// assert_eq!(features[0].confidence, Confidence::Low);
/// assert_eq!(features[1].confidence, Confidence::High);
/// assert_eq!(features[1].yoy_delta, Some(-10.0));
/// ```
pub struct FeatureEngineer {
    config: FeatureConfig,
    signals: Vec<Box<dyn RiskSignal>>,
    weather: WeatherRisk,
    drought: DroughtRisk,
}

impl fmt::Debug for FeatureEngineer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeatureEngineer")
            .field("config", &self.config)
            .field(
                "signals",
                &self.signals.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Features of one record before the volatility fallback is resolved.
struct Draft {
    features: FeatureVector,
    window_volatility: Option<f64>,
    window_available: usize,
}

impl FeatureEngineer {
    /// Create an engineer with the standard component signals.
    ///
    /// # Errors
    ///
    /// Returns [`granary_traits::GranaryError::InvalidConfig`] if the
    /// configuration is out of range.
    pub fn new(config: FeatureConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: FeatureConfig) -> Self {
        Self {
            signals: component_signals(&config),
            weather: WeatherRisk::new((&config).into()),
            drought: DroughtRisk::new((&config).into()),
            config,
        }
    }

    /// The active configuration.
    pub const fn config(&self) -> &FeatureConfig {
        &self.config
    }

    /// The component signals, in precedence order.
    pub fn signals(&self) -> &[Box<dyn RiskSignal>] {
        &self.signals
    }

    /// Derive one feature vector per merged record.
    ///
    /// # Errors
    ///
    /// Returns [`granary_traits::GranaryError::DuplicateKey`] if two merged
    /// records share a key.
    pub fn derive(&self, merged: &[MergedRecord]) -> Result<Vec<FeatureVector>> {
        let groups: Vec<GroupSeries<'_, MergedRecord>> =
            group_by_key(merged, "merged")?.into_values().collect();

        let drafts: Vec<Draft> = groups
            .par_iter()
            .flat_map_iter(|series| self.derive_group(series))
            .collect();

        let fallbacks = commodity_fallbacks(&drafts);
        let window = self.config.volatility_window;
        let features: Vec<FeatureVector> = drafts
            .into_par_iter()
            .map(|draft| self.finalize(draft, &fallbacks, window))
            .collect();

        let low_confidence = features
            .iter()
            .filter(|f| f.confidence == Confidence::Low)
            .count();
        info!(
            records = features.len(),
            groups = groups.len(),
            low_confidence,
            "derived features"
        );
        Ok(features)
    }

    fn derive_group(&self, series: &GroupSeries<'_, MergedRecord>) -> Vec<Draft> {
        let window_len = self.config.volatility_window;
        debug!(group = %series.key(), periods = series.len(), "deriving group");

        series
            .iter()
            .enumerate()
            .map(|(i, record)| {
                let window = series.window(i, window_len);
                let yields = window.values(|r| r.yield_value);
                let window_volatility = if window.has_at_least(2) {
                    sample_std(&yields)
                } else {
                    None
                };

                // Prior periods t-W ..= t-1
                let trailing_mean =
                    mean(&series.window(i, window_len + 1).prior_values(|r| r.yield_value));

                let yoy_delta = series
                    .previous(i)
                    .map(|prev| record.yield_value - prev.yield_value);

                let precipitation_history: Vec<f64> = series
                    .prior(i)
                    .iter()
                    .filter_map(|r| r.total_precipitation)
                    .collect();

                let mut features = FeatureVector::bare(record.key.clone(), record.yield_value);
                features.window_mean = mean(&yields).unwrap_or(record.yield_value);
                features.trailing_mean = trailing_mean;
                features.yoy_delta = yoy_delta;
                features.yield_shortfall = YieldRisk::shortfall(record.yield_value, trailing_mean);
                features.temperature_stress = finite(record.mean_temperature)
                    .map(|t| self.weather.temperature_stress(t));
                features.precipitation_anomaly = finite(record.total_precipitation)
                    .map(|p| WeatherRisk::precipitation_anomaly(p, &precipitation_history));
                features.drought_severity = finite(record.drought_severity_index);
                features.drought_run =
                    series.run_length(i, |r| self.drought.is_high(r.drought_severity_index));
                features.economic_stress = finite(record.economic_delta).map(EconomicRisk::stress);
                if yoy_delta.is_none() {
                    features.warnings.push(FeatureWarning::NoPriorPeriod);
                }

                Draft {
                    features,
                    window_volatility,
                    window_available: window.available(),
                }
            })
            .collect()
    }

    fn finalize(
        &self,
        draft: Draft,
        fallbacks: &BTreeMap<String, f64>,
        window: usize,
    ) -> FeatureVector {
        let Draft {
            mut features,
            window_volatility,
            window_available,
        } = draft;

        match window_volatility {
            Some(volatility) => features.volatility = volatility,
            None => {
                let fallback = fallbacks
                    .get(&features.key.commodity)
                    .copied()
                    .unwrap_or(0.0);
                warn!(
                    record = %features.key,
                    available = window_available,
                    window,
                    fallback,
                    "insufficient history for trailing volatility"
                );
                features.volatility = fallback;
                features.confidence = Confidence::Low;
                features.warnings.push(FeatureWarning::InsufficientHistory {
                    available: window_available,
                    window,
                    fallback,
                });
            }
        }

        for signal in &self.signals {
            let component = signal.component();
            let score = signal.score(&features);
            if score.is_none() {
                debug!(record = %features.key, %component, "component inputs missing");
                features.warnings.push(FeatureWarning::MissingInputs { component });
            }
            features.components = features.components.with(component, score);
        }
        features
    }
}

impl Default for FeatureEngineer {
    fn default() -> Self {
        Self::build(FeatureConfig::default())
    }
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

/// Mean confident volatility per commodity, across regions and periods.
fn commodity_fallbacks(drafts: &[Draft]) -> BTreeMap<String, f64> {
    let mut by_commodity: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for draft in drafts {
        if let Some(volatility) = draft.window_volatility {
            by_commodity
                .entry(draft.features.key.commodity.as_str())
                .or_default()
                .push(volatility);
        }
    }
    by_commodity
        .into_iter()
        .filter_map(|(commodity, vols)| mean(&vols).map(|m| (commodity.to_string(), m)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use granary_traits::{Component, GranaryError, RecordKey};

    fn record(region: &str, period: i32, commodity: &str, value: f64) -> MergedRecord {
        MergedRecord::yield_only(RecordKey::new(region, period, commodity), value)
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = FeatureConfig {
            volatility_window: 1,
            ..FeatureConfig::default()
        };
        assert!(matches!(
            FeatureEngineer::new(config),
            Err(GranaryError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_output_is_grouped_and_sorted() {
        let merged = vec![
            record("KANSAS", 2011, "WHEAT", 45.0),
            record("IOWA", 2012, "CORN", 105.0),
            record("IOWA", 2010, "CORN", 150.0),
            record("KANSAS", 2010, "WHEAT", 40.0),
            record("IOWA", 2011, "CORN", 155.0),
        ];
        let features = FeatureEngineer::default().derive(&merged).unwrap();
        let keys: Vec<String> = features.iter().map(|f| f.key.to_string()).collect();
        assert_eq!(
            keys,
            vec![
                "IOWA/CORN/2010",
                "IOWA/CORN/2011",
                "IOWA/CORN/2012",
                "KANSAS/WHEAT/2010",
                "KANSAS/WHEAT/2011",
            ]
        );
    }

    #[test]
    fn test_rolling_volatility_uses_trailing_window() {
        let merged = vec![
            record("IOWA", 2009, "CORN", 100.0),
            record("IOWA", 2010, "CORN", 150.0),
            record("IOWA", 2011, "CORN", 155.0),
            record("IOWA", 2012, "CORN", 145.0),
        ];
        let features = FeatureEngineer::default().derive(&merged).unwrap();

        // 2012 window: 150, 155, 145
        let last = &features[3];
        assert_relative_eq!(last.volatility, 5.0, epsilon = 1e-12);
        assert_relative_eq!(last.window_mean, 150.0, epsilon = 1e-12);
        // 2009..=2011 prior mean
        assert_relative_eq!(last.trailing_mean.unwrap(), 135.0, epsilon = 1e-12);
        assert_eq!(last.confidence, Confidence::High);
    }

    #[test]
    fn test_single_period_group_uses_commodity_fallback() {
        let merged = vec![
            record("IOWA", 2010, "CORN", 150.0),
            record("IOWA", 2011, "CORN", 140.0),
            record("NEBRASKA", 2011, "CORN", 160.0),
        ];
        let features = FeatureEngineer::default().derive(&merged).unwrap();

        let iowa_2011 = &features[1];
        let expected = iowa_2011.volatility;
        assert_relative_eq!(expected, 7.071_067_811_865_476, epsilon = 1e-9);

        let nebraska = &features[2];
        assert_eq!(nebraska.confidence, Confidence::Low);
        assert_relative_eq!(nebraska.volatility, expected);
        assert!(nebraska.warnings.contains(&FeatureWarning::InsufficientHistory {
            available: 1,
            window: 3,
            fallback: expected,
        }));
        assert!(nebraska.components.yield_risk.unwrap().is_finite());
    }

    #[test]
    fn test_fallback_is_zero_without_confident_records() {
        let merged = vec![record("IOWA", 2012, "CORN", 105.0)];
        let features = FeatureEngineer::default().derive(&merged).unwrap();
        assert_eq!(features[0].volatility, 0.0);
        assert_eq!(features[0].confidence, Confidence::Low);
        assert_eq!(features[0].components.yield_risk, Some(0.0));
    }

    #[test]
    fn test_yoy_delta_flagged_for_first_period() {
        let merged = vec![
            record("IOWA", 2011, "CORN", 150.0),
            record("IOWA", 2012, "CORN", 105.0),
        ];
        let features = FeatureEngineer::default().derive(&merged).unwrap();
        assert_eq!(features[0].yoy_delta, None);
        assert!(features[0].warnings.contains(&FeatureWarning::NoPriorPeriod));
        assert_eq!(features[1].yoy_delta, Some(-45.0));
        assert!(!features[1].warnings.contains(&FeatureWarning::NoPriorPeriod));
    }

    #[test]
    fn test_missing_inputs_leave_component_undefined() {
        let merged = vec![record("IOWA", 2012, "CORN", 105.0)];
        let features = FeatureEngineer::default().derive(&merged).unwrap();
        let f = &features[0];
        assert_eq!(f.components.weather_risk, None);
        assert_eq!(f.components.drought_risk, None);
        assert_eq!(f.components.economic_risk, None);
        for component in [Component::Weather, Component::Drought, Component::Economic] {
            assert!(f.warnings.contains(&FeatureWarning::MissingInputs { component }));
        }
    }

    #[test]
    fn test_drought_persistence() {
        let mut merged = Vec::new();
        for (period, dsci) in [(2010, 300.0), (2011, 320.0), (2012, 420.0)] {
            let mut r = record("IOWA", period, "CORN", 150.0);
            r.drought_severity_index = Some(dsci);
            merged.push(r);
        }
        let features = FeatureEngineer::default().derive(&merged).unwrap();
        assert_eq!(features[0].drought_run, 1);
        assert_eq!(features[2].drought_run, 3);
        // 420 -> 84 plus the capped bonus of 20
        assert_eq!(features[2].components.drought_risk, Some(100.0));
        assert_relative_eq!(features[1].components.drought_risk.unwrap(), 74.0, epsilon = 1e-9);
    }

    #[test]
    fn test_precipitation_anomaly_against_prior_periods() {
        let mut merged = Vec::new();
        for (period, precip) in [(2009, 30.0), (2010, 32.0), (2011, 34.0), (2012, 27.0)] {
            let mut r = record("IOWA", period, "CORN", 150.0);
            r.total_precipitation = Some(precip);
            merged.push(r);
        }
        let features = FeatureEngineer::default().derive(&merged).unwrap();
        assert_eq!(features[0].precipitation_anomaly, Some(0.0));
        assert_eq!(features[1].precipitation_anomaly, Some(0.0));
        assert_relative_eq!(features[3].precipitation_anomaly.unwrap(), -2.5, epsilon = 1e-12);
    }

    #[test]
    fn test_derive_is_deterministic() {
        let merged: Vec<MergedRecord> = (0..40)
            .map(|i| {
                let region = ["IOWA", "KANSAS", "NEBRASKA", "ILLINOIS"][i % 4];
                record(region, 2000 + (i / 4) as i32, "CORN", 100.0 + (i * 7 % 23) as f64)
            })
            .collect();
        let engineer = FeatureEngineer::default();
        assert_eq!(engineer.derive(&merged).unwrap(), engineer.derive(&merged).unwrap());
    }

    #[test]
    fn test_duplicate_merged_key_is_error() {
        let merged = vec![
            record("IOWA", 2012, "CORN", 105.0),
            record("IOWA", 2012, "CORN", 106.0),
        ];
        assert!(matches!(
            FeatureEngineer::default().derive(&merged),
            Err(GranaryError::DuplicateKey { .. })
        ));
    }
}
