//! Component sensitivity: no weighted component may be dead weight.
//!
//! The check works on raw inputs, not on component scores. Each component's
//! inputs are shifted, the features are derived again under the run's
//! [`granary_traits::FeatureConfig`] and the records are re-composed. A
//! component whose scaling flattens every input (for example a scale whose
//! upper bound is far beyond any real value) therefore fails, even though
//! its weight is positive.

use granary_combine::compose;
use granary_features::FeatureEngineer;
use granary_traits::stats::mean;
use granary_traits::{
    Component, FeatureConfig, FeatureVector, GranaryError, GroupKey, MergedRecord, Result,
    WeightConfig,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::report::TestResult;

/// How far each component's raw inputs are moved.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputPerturbation {
    /// Fraction taken off the yield of every other period of a series
    pub yield_shock: f64,
    /// Degrees moved away from the optimal temperature
    pub temperature_shift: f64,
    /// Fraction taken off the precipitation of every other period
    pub precipitation_shock: f64,
    /// DSCI points moved, downwards when the value allows it
    pub drought_shift: f64,
    /// Subtracted from the ending-stocks delta
    pub economic_shift: f64,
}

impl Default for InputPerturbation {
    fn default() -> Self {
        Self {
            yield_shock: 0.2,
            temperature_shift: 5.0,
            precipitation_shock: 0.3,
            drought_shift: 100.0,
            economic_shift: 0.1,
        }
    }
}

impl InputPerturbation {
    /// Check that every shift is usable.
    ///
    /// # Errors
    ///
    /// Returns [`GranaryError::InvalidConfig`] naming the first bad value.
    pub fn validate(&self) -> Result<()> {
        for (name, shock) in [
            ("yield_shock", self.yield_shock),
            ("precipitation_shock", self.precipitation_shock),
        ] {
            if shock.is_nan() || shock <= 0.0 || shock >= 1.0 {
                return Err(GranaryError::InvalidConfig(format!(
                    "validation.sensitivity.{name} must lie in (0, 1), got {shock}"
                )));
            }
        }
        for (name, shift) in [
            ("temperature_shift", self.temperature_shift),
            ("drought_shift", self.drought_shift),
            ("economic_shift", self.economic_shift),
        ] {
            if !(shift.is_finite() && shift > 0.0) {
                return Err(GranaryError::InvalidConfig(format!(
                    "validation.sensitivity.{name} must be finite and positive, got {shift}"
                )));
            }
        }
        Ok(())
    }

    /// Copy of `merged` with the raw inputs of `component` moved.
    ///
    /// Alternating shocks are applied by position inside each
    /// `(region, commodity)` series, starting with its first period, so the
    /// trailing statistics change as well as the levels.
    pub fn apply(
        &self,
        merged: &[MergedRecord],
        component: Component,
        config: &FeatureConfig,
    ) -> Vec<MergedRecord> {
        let mut records = merged.to_vec();
        records.sort_by_cached_key(|r| (r.key.group(), r.key.period));

        let mut previous: Option<GroupKey> = None;
        let mut position = 0_usize;
        for record in &mut records {
            let group = record.key.group();
            position = if previous.as_ref() == Some(&group) { position + 1 } else { 0 };
            previous = Some(group);
            let shocked = position % 2 == 0;

            match component {
                Component::Yield => {
                    if shocked {
                        record.yield_value *= 1.0 - self.yield_shock;
                    }
                }
                Component::Weather => {
                    let optimal = config.optimal_temperature_c;
                    record.mean_temperature = record.mean_temperature.map(|t| {
                        if t >= optimal {
                            t + self.temperature_shift
                        } else {
                            t - self.temperature_shift
                        }
                    });
                    if shocked {
                        record.total_precipitation = record
                            .total_precipitation
                            .map(|p| p * (1.0 - self.precipitation_shock));
                    }
                }
                Component::Drought => {
                    record.drought_severity_index = record.drought_severity_index.map(|d| {
                        if d >= self.drought_shift {
                            d - self.drought_shift
                        } else {
                            d + self.drought_shift
                        }
                    });
                }
                Component::Economic => {
                    record.economic_delta = record.economic_delta.map(|e| e - self.economic_shift);
                }
            }
        }
        records
    }
}

/// Shift each weighted component's raw inputs and measure the composite.
///
/// Components with a positive weight that are defined for at least one
/// record are tested. The metric is the mean absolute composite change over
/// the records where the component is defined; it must reach `min_change`.
/// A feature-derivation error turns every weighted component's test into an
/// inconclusive failure.
pub fn component_sensitivity(
    merged: &[MergedRecord],
    engineer: &FeatureEngineer,
    weights: &WeightConfig,
    perturbation: &InputPerturbation,
    min_change: f64,
) -> Vec<TestResult> {
    let weighted: Vec<Component> = weights.components().collect();

    let base = match engineer.derive(merged) {
        Ok(base) => base,
        Err(err) => {
            return weighted
                .iter()
                .map(|c| TestResult::inconclusive(test_name(*c), min_change, err.to_string()))
                .collect();
        }
    };

    weighted
        .into_iter()
        .filter(|c| base.iter().any(|f| f.components.get(*c).is_some()))
        .map(|component| {
            let shifted = perturbation.apply(merged, component, engineer.config());
            match engineer.derive(&shifted) {
                Ok(moved) => measure(component, &base, &moved, weights, min_change),
                Err(err) => {
                    TestResult::inconclusive(test_name(component), min_change, err.to_string())
                }
            }
        })
        .collect()
}

fn test_name(component: Component) -> String {
    format!("sensitivity:{component}")
}

/// Compare base and shifted features record by record.
///
/// Both sets come out of the engineer ordered by group and period, and a
/// perturbation never touches keys, so they align by position.
fn measure(
    component: Component,
    base: &[FeatureVector],
    moved: &[FeatureVector],
    weights: &WeightConfig,
    min_change: f64,
) -> TestResult {
    let (component_moves, composite_moves): (Vec<f64>, Vec<f64>) = base
        .iter()
        .zip(moved)
        .filter_map(|(b, m)| {
            let before = b.components.get(component)?;
            let after = m.components.get(component)?;
            let composite =
                compose(weights, &m.components).score - compose(weights, &b.components).score;
            Some(((after - before).abs(), composite.abs()))
        })
        .unzip();

    let (Some(component_move), Some(change)) = (mean(&component_moves), mean(&composite_moves))
    else {
        return TestResult::inconclusive(test_name(component), min_change, "no comparable records");
    };
    debug!(%component, component_move, change, "sensitivity measured");

    TestResult::measured(
        test_name(component),
        change >= min_change,
        change,
        min_change,
        format!(
            "{} records: {component} score moves {component_move:.2}, composite {change:.2}",
            composite_moves.len()
        ),
    )
}
