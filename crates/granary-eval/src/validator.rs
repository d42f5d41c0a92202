//! Advisory validation of a scored history.

use granary_combine::RiskClassifier;
use granary_features::FeatureEngineer;
use granary_traits::{
    FeatureConfig, GranaryError, MergedRecord, Result, RiskScore, TierBoundaries, WeightConfig,
    group_by_key,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::checks::{self, Band};
use crate::events::{KnownEvent, event_margin_test};
use crate::report::{TestResult, ValidationReport};
use crate::sensitivity::{InputPerturbation, component_sensitivity};

/// Thresholds for the validation checks and the year comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Minimum SRI margin of an event window over its baseline
    pub min_event_margin: f64,
    /// Minimum Pearson r between SRI and next-period yield decline
    pub min_lead_correlation: f64,
    /// Raw-input shifts used by the sensitivity check
    pub sensitivity: InputPerturbation,
    /// Minimum mean composite change a shift must cause
    pub min_sensitivity: f64,
    /// Minimum lead pairs for the correlation check
    pub min_pairs: usize,
    /// Lower bound of the high-risk bucket in the predictive check
    pub high_risk_score: f64,
    /// Upper bound (exclusive) of the low-risk bucket
    pub low_risk_score: f64,
    /// Period-over-period decline (%) counted as a major drop
    pub major_drop_pct: f64,
    /// Standard deviations above the mean that make a score an outlier
    pub outlier_sigma: f64,
    /// Largest tolerated share of outliers
    pub max_outlier_share: f64,
    /// Smallest tolerated standard deviation of the scores
    pub min_score_std: f64,
    /// Expected mean score
    pub expected_mean: Band,
    /// Expected share of records scoring at least `high_risk_score`
    pub expected_high_risk_share: Band,
    /// Expected mean score of every commodity
    pub expected_commodity_mean: Band,
    /// Score change reported as significant in comparisons
    pub significant_change: f64,
    /// Score change below which a comparison is stable
    pub stable_band: f64,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            min_event_margin: 5.0,
            min_lead_correlation: 0.1,
            sensitivity: InputPerturbation::default(),
            min_sensitivity: 1.0,
            min_pairs: 3,
            high_risk_score: 50.0,
            low_risk_score: 25.0,
            major_drop_pct: 20.0,
            outlier_sigma: 3.0,
            max_outlier_share: 0.05,
            min_score_std: 5.0,
            expected_mean: Band::new(20.0, 40.0),
            expected_high_risk_share: Band::new(0.05, 0.30),
            expected_commodity_mean: Band::new(10.0, 70.0),
            significant_change: 10.0,
            stable_band: 5.0,
        }
    }
}

impl ValidatorConfig {
    /// Check that every threshold is usable.
    ///
    /// # Errors
    ///
    /// Returns [`GranaryError::InvalidConfig`] naming the first bad value.
    pub fn validate(&self) -> Result<()> {
        let finite = [
            ("min_event_margin", self.min_event_margin),
            ("min_lead_correlation", self.min_lead_correlation),
            ("min_sensitivity", self.min_sensitivity),
            ("high_risk_score", self.high_risk_score),
            ("low_risk_score", self.low_risk_score),
            ("major_drop_pct", self.major_drop_pct),
            ("outlier_sigma", self.outlier_sigma),
            ("max_outlier_share", self.max_outlier_share),
            ("min_score_std", self.min_score_std),
            ("significant_change", self.significant_change),
            ("stable_band", self.stable_band),
        ];
        if let Some((name, value)) = finite.iter().find(|(_, v)| !v.is_finite()) {
            return Err(GranaryError::InvalidConfig(format!(
                "validation.{name} must be finite, got {value}"
            )));
        }
        self.sensitivity.validate()?;

        let invalid = |msg: &str| -> Result<()> {
            Err(GranaryError::InvalidConfig(format!("validation: {msg}")))
        };
        let non_negative = [
            self.min_sensitivity,
            self.major_drop_pct,
            self.stable_band,
            self.min_score_std,
        ];
        if non_negative.iter().any(|v| *v < 0.0) {
            return invalid(
                "min_sensitivity, major_drop_pct, stable_band and min_score_std \
                 must be non-negative",
            );
        }
        if self.outlier_sigma <= 0.0 {
            return invalid("outlier_sigma must be positive");
        }
        if !(0.0..=1.0).contains(&self.max_outlier_share) {
            return invalid("max_outlier_share must lie in [0, 1]");
        }
        if !(-1.0..=1.0).contains(&self.min_lead_correlation) {
            return invalid("min_lead_correlation must lie in [-1, 1]");
        }
        if self.min_pairs < 2 {
            return invalid("min_pairs must be at least 2");
        }
        if self.low_risk_score > self.high_risk_score {
            return invalid("low_risk_score must not exceed high_risk_score");
        }
        if self.stable_band > self.significant_change {
            return invalid("stable_band must not exceed significant_change");
        }
        for (name, band) in [
            ("expected_mean", self.expected_mean),
            ("expected_high_risk_share", self.expected_high_risk_share),
            ("expected_commodity_mean", self.expected_commodity_mean),
        ] {
            if !(band.min.is_finite() && band.max.is_finite() && band.min <= band.max) {
                return Err(GranaryError::InvalidConfig(format!(
                    "validation.{name} needs finite bounds with min <= max, got {band}"
                )));
            }
        }
        Ok(())
    }
}

/// Runs every advisory check against a scored history.
///
/// `validate` never returns an error: a problem with the data (for example a
/// duplicated key) shows up as failed tests in the report.
#[derive(Debug)]
pub struct Validator {
    config: ValidatorConfig,
    weights: WeightConfig,
    classifier: RiskClassifier,
    engineer: FeatureEngineer,
}

impl Validator {
    /// Create a validator for scores produced under `weights` and
    /// `features`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the thresholds, weights, tiers or
    /// feature parameters are invalid.
    pub fn new(
        config: ValidatorConfig,
        weights: WeightConfig,
        tiers: TierBoundaries,
        features: FeatureConfig,
    ) -> Result<Self> {
        config.validate()?;
        weights.validate()?;
        Ok(Self {
            config,
            weights,
            classifier: RiskClassifier::new(tiers)?,
            engineer: FeatureEngineer::new(features)?,
        })
    }

    /// The thresholds in use.
    pub const fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Run all checks.
    ///
    /// `merged` holds the raw records `history` was scored from; the
    /// sensitivity check perturbs them. With no merged records the
    /// sensitivity check reports nothing.
    pub fn validate(
        &self,
        history: &[RiskScore],
        merged: &[MergedRecord],
        events: &[KnownEvent],
    ) -> ValidationReport {
        let cfg = &self.config;
        let mut tests = vec![
            checks::score_range(history),
            checks::component_range(history),
            checks::tier_diversity(history, &self.classifier),
            checks::score_outliers(history, cfg.outlier_sigma, cfg.max_outlier_share),
            checks::score_variance(history, cfg.min_score_std),
            checks::mean_score(history, cfg.expected_mean),
            checks::high_risk_share(history, cfg.high_risk_score, cfg.expected_high_risk_share),
            checks::commodity_means(history, cfg.expected_commodity_mean),
        ];

        tests.extend(
            events
                .iter()
                .map(|event| event_margin_test(history, event, events, cfg.min_event_margin)),
        );
        tests.extend(component_sensitivity(
            merged,
            &self.engineer,
            &self.weights,
            &cfg.sensitivity,
            cfg.min_sensitivity,
        ));

        match group_by_key(history, "scores") {
            Ok(groups) => {
                tests.push(checks::lead_correlation(
                    &groups,
                    cfg.min_lead_correlation,
                    cfg.min_pairs,
                ));
                tests.push(checks::predictive_spread(
                    &groups,
                    cfg.high_risk_score,
                    cfg.low_risk_score,
                ));
            }
            Err(err) => {
                warn!(error = %err, "cannot build period series for lead checks");
                let detail = err.to_string();
                tests.push(TestResult::inconclusive(
                    "lead_correlation",
                    cfg.min_lead_correlation,
                    detail.clone(),
                ));
                tests.push(TestResult::inconclusive("predictive_spread", 0.0, detail));
            }
        }

        tests.push(checks::concurrent_yield_correlation(history));
        tests.push(checks::major_yield_drops(history, cfg.major_drop_pct));

        let report = ValidationReport { tests };
        info!(
            passed = report.passed(),
            failed = report.failed(),
            records = history.len(),
            events = events.len(),
            "validation complete"
        );
        for failed in report.tests.iter().filter(|t| !t.passed) {
            warn!(test = %failed.test_name, detail = %failed.detail, "validation test failed");
        }
        report
    }
}
