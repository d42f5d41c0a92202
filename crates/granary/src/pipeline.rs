//! End-to-end pipeline: merge, derive features, score, classify, validate.

use granary_combine::{RiskClassifier, RiskScorer};
use granary_eval::{KnownEvent, ScoreSummary, ValidationReport, Validator, ValidatorConfig};
use granary_features::FeatureEngineer;
use granary_merge::{DataMerger, DataQuality, MergeCoverage, Sources};
use granary_traits::{
    FeatureConfig, FeatureVector, MergedRecord, Result, RiskScore, TierBoundaries, WeightConfig,
};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Every tunable of a pipeline run.
///
/// Missing sections fall back to their defaults, so `{}` is a valid
/// configuration file.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Component weights
    pub weights: WeightConfig,
    /// Feature windows, thresholds and scaling bounds
    pub features: FeatureConfig,
    /// Tier boundaries
    pub tiers: TierBoundaries,
    /// Validation thresholds
    pub validation: ValidatorConfig,
}

impl PipelineConfig {
    /// Check every section.
    ///
    /// # Errors
    ///
    /// Returns the first configuration error found.
    pub fn validate(&self) -> Result<()> {
        self.weights.validate()?;
        self.features.validate()?;
        self.tiers.validate()?;
        self.validation.validate()
    }
}

/// Records produced by one scoring run.
#[derive(Debug, Clone)]
pub struct ScoredRun {
    /// Coverage of the optional sources
    pub coverage: MergeCoverage,
    /// Input quality per source
    pub quality: DataQuality,
    /// Merged records the scores were derived from
    pub merged: Vec<MergedRecord>,
    /// Engineered features, one per merged record
    pub features: Vec<FeatureVector>,
    /// Classified scores, one per feature vector
    pub scores: Vec<RiskScore>,
    /// Weights actually applied after the economic fallback
    pub active_weights: WeightConfig,
    /// Distribution of the scores
    pub summary: ScoreSummary,
}

/// A scoring run plus its validation report.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// The scored records
    pub run: ScoredRun,
    /// Advisory validation results
    pub report: ValidationReport,
}

/// The configured pipeline.
///
/// Construction validates the whole configuration, so no record is touched
/// under an invalid setup.
///
/// # Example
///
/// ```
/// use granary::{Pipeline, PipelineConfig};
/// use granary::merge::Sources;
/// use granary::traits::YieldObservation;
///
/// let yields = vec![YieldObservation {
///     region: "Iowa".to_string(),
///     period: 2012,
///     commodity: "Corn".to_string(),
///     yield_value: 137.0,
/// }];
/// let sources = Sources::new(yields, vec![], vec![], None);
///
/// let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
/// let run = pipeline.score(&sources).unwrap();
/// assert_eq!(run.scores.len(), 1);
/// assert!((0.0..=100.0).contains(&run.scores[0].composite_score));
/// ```
#[derive(Debug)]
pub struct Pipeline {
    config: PipelineConfig,
    merger: DataMerger,
    engineer: FeatureEngineer,
    scorer: RiskScorer,
    classifier: RiskClassifier,
}

impl Pipeline {
    /// Build a pipeline.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if any section is invalid.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            merger: DataMerger::new(),
            engineer: FeatureEngineer::new(config.features.clone())?,
            scorer: RiskScorer::new(config.weights.clone())?,
            classifier: RiskClassifier::new(config.tiers)?,
            config,
        })
    }

    /// The configuration in use.
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// The tier classifier.
    pub const fn classifier(&self) -> &RiskClassifier {
        &self.classifier
    }

    /// Merge, derive features, score and classify.
    ///
    /// # Errors
    ///
    /// Returns [`granary_traits::GranaryError::DuplicateKey`] or an input
    /// data error from the merge or feature stages.
    pub fn score(&self, sources: &Sources) -> Result<ScoredRun> {
        let merged = self.merger.merge(sources)?;
        let features = self.engineer.derive(&merged.records)?;
        let active_weights = self.scorer.active_weights(&features).into_owned();
        let scores = self.classifier.classify(&self.scorer.score(&features));
        let summary = ScoreSummary::from_scores(&scores, &self.classifier);

        info!(
            records = scores.len(),
            weights = %active_weights.name,
            mean = ?summary.mean,
            "pipeline scored records"
        );

        Ok(ScoredRun {
            coverage: merged.coverage,
            quality: merged.quality,
            merged: merged.records,
            features,
            scores,
            active_weights,
            summary,
        })
    }

    /// Validate an existing scored history against known events.
    ///
    /// Sensitivity re-derives `merged` under the pipeline's feature
    /// configuration and composes under `weights`, normally the run's active
    /// weights. Pass an empty `merged` to skip it.
    ///
    /// # Errors
    ///
    /// Returns a configuration error only if `weights` is invalid; failed
    /// checks are part of the report.
    pub fn validate(
        &self,
        scores: &[RiskScore],
        merged: &[MergedRecord],
        weights: &WeightConfig,
        events: &[KnownEvent],
    ) -> Result<ValidationReport> {
        let validator = Validator::new(
            self.config.validation.clone(),
            weights.clone(),
            self.config.tiers,
            self.config.features.clone(),
        )?;
        Ok(validator.validate(scores, merged, events))
    }

    /// Score and validate in one pass.
    ///
    /// # Errors
    ///
    /// See [`Pipeline::score`].
    pub fn run(&self, sources: &Sources, events: &[KnownEvent]) -> Result<PipelineOutput> {
        let run = self.score(sources)?;
        let report = self.validate(&run.scores, &run.merged, &run.active_weights, events)?;
        Ok(PipelineOutput { run, report })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use granary_traits::{Component, GranaryError};

    #[test]
    fn test_default_config_is_valid() {
        PipelineConfig::default().validate().unwrap();
    }

    #[test]
    fn test_partial_json_config() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"tiers": {"moderate": 20.0}}"#).unwrap();
        assert_eq!(config.tiers.moderate, 20.0);
        assert_eq!(config.tiers.high, 50.0);
        assert_eq!(config.weights, WeightConfig::default());
    }

    #[test]
    fn test_invalid_config_fails_fast() {
        let mut config = PipelineConfig::default();
        config.weights.weights.insert(Component::Economic, 0.5);
        assert!(matches!(
            Pipeline::new(config),
            Err(GranaryError::InvalidWeightConfig(_))
        ));
    }
}
