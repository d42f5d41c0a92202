#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/granary-risk/granary/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! # granary
//!
//! Composite stock risk index (SRI) for agricultural commodities.
//!
//! granary is an umbrella crate that re-exports the granary sub-crates and
//! wires them into a [`Pipeline`].
//!
//! ## Crate Organization
//!
//! - [`traits`] - Records, configuration, errors and the [`RiskSignal`] trait
//! - [`merge`] - Left join of yield, weather, drought and economic sources
//! - [`features`] - Trailing-window features and component signals
//! - [`combine`] - Weighted composite scoring and tier classification
//! - [`eval`] - Validation, summaries and period comparison
//!
//! ## Architecture
//!
//! 1. **Merge** joins every source onto the yield records
//! 2. **Features** derive volatility, shortfall, weather and drought stress per group
//! 3. **Signals** map features onto 0-100 component scores
//! 4. **Scorer** blends components under a weight set
//! 5. **Classifier** assigns a tier and a stockpile recommendation
//! 6. **Validator** checks the scored history against known events

mod pipeline;

/// Version information for the granary crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// Core Types
// ============================================================================

/// Core records, configuration and traits.
///
/// ```
/// use granary::traits::{RecordKey, WeightConfig};
///
/// let key = RecordKey::new("Iowa ", 2012, "corn");
/// assert_eq!(key.to_string(), "IOWA/CORN/2012");
/// assert!(WeightConfig::three_component().validate().is_ok());
/// ```
pub mod traits {
    pub use granary_traits::*;
}

pub use granary_traits::{
    Component, FeatureVector, GranaryError, MergedRecord, Result, RiskCategory, RiskScore,
    RiskSignal,
};

// ============================================================================
// Pipeline Stages
// ============================================================================

/// Source ingestion and the left join onto yield records.
pub mod merge {
    pub use granary_merge::*;
}

/// Feature engineering and the component signal registry.
///
/// ## Components
///
/// - **yield**: coefficient of variation and shortfall against the trailing mean
/// - **weather**: temperature stress and precipitation anomaly
/// - **drought**: drought severity with a persistence bonus
/// - **economic**: ending-stocks drawdown (optional)
pub mod features {
    pub use granary_features::*;
}

/// Composite scoring and classification.
///
/// ```text
/// SRI = sum_c w'_c * score_c      w'_c = w_c / sum of active weights
/// ```
pub mod combine {
    pub use granary_combine::*;
}

/// Validation, summaries and comparisons.
pub mod eval {
    pub use granary_eval::*;
}

pub use pipeline::{Pipeline, PipelineConfig, PipelineOutput, ScoredRun};
