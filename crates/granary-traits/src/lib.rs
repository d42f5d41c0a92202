#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/granary-risk/granary/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Core data model and trait definitions for the Granary stock risk index.
//!
//! This crate provides the record types passed between pipeline stages, the
//! immutable configuration objects, the error type, shared statistics and the
//! per-group sliding window used by every rolling computation.

/// The version of the granary-traits crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Module declarations
pub mod config;
pub mod error;
pub mod records;
pub mod signal;
pub mod stats;
pub mod types;
pub mod window;

// Re-exports
pub use config::{FeatureConfig, LinearScale, ScaleConfig, TierBoundaries, WeightConfig};
pub use error::{GranaryError, Result};
pub use records::{
    ComponentScores, DroughtObservation, EconomicObservation, FeatureVector, FeatureWarning,
    MergedRecord, RiskScore, WeatherObservation, YieldObservation,
};
pub use signal::RiskSignal;
pub use types::{Component, Confidence, GroupKey, Period, RecordKey, RiskCategory};
pub use window::{GroupSeries, Keyed, TrailingWindow, group_by_key};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
        assert!(VERSION.contains('.'));
    }
}
