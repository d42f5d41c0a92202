//! Backtesting and validation for Granary stock risk index scores.
//!
//! This crate checks a scored history against what actually happened:
//! - Known shortfall events must score above their baseline
//! - Every weighted component's raw inputs must move the composite
//! - Score distributions must look plausible
//! - SRI at one period should correlate with the next period's yield decline
//! - Score summaries and period-over-period comparisons
//!
//! # Example
//!
//! ```rust,ignore
//! use granary_eval::{KnownEvent, Validator, ValidatorConfig};
//! use granary_traits::{FeatureConfig, TierBoundaries, WeightConfig};
//!
//! let validator = Validator::new(
//!     ValidatorConfig::default(),
//!     WeightConfig::three_component(),
//!     TierBoundaries::default(),
//!     FeatureConfig::default(),
//! )?;
//! let report = validator.validate(&scores, &merged, &events);
//! println!("{report}");
//! ```

pub mod checks;
pub mod compare;
pub mod correlation;
pub mod events;
pub mod report;
pub mod sensitivity;
pub mod summary;
pub mod validator;

// Re-export main types
pub use checks::Band;
pub use compare::{Trend, TrendSummary, YearComparison, compare_periods, compare_sets};
pub use correlation::{pearson, spearman};
pub use events::{KnownEvent, event_margin_test};
pub use report::{TestResult, ValidationReport};
pub use sensitivity::{InputPerturbation, component_sensitivity};
pub use summary::ScoreSummary;
pub use validator::{Validator, ValidatorConfig};
