//! Composite scoring and classification for the Granary stock risk index.
//!
//! This crate combines per-component scores into the composite index under a
//! [`granary_traits::WeightConfig`] and maps the result onto risk tiers with a
//! stockpile recommendation.
//!
//! # Examples
//!
//! ```rust,no_run
//! use granary_combine::{RiskClassifier, RiskScorer};
//! use granary_traits::WeightConfig;
//!
//! let scorer = RiskScorer::new(WeightConfig::four_component()).unwrap();
//! let scores = scorer.score(&[]);
//! let classified = RiskClassifier::default().classify(&scores);
//! assert!(classified.is_empty());
//! ```

mod classify;
mod scorer;

// Re-export main types
pub use classify::RiskClassifier;
pub use scorer::{Composite, RiskScorer, compose};
