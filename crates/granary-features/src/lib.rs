//! Feature engineering for the Granary stock risk index.
//!
//! This crate turns merged records into feature vectors: trailing yield
//! volatility, year-over-year deltas, weather stress, drought persistence and
//! economic drawdown, each mapped onto a 0-100 component score by a
//! [`granary_traits::RiskSignal`].
//!
//! # Example
//!
//! ```ignore
//! use granary_features::{FeatureEngineer, registry::available_components};
//!
//! let engineer = FeatureEngineer::default();
//! let features = engineer.derive(&merged)?;
//!
//! // Discover the component signals
//! let components = available_components();
//! ```

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

mod engineer;
pub mod registry;
pub mod signals;

// Re-export key types
pub use engineer::FeatureEngineer;
pub use registry::{ComponentInfo, available_components, component_signals};
