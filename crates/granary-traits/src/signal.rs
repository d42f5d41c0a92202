//! Risk signal trait for turning engineered features into component scores.
//!
//! A [`RiskSignal`] reads the raw features of one [`FeatureVector`] and maps
//! them onto the common 0-100 severity scale for a single [`Component`].
//! Signals are stateless with respect to the data they score, so one instance
//! can be shared across worker threads.

use crate::records::FeatureVector;
use crate::types::Component;

/// A scorer for one risk component.
///
/// # Example
///
/// ```
/// use granary_traits::{Component, RiskSignal};
/// use granary_traits::records::FeatureVector;
///
/// struct FlatEconomic;
///
/// impl RiskSignal for FlatEconomic {
///     fn name(&self) -> &str {
///         "flat_economic"
///     }
///
///     fn component(&self) -> Component {
///         Component::Economic
///     }
///
///     fn required_fields(&self) -> &[&str] {
///         &["economic_stress"]
///     }
///
///     fn score(&self, features: &FeatureVector) -> Option<f64> {
///         features.economic_stress.map(|_| 50.0)
///     }
/// }
/// ```
pub trait RiskSignal: Send + Sync {
    /// Unique signal name, used in logs and registry lookups.
    fn name(&self) -> &str;

    /// The component this signal scores.
    fn component(&self) -> Component;

    /// Feature fields read by [`RiskSignal::score`].
    fn required_fields(&self) -> &[&str];

    /// Severity in `[0, 100]`, or `None` when every required input is null.
    fn score(&self, features: &FeatureVector) -> Option<f64>;

    /// A short description of what the signal measures.
    fn description(&self) -> &str {
        ""
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RecordKey;

    struct Constant(f64);

    impl RiskSignal for Constant {
        fn name(&self) -> &str {
            "constant"
        }

        fn component(&self) -> Component {
            Component::Yield
        }

        fn required_fields(&self) -> &[&str] {
            &["yield_value"]
        }

        fn score(&self, _features: &FeatureVector) -> Option<f64> {
            Some(self.0)
        }
    }

    #[test]
    fn test_signal_is_object_safe() {
        let signals: Vec<Box<dyn RiskSignal>> = vec![Box::new(Constant(10.0))];
        let features = FeatureVector::bare(RecordKey::new("IOWA", 2012, "CORN"), 120.0);
        assert_eq!(signals[0].score(&features), Some(10.0));
        assert_eq!(signals[0].description(), "");
    }
}
