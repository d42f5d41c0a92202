//! Common types used throughout the Granary pipeline.
//!
//! This module defines join keys, the risk component vocabulary, risk tiers
//! and confidence flags shared by every stage.

use std::fmt;

use serde::{Deserialize, Serialize};

/// An observation period. Periods are crop years.
pub type Period = i32;

/// Normalize a region or commodity name for joining.
///
/// Case is folded to upper case, leading and trailing whitespace is removed
/// and interior whitespace runs collapse to a single space, so `"Iowa "`,
/// `" IOWA"` and `"iowa"` all join to `"IOWA"`.
///
/// # Examples
///
/// ```
/// use granary_traits::types::normalize_name;
///
/// assert_eq!(normalize_name("  North   dakota "), "NORTH DAKOTA");
/// ```
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_uppercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Unique key of a merged record: one (region, period, commodity) tuple.
///
/// Construct through [`RecordKey::new`] so the names are always normalized.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    /// Normalized region name.
    pub region: String,
    /// Observation period.
    pub period: Period,
    /// Normalized commodity name.
    pub commodity: String,
}

impl RecordKey {
    /// Build a normalized key.
    pub fn new(region: &str, period: Period, commodity: &str) -> Self {
        Self {
            region: normalize_name(region),
            period,
            commodity: normalize_name(commodity),
        }
    }

    /// The (region, commodity) group this key belongs to.
    pub fn group(&self) -> GroupKey {
        GroupKey {
            region: self.region.clone(),
            commodity: self.commodity.clone(),
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.region, self.commodity, self.period)
    }
}

/// A (region, commodity) time series identifier.
///
/// Rolling statistics never cross group boundaries.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupKey {
    /// Normalized region name.
    pub region: String,
    /// Normalized commodity name.
    pub commodity: String,
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.region, self.commodity)
    }
}

/// One named risk dimension contributing to the composite score.
///
/// Variant order is the tie-break precedence used when picking a dominant
/// component: yield beats weather beats drought beats economic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    /// Yield volatility and shortfall.
    Yield,
    /// Temperature stress and precipitation anomaly.
    Weather,
    /// Drought severity and persistence.
    Drought,
    /// Ending-stocks drawdown.
    Economic,
}

impl Component {
    /// All components in precedence order.
    pub const ALL: [Self; 4] = [Self::Yield, Self::Weather, Self::Drought, Self::Economic];

    /// Stable lower-case identifier.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Yield => "yield",
            Self::Weather => "weather",
            Self::Drought => "drought",
            Self::Economic => "economic",
        }
    }

    /// Parse an identifier produced by [`Component::name`].
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(name.trim()))
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Ordered risk tier derived from the composite score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskCategory {
    /// Composite below the moderate boundary.
    Low,
    /// Composite in `[moderate, high)`.
    Moderate,
    /// Composite in `[high, very_high)`.
    High,
    /// Composite in `[very_high, 100]`.
    VeryHigh,
}

impl RiskCategory {
    /// All tiers from lowest to highest.
    pub const ALL: [Self; 4] = [Self::Low, Self::Moderate, Self::High, Self::VeryHigh];

    /// Human-readable label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Moderate => "Moderate",
            Self::High => "High",
            Self::VeryHigh => "Very High",
        }
    }
}

impl fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Whether a trailing window had enough history for its statistic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    /// The statistic was computed from the record's own history.
    #[default]
    High,
    /// A documented fallback value was substituted.
    Low,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("Iowa"), "IOWA");
        assert_eq!(normalize_name("IOWA   "), "IOWA");
        assert_eq!(normalize_name("\tiowa"), "IOWA");
        assert_eq!(normalize_name("new  york"), "NEW YORK");
        assert_eq!(normalize_name("   "), "");
    }

    #[test]
    fn test_record_key_normalizes() {
        let a = RecordKey::new("Iowa ", 2012, "corn");
        let b = RecordKey::new("IOWA", 2012, " CORN");
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "IOWA/CORN/2012");
        assert_eq!(a.group().to_string(), "IOWA/CORN");
    }

    #[test]
    fn test_component_precedence() {
        assert!(Component::Yield < Component::Weather);
        assert!(Component::Weather < Component::Drought);
        assert!(Component::Drought < Component::Economic);
    }

    #[test]
    fn test_component_names_round_trip() {
        for c in Component::ALL {
            assert_eq!(Component::from_name(c.name()), Some(c));
        }
        assert_eq!(Component::from_name(" Drought"), Some(Component::Drought));
        assert_eq!(Component::from_name("price"), None);
    }

    #[test]
    fn test_category_ordering_and_labels() {
        assert!(RiskCategory::Low < RiskCategory::VeryHigh);
        assert_eq!(RiskCategory::VeryHigh.to_string(), "Very High");
    }
}
