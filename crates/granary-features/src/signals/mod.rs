//! One risk signal per component.
//!
//! Each signal reads the raw features of a [`granary_traits::FeatureVector`]
//! and maps them onto the 0-100 component scale:
//! - Yield: trailing volatility (coefficient of variation) and shortfall
//!   against the trailing mean
//! - Weather: temperature outside the optimal band and precipitation z-score
//! - Drought: DSCI plus a persistence bonus for consecutive high periods
//! - Economic: ending-stocks drawdown

mod drought;
mod economic;
mod weather;
mod yield_risk;

pub use drought::{DroughtRisk, DroughtRiskConfig};
pub use economic::{EconomicRisk, EconomicRiskConfig};
pub use weather::{WeatherRisk, WeatherRiskConfig};
pub use yield_risk::{YieldRisk, YieldRiskConfig};

/// Share-weighted mean of the defined sub-scores.
///
/// Undefined parts drop out and the remaining shares are renormalized. If the
/// defined parts all carry zero share, their plain mean is used. `None` when
/// no part is defined.
pub(crate) fn blend(parts: &[(f64, Option<f64>)]) -> Option<f64> {
    let defined: Vec<(f64, f64)> = parts
        .iter()
        .filter_map(|&(share, score)| score.filter(|s| s.is_finite()).map(|s| (share, s)))
        .collect();
    if defined.is_empty() {
        return None;
    }

    let total: f64 = defined.iter().map(|(share, _)| share).sum();
    let value = if total > 0.0 {
        defined.iter().map(|(share, s)| share * s).sum::<f64>() / total
    } else {
        defined.iter().map(|(_, s)| s).sum::<f64>() / defined.len() as f64
    };
    Some(value.clamp(0.0, 100.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_blend_both_defined() {
        assert_relative_eq!(blend(&[(0.5, Some(80.0)), (0.5, Some(40.0))]).unwrap(), 60.0);
        assert_relative_eq!(blend(&[(0.25, Some(80.0)), (0.75, Some(40.0))]).unwrap(), 50.0);
    }

    #[test]
    fn test_blend_missing_part_is_renormalized() {
        assert_relative_eq!(blend(&[(0.5, None), (0.5, Some(40.0))]).unwrap(), 40.0);
        assert_eq!(blend(&[(0.5, None), (0.5, None)]), None);
    }

    #[test]
    fn test_blend_zero_share() {
        assert_relative_eq!(blend(&[(1.0, None), (0.0, Some(30.0))]).unwrap(), 30.0);
    }
}
