//! Statistical helpers shared by feature engineering and validation.
//!
//! All helpers skip non-finite inputs and return `None` (or a documented
//! constant) instead of NaN, so callers never have to propagate NaN.

/// Minimum threshold for standard deviation to avoid division by zero.
/// Values below this threshold are treated as zero variance.
pub const MIN_STD_THRESHOLD: f64 = 1e-10;

/// Arithmetic mean of the finite values, `None` if there are none.
///
/// # Examples
///
/// ```
/// use granary_traits::stats::mean;
///
/// assert_eq!(mean(&[1.0, 2.0, f64::NAN, 3.0]), Some(2.0));
/// assert_eq!(mean(&[]), None);
/// ```
pub fn mean(values: &[f64]) -> Option<f64> {
    let (sum, n) = values
        .iter()
        .filter(|x| x.is_finite())
        .fold((0.0, 0usize), |(s, n), x| (s + x, n + 1));
    (n > 0).then(|| sum / n as f64)
}

/// Sample standard deviation (N-1 denominator) of the finite values.
///
/// Returns `None` with fewer than two finite values.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    let finite: Vec<f64> = values.iter().copied().filter(|x| x.is_finite()).collect();
    if finite.len() < 2 {
        return None;
    }
    let n = finite.len() as f64;
    let mean = finite.iter().sum::<f64>() / n;
    // Bessel's correction
    let variance = finite.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some(variance.sqrt())
}

/// Median of the finite values, `None` if there are none.
pub fn median(values: &[f64]) -> Option<f64> {
    let mut finite: Vec<f64> = values.iter().copied().filter(|x| x.is_finite()).collect();
    if finite.is_empty() {
        return None;
    }
    finite.sort_by(f64::total_cmp);
    let mid = finite.len() / 2;
    Some(if finite.len() % 2 == 0 {
        (finite[mid - 1] + finite[mid]) / 2.0
    } else {
        finite[mid]
    })
}

/// Z-score standardization result containing the reference statistics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZScore {
    /// The standardized value; 0.0 when `applied` is false.
    pub value: f64,
    /// Mean of the reference history, if any.
    pub mean: Option<f64>,
    /// Sample standard deviation of the reference history, if defined.
    pub std: Option<f64>,
    /// Whether a real division took place.
    pub applied: bool,
}

/// Z-score of `value` against a reference `history`.
///
/// With fewer than two history points, or a standard deviation below
/// [`MIN_STD_THRESHOLD`], the anomaly is defined as 0.0 rather than dividing
/// by zero.
///
/// # Examples
///
/// ```
/// use granary_traits::stats::zscore;
///
/// let z = zscore(27.0, &[30.0, 32.0, 34.0]);
/// assert!(z.applied);
/// assert!((z.value + 2.5).abs() < 1e-10);
///
/// let flat = zscore(27.0, &[30.0]);
/// assert_eq!(flat.value, 0.0);
/// assert!(!flat.applied);
/// ```
pub fn zscore(value: f64, history: &[f64]) -> ZScore {
    let mean = mean(history);
    let std = sample_std(history);

    match (mean, std) {
        (Some(m), Some(s)) if s > MIN_STD_THRESHOLD && value.is_finite() => ZScore {
            value: (value - m) / s,
            mean,
            std,
            applied: true,
        },
        _ => ZScore {
            value: 0.0,
            mean,
            std,
            applied: false,
        },
    }
}

/// Replace a non-finite value with 0.0.
#[inline]
pub const fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mean_skips_non_finite() {
        assert_eq!(mean(&[2.0, f64::INFINITY, 4.0]), Some(3.0));
        assert_eq!(mean(&[f64::NAN]), None);
    }

    #[test]
    fn test_sample_std() {
        let std = sample_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert_relative_eq!(std, 2.138_089_935_299_395, epsilon = 1e-12);
        assert_eq!(sample_std(&[5.0]), None);
        assert_eq!(sample_std(&[]), None);
    }

    #[test]
    fn test_sample_std_constant() {
        assert_eq!(sample_std(&[3.0, 3.0, 3.0]), Some(0.0));
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn test_zscore_zero_variance() {
        let z = zscore(10.0, &[5.0, 5.0, 5.0]);
        assert!(!z.applied);
        assert_eq!(z.value, 0.0);
        assert_eq!(z.mean, Some(5.0));
    }

    #[test]
    fn test_zscore_empty_history() {
        let z = zscore(10.0, &[]);
        assert_eq!(z.value, 0.0);
        assert_eq!(z.mean, None);
        assert_eq!(z.std, None);
    }

    #[test]
    fn test_min_std_threshold() {
        let z = zscore(1.0, &[1.0, 1.0 + 1e-12, 1.0 - 1e-12]);
        assert!(!z.applied);
        assert_eq!(z.value, 0.0);
    }

    #[test]
    fn test_finite_or_zero() {
        assert_eq!(finite_or_zero(f64::NAN), 0.0);
        assert_eq!(finite_or_zero(f64::NEG_INFINITY), 0.0);
        assert_eq!(finite_or_zero(4.5), 4.5);
    }
}
