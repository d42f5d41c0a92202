//! Correlation coefficients for backtesting scores against yields.
//!
//! Pearson r is the headline statistic; Spearman rank correlation is reported
//! alongside it as an outlier-robust cross-check.

use granary_traits::stats::MIN_STD_THRESHOLD;
use ndarray::Array1;

/// Pearson correlation over the pairs where both values are finite.
///
/// Returns `None` with fewer than two usable pairs, mismatched lengths, or
/// zero variance on either side.
///
/// # Example
///
/// ```
/// use granary_eval::pearson;
/// use ndarray::array;
///
/// let r = pearson(&array![1.0, 2.0, 3.0], &array![2.0, 4.0, 6.0]).unwrap();
/// assert!((r - 1.0).abs() < 1e-12);
/// ```
pub fn pearson(x: &Array1<f64>, y: &Array1<f64>) -> Option<f64> {
    let (x, y) = finite_pairs(x, y)?;
    let dx = &x - x.mean()?;
    let dy = &y - y.mean()?;

    let cov = dx.dot(&dy);
    let var_x = dx.dot(&dx);
    let var_y = dy.dot(&dy);
    if var_x.sqrt() < MIN_STD_THRESHOLD || var_y.sqrt() < MIN_STD_THRESHOLD {
        return None;
    }
    Some((cov / (var_x.sqrt() * var_y.sqrt())).clamp(-1.0, 1.0))
}

/// Spearman rank correlation over the pairs where both values are finite.
pub fn spearman(x: &Array1<f64>, y: &Array1<f64>) -> Option<f64> {
    let (x, y) = finite_pairs(x, y)?;
    let rx = Array1::from(compute_ranks(x.as_slice()?));
    let ry = Array1::from(compute_ranks(y.as_slice()?));
    pearson(&rx, &ry)
}

fn finite_pairs(x: &Array1<f64>, y: &Array1<f64>) -> Option<(Array1<f64>, Array1<f64>)> {
    if x.len() != y.len() {
        return None;
    }
    let (xs, ys): (Vec<f64>, Vec<f64>) = x
        .iter()
        .zip(y.iter())
        .filter(|(a, b)| a.is_finite() && b.is_finite())
        .map(|(&a, &b)| (a, b))
        .unzip();
    if xs.len() < 2 {
        return None;
    }
    Some((Array1::from(xs), Array1::from(ys)))
}

/// Compute ranks of values (handling ties with average rank).
fn compute_ranks(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    let mut indexed: Vec<(usize, f64)> = values.iter().copied().enumerate().collect();
    indexed.sort_by(|a, b| a.1.total_cmp(&b.1));

    let mut ranks = vec![0.0; n];
    let mut i = 0;
    while i < n {
        let mut j = i;
        // Find ties
        while j < n && (indexed[j].1 - indexed[i].1).abs() < f64::EPSILON {
            j += 1;
        }

        let avg_rank = (i + j - 1) as f64 / 2.0;
        for item in &indexed[i..j] {
            ranks[item.0] = avg_rank;
        }
        i = j;
    }
    ranks
}
