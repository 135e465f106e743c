//! Statistical primitives for the analysis engine
//!
//! Pure functions over slices of f64. Every function returns a defined
//! value for empty input rather than failing; degenerate cases (zero
//! spread, mismatched lengths) yield zeros, never NaN.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Most frequent value(s) in a dataset
///
/// Serialized untagged, so JSON consumers see a scalar for a single mode
/// and an array for ties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Mode {
    Single(f64),
    Multiple(Vec<f64>),
}

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut out = values.to_vec();
    out.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    out
}

/// Arithmetic mean; 0.0 for empty input
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Median; averages the two middle values for even-length input
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let sorted = sorted(values);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Most frequent value(s); `None` for empty input
///
/// Values are bucketed on their exact bit pattern. Tied modes are returned
/// ascending for determinism.
pub fn mode(values: &[f64]) -> Option<Mode> {
    if values.is_empty() {
        return None;
    }

    let mut counts: HashMap<u64, (f64, usize)> = HashMap::new();
    for &v in values {
        let slot = counts.entry(v.to_bits()).or_insert((v, 0));
        slot.1 += 1;
    }

    let max_count = counts.values().map(|(_, c)| *c).max()?;
    let mut modes: Vec<f64> = counts
        .values()
        .filter(|(_, c)| *c == max_count)
        .map(|(v, _)| *v)
        .collect();
    modes.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    if modes.len() == 1 {
        Some(Mode::Single(modes[0]))
    } else {
        Some(Mode::Multiple(modes))
    }
}

/// Population variance (divides by n, not n-1)
pub fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|x| (x - m).powi(2)).sum::<f64>() / values.len() as f64
}

/// Population standard deviation
pub fn std_dev(values: &[f64]) -> f64 {
    variance(values).sqrt()
}

/// Nearest-rank percentile
///
/// Sorts ascending and picks index `ceil(p/100 * n) - 1`, clamped into
/// range. Not interpolated, so the result is always an observed value.
pub fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let sorted = sorted(values);
    let rank = (p / 100.0 * sorted.len() as f64).ceil() as isize - 1;
    let idx = rank.clamp(0, sorted.len() as isize - 1) as usize;
    sorted[idx]
}

/// First, second, and third quartiles via nearest-rank percentiles
pub fn quartiles(values: &[f64]) -> (f64, f64, f64) {
    (
        percentile(values, 25.0),
        percentile(values, 50.0),
        percentile(values, 75.0),
    )
}

/// Pearson correlation coefficient between two series
///
/// Returns 0.0 when the series differ in length, have fewer than two
/// points, or either side has zero spread.
pub fn pearson_correlation(x: &[f64], y: &[f64]) -> f64 {
    if x.len() != y.len() || x.len() < 2 {
        return 0.0;
    }

    let n = x.len() as f64;
    let sum_x: f64 = x.iter().sum();
    let sum_y: f64 = y.iter().sum();
    let sum_xy: f64 = x.iter().zip(y).map(|(a, b)| a * b).sum();
    let sum_x2: f64 = x.iter().map(|a| a * a).sum();
    let sum_y2: f64 = y.iter().map(|b| b * b).sum();

    let numerator = n * sum_xy - sum_x * sum_y;
    let denominator = ((n * sum_x2 - sum_x * sum_x) * (n * sum_y2 - sum_y * sum_y)).sqrt();

    if denominator == 0.0 {
        return 0.0;
    }
    numerator / denominator
}

/// Z-score of a value against a known mean and standard deviation
pub fn z_score(value: f64, mean: f64, std_dev: f64) -> f64 {
    if std_dev == 0.0 {
        return 0.0;
    }
    (value - mean) / std_dev
}

/// Percentage change from old to new
pub fn percentage_change(old: f64, new: f64) -> f64 {
    if old == 0.0 {
        if new == 0.0 {
            return 0.0;
        }
        return 100.0;
    }
    ((new - old) / old) * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(mean(&[1.0, 2.0, 3.0, 4.0, 5.0]), 3.0);
    }

    #[test]
    fn test_median_odd_and_even() {
        assert_eq!(median(&[]), 0.0);
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), 2.5);
    }

    #[test]
    fn test_mode_single() {
        let m = mode(&[1.0, 2.0, 2.0, 3.0]);
        assert_eq!(m, Some(Mode::Single(2.0)));
    }

    #[test]
    fn test_mode_tied() {
        let m = mode(&[3.0, 1.0, 3.0, 1.0, 2.0]);
        assert_eq!(m, Some(Mode::Multiple(vec![1.0, 3.0])));
    }

    #[test]
    fn test_mode_empty() {
        assert_eq!(mode(&[]), None);
    }

    #[test]
    fn test_mode_serializes_untagged() {
        let single = serde_json::to_value(Mode::Single(2.0)).unwrap();
        assert_eq!(single, serde_json::json!(2.0));

        let multi = serde_json::to_value(Mode::Multiple(vec![1.0, 3.0])).unwrap();
        assert_eq!(multi, serde_json::json!([1.0, 3.0]));
    }

    #[test]
    fn test_population_variance_and_std_dev() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(variance(&values), 2.0);
        assert!((std_dev(&values) - 2.0_f64.sqrt()).abs() < 1e-12);
        assert_eq!(variance(&[]), 0.0);
    }

    #[test]
    fn test_percentile_nearest_rank() {
        let values: Vec<f64> = (1..=100).map(|v| v as f64).collect();
        assert_eq!(percentile(&values, 50.0), 50.0);
        assert_eq!(percentile(&values, 95.0), 95.0);
        assert_eq!(percentile(&values, 99.0), 99.0);
        assert_eq!(percentile(&values, 100.0), 100.0);
    }

    #[test]
    fn test_percentile_small_inputs() {
        assert_eq!(percentile(&[], 50.0), 0.0);
        assert_eq!(percentile(&[7.0], 99.0), 7.0);
        // ceil(50/100 * 4) - 1 = 1
        assert_eq!(percentile(&[10.0, 20.0, 30.0, 40.0], 50.0), 20.0);
    }

    #[test]
    fn test_quartiles() {
        let values: Vec<f64> = (1..=8).map(|v| v as f64).collect();
        let (q1, q2, q3) = quartiles(&values);
        assert_eq!(q1, 2.0);
        assert_eq!(q2, 4.0);
        assert_eq!(q3, 6.0);
    }

    #[test]
    fn test_pearson_correlation() {
        let x = vec![1.0, 2.0, 3.0, 4.0];
        let y = vec![2.0, 4.0, 6.0, 8.0];
        assert!((pearson_correlation(&x, &y) - 1.0).abs() < 1e-12);

        let inverse = vec![8.0, 6.0, 4.0, 2.0];
        assert!((pearson_correlation(&x, &inverse) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_pearson_degenerate_inputs() {
        assert_eq!(pearson_correlation(&[1.0], &[2.0]), 0.0);
        assert_eq!(pearson_correlation(&[1.0, 2.0], &[1.0]), 0.0);
        // zero spread on one side
        assert_eq!(pearson_correlation(&[1.0, 2.0, 3.0], &[5.0, 5.0, 5.0]), 0.0);
    }

    #[test]
    fn test_z_score() {
        assert_eq!(z_score(100.0, 50.0, 10.0), 5.0);
        assert_eq!(z_score(40.0, 50.0, 10.0), -1.0);
        assert_eq!(z_score(40.0, 40.0, 0.0), 0.0);
    }

    #[test]
    fn test_percentage_change() {
        assert_eq!(percentage_change(100.0, 150.0), 50.0);
        assert_eq!(percentage_change(100.0, 50.0), -50.0);
        assert_eq!(percentage_change(0.0, 100.0), 100.0);
        assert_eq!(percentage_change(0.0, 0.0), 0.0);
    }
}
