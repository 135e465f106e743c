//! Linear-width histograms over a numeric field

use serde::{Deserialize, Serialize};

use crate::fields;
use tracelens_types::Entry;

/// Default bucket count
pub const DEFAULT_BUCKETS: usize = 10;

/// One histogram bucket
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistogramBucket {
    pub min: f64,
    pub max: f64,
    pub count: usize,
    pub percentage: f64,
}

/// Linear histogram spanning the observed value range
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Histogram {
    pub buckets: Vec<HistogramBucket>,
    pub bucket_width: f64,
    pub total: usize,
    pub min: f64,
    pub max: f64,
}

impl Histogram {
    fn empty() -> Self {
        Self {
            buckets: Vec::new(),
            bucket_width: 0.0,
            total: 0,
            min: 0.0,
            max: 0.0,
        }
    }
}

/// Histogram of a field across the entries
pub fn create_histogram(entries: &[Entry], field: &str, buckets: usize) -> Histogram {
    histogram_of(&fields::numeric_series(entries, field), buckets)
}

/// Histogram over already-extracted values
///
/// Bucket assignment is `floor((v - min) / width)` clamped to the last
/// bucket, so the maximum value lands in the final bucket instead of
/// overflowing. Zero spread puts every value in bucket 0.
pub fn histogram_of(values: &[f64], buckets: usize) -> Histogram {
    let buckets = buckets.max(1);
    if values.is_empty() {
        return Histogram::empty();
    }

    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let width = (max - min) / buckets as f64;

    let mut counts = vec![0usize; buckets];
    for &v in values {
        let idx = if width == 0.0 {
            0
        } else {
            (((v - min) / width).floor() as usize).min(buckets - 1)
        };
        counts[idx] += 1;
    }

    let total = values.len();
    let bucket_list = counts
        .iter()
        .enumerate()
        .map(|(i, &count)| HistogramBucket {
            min: min + i as f64 * width,
            max: min + (i + 1) as f64 * width,
            count,
            percentage: (count as f64 / total as f64) * 100.0,
        })
        .collect();

    Histogram {
        buckets: bucket_list,
        bucket_width: width,
        total,
        min,
        max,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_even_spread() {
        let values: Vec<f64> = (0..100).map(|v| v as f64).collect();
        let hist = histogram_of(&values, 10);

        assert_eq!(hist.buckets.len(), 10);
        assert_eq!(hist.total, 100);
        for bucket in &hist.buckets {
            assert_eq!(bucket.count, 10);
            assert!((bucket.percentage - 10.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_max_value_lands_in_last_bucket() {
        let hist = histogram_of(&[0.0, 5.0, 10.0], 5);
        assert_eq!(hist.buckets.last().map(|b| b.count), Some(1));
    }

    #[test]
    fn test_zero_spread_single_bucket() {
        let hist = histogram_of(&[7.0, 7.0, 7.0], 10);
        assert_eq!(hist.bucket_width, 0.0);
        assert_eq!(hist.buckets[0].count, 3);
        assert_eq!(hist.buckets.iter().map(|b| b.count).sum::<usize>(), 3);
    }

    #[test]
    fn test_empty_input() {
        let hist = histogram_of(&[], 10);
        assert!(hist.buckets.is_empty());
        assert_eq!(hist.total, 0);
    }
}
