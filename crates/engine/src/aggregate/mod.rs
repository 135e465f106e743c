//! Aggregation over collections of telemetry entries
//!
//! [`AggregationEngine`] computes multi-measure summaries over a window of
//! entries: the full [`AggregateResult`] block, independent per-time-window
//! aggregates, group-by partitions, trend direction, z-score anomalies, and
//! histograms. Every computation is pure over a request-local copy; empty
//! input yields the canonical all-zero result rather than an error.

mod anomaly;
mod histogram;
mod trend;

pub use anomaly::{detect_anomalies, Anomaly, AnomalyReport, DEFAULT_THRESHOLD};
pub use histogram::{create_histogram, histogram_of, Histogram, HistogramBucket, DEFAULT_BUCKETS};
pub use trend::{calculate_trend, TrendDirection, TrendReport};

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use crate::config::AggregationConfig;
use crate::fields;
use crate::stats::{self, Mode};
use tracelens_types::Entry;

/// Quartile block with 1.5x IQR outlier fences
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Distribution {
    pub q1: f64,
    pub q2: f64,
    pub q3: f64,
    pub iqr: f64,
    pub lower_fence: f64,
    pub upper_fence: f64,
}

/// Immutable multi-measure summary of one numeric field
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateResult {
    pub count: usize,
    pub sum: f64,
    pub avg: f64,
    pub min: f64,
    pub max: f64,
    pub range: f64,
    pub median: f64,
    /// `None` for empty input; otherwise the most frequent value(s)
    pub mode: Option<Mode>,
    pub std_dev: f64,
    pub variance: f64,
    /// Percentile label (`"p50"`) to value
    pub percentiles: BTreeMap<String, f64>,
    pub distribution: Distribution,
}

impl AggregateResult {
    /// Canonical all-zero result for empty input
    pub fn empty(percentile_labels: &[u8]) -> Self {
        let percentiles = percentile_labels
            .iter()
            .map(|p| (format!("p{}", p), 0.0))
            .collect();
        Self {
            count: 0,
            sum: 0.0,
            avg: 0.0,
            min: 0.0,
            max: 0.0,
            range: 0.0,
            median: 0.0,
            mode: None,
            std_dev: 0.0,
            variance: 0.0,
            percentiles,
            distribution: Distribution::default(),
        }
    }
}

/// One partition from a group-by aggregation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupAggregate {
    pub key: String,
    pub count: usize,
    pub stats: AggregateResult,
}

/// Computes statistical aggregates over entry collections
#[derive(Debug, Clone)]
pub struct AggregationEngine {
    config: AggregationConfig,
}

impl AggregationEngine {
    pub fn new(config: AggregationConfig) -> Self {
        Self { config }
    }

    /// Full aggregate of `field` across the entries
    pub fn aggregate(&self, entries: &[Entry], field: &str) -> AggregateResult {
        self.aggregate_values(&fields::numeric_series(entries, field))
    }

    /// Aggregate over already-extracted values
    pub fn aggregate_values(&self, values: &[f64]) -> AggregateResult {
        if values.is_empty() {
            return AggregateResult::empty(&self.config.percentiles);
        }

        debug!(count = values.len(), "computing aggregate");

        let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let sum: f64 = values.iter().sum();

        let percentiles = self
            .config
            .percentiles
            .iter()
            .map(|&p| (format!("p{}", p), stats::percentile(values, p as f64)))
            .collect();

        let (q1, q2, q3) = stats::quartiles(values);
        let iqr = q3 - q1;
        let distribution = Distribution {
            q1,
            q2,
            q3,
            iqr,
            lower_fence: q1 - 1.5 * iqr,
            upper_fence: q3 + 1.5 * iqr,
        };

        AggregateResult {
            count: values.len(),
            sum,
            avg: stats::mean(values),
            min,
            max,
            range: max - min,
            median: stats::median(values),
            mode: stats::mode(values),
            std_dev: stats::std_dev(values),
            variance: stats::variance(values),
            percentiles,
            distribution,
        }
    }

    /// Independent aggregate per configured time window
    ///
    /// Each window filters to entries recorded within the last
    /// `window.seconds`; windows overlap rather than bucket.
    pub fn aggregate_by_time_window(
        &self,
        entries: &[Entry],
        field: &str,
    ) -> BTreeMap<String, AggregateResult> {
        let now = Utc::now();
        let mut out = BTreeMap::new();
        for window in &self.config.time_windows {
            // a window wider than representable time bounds nothing
            let cutoff = i64::try_from(window.seconds)
                .ok()
                .and_then(Duration::try_seconds)
                .and_then(|span| now.checked_sub_signed(span));
            let values: Vec<f64> = entries
                .iter()
                .filter(|e| cutoff.map_or(true, |cutoff| e.created_at >= cutoff))
                .map(|e| fields::numeric_field(e, field))
                .collect();
            out.insert(window.label.clone(), self.aggregate_values(&values));
        }
        out
    }

    /// Partition by the raw value at `group_field` and aggregate each
    /// partition on `agg_field`
    ///
    /// Partitions are ordered by descending member count; ties keep first
    /// appearance order. Entries missing the group field land in an
    /// `"unknown"` partition.
    pub fn group_by_and_aggregate(
        &self,
        entries: &[Entry],
        group_field: &str,
        agg_field: &str,
    ) -> Vec<GroupAggregate> {
        let mut order: Vec<String> = Vec::new();
        let mut partitions: HashMap<String, Vec<f64>> = HashMap::new();

        for entry in entries {
            let raw = fields::text_field(entry, group_field);
            let key = if raw.is_empty() {
                "unknown".to_string()
            } else {
                raw
            };
            if !partitions.contains_key(&key) {
                order.push(key.clone());
            }
            partitions
                .entry(key)
                .or_default()
                .push(fields::numeric_field(entry, agg_field));
        }

        let mut out: Vec<GroupAggregate> = order
            .into_iter()
            .map(|key| {
                let values = &partitions[&key];
                GroupAggregate {
                    count: values.len(),
                    stats: self.aggregate_values(values),
                    key,
                }
            })
            .collect();

        // stable sort keeps insertion order on equal counts
        out.sort_by(|a, b| b.count.cmp(&a.count));
        out
    }

    /// Trend of `value_field` across the window, sorted by `date_field`
    pub fn calculate_trend(
        &self,
        entries: &[Entry],
        date_field: &str,
        value_field: &str,
    ) -> TrendReport {
        trend::calculate_trend(entries, date_field, value_field)
    }

    /// Z-score anomalies of `field` at the given threshold
    pub fn detect_anomalies(&self, entries: &[Entry], field: &str, threshold: f64) -> AnomalyReport {
        anomaly::detect_anomalies(entries, field, threshold)
    }

    /// Linear histogram of `field`
    pub fn create_histogram(&self, entries: &[Entry], field: &str, buckets: usize) -> Histogram {
        histogram::create_histogram(entries, field, buckets)
    }
}

impl Default for AggregationEngine {
    fn default() -> Self {
        Self::new(AggregationConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tracelens_types::EntryKind;

    fn engine() -> AggregationEngine {
        AggregationEngine::default()
    }

    fn query_entries(times: &[f64]) -> Vec<Entry> {
        times
            .iter()
            .map(|&t| Entry::new(EntryKind::Query, json!({ "time": t })))
            .collect()
    }

    #[test]
    fn test_full_aggregate() {
        let entries = query_entries(&[10.0, 20.0, 30.0, 40.0, 50.0]);
        let result = engine().aggregate(&entries, "time");

        assert_eq!(result.count, 5);
        assert_eq!(result.sum, 150.0);
        assert_eq!(result.avg, 30.0);
        assert_eq!(result.min, 10.0);
        assert_eq!(result.max, 50.0);
        assert_eq!(result.range, 40.0);
        assert_eq!(result.median, 30.0);
        assert_eq!(result.variance, 200.0);
        assert!((result.std_dev - 200.0_f64.sqrt()).abs() < 1e-12);
        assert_eq!(result.percentiles.get("p50"), Some(&30.0));
        assert_eq!(result.percentiles.get("p95"), Some(&50.0));
        assert_eq!(result.percentiles.get("p99"), Some(&50.0));
    }

    #[test]
    fn test_empty_aggregate_is_canonical() {
        let result = engine().aggregate(&[], "time");

        assert_eq!(result.count, 0);
        assert_eq!(result.sum, 0.0);
        assert_eq!(result.avg, 0.0);
        assert_eq!(result.mode, None);
        assert_eq!(result.percentiles.get("p50"), Some(&0.0));
        assert_eq!(result.distribution, Distribution::default());
    }

    #[test]
    fn test_distribution_fences() {
        let entries = query_entries(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
        let result = engine().aggregate(&entries, "time");

        assert_eq!(result.distribution.q1, 2.0);
        assert_eq!(result.distribution.q3, 6.0);
        assert_eq!(result.distribution.iqr, 4.0);
        assert_eq!(result.distribution.lower_fence, -4.0);
        assert_eq!(result.distribution.upper_fence, 12.0);
    }

    #[test]
    fn test_missing_fields_count_as_zero() {
        let mut entries = query_entries(&[10.0, 20.0]);
        entries.push(Entry::new(EntryKind::Query, json!({})));
        let result = engine().aggregate(&entries, "time");

        assert_eq!(result.count, 3);
        assert_eq!(result.sum, 30.0);
        assert_eq!(result.min, 0.0);
    }

    #[test]
    fn test_group_by_orders_by_count_desc() {
        let entries = vec![
            Entry::new(EntryKind::Request, json!({"uri": "/a", "duration": 10.0})),
            Entry::new(EntryKind::Request, json!({"uri": "/b", "duration": 20.0})),
            Entry::new(EntryKind::Request, json!({"uri": "/b", "duration": 30.0})),
            Entry::new(EntryKind::Request, json!({"uri": "/c", "duration": 40.0})),
        ];
        let groups = engine().group_by_and_aggregate(&entries, "uri", "duration");

        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].key, "/b");
        assert_eq!(groups[0].count, 2);
        assert_eq!(groups[0].stats.avg, 25.0);
        // tie between /a and /c keeps first-appearance order
        assert_eq!(groups[1].key, "/a");
        assert_eq!(groups[2].key, "/c");
    }

    #[test]
    fn test_group_by_missing_key_goes_unknown() {
        let entries = vec![
            Entry::new(EntryKind::Request, json!({"duration": 10.0})),
            Entry::new(EntryKind::Request, json!({"uri": "/a", "duration": 20.0})),
        ];
        let groups = engine().group_by_and_aggregate(&entries, "uri", "duration");

        assert!(groups.iter().any(|g| g.key == "unknown"));
    }

    #[test]
    fn test_time_windows_are_independent() {
        let now = Utc::now();
        let entries = vec![
            Entry::new(EntryKind::Query, json!({"time": 10.0}))
                .with_created_at(now - Duration::minutes(2)),
            Entry::new(EntryKind::Query, json!({"time": 30.0}))
                .with_created_at(now - Duration::minutes(30)),
            Entry::new(EntryKind::Query, json!({"time": 50.0}))
                .with_created_at(now - Duration::hours(20)),
        ];
        let windows = engine().aggregate_by_time_window(&entries, "time");

        assert_eq!(windows.get("5m").map(|w| w.count), Some(1));
        assert_eq!(windows.get("1h").map(|w| w.count), Some(2));
        assert_eq!(windows.get("24h").map(|w| w.count), Some(3));
        assert_eq!(windows.get("7d").map(|w| w.count), Some(3));
    }
}
