//! Trend detection over chronological period averages
//!
//! The window is sorted by date and split into five contiguous periods; the
//! mean of the early periods' averages is compared against the late ones.
//! The middle period is skipped when the count is odd, so a spike in the
//! center cannot tip the direction either way.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fields;
use crate::stats;
use tracelens_types::Entry;

/// Number of contiguous periods the window is split into
const PERIOD_COUNT: usize = 5;

/// Relative change beyond which a direction is reported
const TREND_THRESHOLD_PCT: f64 = 10.0;

/// Direction of a detected trend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
    InsufficientData,
}

impl TrendDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendDirection::Increasing => "increasing",
            TrendDirection::Decreasing => "decreasing",
            TrendDirection::Stable => "stable",
            TrendDirection::InsufficientData => "insufficient_data",
        }
    }
}

/// Outcome of a trend computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendReport {
    pub direction: TrendDirection,
    /// Average of the value field within each chronological period
    pub period_averages: Vec<f64>,
    /// Relative change between the early and late halves of the window
    pub change_pct: f64,
    pub sample_count: usize,
}

impl TrendReport {
    fn insufficient(sample_count: usize) -> Self {
        Self {
            direction: TrendDirection::InsufficientData,
            period_averages: Vec::new(),
            change_pct: 0.0,
            sample_count,
        }
    }
}

fn entry_date(entry: &Entry, date_field: &str) -> DateTime<Utc> {
    if date_field == "created_at" {
        return entry.created_at;
    }
    fields::resolve_path(entry, date_field)
        .and_then(|v| v.as_str())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(entry.created_at)
}

/// Detect the direction of change of `value_field` across the window
///
/// Requires at least two entries; below that the report carries
/// [`TrendDirection::InsufficientData`] and no period averages.
pub fn calculate_trend(entries: &[Entry], date_field: &str, value_field: &str) -> TrendReport {
    if entries.len() < 2 {
        return TrendReport::insufficient(entries.len());
    }

    let mut dated: Vec<(DateTime<Utc>, f64)> = entries
        .iter()
        .map(|e| (entry_date(e, date_field), fields::numeric_field(e, value_field)))
        .collect();
    dated.sort_by_key(|(at, _)| *at);

    // last period absorbs the remainder
    let chunk = (dated.len() / PERIOD_COUNT).max(1);
    let mut period_averages = Vec::with_capacity(PERIOD_COUNT);
    for i in 0..PERIOD_COUNT {
        let start = i * chunk;
        if start >= dated.len() {
            break;
        }
        let end = if i == PERIOD_COUNT - 1 {
            dated.len()
        } else {
            ((i + 1) * chunk).min(dated.len())
        };
        let values: Vec<f64> = dated[start..end].iter().map(|(_, v)| *v).collect();
        period_averages.push(stats::mean(&values));
    }

    let half = period_averages.len() / 2;
    let early = stats::mean(&period_averages[..half]);
    let late = stats::mean(&period_averages[period_averages.len() - half..]);
    let change_pct = stats::percentage_change(early, late);

    let direction = if change_pct > TREND_THRESHOLD_PCT {
        TrendDirection::Increasing
    } else if change_pct < -TREND_THRESHOLD_PCT {
        TrendDirection::Decreasing
    } else {
        TrendDirection::Stable
    };

    TrendReport {
        direction,
        period_averages,
        change_pct,
        sample_count: entries.len(),
    }
}
