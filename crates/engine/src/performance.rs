//! Request-level performance analysis
//!
//! Composes the statistics kit over two entry collections, a primary one
//! (requests) and an optional secondary one (queries), to surface
//! bottlenecks, per-endpoint breakdowns, slow requests, health scoring,
//! and trend comparison against a historical baseline.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::debug;

use crate::config::AnalysisConfig;
use crate::fields;
use crate::patterns::Severity;
use crate::stats;
use tracelens_types::Entry;

/// Content field holding request duration in milliseconds
const DURATION_FIELD: &str = "duration";

/// Content field holding peak memory in megabytes
const MEMORY_FIELD: &str = "memory";

/// Content field holding the HTTP response status
const STATUS_FIELD: &str = "response_status";

/// Content field naming the handling controller action
const ENDPOINT_FIELD: &str = "controller_action";

/// Fallback content field when no controller action is recorded
const URI_FIELD: &str = "uri";

/// Secondary-collection timing field (statement entries)
const TIME_FIELD: &str = "time";

/// Share of primary time above which the database dominates
const DB_SHARE_THRESHOLD_PCT: f64 = 50.0;

/// Share of high-memory entries above which memory pressure is flagged
const MEMORY_SHARE_THRESHOLD_PCT: f64 = 10.0;

/// Cap for the slow-request report list
const REPORT_CAP: usize = 10;

/// Kind of detected bottleneck
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BottleneckKind {
    DatabaseDominance,
    MemoryPressure,
    SlowEndpoint,
}

/// One detected bottleneck with its measured figure and threshold
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bottleneck {
    pub kind: BottleneckKind,
    pub severity: Severity,
    /// Endpoint label for per-endpoint findings
    pub subject: Option<String>,
    pub value: f64,
    pub threshold: f64,
    pub detail: String,
    pub suggestion: String,
}

/// Direction of a current-vs-baseline comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthTrend {
    Degrading,
    Improving,
    Stable,
}

impl HealthTrend {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthTrend::Degrading => "degrading",
            HealthTrend::Improving => "improving",
            HealthTrend::Stable => "stable",
        }
    }
}

/// One metric compared between the current window and the baseline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricComparison {
    pub current: f64,
    pub historical: f64,
    pub change_pct: f64,
}

fn compare(current: f64, historical: f64) -> MetricComparison {
    MetricComparison {
        current,
        historical,
        change_pct: stats::percentage_change(historical, current),
    }
}

/// Current-vs-historical performance comparison
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceTrend {
    pub direction: HealthTrend,
    /// Relative change in mean duration
    pub change_pct: f64,
    pub mean: MetricComparison,
    pub p50: MetricComparison,
    pub p95: MetricComparison,
    pub current_samples: usize,
    pub historical_samples: usize,
}

/// Qualitative banding of a performance score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreRating {
    Excellent,
    Good,
    Fair,
    Poor,
}

/// One itemized deduction from the performance score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScorePenalty {
    pub reason: String,
    pub points: f64,
}

/// Health score over a request window, 100 down to a floor of 0
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceScore {
    pub score: f64,
    pub rating: ScoreRating,
    pub avg_duration_ms: f64,
    pub error_rate_pct: f64,
    pub high_memory_pct: f64,
    pub sample_count: usize,
    pub penalties: Vec<ScorePenalty>,
}

/// Per-endpoint duration summary, slowest first
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointBreakdown {
    pub endpoint: String,
    pub count: usize,
    pub avg_duration_ms: f64,
    pub p95_duration_ms: f64,
    pub error_rate_pct: f64,
    pub slow: bool,
}

/// One request exceeding the slow threshold
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlowRequest {
    pub entry_id: String,
    pub endpoint: String,
    pub duration_ms: f64,
    pub memory_mb: f64,
    pub severity: Severity,
}

fn endpoint_label(entry: &Entry) -> String {
    let action = fields::text_field(entry, ENDPOINT_FIELD);
    if !action.is_empty() {
        return action;
    }
    let uri = fields::text_field(entry, URI_FIELD);
    if !uri.is_empty() {
        return uri;
    }
    "unknown".to_string()
}

fn error_rate_pct(entries: &[&Entry]) -> f64 {
    if entries.is_empty() {
        return 0.0;
    }
    let errors = entries
        .iter()
        .filter(|e| fields::numeric_field(e, STATUS_FIELD) >= 500.0)
        .count();
    errors as f64 / entries.len() as f64 * 100.0
}

/// Cross-collection performance analysis with configured thresholds
#[derive(Debug, Clone)]
pub struct PerformanceAnalyzer {
    config: AnalysisConfig,
}

impl PerformanceAnalyzer {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    /// Flag database dominance, memory pressure, and slow endpoint groups
    pub fn identify_bottlenecks(
        &self,
        primary: &[Entry],
        secondary: Option<&[Entry]>,
    ) -> Vec<Bottleneck> {
        let mut bottlenecks = Vec::new();

        if let Some(secondary) = secondary {
            let primary_total: f64 = primary
                .iter()
                .map(|e| fields::numeric_field(e, DURATION_FIELD))
                .sum();
            let secondary_total: f64 = secondary
                .iter()
                .map(|e| fields::numeric_field(e, TIME_FIELD))
                .sum();

            if primary_total > 0.0 {
                let share_pct = secondary_total / primary_total * 100.0;
                if share_pct > DB_SHARE_THRESHOLD_PCT {
                    let severity = if share_pct > 75.0 {
                        Severity::Critical
                    } else {
                        Severity::Warning
                    };
                    bottlenecks.push(Bottleneck {
                        kind: BottleneckKind::DatabaseDominance,
                        severity,
                        subject: None,
                        value: share_pct,
                        threshold: DB_SHARE_THRESHOLD_PCT,
                        detail: format!(
                            "database time is {:.1}% of total request time ({:.0}ms of {:.0}ms)",
                            share_pct, secondary_total, primary_total
                        ),
                        suggestion: "cache hot queries or batch lookups to cut time spent in the database"
                            .to_string(),
                    });
                }
            }
        }

        if !primary.is_empty() {
            let over = primary
                .iter()
                .filter(|e| fields::numeric_field(e, MEMORY_FIELD) > self.config.high_memory_mb)
                .count();
            let over_pct = over as f64 / primary.len() as f64 * 100.0;
            if over_pct > MEMORY_SHARE_THRESHOLD_PCT {
                let severity = if over_pct > 25.0 {
                    Severity::Critical
                } else {
                    Severity::Warning
                };
                bottlenecks.push(Bottleneck {
                    kind: BottleneckKind::MemoryPressure,
                    severity,
                    subject: None,
                    value: over_pct,
                    threshold: MEMORY_SHARE_THRESHOLD_PCT,
                    detail: format!(
                        "{:.1}% of requests exceed {:.0}MB peak memory",
                        over_pct, self.config.high_memory_mb
                    ),
                    suggestion: "profile allocation-heavy endpoints and stream large responses"
                        .to_string(),
                });
            }
        }

        for group in self.endpoint_breakdown(primary) {
            if !group.slow {
                continue;
            }
            let severity = if group.avg_duration_ms > self.config.slow_request_ms * 2.0 {
                Severity::Critical
            } else {
                Severity::Warning
            };
            bottlenecks.push(Bottleneck {
                kind: BottleneckKind::SlowEndpoint,
                severity,
                value: group.avg_duration_ms,
                threshold: self.config.slow_request_ms,
                detail: format!(
                    "'{}' averages {:.0}ms across {} requests",
                    group.endpoint, group.avg_duration_ms, group.count
                ),
                suggestion: "split the endpoint's work into cheaper queries or move it to a background job"
                    .to_string(),
                subject: Some(group.endpoint),
            });
        }

        debug!(
            primary = primary.len(),
            findings = bottlenecks.len(),
            "bottleneck scan complete"
        );
        bottlenecks
    }

    /// Per-endpoint duration summary, slowest average first
    ///
    /// Groups by controller action, falling back to the request URI and
    /// then to `"unknown"`.
    pub fn endpoint_breakdown(&self, entries: &[Entry]) -> Vec<EndpointBreakdown> {
        let mut order: Vec<String> = Vec::new();
        let mut groups: HashMap<String, Vec<&Entry>> = HashMap::new();
        for entry in entries {
            let label = endpoint_label(entry);
            if !groups.contains_key(&label) {
                order.push(label.clone());
            }
            groups.entry(label).or_default().push(entry);
        }

        let mut out: Vec<EndpointBreakdown> = order
            .into_iter()
            .map(|endpoint| {
                let members = &groups[&endpoint];
                let durations: Vec<f64> = members
                    .iter()
                    .map(|e| fields::numeric_field(e, DURATION_FIELD))
                    .collect();
                let avg = stats::mean(&durations);
                EndpointBreakdown {
                    count: members.len(),
                    avg_duration_ms: avg,
                    p95_duration_ms: stats::percentile(&durations, 95.0),
                    error_rate_pct: error_rate_pct(members),
                    slow: avg > self.config.slow_request_ms,
                    endpoint,
                }
            })
            .collect();

        out.sort_by(|a, b| {
            b.avg_duration_ms
                .partial_cmp(&a.avg_duration_ms)
                .unwrap_or(Ordering::Equal)
        });
        out
    }

    /// Requests whose duration exceeds the slow threshold, slowest first,
    /// top 10
    pub fn slow_requests(&self, entries: &[Entry], threshold_ms: Option<f64>) -> Vec<SlowRequest> {
        let threshold = threshold_ms.unwrap_or(self.config.slow_request_ms);

        let mut slow: Vec<SlowRequest> = entries
            .iter()
            .filter_map(|entry| {
                let duration_ms = fields::numeric_field(entry, DURATION_FIELD);
                if duration_ms <= threshold {
                    return None;
                }
                let severity = if duration_ms > threshold * 2.0 {
                    Severity::Critical
                } else {
                    Severity::Warning
                };
                Some(SlowRequest {
                    entry_id: entry.id.clone(),
                    endpoint: endpoint_label(entry),
                    duration_ms,
                    memory_mb: fields::numeric_field(entry, MEMORY_FIELD),
                    severity,
                })
            })
            .collect();

        slow.sort_by(|a, b| {
            b.duration_ms
                .partial_cmp(&a.duration_ms)
                .unwrap_or(Ordering::Equal)
        });
        slow.truncate(REPORT_CAP);
        slow
    }

    /// Compare the current window's durations against a historical baseline
    pub fn calculate_trends(&self, current: &[Entry], historical: &[Entry]) -> PerformanceTrend {
        let current_durations = fields::numeric_series(current, DURATION_FIELD);
        let historical_durations = fields::numeric_series(historical, DURATION_FIELD);

        let mean = compare(
            stats::mean(&current_durations),
            stats::mean(&historical_durations),
        );
        let direction = if mean.change_pct > 10.0 {
            HealthTrend::Degrading
        } else if mean.change_pct < -10.0 {
            HealthTrend::Improving
        } else {
            HealthTrend::Stable
        };

        PerformanceTrend {
            direction,
            change_pct: mean.change_pct,
            p50: compare(
                stats::percentile(&current_durations, 50.0),
                stats::percentile(&historical_durations, 50.0),
            ),
            p95: compare(
                stats::percentile(&current_durations, 95.0),
                stats::percentile(&historical_durations, 95.0),
            ),
            mean,
            current_samples: current.len(),
            historical_samples: historical.len(),
        }
    }

    /// Health score from 100 with tiered deductions for slow averages,
    /// error rates, and high-memory share; floored at 0
    pub fn performance_score(&self, entries: &[Entry]) -> PerformanceScore {
        let mut penalties = Vec::new();

        let durations = fields::numeric_series(entries, DURATION_FIELD);
        let avg_duration_ms = stats::mean(&durations);
        if avg_duration_ms > 1000.0 {
            penalties.push(ScorePenalty {
                reason: "average duration above 1000ms".to_string(),
                points: 30.0,
            });
        } else if avg_duration_ms > 500.0 {
            penalties.push(ScorePenalty {
                reason: "average duration above 500ms".to_string(),
                points: 20.0,
            });
        } else if avg_duration_ms > 200.0 {
            penalties.push(ScorePenalty {
                reason: "average duration above 200ms".to_string(),
                points: 10.0,
            });
        }

        let members: Vec<&Entry> = entries.iter().collect();
        let error_rate = error_rate_pct(&members);
        if error_rate > 10.0 {
            penalties.push(ScorePenalty {
                reason: "server error rate above 10%".to_string(),
                points: 30.0,
            });
        } else if error_rate > 5.0 {
            penalties.push(ScorePenalty {
                reason: "server error rate above 5%".to_string(),
                points: 20.0,
            });
        } else if error_rate > 1.0 {
            penalties.push(ScorePenalty {
                reason: "server error rate above 1%".to_string(),
                points: 10.0,
            });
        }

        let high_memory_pct = if entries.is_empty() {
            0.0
        } else {
            let over = entries
                .iter()
                .filter(|e| fields::numeric_field(e, MEMORY_FIELD) > self.config.high_memory_mb)
                .count();
            over as f64 / entries.len() as f64 * 100.0
        };
        if high_memory_pct > 20.0 {
            penalties.push(ScorePenalty {
                reason: "more than 20% of requests above the memory ceiling".to_string(),
                points: 20.0,
            });
        } else if high_memory_pct > 10.0 {
            penalties.push(ScorePenalty {
                reason: "more than 10% of requests above the memory ceiling".to_string(),
                points: 10.0,
            });
        }

        let deducted: f64 = penalties.iter().map(|p| p.points).sum();
        let score = (100.0 - deducted).max(0.0);
        let rating = if score >= 90.0 {
            ScoreRating::Excellent
        } else if score >= 75.0 {
            ScoreRating::Good
        } else if score >= 50.0 {
            ScoreRating::Fair
        } else {
            ScoreRating::Poor
        };

        PerformanceScore {
            score,
            rating,
            avg_duration_ms,
            error_rate_pct: error_rate,
            high_memory_pct,
            sample_count: entries.len(),
            penalties,
        }
    }
}
