//! Query pattern analysis
//!
//! Groups statement-bearing entries to surface N+1 execution patterns,
//! literal duplicates with the time wasted on repetition, slow statements
//! with tiered remediation, and heuristic optimization suggestions. All
//! groupings are recomputed per request from the supplied window; nothing
//! is persisted.

pub mod canonical;

pub use canonical::{canonicalize, classify, extract_tables, normalize, QueryClass};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::debug;

use crate::config::AnalysisConfig;
use crate::fields;
use tracelens_types::Entry;

/// Content field holding the statement text
const SQL_FIELD: &str = "sql";

/// Content field holding the statement timing in milliseconds
const TIME_FIELD: &str = "time";

/// Members of a group included as a drill-down sample
const SAMPLE_SIZE: usize = 3;

/// Cap for duplicate and slow-query report lists
const REPORT_CAP: usize = 10;

/// Report severity tiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

/// One sampled member of a pattern group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampledQuery {
    pub entry_id: String,
    pub sql: String,
    pub time_ms: f64,
}

/// Structurally identical statements repeated enough to look like an N+1
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NPlusOnePattern {
    /// Canonical signature shared by every member
    pub signature: String,
    pub count: usize,
    pub tables: Vec<String>,
    pub total_time_ms: f64,
    /// First members, for drill-down
    pub sample: Vec<SampledQuery>,
    pub suggestion: String,
}

/// Literal-identical statements executed more than once
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateGroup {
    /// Normalized statement text shared by every member
    pub sql: String,
    /// Hash of the normalized text
    pub hash: String,
    pub count: usize,
    pub total_time_ms: f64,
    pub avg_time_ms: f64,
    /// Time beyond one canonical execution
    pub wasted_time_ms: f64,
    pub entry_ids: Vec<String>,
}

/// One statement exceeding the slow threshold
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlowQuery {
    pub entry_id: String,
    pub sql: String,
    pub time_ms: f64,
    pub severity: Severity,
    pub suggestion: String,
}

/// Kind of heuristic optimization finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionKind {
    MissingIndex,
    FullScan,
    WildcardProjection,
}

/// One heuristic optimization finding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationSuggestion {
    pub kind: SuggestionKind,
    pub table: Option<String>,
    pub detail: String,
    pub sample_sql: String,
    pub occurrences: usize,
}

fn text_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

fn slow_query_tier(time_ms: f64) -> (Severity, String) {
    if time_ms > 1000.0 {
        (
            Severity::Critical,
            format!(
                "critical: {:.0}ms runtime; restructure the query or add a covering index",
                time_ms
            ),
        )
    } else if time_ms > 500.0 {
        (
            Severity::Warning,
            format!(
                "high priority: {:.0}ms runtime; check indexes on the filtered columns",
                time_ms
            ),
        )
    } else {
        (
            Severity::Info,
            "review the query plan and confirm indexes are used".to_string(),
        )
    }
}

/// Detects execution patterns across statement-bearing entries
#[derive(Debug, Clone)]
pub struct PatternAnalyzer {
    config: AnalysisConfig,
}

impl PatternAnalyzer {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    /// Group by canonical signature and report groups at or above the
    /// repetition threshold
    pub fn detect_n_plus_one(
        &self,
        entries: &[Entry],
        threshold: Option<usize>,
    ) -> Vec<NPlusOnePattern> {
        let threshold = threshold.unwrap_or(self.config.n_plus_one_threshold);

        let mut order: Vec<String> = Vec::new();
        let mut groups: HashMap<String, Vec<&Entry>> = HashMap::new();
        for entry in entries {
            let sql = fields::text_field(entry, SQL_FIELD);
            if sql.is_empty() {
                continue;
            }
            let signature = canonical::canonicalize(&sql);
            if !groups.contains_key(&signature) {
                order.push(signature.clone());
            }
            groups.entry(signature).or_default().push(entry);
        }

        debug!(
            groups = groups.len(),
            threshold, "scanning signature groups for n+1 patterns"
        );

        order
            .into_iter()
            .filter_map(|signature| {
                let members = &groups[&signature];
                if members.len() < threshold {
                    return None;
                }

                let tables = canonical::extract_tables(&signature);
                let total_time_ms = members
                    .iter()
                    .map(|e| fields::numeric_field(e, TIME_FIELD))
                    .sum();
                let sample = members
                    .iter()
                    .take(SAMPLE_SIZE)
                    .map(|e| SampledQuery {
                        entry_id: e.id.clone(),
                        sql: fields::text_field(e, SQL_FIELD),
                        time_ms: fields::numeric_field(e, TIME_FIELD),
                    })
                    .collect();
                let subject = tables
                    .first()
                    .cloned()
                    .unwrap_or_else(|| "the related records".to_string());
                let suggestion = format!(
                    "eager-load or batch the {} repeated lookups against '{}' into one query",
                    members.len(),
                    subject
                );

                Some(NPlusOnePattern {
                    signature,
                    count: members.len(),
                    tables,
                    total_time_ms,
                    sample,
                    suggestion,
                })
            })
            .collect()
    }

    /// Group by normalized text and report repeats with the wasted time
    /// (total minus one canonical execution), worst first, top 10
    pub fn find_duplicates(&self, entries: &[Entry]) -> Vec<DuplicateGroup> {
        let mut order: Vec<String> = Vec::new();
        let mut groups: HashMap<String, (String, Vec<&Entry>)> = HashMap::new();
        for entry in entries {
            let sql = fields::text_field(entry, SQL_FIELD);
            if sql.is_empty() {
                continue;
            }
            let normalized = canonical::normalize(&sql);
            let hash = text_hash(&normalized);
            if !groups.contains_key(&hash) {
                order.push(hash.clone());
            }
            groups
                .entry(hash)
                .or_insert_with(|| (normalized, Vec::new()))
                .1
                .push(entry);
        }

        let mut out: Vec<DuplicateGroup> = order
            .into_iter()
            .filter_map(|hash| {
                let (sql, members) = &groups[&hash];
                if members.len() < 2 {
                    return None;
                }

                let total_time_ms: f64 = members
                    .iter()
                    .map(|e| fields::numeric_field(e, TIME_FIELD))
                    .sum();
                let avg_time_ms = total_time_ms / members.len() as f64;

                Some(DuplicateGroup {
                    sql: sql.clone(),
                    hash,
                    count: members.len(),
                    total_time_ms,
                    avg_time_ms,
                    wasted_time_ms: total_time_ms - avg_time_ms,
                    entry_ids: members.iter().map(|e| e.id.clone()).collect(),
                })
            })
            .collect();

        out.sort_by(|a, b| {
            b.wasted_time_ms
                .partial_cmp(&a.wasted_time_ms)
                .unwrap_or(Ordering::Equal)
        });
        out.truncate(REPORT_CAP);
        out
    }

    /// Statements whose timing exceeds the threshold, slowest first, top 10
    pub fn identify_slow_queries(
        &self,
        entries: &[Entry],
        threshold_ms: Option<f64>,
    ) -> Vec<SlowQuery> {
        let threshold = threshold_ms.unwrap_or(self.config.slow_query_ms);

        let mut slow: Vec<SlowQuery> = entries
            .iter()
            .filter_map(|entry| {
                let time_ms = fields::numeric_field(entry, TIME_FIELD);
                if time_ms <= threshold {
                    return None;
                }
                let (severity, suggestion) = slow_query_tier(time_ms);
                Some(SlowQuery {
                    entry_id: entry.id.clone(),
                    sql: fields::text_field(entry, SQL_FIELD),
                    time_ms,
                    severity,
                    suggestion,
                })
            })
            .collect();

        slow.sort_by(|a, b| b.time_ms.partial_cmp(&a.time_ms).unwrap_or(Ordering::Equal));
        slow.truncate(REPORT_CAP);
        slow
    }

    /// Heuristic findings: recurring slow filtered tables (missing index),
    /// unbounded scans, and wildcard projections
    pub fn suggest_optimizations(&self, entries: &[Entry]) -> Vec<OptimizationSuggestion> {
        let mut suggestions = Vec::new();

        let mut table_order: Vec<String> = Vec::new();
        let mut table_hits: HashMap<String, (usize, String)> = HashMap::new();
        let mut scan_order: Vec<String> = Vec::new();
        let mut scans: HashMap<String, (String, usize)> = HashMap::new();
        let mut wildcard_order: Vec<String> = Vec::new();
        let mut wildcards: HashMap<String, (String, usize)> = HashMap::new();

        for entry in entries {
            let sql = fields::text_field(entry, SQL_FIELD);
            if sql.is_empty() {
                continue;
            }
            let time_ms = fields::numeric_field(entry, TIME_FIELD);

            if time_ms > self.config.slow_query_ms && canonical::has_where(&sql) {
                for table in canonical::extract_tables(&sql) {
                    if !table_hits.contains_key(&table) {
                        table_order.push(table.clone());
                    }
                    let slot = table_hits.entry(table).or_insert_with(|| (0, sql.clone()));
                    slot.0 += 1;
                }
            }

            if canonical::is_select(&sql) {
                let signature = canonical::canonicalize(&sql);
                if !canonical::has_where(&sql) && !canonical::has_limit(&sql) {
                    if !scans.contains_key(&signature) {
                        scan_order.push(signature.clone());
                    }
                    scans.entry(signature).or_insert_with(|| (sql.clone(), 0)).1 += 1;
                }
                if canonical::is_wildcard_select(&sql) {
                    let signature = canonical::canonicalize(&sql);
                    if !wildcards.contains_key(&signature) {
                        wildcard_order.push(signature.clone());
                    }
                    wildcards
                        .entry(signature)
                        .or_insert_with(|| (sql.clone(), 0))
                        .1 += 1;
                }
            }
        }

        for table in table_order {
            let (count, sample_sql) = &table_hits[&table];
            if *count >= 3 {
                suggestions.push(OptimizationSuggestion {
                    kind: SuggestionKind::MissingIndex,
                    detail: format!(
                        "{} slow filtered statements hit '{}'; add an index on the filtered columns",
                        count, table
                    ),
                    table: Some(table),
                    sample_sql: sample_sql.clone(),
                    occurrences: *count,
                });
            }
        }

        for signature in scan_order {
            let (sample_sql, count) = &scans[&signature];
            suggestions.push(OptimizationSuggestion {
                kind: SuggestionKind::FullScan,
                table: canonical::extract_tables(sample_sql).into_iter().next(),
                detail: "unbounded scan with no WHERE or LIMIT; constrain the result set"
                    .to_string(),
                sample_sql: sample_sql.clone(),
                occurrences: *count,
            });
        }

        for signature in wildcard_order {
            let (sample_sql, count) = &wildcards[&signature];
            suggestions.push(OptimizationSuggestion {
                kind: SuggestionKind::WildcardProjection,
                table: canonical::extract_tables(sample_sql).into_iter().next(),
                detail: "SELECT * fetches every column; project only the columns in use"
                    .to_string(),
                sample_sql: sample_sql.clone(),
                occurrences: *count,
            });
        }

        suggestions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tracelens_types::EntryKind;

    fn analyzer() -> PatternAnalyzer {
        PatternAnalyzer::new(AnalysisConfig::default())
    }

    fn query(sql: &str, time_ms: f64) -> Entry {
        Entry::new(EntryKind::Query, json!({ "sql": sql, "time": time_ms }))
    }

    #[test]
    fn test_n_plus_one_group() {
        let entries = vec![
            query("SELECT * FROM posts WHERE user_id = 1", 5.0),
            query("SELECT * FROM posts WHERE user_id = 2", 5.0),
            query("SELECT * FROM posts WHERE user_id = 3", 5.0),
            query("SELECT * FROM posts WHERE user_id = 4", 5.0),
        ];
        let patterns = analyzer().detect_n_plus_one(&entries, Some(3));

        assert_eq!(patterns.len(), 1);
        let pattern = &patterns[0];
        assert_eq!(pattern.count, 4);
        assert_eq!(pattern.signature, "SELECT * FROM posts WHERE user_id = ?");
        assert_eq!(pattern.tables, vec!["posts".to_string()]);
        assert_eq!(pattern.sample.len(), 3);
        assert_eq!(pattern.total_time_ms, 20.0);
        assert!(pattern.suggestion.contains("posts"));
    }

    #[test]
    fn test_n_plus_one_below_threshold() {
        let entries = vec![
            query("SELECT * FROM posts WHERE user_id = 1", 5.0),
            query("SELECT * FROM posts WHERE user_id = 2", 5.0),
        ];
        assert!(analyzer().detect_n_plus_one(&entries, Some(3)).is_empty());
    }

    #[test]
    fn test_n_plus_one_uses_configured_threshold() {
        let entries = vec![
            query("SELECT * FROM posts WHERE user_id = 1", 5.0),
            query("SELECT * FROM posts WHERE user_id = 2", 5.0),
            query("SELECT * FROM posts WHERE user_id = 3", 5.0),
        ];
        // config default threshold is 3
        assert_eq!(analyzer().detect_n_plus_one(&entries, None).len(), 1);
    }

    #[test]
    fn test_duplicate_wasted_time() {
        let entries = vec![
            query("SELECT * FROM settings", 100.0),
            query("SELECT * FROM settings", 100.0),
            query("SELECT * FROM settings", 100.0),
        ];
        let duplicates = analyzer().find_duplicates(&entries);

        assert_eq!(duplicates.len(), 1);
        let group = &duplicates[0];
        assert_eq!(group.count, 3);
        assert_eq!(group.total_time_ms, 300.0);
        assert_eq!(group.avg_time_ms, 100.0);
        assert_eq!(group.wasted_time_ms, 200.0);
        assert_eq!(group.entry_ids.len(), 3);
    }

    #[test]
    fn test_duplicates_distinguish_literals() {
        // same structure, different literals: duplicates must not merge them
        let entries = vec![
            query("SELECT * FROM posts WHERE user_id = 1", 10.0),
            query("SELECT * FROM posts WHERE user_id = 2", 10.0),
        ];
        assert!(analyzer().find_duplicates(&entries).is_empty());
    }

    #[test]
    fn test_duplicates_sorted_by_wasted_time() {
        let mut entries = Vec::new();
        for _ in 0..2 {
            entries.push(query("SELECT * FROM small", 10.0));
        }
        for _ in 0..3 {
            entries.push(query("SELECT * FROM big", 500.0));
        }
        let duplicates = analyzer().find_duplicates(&entries);

        assert_eq!(duplicates.len(), 2);
        assert!(duplicates[0].sql.contains("big"));
        assert_eq!(duplicates[0].wasted_time_ms, 1000.0);
    }

    #[test]
    fn test_slow_queries_tiered_and_sorted() {
        let entries = vec![
            query("SELECT * FROM a WHERE x = 1", 600.0),
            query("SELECT * FROM b WHERE x = 1", 1500.0),
            query("SELECT * FROM c WHERE x = 1", 150.0),
            query("SELECT * FROM d WHERE x = 1", 50.0),
        ];
        let slow = analyzer().identify_slow_queries(&entries, None);

        assert_eq!(slow.len(), 3);
        assert_eq!(slow[0].time_ms, 1500.0);
        assert_eq!(slow[0].severity, Severity::Critical);
        assert_eq!(slow[1].severity, Severity::Warning);
        assert_eq!(slow[2].severity, Severity::Info);
    }

    #[test]
    fn test_slow_query_cap() {
        let entries: Vec<Entry> = (0..15)
            .map(|i| query("SELECT * FROM t WHERE x = 1", 200.0 + i as f64))
            .collect();
        assert_eq!(analyzer().identify_slow_queries(&entries, None).len(), 10);
    }

    #[test]
    fn test_missing_index_suggestion() {
        let entries = vec![
            query("SELECT * FROM orders WHERE customer_id = 1", 150.0),
            query("SELECT * FROM orders WHERE customer_id = 2", 180.0),
            query("SELECT * FROM orders WHERE status = 'open'", 200.0),
        ];
        let suggestions = analyzer().suggest_optimizations(&entries);

        let index = suggestions
            .iter()
            .find(|s| s.kind == SuggestionKind::MissingIndex)
            .expect("missing index suggestion");
        assert_eq!(index.table.as_deref(), Some("orders"));
        assert_eq!(index.occurrences, 3);
    }

    #[test]
    fn test_full_scan_and_wildcard_suggestions() {
        let entries = vec![query("SELECT * FROM logs", 20.0)];
        let suggestions = analyzer().suggest_optimizations(&entries);

        assert!(suggestions
            .iter()
            .any(|s| s.kind == SuggestionKind::FullScan));
        assert!(suggestions
            .iter()
            .any(|s| s.kind == SuggestionKind::WildcardProjection));
    }

    #[test]
    fn test_entries_without_sql_are_skipped() {
        let entries = vec![Entry::new(EntryKind::Query, json!({"time": 999.0}))];
        assert!(analyzer().detect_n_plus_one(&entries, None).is_empty());
        assert!(analyzer().find_duplicates(&entries).is_empty());
        assert!(analyzer().suggest_optimizations(&entries).is_empty());
    }
}
