//! Entry store boundary
//!
//! The engine pulls telemetry through the `EntryStore` trait: a read-only,
//! time-ordered-descending source. Stores cannot always filter by absolute
//! time window natively, so period filtering happens client-side via
//! `Period` and `filter_by_period`. `MemoryEntryStore` is the reference
//! implementation used by tests and the demo.

use async_trait::async_trait;
use chrono::Utc;
use std::str::FromStr;
use tokio::sync::RwLock;
use tracing::trace;

use tracelens_types::{AnalysisError, Entry, EntryKind, Result};

/// Fetch filters supported by every store
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    pub limit: Option<usize>,
    pub tag: Option<String>,
    pub family_hash: Option<String>,
    pub before_sequence: Option<u64>,
}

impl FetchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_family_hash(mut self, hash: impl Into<String>) -> Self {
        self.family_hash = Some(hash.into());
        self
    }

    pub fn before_sequence(mut self, sequence: u64) -> Self {
        self.before_sequence = Some(sequence);
        self
    }
}

/// Longest accepted relative span, ten years in seconds
///
/// Bounds client-supplied periods and configured windows/TTLs well below
/// the range where second arithmetic on timestamps stops being exact.
pub const MAX_SPAN_SECS: u64 = 315_360_000;

/// A relative time window such as `"5m"`, `"1h"`, `"24h"`, `"7d"`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Period {
    pub label: String,
    pub seconds: u64,
}

impl Period {
    pub fn new(label: impl Into<String>, seconds: u64) -> Self {
        Self {
            label: label.into(),
            seconds,
        }
    }
}

impl FromStr for Period {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let unit_start = trimmed
            .find(|c: char| !c.is_ascii_digit())
            .filter(|&pos| pos > 0)
            .ok_or_else(|| {
                AnalysisError::invalid_argument("period", format!("cannot parse period '{s}'"))
            })?;
        let (magnitude, unit) = trimmed.split_at(unit_start);

        let magnitude: u64 = magnitude.parse().map_err(|_| {
            AnalysisError::invalid_argument("period", format!("cannot parse period '{s}'"))
        })?;
        let seconds = match unit {
            "s" => Some(magnitude),
            "m" => magnitude.checked_mul(60),
            "h" => magnitude.checked_mul(3_600),
            "d" => magnitude.checked_mul(86_400),
            "w" => magnitude.checked_mul(604_800),
            other => {
                return Err(AnalysisError::invalid_argument(
                    "period",
                    format!("unknown period unit '{other}'"),
                ))
            }
        };
        let seconds = seconds.filter(|&secs| secs <= MAX_SPAN_SECS).ok_or_else(|| {
            AnalysisError::invalid_argument(
                "period",
                format!("period '{s}' exceeds the ten year maximum"),
            )
        })?;
        if seconds == 0 {
            return Err(AnalysisError::invalid_argument(
                "period",
                "period must be positive",
            ));
        }

        Ok(Period {
            label: trimmed.to_string(),
            seconds,
        })
    }
}

/// Keep entries whose timestamp falls within the period ending now
pub fn filter_by_period(entries: Vec<Entry>, period: &Period) -> Vec<Entry> {
    let cutoff = i64::try_from(period.seconds)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .and_then(|span| Utc::now().checked_sub_signed(span));
    match cutoff {
        Some(cutoff) => entries
            .into_iter()
            .filter(|entry| entry.created_at >= cutoff)
            .collect(),
        // a span wider than representable time bounds nothing
        None => entries,
    }
}

/// Pull-based, read-only telemetry source
///
/// Results are ordered newest first. Implementations must be safe for
/// concurrent access.
#[async_trait]
pub trait EntryStore: Send + Sync {
    /// Entries of one kind matching the fetch filters, newest first
    async fn get(&self, kind: EntryKind, options: FetchOptions) -> Result<Vec<Entry>>;

    /// Single entry by id
    async fn find(&self, id: &str) -> Result<Option<Entry>>;
}

/// In-memory store over a shared entry list
pub struct MemoryEntryStore {
    entries: RwLock<Vec<Entry>>,
}

impl MemoryEntryStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    pub async fn add(&self, entry: Entry) {
        self.entries.write().await.push(entry);
    }

    pub async fn add_all(&self, entries: Vec<Entry>) {
        self.entries.write().await.extend(entries);
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

impl Default for MemoryEntryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EntryStore for MemoryEntryStore {
    async fn get(&self, kind: EntryKind, options: FetchOptions) -> Result<Vec<Entry>> {
        let entries = self.entries.read().await;

        let mut out: Vec<Entry> = entries
            .iter()
            .filter(|entry| entry.kind == kind)
            .filter(|entry| match &options.tag {
                Some(tag) => entry.tags.iter().any(|t| t == tag),
                None => true,
            })
            .filter(|entry| match &options.family_hash {
                Some(hash) => entry.family_hash.as_deref() == Some(hash.as_str()),
                None => true,
            })
            .filter(|entry| match options.before_sequence {
                Some(before) => entry.sequence.is_some_and(|s| s < before),
                None => true,
            })
            .cloned()
            .collect();

        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = options.limit {
            out.truncate(limit);
        }

        trace!(kind = kind.as_str(), returned = out.len(), "store fetch");
        Ok(out)
    }

    async fn find(&self, id: &str) -> Result<Option<Entry>> {
        let entries = self.entries.read().await;
        Ok(entries.iter().find(|entry| entry.id == id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn entry(kind: EntryKind, id: &str, age_seconds: i64) -> Entry {
        Entry::new(kind, json!({}))
            .with_id(id)
            .with_created_at(Utc::now() - Duration::seconds(age_seconds))
    }

    #[tokio::test]
    async fn test_kind_filter_and_descending_order() {
        let store = MemoryEntryStore::new();
        store.add(entry(EntryKind::Query, "q-old", 300)).await;
        store.add(entry(EntryKind::Request, "r1", 10)).await;
        store.add(entry(EntryKind::Query, "q-new", 5)).await;

        let queries = store
            .get(EntryKind::Query, FetchOptions::new())
            .await
            .unwrap();
        assert_eq!(queries.len(), 2);
        assert_eq!(queries[0].id, "q-new");
        assert_eq!(queries[1].id, "q-old");
    }

    #[tokio::test]
    async fn test_limit_applies_after_ordering() {
        let store = MemoryEntryStore::new();
        for i in 0..5 {
            store
                .add(entry(EntryKind::Request, &format!("r{i}"), i * 60))
                .await;
        }

        let recent = store
            .get(EntryKind::Request, FetchOptions::new().with_limit(2))
            .await
            .unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].id, "r0");
        assert_eq!(recent[1].id, "r1");
    }

    #[tokio::test]
    async fn test_tag_and_family_filters() {
        let store = MemoryEntryStore::new();
        store
            .add(entry(EntryKind::Exception, "e1", 10).with_tag("billing"))
            .await;
        store
            .add(entry(EntryKind::Exception, "e2", 20).with_family_hash("fam-a"))
            .await;
        store.add(entry(EntryKind::Exception, "e3", 30)).await;

        let tagged = store
            .get(EntryKind::Exception, FetchOptions::new().with_tag("billing"))
            .await
            .unwrap();
        assert_eq!(tagged.len(), 1);
        assert_eq!(tagged[0].id, "e1");

        let family = store
            .get(
                EntryKind::Exception,
                FetchOptions::new().with_family_hash("fam-a"),
            )
            .await
            .unwrap();
        assert_eq!(family.len(), 1);
        assert_eq!(family[0].id, "e2");
    }

    #[tokio::test]
    async fn test_before_sequence_excludes_unsequenced() {
        let store = MemoryEntryStore::new();
        store
            .add(entry(EntryKind::Job, "j1", 10).with_sequence(5))
            .await;
        store
            .add(entry(EntryKind::Job, "j2", 20).with_sequence(9))
            .await;
        store.add(entry(EntryKind::Job, "j3", 30)).await;

        let jobs = store
            .get(EntryKind::Job, FetchOptions::new().before_sequence(9))
            .await
            .unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].id, "j1");
    }

    #[tokio::test]
    async fn test_find_by_id() {
        let store = MemoryEntryStore::new();
        store.add(entry(EntryKind::Cache, "c1", 10)).await;

        assert!(store.find("c1").await.unwrap().is_some());
        assert!(store.find("missing").await.unwrap().is_none());
    }

    #[test]
    fn test_period_parsing() {
        assert_eq!("5m".parse::<Period>().unwrap().seconds, 300);
        assert_eq!("1h".parse::<Period>().unwrap().seconds, 3_600);
        assert_eq!("24h".parse::<Period>().unwrap().seconds, 86_400);
        assert_eq!("7d".parse::<Period>().unwrap().seconds, 604_800);
        assert_eq!("90s".parse::<Period>().unwrap().seconds, 90);
        assert_eq!("2w".parse::<Period>().unwrap().seconds, 1_209_600);

        assert!("".parse::<Period>().is_err());
        assert!("abc".parse::<Period>().is_err());
        assert!("10x".parse::<Period>().is_err());
        assert!("0m".parse::<Period>().is_err());
    }

    #[test]
    fn test_period_rejects_oversized_spans() {
        // ten years exactly is the ceiling
        assert_eq!("3650d".parse::<Period>().unwrap().seconds, MAX_SPAN_SECS);
        assert!("3651d".parse::<Period>().is_err());

        // second arithmetic must not overflow on the way to the ceiling
        assert!("999999999999999999s".parse::<Period>().is_err());
        assert!("100000000000000000w".parse::<Period>().is_err());
        assert!("99999999999999999999s".parse::<Period>().is_err());
    }

    #[test]
    fn test_filter_by_period() {
        let entries = vec![
            entry(EntryKind::Request, "recent", 30),
            entry(EntryKind::Request, "stale", 7_200),
        ];
        let period = "1h".parse::<Period>().unwrap();

        let kept = filter_by_period(entries, &period);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, "recent");
    }

    #[test]
    fn test_filter_by_unrepresentable_span_keeps_everything() {
        let entries = vec![entry(EntryKind::Request, "r1", 30)];
        let period = Period::new("forever", u64::MAX);

        assert_eq!(filter_by_period(entries, &period).len(), 1);
    }
}
