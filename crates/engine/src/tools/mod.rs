//! Record-kind tool adapters
//!
//! One thin adapter per telemetry kind exposes `execute(action, args)` to
//! the outside. The adapter pulls entries from the store, runs the
//! requested analysis, and lets the cache orchestrator memoize every
//! cacheable action. Statement-specific actions live on `QueryTool`; any
//! other kind rejects them with a structured unsupported-action error.

pub mod query_tool;

pub use query_tool::QueryTool;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

use crate::aggregate::{AggregationEngine, DEFAULT_BUCKETS};
use crate::cache::{CacheOrchestrator, OperationKind};
use crate::config::EngineConfig;
use crate::fields;
use crate::pagination::{PageRequest, PaginationEngine};
use crate::patterns::PatternAnalyzer;
use crate::performance::PerformanceAnalyzer;
use crate::response::{ResponseMode, ResponseShaper};
use crate::store::{filter_by_period, EntryStore, FetchOptions, Period};
use tracelens_types::{AnalysisError, Entry, EntryKind, Result};

/// Actions exposed by every tool adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Summary,
    List,
    Detail,
    Stats,
    Search,
    Slow,
    Duplicates,
    NPlusOne,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Summary => "summary",
            Action::List => "list",
            Action::Detail => "detail",
            Action::Stats => "stats",
            Action::Search => "search",
            Action::Slow => "slow",
            Action::Duplicates => "duplicates",
            Action::NPlusOne => "n_plus_one",
        }
    }
}

impl FromStr for Action {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "summary" => Ok(Action::Summary),
            "list" => Ok(Action::List),
            "detail" => Ok(Action::Detail),
            "stats" => Ok(Action::Stats),
            "search" => Ok(Action::Search),
            "slow" => Ok(Action::Slow),
            // both spellings circulate in clients
            "duplicate" | "duplicates" => Ok(Action::Duplicates),
            "n_plus_one" => Ok(Action::NPlusOne),
            other => Err(AnalysisError::invalid_argument(
                "action",
                format!("unknown action '{other}'"),
            )),
        }
    }
}

/// Per-kind field conventions for metrics, search, and projection
#[derive(Debug, Clone, Copy)]
pub struct KindProfile {
    pub kind: EntryKind,
    /// Primary timing field, when the kind has one
    pub metric_field: Option<&'static str>,
    /// Content fields searched by substring
    pub search_fields: &'static [&'static str],
    /// Standard-mode projection allowlist
    pub standard_fields: &'static [&'static str],
}

impl KindProfile {
    pub fn for_kind(kind: EntryKind) -> Self {
        match kind {
            EntryKind::Request => Self {
                kind,
                metric_field: Some("duration"),
                search_fields: &["uri", "method", "controller_action"],
                standard_fields: &[
                    "uri",
                    "method",
                    "response_status",
                    "duration",
                    "controller_action",
                ],
            },
            EntryKind::Query => Self {
                kind,
                metric_field: Some("time"),
                search_fields: &["sql", "connection"],
                standard_fields: &["sql", "time", "connection", "slow"],
            },
            EntryKind::Exception => Self {
                kind,
                metric_field: None,
                search_fields: &["class", "message", "file"],
                standard_fields: &["class", "message", "file", "line"],
            },
            EntryKind::Job => Self {
                kind,
                metric_field: None,
                search_fields: &["name", "queue", "status"],
                standard_fields: &["name", "queue", "status", "connection"],
            },
            EntryKind::Cache => Self {
                kind,
                metric_field: None,
                search_fields: &["key"],
                standard_fields: &["key", "type"],
            },
            EntryKind::Event => Self {
                kind,
                metric_field: None,
                search_fields: &["name"],
                standard_fields: &["name", "listeners"],
            },
        }
    }
}

fn arg_str(args: &Value, key: &str) -> Option<String> {
    args.get(key).and_then(|v| v.as_str()).map(str::to_string)
}

fn arg_i64(args: &Value, key: &str) -> Option<i64> {
    args.get(key).and_then(|v| v.as_i64())
}

fn arg_f64(args: &Value, key: &str) -> Option<f64> {
    args.get(key).and_then(|v| v.as_f64())
}

fn parse_period(args: &Value) -> Result<Option<Period>> {
    match arg_str(args, "period") {
        Some(raw) => Ok(Some(raw.parse()?)),
        None => Ok(None),
    }
}

fn parse_mode(args: &Value) -> Result<Option<ResponseMode>> {
    match arg_str(args, "mode") {
        Some(raw) => Ok(Some(raw.parse()?)),
        None => Ok(None),
    }
}

/// Tool adapter for one record kind
pub struct RecordTool {
    profile: KindProfile,
    store: Arc<dyn EntryStore>,
    cache: Arc<CacheOrchestrator>,
    config: EngineConfig,
    aggregator: AggregationEngine,
    patterns: PatternAnalyzer,
    performance: PerformanceAnalyzer,
    paginator: PaginationEngine,
    shaper: ResponseShaper,
}

impl RecordTool {
    pub fn new(
        kind: EntryKind,
        store: Arc<dyn EntryStore>,
        cache: Arc<CacheOrchestrator>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            profile: KindProfile::for_kind(kind),
            store,
            cache,
            aggregator: AggregationEngine::new(config.aggregation.clone()),
            patterns: PatternAnalyzer::new(config.analysis.clone()),
            performance: PerformanceAnalyzer::new(config.analysis.clone()),
            paginator: PaginationEngine::new(config.pagination.clone()),
            shaper: ResponseShaper::new(
                config.response.clone(),
                config.pagination.summary_threshold,
            ),
            config: config.clone(),
        }
    }

    pub fn kind(&self) -> EntryKind {
        self.profile.kind
    }

    pub fn profile(&self) -> &KindProfile {
        &self.profile
    }

    /// Route one action; statement-specific actions are rejected here and
    /// handled by `QueryTool`
    pub async fn execute(&self, action: Action, args: &Value) -> Result<Value> {
        debug!(
            kind = self.profile.kind.as_str(),
            action = action.as_str(),
            "executing tool action"
        );

        match action {
            Action::Summary => self.summary(args).await,
            Action::List => self.list(args).await,
            Action::Detail => self.detail(args).await,
            Action::Stats => self.stats(args).await,
            Action::Search => self.search(args).await,
            Action::Slow | Action::Duplicates | Action::NPlusOne => Err(
                AnalysisError::unsupported_action(action.as_str(), self.profile.kind.as_str()),
            ),
        }
    }

    /// Entries of this kind within the period, newest first
    pub(crate) async fn fetch_window(
        &self,
        period: Option<&Period>,
        tag: Option<String>,
    ) -> Result<Vec<Entry>> {
        let mut options = FetchOptions::new().with_limit(self.config.analysis.scan_limit);
        if let Some(tag) = tag {
            options = options.with_tag(tag);
        }
        let entries = self.store.get(self.profile.kind, options).await?;
        Ok(match period {
            Some(period) => filter_by_period(entries, period),
            None => entries,
        })
    }

    pub(crate) fn orchestrator(&self) -> &CacheOrchestrator {
        &self.cache
    }

    pub(crate) fn analyzer(&self) -> &PatternAnalyzer {
        &self.patterns
    }

    async fn summary(&self, args: &Value) -> Result<Value> {
        let period = parse_period(args)?;
        let key = self
            .cache
            .cache_key(self.profile.kind.as_str(), "summary", args);
        let ttl = self.cache.ttl_for(OperationKind::Overview);

        self.cache
            .remember(&key, ttl, || async move {
                let entries = self.fetch_window(period.as_ref(), None).await?;
                let stats = match self.profile.metric_field {
                    Some(field) => self.aggregator.aggregate(&entries, field),
                    None => self.aggregator.aggregate_values(&[]),
                };
                Ok(json!({
                    "total": entries.len(),
                    "type": self.profile.kind,
                    "period": period.as_ref().map(|p| p.label.clone()),
                    "stats": stats,
                }))
            })
            .await
    }

    async fn list(&self, args: &Value) -> Result<Value> {
        let period = parse_period(args)?;
        let mode = parse_mode(args)?;
        let tag = arg_str(args, "tag");
        let params = self.paginator.validate(&PageRequest {
            limit: arg_i64(args, "limit"),
            offset: arg_i64(args, "offset"),
            page: arg_i64(args, "page"),
        });

        let key = self.cache.cache_key(self.profile.kind.as_str(), "list", args);
        let ttl = self.cache.ttl_for(OperationKind::List);

        self.cache
            .remember(&key, ttl, || async move {
                let entries = self.fetch_window(period.as_ref(), tag).await?;
                let items = to_items(&entries)?;
                let window = self.paginator.paginate_slice(&items, params.limit, params.offset);
                let mode = self.shaper.determine_mode(mode, window.data.len());
                Ok(self.shaper.shape(
                    serde_json::to_value(window)?,
                    mode,
                    self.profile.standard_fields,
                ))
            })
            .await
    }

    async fn detail(&self, args: &Value) -> Result<Value> {
        let id = arg_str(args, "id")
            .ok_or_else(|| AnalysisError::invalid_argument("id", "detail requires an id"))?;

        let entry = self
            .store
            .find(&id)
            .await?
            .ok_or_else(|| AnalysisError::not_found(self.profile.kind.as_str(), &id))?;

        Ok(self.shaper.shape(
            serde_json::to_value(&entry)?,
            ResponseMode::Detailed,
            self.profile.standard_fields,
        ))
    }

    async fn stats(&self, args: &Value) -> Result<Value> {
        let period = parse_period(args)?;
        let key = self
            .cache
            .cache_key(self.profile.kind.as_str(), "stats", args);
        let ttl = self.cache.ttl_for(OperationKind::Statistics);

        self.cache
            .remember(&key, ttl, || async move {
                self.compute_stats(period).await
            })
            .await
    }

    async fn compute_stats(&self, period: Option<Period>) -> Result<Value> {
        let raw = self
            .store
            .get(
                self.profile.kind,
                FetchOptions::new().with_limit(self.config.analysis.scan_limit),
            )
            .await?;
        let entries = match &period {
            Some(p) => filter_by_period(raw.clone(), p),
            None => raw.clone(),
        };

        let mut out = Map::new();
        out.insert("type".to_string(), json!(self.profile.kind));
        out.insert(
            "period".to_string(),
            json!(period.as_ref().map(|p| p.label.clone())),
        );
        out.insert("total".to_string(), json!(entries.len()));
        out.insert(
            "rate_per_minute".to_string(),
            json!(rate_per_minute(&entries, period.as_ref())),
        );

        if let Some(field) = self.profile.metric_field {
            out.insert(
                "stats".to_string(),
                serde_json::to_value(self.aggregator.aggregate(&entries, field))?,
            );
            out.insert(
                "windows".to_string(),
                serde_json::to_value(self.aggregator.aggregate_by_time_window(&entries, field))?,
            );
            out.insert(
                "histogram".to_string(),
                serde_json::to_value(self.aggregator.create_histogram(
                    &entries,
                    field,
                    DEFAULT_BUCKETS,
                ))?,
            );
        }

        if self.profile.kind == EntryKind::Request {
            out.insert(
                "performance".to_string(),
                self.request_performance(&raw, &entries, period.as_ref())
                    .await?,
            );
        }

        Ok(Value::Object(out))
    }

    /// Performance block for the request kind: score, endpoint breakdown,
    /// slow requests, bottlenecks against the query collection, and a trend
    /// against the preceding window of equal length
    async fn request_performance(
        &self,
        raw: &[Entry],
        entries: &[Entry],
        period: Option<&Period>,
    ) -> Result<Value> {
        let queries = self
            .store
            .get(
                EntryKind::Query,
                FetchOptions::new().with_limit(self.config.analysis.scan_limit),
            )
            .await?;
        let queries = match period {
            Some(p) => filter_by_period(queries, p),
            None => queries,
        };

        // no trend when the preceding window of equal length cannot be
        // represented
        let trend = period.and_then(|p| {
            let span = i64::try_from(p.seconds)
                .ok()
                .and_then(chrono::Duration::try_seconds)?;
            let window_start = Utc::now().checked_sub_signed(span)?;
            let baseline_start = window_start.checked_sub_signed(span)?;
            let historical: Vec<Entry> = raw
                .iter()
                .filter(|e| e.created_at >= baseline_start && e.created_at < window_start)
                .cloned()
                .collect();
            Some(self.performance.calculate_trends(entries, &historical))
        });

        Ok(json!({
            "score": self.performance.performance_score(entries),
            "endpoints": self.performance.endpoint_breakdown(entries),
            "slow_requests": self.performance.slow_requests(entries, None),
            "bottlenecks": self.performance.identify_bottlenecks(entries, Some(&queries)),
            "trend": trend,
        }))
    }

    async fn search(&self, args: &Value) -> Result<Value> {
        let query = arg_str(args, "query")
            .ok_or_else(|| AnalysisError::invalid_argument("query", "search requires a query"))?;
        let period = parse_period(args)?;
        let mode = parse_mode(args)?;
        let tag = arg_str(args, "tag");
        let params = self.paginator.validate(&PageRequest {
            limit: arg_i64(args, "limit"),
            offset: arg_i64(args, "offset"),
            page: arg_i64(args, "page"),
        });

        let key = self
            .cache
            .cache_key(self.profile.kind.as_str(), "search", args);
        let ttl = self.cache.ttl_for(OperationKind::List);

        self.cache
            .remember(&key, ttl, || async move {
                let entries = self.fetch_window(period.as_ref(), tag).await?;
                let needle = query.to_lowercase();
                let matched: Vec<Entry> = entries
                    .into_iter()
                    .filter(|entry| {
                        self.profile.search_fields.iter().any(|field| {
                            fields::text_field(entry, field)
                                .to_lowercase()
                                .contains(&needle)
                        })
                    })
                    .collect();

                let items = to_items(&matched)?;
                let window = self.paginator.paginate_slice(&items, params.limit, params.offset);
                let mode = self.shaper.determine_mode(mode, window.data.len());
                Ok(self.shaper.shape(
                    serde_json::to_value(window)?,
                    mode,
                    self.profile.standard_fields,
                ))
            })
            .await
    }
}

fn to_items(entries: &[Entry]) -> Result<Vec<Value>> {
    entries
        .iter()
        .map(|entry| serde_json::to_value(entry).map_err(AnalysisError::from))
        .collect()
}

fn rate_per_minute(entries: &[Entry], period: Option<&Period>) -> f64 {
    let span_seconds = match period {
        Some(p) => p.seconds as f64,
        None => match (entries.first(), entries.last()) {
            (Some(newest), Some(oldest)) => {
                (newest.created_at - oldest.created_at).num_seconds().max(60) as f64
            }
            _ => 60.0,
        },
    };
    entries.len() as f64 / (span_seconds / 60.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCacheTier;
    use crate::store::MemoryEntryStore;

    async fn seeded_tool(kind: EntryKind, entries: Vec<Entry>) -> RecordTool {
        let store = Arc::new(MemoryEntryStore::new());
        store.add_all(entries).await;
        let config = EngineConfig::default();
        let cache = Arc::new(CacheOrchestrator::new(
            config.cache.clone(),
            Arc::new(MemoryCacheTier::new()),
        ));
        RecordTool::new(kind, store, cache, &config)
    }

    fn request(uri: &str, duration: f64) -> Entry {
        Entry::new(
            EntryKind::Request,
            json!({"uri": uri, "method": "GET", "duration": duration, "response_status": 200}),
        )
    }

    #[test]
    fn test_action_parsing() {
        assert_eq!("summary".parse::<Action>().unwrap(), Action::Summary);
        assert_eq!("n_plus_one".parse::<Action>().unwrap(), Action::NPlusOne);
        assert_eq!("duplicate".parse::<Action>().unwrap(), Action::Duplicates);
        assert_eq!(" SLOW ".parse::<Action>().unwrap(), Action::Slow);
        assert!("bogus".parse::<Action>().is_err());
    }

    #[test]
    fn test_profiles_cover_all_kinds() {
        for kind in EntryKind::all() {
            let profile = KindProfile::for_kind(*kind);
            assert!(!profile.search_fields.is_empty());
            assert!(!profile.standard_fields.is_empty());
        }
        assert_eq!(
            KindProfile::for_kind(EntryKind::Request).metric_field,
            Some("duration")
        );
        assert_eq!(
            KindProfile::for_kind(EntryKind::Query).metric_field,
            Some("time")
        );
        assert_eq!(KindProfile::for_kind(EntryKind::Job).metric_field, None);
    }

    #[tokio::test]
    async fn test_summary_action() {
        let tool = seeded_tool(
            EntryKind::Request,
            vec![
                request("/a", 100.0),
                request("/b", 200.0),
                request("/c", 300.0),
            ],
        )
        .await;

        let result = tool.execute(Action::Summary, &json!({})).await.unwrap();
        assert_eq!(result["total"], 3);
        assert_eq!(result["type"], "request");
        assert_eq!(result["stats"]["count"], 3);
        assert_eq!(result["stats"]["avg"], 200.0);
    }

    #[tokio::test]
    async fn test_list_pagination_and_shaping() {
        let entries: Vec<Entry> = (0..5).map(|i| request(&format!("/p{i}"), 50.0)).collect();
        let tool = seeded_tool(EntryKind::Request, entries).await;

        let result = tool
            .execute(Action::List, &json!({"limit": 2}))
            .await
            .unwrap();
        assert_eq!(result["total"], 5);
        assert_eq!(result["data"].as_array().unwrap().len(), 2);
        assert_eq!(result["has_more"], true);
        assert_eq!(result["meta"]["mode"], "standard");
    }

    #[tokio::test]
    async fn test_detail_not_found() {
        let tool = seeded_tool(EntryKind::Request, vec![]).await;
        let err = tool
            .execute(Action::Detail, &json!({"id": "missing"}))
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_detail_found() {
        let entry = request("/only", 10.0).with_id("r-1");
        let tool = seeded_tool(EntryKind::Request, vec![entry]).await;

        let result = tool
            .execute(Action::Detail, &json!({"id": "r-1"}))
            .await
            .unwrap();
        assert_eq!(result["id"], "r-1");
        assert_eq!(result["meta"]["mode"], "detailed");
    }

    #[tokio::test]
    async fn test_search_uses_kind_allowlist() {
        let tool = seeded_tool(
            EntryKind::Request,
            vec![request("/api/users", 10.0), request("/health", 10.0)],
        )
        .await;

        let result = tool
            .execute(Action::Search, &json!({"query": "users"}))
            .await
            .unwrap();
        assert_eq!(result["total"], 1);

        let missing_query = tool.execute(Action::Search, &json!({})).await;
        assert!(missing_query.is_err());
    }

    #[tokio::test]
    async fn test_statement_actions_rejected_for_other_kinds() {
        let tool = seeded_tool(EntryKind::Request, vec![]).await;
        let err = tool
            .execute(Action::Duplicates, &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::UnsupportedAction { .. }));
    }

    #[tokio::test]
    async fn test_invalid_period_rejected() {
        let tool = seeded_tool(EntryKind::Request, vec![]).await;
        let err = tool
            .execute(Action::Summary, &json!({"period": "soon"}))
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidArgument { .. }));
    }

    #[tokio::test]
    async fn test_stats_includes_performance_for_requests() {
        let tool = seeded_tool(
            EntryKind::Request,
            vec![request("/a", 100.0), request("/b", 150.0)],
        )
        .await;

        let result = tool.execute(Action::Stats, &json!({})).await.unwrap();
        assert!(result["performance"]["score"]["score"].is_number());
        assert!(result["performance"]["endpoints"].is_array());
        assert_eq!(result["stats"]["count"], 2);
        assert!(result["histogram"]["buckets"].is_array());
    }
}
