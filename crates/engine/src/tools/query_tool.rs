//! Statement analysis for the query kind
//!
//! Extends the record tool with the three statement-specific actions:
//! slow-query ranking, duplicate grouping, and N+1 detection. Everything
//! else delegates to the shared per-kind adapter, so the query kind keeps
//! summary/list/detail/stats/search behavior identical to the others.

use serde_json::{json, Value};
use std::sync::Arc;

use super::{arg_f64, arg_i64, parse_period, Action, RecordTool};
use crate::cache::{CacheOrchestrator, OperationKind};
use crate::config::EngineConfig;
use crate::store::EntryStore;
use tracelens_types::{EntryKind, Result};

pub struct QueryTool {
    inner: RecordTool,
}

impl QueryTool {
    pub fn new(
        store: Arc<dyn EntryStore>,
        cache: Arc<CacheOrchestrator>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            inner: RecordTool::new(EntryKind::Query, store, cache, config),
        }
    }

    pub async fn execute(&self, action: Action, args: &Value) -> Result<Value> {
        match action {
            Action::Slow => self.slow(args).await,
            Action::Duplicates => self.duplicates(args).await,
            Action::NPlusOne => self.n_plus_one(args).await,
            other => self.inner.execute(other, args).await,
        }
    }

    /// Queries above the timing threshold, slowest first, with index and
    /// scan suggestions derived from the same window
    async fn slow(&self, args: &Value) -> Result<Value> {
        let period = parse_period(args)?;
        let threshold = arg_f64(args, "threshold");
        let cache = self.inner.orchestrator();
        let key = cache.cache_key("query", "slow", args);
        let ttl = cache.ttl_for(OperationKind::Analysis);

        cache
            .remember(&key, ttl, || async move {
                let entries = self.inner.fetch_window(period.as_ref(), None).await?;
                let slow = self.inner.analyzer().identify_slow_queries(&entries, threshold);
                let suggestions = self.inner.analyzer().suggest_optimizations(&entries);
                Ok(json!({
                    "period": period.as_ref().map(|p| p.label.clone()),
                    "threshold_ms": threshold.unwrap_or(self.inner.config.analysis.slow_query_ms),
                    "total_scanned": entries.len(),
                    "slow_queries": slow,
                    "suggestions": suggestions,
                }))
            })
            .await
    }

    /// Literal-identical statements executed more than once
    async fn duplicates(&self, args: &Value) -> Result<Value> {
        let period = parse_period(args)?;
        let cache = self.inner.orchestrator();
        let key = cache.cache_key("query", "duplicates", args);
        let ttl = cache.ttl_for(OperationKind::Analysis);

        cache
            .remember(&key, ttl, || async move {
                let entries = self.inner.fetch_window(period.as_ref(), None).await?;
                let groups = self.inner.analyzer().find_duplicates(&entries);
                Ok(json!({
                    "period": period.as_ref().map(|p| p.label.clone()),
                    "total_scanned": entries.len(),
                    "duplicates": groups,
                }))
            })
            .await
    }

    /// Repeated same-shape lookups that should be a single batched query
    async fn n_plus_one(&self, args: &Value) -> Result<Value> {
        let period = parse_period(args)?;
        let threshold = arg_i64(args, "threshold").map(|t| t.max(1) as usize);
        let cache = self.inner.orchestrator();
        let key = cache.cache_key("query", "n_plus_one", args);
        let ttl = cache.ttl_for(OperationKind::Analysis);

        cache
            .remember(&key, ttl, || async move {
                let entries = self.inner.fetch_window(period.as_ref(), None).await?;
                let patterns = self.inner.analyzer().detect_n_plus_one(&entries, threshold);
                Ok(json!({
                    "period": period.as_ref().map(|p| p.label.clone()),
                    "threshold": threshold.unwrap_or(self.inner.config.analysis.n_plus_one_threshold),
                    "total_scanned": entries.len(),
                    "patterns": patterns,
                }))
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCacheTier;
    use crate::store::MemoryEntryStore;
    use tracelens_types::Entry;

    async fn seeded_tool(entries: Vec<Entry>) -> QueryTool {
        let store = Arc::new(MemoryEntryStore::new());
        store.add_all(entries).await;
        let config = EngineConfig::default();
        let cache = Arc::new(CacheOrchestrator::new(
            config.cache.clone(),
            Arc::new(MemoryCacheTier::new()),
        ));
        QueryTool::new(store, cache, &config)
    }

    fn query(sql: &str, time: f64) -> Entry {
        Entry::new(EntryKind::Query, json!({"sql": sql, "time": time}))
    }

    #[tokio::test]
    async fn test_slow_action_with_threshold_override() {
        let tool = seeded_tool(vec![
            query("SELECT * FROM users WHERE id = 1", 100.0),
            query("SELECT * FROM orders", 600.0),
            query("SELECT * FROM reports", 1200.0),
        ])
        .await;

        let result = tool.execute(Action::Slow, &json!({})).await.unwrap();
        assert_eq!(result["threshold_ms"], 100.0);
        assert_eq!(result["slow_queries"].as_array().unwrap().len(), 2);
        assert_eq!(result["total_scanned"], 3);

        let result = tool
            .execute(Action::Slow, &json!({"threshold": 1000.0}))
            .await
            .unwrap();
        assert_eq!(result["slow_queries"].as_array().unwrap().len(), 1);
        assert_eq!(
            result["slow_queries"][0]["sql"],
            "SELECT * FROM reports"
        );
    }

    #[tokio::test]
    async fn test_duplicates_action() {
        let tool = seeded_tool(vec![
            query("SELECT * FROM users WHERE id = 7", 100.0),
            query("SELECT  *  FROM users WHERE id = 7", 300.0),
            query("SELECT * FROM posts", 50.0),
        ])
        .await;

        let result = tool.execute(Action::Duplicates, &json!({})).await.unwrap();
        let groups = result["duplicates"].as_array().unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0]["count"], 2);
        assert_eq!(groups[0]["wasted_time_ms"], 200.0);
    }

    #[tokio::test]
    async fn test_n_plus_one_action() {
        let mut entries: Vec<Entry> = (0..4)
            .map(|i| query(&format!("SELECT * FROM posts WHERE user_id = {i}"), 5.0))
            .collect();
        entries.push(query("SELECT * FROM users", 10.0));
        let tool = seeded_tool(entries).await;

        let result = tool.execute(Action::NPlusOne, &json!({})).await.unwrap();
        let patterns = result["patterns"].as_array().unwrap();
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0]["count"], 4);
        assert_eq!(result["threshold"], 3);

        let result = tool
            .execute(Action::NPlusOne, &json!({"threshold": 5}))
            .await
            .unwrap();
        assert!(result["patterns"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delegates_shared_actions() {
        let tool = seeded_tool(vec![query("SELECT 1", 1.0)]).await;

        let result = tool.execute(Action::Summary, &json!({})).await.unwrap();
        assert_eq!(result["total"], 1);
        assert_eq!(result["type"], "query");
    }

    #[tokio::test]
    async fn test_analysis_results_cached() {
        let tool = seeded_tool(vec![query("SELECT * FROM t", 900.0)]).await;

        tool.execute(Action::Slow, &json!({})).await.unwrap();
        tool.execute(Action::Slow, &json!({})).await.unwrap();

        let stats = tool.inner.orchestrator().stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.writes, 1);
    }
}
