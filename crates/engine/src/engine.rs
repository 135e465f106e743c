//! Engine facade
//!
//! Owns one tool adapter per entry kind plus the shared cache orchestrator,
//! and routes `(kind, action, args)` triples to the right adapter. The query
//! kind goes through `QueryTool` so the statement-analysis actions resolve;
//! every other kind uses the plain record tool, which rejects them.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::cache::{CacheOrchestrator, CacheStats, CacheTier};
use crate::config::EngineConfig;
use crate::store::EntryStore;
use crate::tools::{Action, QueryTool, RecordTool};
use tracelens_types::{EntryKind, Result};

pub struct AnalysisEngine {
    cache: Arc<CacheOrchestrator>,
    query_tool: QueryTool,
    tools: HashMap<EntryKind, RecordTool>,
}

impl std::fmt::Debug for AnalysisEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisEngine")
            .field("kinds", &self.tools.len())
            .finish_non_exhaustive()
    }
}

impl AnalysisEngine {
    /// Wire an engine over the given store and cache tier. Configuration is
    /// validated up front so a bad limit or TTL fails here, not mid-request.
    pub fn new(
        store: Arc<dyn EntryStore>,
        tier: Arc<dyn CacheTier>,
        config: EngineConfig,
    ) -> Result<Self> {
        config.validate()?;

        let cache = Arc::new(CacheOrchestrator::new(config.cache.clone(), tier));
        let query_tool = QueryTool::new(Arc::clone(&store), Arc::clone(&cache), &config);

        let mut tools = HashMap::new();
        for kind in EntryKind::all() {
            if *kind == EntryKind::Query {
                continue;
            }
            tools.insert(
                *kind,
                RecordTool::new(*kind, Arc::clone(&store), Arc::clone(&cache), &config),
            );
        }

        info!(
            kinds = EntryKind::all().len(),
            cache_enabled = config.cache.enabled,
            "analysis engine ready"
        );

        Ok(Self {
            cache,
            query_tool,
            tools,
        })
    }

    /// Route one action to the adapter for its kind
    pub async fn execute(&self, kind: EntryKind, action: Action, args: &Value) -> Result<Value> {
        if kind == EntryKind::Query {
            return self.query_tool.execute(action, args).await;
        }

        // every non-query kind is registered in new(), so the lookup cannot
        // miss; the map API still forces the branch
        match self.tools.get(&kind) {
            Some(tool) => tool.execute(action, args).await,
            None => self.query_tool.execute(action, args).await,
        }
    }

    /// Convenience entry point for callers holding raw strings
    pub async fn execute_str(&self, kind: &str, action: &str, args: &Value) -> Result<Value> {
        let kind: EntryKind = kind.parse()?;
        let action: Action = action.parse()?;
        self.execute(kind, action, args).await
    }

    /// Drop cached results for one kind, or everything when `kind` is `None`
    pub async fn invalidate(&self, kind: Option<EntryKind>) -> Result<usize> {
        match kind {
            Some(kind) => {
                let prefix = format!("{}:{}:", self.cache.key_prefix(), kind.as_str());
                let dropped = self.cache.invalidate_pattern(&prefix).await?;
                debug!(kind = kind.as_str(), dropped, "invalidated cached results");
                Ok(dropped)
            }
            None => {
                self.cache.flush().await?;
                debug!("flushed all cached results");
                Ok(0)
            }
        }
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}
