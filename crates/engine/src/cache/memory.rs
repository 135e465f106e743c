//! In-process cache tier
//!
//! DashMap-backed tier with per-entry expiry. Expired entries are removed
//! lazily on read and counted as misses; `purge_expired` sweeps the whole
//! map for callers that want proactive cleanup. Statistics track access
//! patterns for the orchestrator's introspection surface.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, trace};

use super::tier::CacheTier;
use tracelens_types::Result;

/// One stored value with its expiry instant
#[derive(Debug, Clone)]
struct CacheSlot {
    value: Value,
    expires_at: DateTime<Utc>,
}

impl CacheSlot {
    fn new(value: Value, ttl: Duration) -> Self {
        // a ttl wider than representable time never expires
        let span = i64::try_from(ttl.as_millis())
            .map(chrono::Duration::milliseconds)
            .unwrap_or(chrono::Duration::MAX);
        Self {
            value,
            expires_at: Utc::now()
                .checked_add_signed(span)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

/// Access counters for the in-process tier
#[derive(Debug, Clone, Default)]
pub struct CacheTierStats {
    pub hits: u64,
    pub misses: u64,
    pub puts: u64,
    pub evictions: u64,
}

/// Concurrent in-process cache tier with lazy expiry
pub struct MemoryCacheTier {
    slots: Arc<DashMap<String, CacheSlot>>,
    stats: Arc<RwLock<CacheTierStats>>,
}

impl MemoryCacheTier {
    pub fn new() -> Self {
        Self {
            slots: Arc::new(DashMap::new()),
            stats: Arc::new(RwLock::new(CacheTierStats::default())),
        }
    }

    /// Snapshot of the current counters
    pub async fn stats(&self) -> CacheTierStats {
        self.stats.read().await.clone()
    }

    /// Remove every expired entry; returns how many were dropped
    pub async fn purge_expired(&self) -> usize {
        let expired: Vec<String> = self
            .slots
            .iter()
            .filter(|entry| entry.value().is_expired())
            .map(|entry| entry.key().clone())
            .collect();

        let removed = expired.len();
        for key in expired {
            self.slots.remove(&key);
        }

        if removed > 0 {
            debug!(removed, "purged expired cache entries");
            self.stats.write().await.evictions += removed as u64;
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl Default for MemoryCacheTier {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MemoryCacheTier {
    fn clone(&self) -> Self {
        Self {
            slots: Arc::clone(&self.slots),
            stats: Arc::clone(&self.stats),
        }
    }
}

#[async_trait]
impl CacheTier for MemoryCacheTier {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let mut stats = self.stats.write().await;

        if let Some(slot) = self.slots.get(key) {
            if slot.is_expired() {
                trace!(key, "cache entry expired on read");
                drop(slot);
                self.slots.remove(key);
                stats.misses += 1;
                stats.evictions += 1;
                return Ok(None);
            }
            stats.hits += 1;
            return Ok(Some(slot.value.clone()));
        }

        stats.misses += 1;
        Ok(None)
    }

    async fn put(&self, key: &str, value: Value, ttl: Duration) -> Result<()> {
        trace!(key, ttl_ms = ttl.as_millis() as u64, "storing cache entry");
        self.slots.insert(key.to_string(), CacheSlot::new(value, ttl));
        self.stats.write().await.puts += 1;
        Ok(())
    }

    async fn forget(&self, key: &str) -> Result<()> {
        if self.slots.remove(key).is_some() {
            self.stats.write().await.evictions += 1;
        }
        Ok(())
    }

    async fn keys_matching(&self, prefix: &str) -> Result<Option<Vec<String>>> {
        let keys: Vec<String> = self
            .slots
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| entry.key().clone())
            .collect();
        Ok(Some(keys))
    }

    async fn flush(&self) -> Result<()> {
        debug!(entries = self.slots.len(), "flushing cache tier");
        self.slots.clear();
        Ok(())
    }
}
