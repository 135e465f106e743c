//! Cache-aside orchestration
//!
//! Wraps a cache tier with "compute once, read many" semantics. Keys are
//! deterministic digests of the record kind, operation, and argument
//! snapshot; TTLs come in per-operation classes. A disabled or failing
//! tier degrades every call to direct computation so cache trouble never
//! fails an otherwise healthy request.

pub mod memory;
pub mod tier;

pub use memory::{CacheTierStats, MemoryCacheTier};
pub use tier::CacheTier;

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

use crate::config::CacheConfig;
use tracelens_types::Result;

/// TTL class of a cached operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Overview,
    Statistics,
    Analysis,
    List,
}

/// Orchestrator-level counters
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub writes: u64,
    pub bypasses: u64,
}

/// Cache-aside wrapper around a tier
pub struct CacheOrchestrator {
    config: CacheConfig,
    tier: Arc<dyn CacheTier>,
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
    bypasses: AtomicU64,
}

impl CacheOrchestrator {
    pub fn new(config: CacheConfig, tier: Arc<dyn CacheTier>) -> Self {
        Self {
            config,
            tier,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            bypasses: AtomicU64::new(0),
        }
    }

    pub fn enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn key_prefix(&self) -> &str {
        &self.config.key_prefix
    }

    /// Deterministic key: `<prefix>:<kind>:<operation>:<sha256 of args>`
    ///
    /// The digest covers the canonical JSON of the argument snapshot;
    /// serde_json object keys are already sorted, so equal argument sets
    /// produce equal keys regardless of insertion order.
    pub fn cache_key(&self, kind: &str, operation: &str, args: &Value) -> String {
        let mut hasher = Sha256::new();
        hasher.update(args.to_string().as_bytes());
        let digest = hex::encode(hasher.finalize());
        format!("{}:{}:{}:{}", self.config.key_prefix, kind, operation, digest)
    }

    /// TTL for an operation's cache class
    pub fn ttl_for(&self, operation: OperationKind) -> Duration {
        let seconds = match operation {
            OperationKind::Overview => self.config.ttl.overview,
            OperationKind::Statistics => self.config.ttl.statistics,
            OperationKind::Analysis => self.config.ttl.analysis,
            OperationKind::List => self.config.ttl.list,
        };
        Duration::from_secs(seconds)
    }

    /// Cache-aside read: return the cached value or compute and store it
    ///
    /// A compute error is returned without caching. Tier read and write
    /// errors are logged and absorbed; the call degrades to direct
    /// computation. There is no cross-request lock, so two concurrent
    /// misses on one key may both compute and both write; computations are
    /// pure and idempotent, making the race redundant work rather than a
    /// correctness problem.
    pub async fn remember<F, Fut>(&self, key: &str, ttl: Duration, compute: F) -> Result<Value>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value>>,
    {
        if !self.config.enabled {
            self.bypasses.fetch_add(1, Ordering::Relaxed);
            return compute().await;
        }

        match self.tier.get(key).await {
            Ok(Some(value)) => {
                trace!(key, "cache hit");
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(value);
            }
            Ok(None) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
            }
            Err(error) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                warn!(key, %error, "cache read failed; computing directly");
            }
        }

        let value = compute().await?;

        match self.tier.put(key, value.clone(), ttl).await {
            Ok(()) => {
                self.writes.fetch_add(1, Ordering::Relaxed);
            }
            Err(error) => {
                warn!(key, %error, "cache write failed; returning fresh value");
            }
        }

        Ok(value)
    }

    /// Remove every key under `prefix`, or flush everything when the tier
    /// cannot enumerate keys
    pub async fn invalidate_pattern(&self, prefix: &str) -> Result<usize> {
        match self.tier.keys_matching(prefix).await? {
            Some(keys) => {
                let count = keys.len();
                for key in &keys {
                    self.tier.forget(key).await?;
                }
                debug!(prefix, count, "invalidated cache namespace");
                Ok(count)
            }
            None => {
                debug!(prefix, "tier cannot enumerate keys; flushing all");
                self.tier.flush().await?;
                Ok(0)
            }
        }
    }

    pub async fn flush(&self) -> Result<()> {
        self.tier.flush().await
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            bypasses: self.bypasses.load(Ordering::Relaxed),
        }
    }
}
