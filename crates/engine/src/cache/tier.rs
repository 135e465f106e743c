//! Cache tier trait definition
//!
//! The orchestrator talks to storage through this trait so the same
//! cache-aside logic runs against the in-process tier, a test double, or
//! an external store. All operations are async because real tiers sit
//! behind I/O.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use tracelens_types::Result;

/// Key-value cache storage with per-entry TTL
///
/// Implementations must be safe for concurrent access from multiple tasks.
/// A tier failure is reported as an error and never panics; the
/// orchestrator degrades to direct computation on any tier error.
#[async_trait]
pub trait CacheTier: Send + Sync {
    /// Fetch a value; `Ok(None)` when the key is absent or expired
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Store a value for `ttl`; an existing entry is overwritten
    async fn put(&self, key: &str, value: Value, ttl: Duration) -> Result<()>;

    /// Remove a single key; removing an absent key is not an error
    async fn forget(&self, key: &str) -> Result<()>;

    /// Keys starting with `prefix`
    ///
    /// `Ok(None)` signals the tier cannot enumerate keys; callers fall
    /// back to a full flush for namespace invalidation.
    async fn keys_matching(&self, prefix: &str) -> Result<Option<Vec<String>>>;

    /// Drop every entry
    async fn flush(&self) -> Result<()>;
}
