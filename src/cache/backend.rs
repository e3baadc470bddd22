//! Cache Backend Contract
//!
//! Defines the uniform interface implemented by every storage tier and
//! consumed by the manager. Values cross the boundary as `serde_json::Value`
//! so the trait stays object-safe; the manager layers typed access on top.

use async_trait::async_trait;
use serde_json::Value;

use crate::cache::CacheStats;
use crate::error::Result;

// == Cache Backend Trait ==
/// Uniform storage-tier interface.
///
/// Implementations must be safe to call concurrently from many in-flight
/// request handlers; the manager never serializes access to them.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Short identifier used in logs, stats, and events (e.g. "memory", "file").
    fn name(&self) -> &str;

    /// Whether this tier survives process restarts. Used by adaptive backend
    /// selection to route large values to durable storage.
    fn durable(&self) -> bool {
        false
    }

    /// Retrieves a value. Returns `None` for absent or expired keys.
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Stores a value with a TTL in milliseconds (backend default when `None`).
    async fn set(&self, key: &str, value: Value, ttl_ms: Option<u64>) -> Result<()>;

    /// Removes an entry. Returns `true` if an entry existed, `false` otherwise;
    /// deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Checks for a live (non-expired) entry without reading its value.
    async fn has(&self, key: &str) -> Result<bool>;

    /// Removes every entry.
    async fn clear(&self) -> Result<()>;

    /// Lists keys, optionally filtered by a `*`-wildcard pattern.
    async fn keys(&self, pattern: Option<&str>) -> Result<Vec<String>>;

    /// Current number of live entries.
    async fn size(&self) -> Result<usize>;

    /// Current performance counters.
    async fn stats(&self) -> Result<CacheStats>;

    /// Checks that the backend can serve traffic. Never errors; a failed
    /// check returns `false`.
    async fn health_check(&self) -> bool;

    /// Purges TTL-expired entries, returning how many were removed.
    async fn cleanup_expired(&self) -> Result<usize>;

    /// Releases backend resources. Idempotent and tolerant of a backend that
    /// never finished initializing.
    async fn shutdown(&self) -> Result<()>;
}
