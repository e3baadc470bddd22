//! Memory Cache Module
//!
//! The low-latency tier: a HashMap store with LRU eviction and TTL
//! expiration, behind the [`CacheBackend`] contract.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::debug;

use crate::cache::entry::MemoryEntry;
use crate::cache::events::{CacheEvent, EventRegistry};
use crate::cache::keys::{matches_pattern, value_is_korean};
use crate::cache::{CacheBackend, CacheStats};
use crate::config::MemoryCacheConfig;
use crate::error::Result;

/// Sentinel key used by the health-check round trip.
const HEALTH_CHECK_KEY: &str = "__memory_health_check__";

/// TTL applied when a caller does not provide one (milliseconds).
const FALLBACK_TTL_MS: u64 = 1_800_000;

struct MemoryInner {
    entries: HashMap<String, MemoryEntry>,
    lru: crate::cache::LruTracker,
    stats: CacheStats,
    /// Summed serialized sizes of live entries
    bytes: u64,
}

// == Memory Cache ==
/// In-memory cache backend with a bounded entry count.
///
/// When the cache is at capacity, inserting a new key evicts the least
/// recently used entry. Expired entries are dropped lazily on access and by
/// [`CacheBackend::cleanup_expired`].
pub struct MemoryCache {
    inner: RwLock<MemoryInner>,
    max_entries: usize,
    events: EventRegistry,
}

impl MemoryCache {
    /// Creates a new MemoryCache from configuration.
    pub fn new(config: MemoryCacheConfig) -> Self {
        Self::with_events(config, EventRegistry::new())
    }

    /// Creates a new MemoryCache that reports events to `events`.
    pub fn with_events(config: MemoryCacheConfig, events: EventRegistry) -> Self {
        Self {
            inner: RwLock::new(MemoryInner {
                entries: HashMap::new(),
                lru: crate::cache::LruTracker::new(),
                stats: CacheStats::new(),
                bytes: 0,
            }),
            max_entries: config.max_entries,
            events,
        }
    }

    fn remove_entry(inner: &mut MemoryInner, key: &str) -> Option<MemoryEntry> {
        let removed = inner.entries.remove(key);
        if let Some(entry) = &removed {
            inner.lru.remove(key);
            inner.bytes = inner.bytes.saturating_sub(entry.size);
        }
        removed
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;

        let expired = matches!(inner.entries.get(key), Some(entry) if entry.is_expired());
        if expired {
            Self::remove_entry(inner, key);
            inner.stats.record_miss();
            self.events.emit(CacheEvent::Miss {
                backend: "memory".to_string(),
                key: key.to_string(),
            });
            return Ok(None);
        }

        match inner.entries.get_mut(key) {
            Some(entry) => {
                entry.touch();
                let value = entry.value.clone();
                inner.stats.record_hit();
                inner.lru.touch(key);
                self.events.emit(CacheEvent::Hit {
                    backend: "memory".to_string(),
                    key: key.to_string(),
                });
                Ok(Some(value))
            }
            None => {
                inner.stats.record_miss();
                self.events.emit(CacheEvent::Miss {
                    backend: "memory".to_string(),
                    key: key.to_string(),
                });
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, value: Value, ttl_ms: Option<u64>) -> Result<()> {
        let size = serde_json::to_vec(&value)?.len() as u64;
        let is_korean = value_is_korean(&value);
        let ttl = ttl_ms.unwrap_or(FALLBACK_TTL_MS);

        let mut guard = self.inner.write().await;
        let inner = &mut *guard;

        // Overwrites reuse the slot; fresh inserts at capacity evict the LRU key.
        let old_size = inner.entries.get(key).map(|entry| entry.size);
        if let Some(old_size) = old_size {
            inner.bytes = inner.bytes.saturating_sub(old_size);
        } else if inner.entries.len() >= self.max_entries {
            if let Some(victim) = inner.lru.evict_oldest() {
                let freed = inner
                    .entries
                    .remove(&victim)
                    .map(|e| e.size)
                    .unwrap_or(0);
                inner.bytes = inner.bytes.saturating_sub(freed);
                inner.stats.record_eviction();
                debug!(key = %victim, freed, "memory cache evicted LRU entry");
                self.events.emit(CacheEvent::Eviction {
                    backend: "memory".to_string(),
                    key: victim,
                    freed,
                });
            }
        }

        inner
            .entries
            .insert(key.to_string(), MemoryEntry::new(value, ttl, is_korean, size));
        inner.bytes += size;
        inner.lru.touch(key);
        self.events.emit(CacheEvent::Set {
            backend: "memory".to_string(),
            key: key.to_string(),
            size,
        });
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut inner = self.inner.write().await;
        let existed = Self::remove_entry(&mut inner, key).is_some();
        if existed {
            self.events.emit(CacheEvent::Delete {
                backend: "memory".to_string(),
                key: key.to_string(),
            });
        }
        Ok(existed)
    }

    async fn has(&self, key: &str) -> Result<bool> {
        let mut inner = self.inner.write().await;
        let expired = matches!(inner.entries.get(key), Some(entry) if entry.is_expired());
        if expired {
            Self::remove_entry(&mut inner, key);
            return Ok(false);
        }
        Ok(inner.entries.contains_key(key))
    }

    async fn clear(&self) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.entries.clear();
        inner.lru.clear();
        inner.bytes = 0;
        Ok(())
    }

    async fn keys(&self, pattern: Option<&str>) -> Result<Vec<String>> {
        let inner = self.inner.read().await;
        let keys = inner
            .entries
            .iter()
            .filter(|(_, entry)| !entry.is_expired())
            .map(|(key, _)| key.clone())
            .filter(|key| pattern.map_or(true, |p| matches_pattern(key, p)))
            .collect();
        Ok(keys)
    }

    async fn size(&self) -> Result<usize> {
        let inner = self.inner.read().await;
        Ok(inner
            .entries
            .values()
            .filter(|entry| !entry.is_expired())
            .count())
    }

    async fn stats(&self) -> Result<CacheStats> {
        let inner = self.inner.read().await;
        let mut stats = inner.stats.clone();
        // Count like size(): entries past their TTL are gone to callers even
        // before cleanup purges them.
        let live = || inner.entries.values().filter(|e| !e.is_expired());
        stats.total_keys = live().count();
        stats.memory_usage = inner.bytes;
        stats.oldest_entry = live().map(|e| e.created_at).min();
        stats.newest_entry = live().map(|e| e.created_at).max();
        Ok(stats)
    }

    async fn health_check(&self) -> bool {
        let roundtrip = async {
            self.set(HEALTH_CHECK_KEY, json!("ok"), Some(5_000)).await?;
            let read = self.get(HEALTH_CHECK_KEY).await?;
            self.delete(HEALTH_CHECK_KEY).await?;
            Ok::<bool, crate::error::CacheError>(read == Some(json!("ok")))
        };
        roundtrip.await.unwrap_or(false)
    }

    async fn cleanup_expired(&self) -> Result<usize> {
        let mut inner = self.inner.write().await;
        let expired: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            Self::remove_entry(&mut inner, key);
        }
        if !expired.is_empty() {
            self.events.emit(CacheEvent::Cleanup {
                backend: "memory".to_string(),
                removed: expired.len(),
            });
        }
        Ok(expired.len())
    }

    async fn shutdown(&self) -> Result<()> {
        // Nothing to release; entries die with the process.
        Ok(())
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use tokio::time::sleep;

    fn cache_of(max_entries: usize) -> MemoryCache {
        MemoryCache::new(MemoryCacheConfig { max_entries })
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let cache = cache_of(100);

        cache.set("key1", json!({"title": "doc"}), None).await.unwrap();
        let value = cache.get("key1").await.unwrap();

        assert_eq!(value, Some(json!({"title": "doc"})));
        assert_eq!(cache.size().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_get_nonexistent() {
        let cache = cache_of(100);
        assert_eq!(cache.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_overwrite() {
        let cache = cache_of(100);

        cache.set("key1", json!("v1"), None).await.unwrap();
        cache.set("key1", json!("v2"), None).await.unwrap();

        assert_eq!(cache.get("key1").await.unwrap(), Some(json!("v2")));
        assert_eq!(cache.size().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_idempotent() {
        let cache = cache_of(100);

        cache.set("key1", json!("v"), None).await.unwrap();
        assert!(cache.delete("key1").await.unwrap());
        assert!(!cache.delete("key1").await.unwrap());
        assert!(!cache.delete("never-existed").await.unwrap());
    }

    #[tokio::test]
    async fn test_ttl_expiration() {
        let cache = cache_of(100);

        cache.set("short", json!("v"), Some(50)).await.unwrap();
        assert!(cache.has("short").await.unwrap());

        sleep(Duration::from_millis(80)).await;

        assert_eq!(cache.get("short").await.unwrap(), None);
        assert!(!cache.has("short").await.unwrap());
        assert_eq!(cache.size().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_stats_agree_with_size_on_expiry() {
        let cache = cache_of(100);

        cache.set("live", json!(1), Some(60_000)).await.unwrap();
        cache.set("short", json!(2), Some(50)).await.unwrap();
        sleep(Duration::from_millis(80)).await;

        // No get or cleanup has purged "short" yet.
        let stats = cache.stats().await.unwrap();
        assert_eq!(stats.total_keys, 1);
        assert_eq!(stats.total_keys, cache.size().await.unwrap());
    }

    #[tokio::test]
    async fn test_lru_eviction_at_capacity() {
        let cache = cache_of(3);

        cache.set("k1", json!(1), None).await.unwrap();
        cache.set("k2", json!(2), None).await.unwrap();
        cache.set("k3", json!(3), None).await.unwrap();

        // Touch k1 so k2 becomes the LRU victim.
        cache.get("k1").await.unwrap();
        cache.set("k4", json!(4), None).await.unwrap();

        assert_eq!(cache.size().await.unwrap(), 3);
        assert!(cache.get("k1").await.unwrap().is_some());
        assert!(cache.get("k2").await.unwrap().is_none());
        assert!(cache.get("k4").await.unwrap().is_some());

        let stats = cache.stats().await.unwrap();
        assert_eq!(stats.evictions, 1);
    }

    #[tokio::test]
    async fn test_keys_with_pattern() {
        let cache = cache_of(100);

        cache.set("document:a", json!(1), None).await.unwrap();
        cache.set("document:b", json!(2), None).await.unwrap();
        cache.set("image:c", json!(3), None).await.unwrap();

        let mut docs = cache.keys(Some("document:*")).await.unwrap();
        docs.sort();
        assert_eq!(docs, vec!["document:a", "document:b"]);
        assert_eq!(cache.keys(None).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_stats_counters() {
        let cache = cache_of(100);

        cache.set("k", json!("v"), None).await.unwrap();
        cache.get("k").await.unwrap();
        cache.get("absent").await.unwrap();

        let stats = cache.stats().await.unwrap();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.total_keys, 1);
        assert!(stats.memory_usage > 0);
        assert!(stats.oldest_entry.is_some());
    }

    #[tokio::test]
    async fn test_cleanup_expired() {
        let cache = cache_of(100);

        cache.set("short", json!(1), Some(30)).await.unwrap();
        cache.set("long", json!(2), Some(60_000)).await.unwrap();

        sleep(Duration::from_millis(60)).await;

        let removed = cache.cleanup_expired().await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(cache.size().await.unwrap(), 1);
        assert!(cache.get("long").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_clear() {
        let cache = cache_of(100);
        cache.set("a", json!(1), None).await.unwrap();
        cache.set("b", json!(2), None).await.unwrap();

        cache.clear().await.unwrap();
        assert_eq!(cache.size().await.unwrap(), 0);
        assert_eq!(cache.stats().await.unwrap().memory_usage, 0);
    }

    #[tokio::test]
    async fn test_health_check() {
        let cache = cache_of(100);
        assert!(cache.health_check().await);
        // The sentinel key must not linger.
        assert_eq!(cache.get("__memory_health_check__").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_korean_value_flagged() {
        let cache = cache_of(100);
        cache.set("doc", json!({"title": "테스트"}), None).await.unwrap();

        let inner = cache.inner.read().await;
        assert!(inner.entries.get("doc").unwrap().is_korean);
    }
}
