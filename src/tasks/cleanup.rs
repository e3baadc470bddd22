//! Background Maintenance Tasks
//!
//! Periodic expiry cleanup for any backend, and disk-usage reconciliation
//! for the file tier. Both run independently of foreground calls and may
//! interleave with them.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::{CacheBackend, FileCache};

/// Spawns a task that periodically purges TTL-expired entries from a backend.
///
/// The task loops forever, sleeping for `interval_secs` between runs; abort
/// the returned handle during shutdown.
pub fn spawn_cleanup_task(backend: Arc<dyn CacheBackend>, interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            backend = backend.name(),
            interval_secs, "Starting expiry cleanup task"
        );
        loop {
            tokio::time::sleep(interval).await;
            match backend.cleanup_expired().await {
                Ok(0) => debug!(backend = backend.name(), "Cleanup found no expired entries"),
                Ok(removed) => info!(backend = backend.name(), removed, "Cleanup removed expired entries"),
                Err(e) => warn!(backend = backend.name(), error = %e, "Cleanup run failed"),
            }
        }
    })
}

/// Spawns a task that periodically reconciles the file tier's tracked size
/// against actual bytes on disk. Runs at a slower cadence than cleanup.
pub fn spawn_disk_usage_task(cache: Arc<FileCache>, interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(interval_secs.max(1));

    tokio::spawn(async move {
        info!(interval_secs, "Starting disk-usage reconciliation task");
        loop {
            tokio::time::sleep(interval).await;
            match cache.reconcile_disk_usage().await {
                Ok(actual) => debug!(actual, "Disk usage reconciled"),
                Err(e) => warn!(error = %e, "Disk usage reconciliation failed"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::config::MemoryCacheConfig;
    use serde_json::json;
    use std::time::Duration;

    #[tokio::test]
    async fn test_cleanup_task_removes_expired_entries() {
        let cache: Arc<dyn CacheBackend> =
            Arc::new(MemoryCache::new(MemoryCacheConfig::default()));
        cache.set("doomed", json!("v"), Some(300)).await.unwrap();

        let handle = spawn_cleanup_task(cache.clone(), 1);
        tokio::time::sleep(Duration::from_millis(2500)).await;

        assert_eq!(cache.size().await.unwrap(), 0);
        handle.abort();
    }

    #[tokio::test]
    async fn test_cleanup_task_preserves_valid_entries() {
        let cache: Arc<dyn CacheBackend> =
            Arc::new(MemoryCache::new(MemoryCacheConfig::default()));
        cache.set("keeper", json!("v"), Some(600_000)).await.unwrap();

        let handle = spawn_cleanup_task(cache.clone(), 1);
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(cache.get("keeper").await.unwrap(), Some(json!("v")));
        handle.abort();
    }

    #[tokio::test]
    async fn test_cleanup_task_can_be_aborted() {
        let cache: Arc<dyn CacheBackend> =
            Arc::new(MemoryCache::new(MemoryCacheConfig::default()));

        let handle = spawn_cleanup_task(cache, 1);
        handle.abort();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished());
    }

    #[tokio::test]
    async fn test_disk_usage_task_runs() {
        let dir = tempfile::TempDir::new().unwrap();
        let cache = Arc::new(FileCache::new(crate::config::FileCacheConfig {
            base_dir: dir.path().to_path_buf(),
            ..crate::config::FileCacheConfig::default()
        }));
        cache.initialize().await.unwrap();
        cache.set("k", json!("v"), None).await.unwrap();

        let handle = spawn_disk_usage_task(cache.clone(), 1);
        tokio::time::sleep(Duration::from_millis(1500)).await;
        handle.abort();

        // Sizes were already consistent, so nothing changed.
        let stats = cache.stats().await.unwrap();
        assert!(stats.memory_usage > 0);
    }
}
