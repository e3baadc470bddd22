//! Cache Manager Module
//!
//! Presents one cache API over N heterogeneous backends: fallback-ordered
//! reads, parallel write-through, Korean-aware TTL policy, adaptive backend
//! selection, aggregated statistics, warming, cleanup, and shutdown.
//!
//! Backend failure is hidden from callers: a backend that errors is logged
//! and treated as a miss for that backend only. The only failures callers
//! see are an oversized payload and a write rejected by every backend.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures::future::join_all;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::events::EventRegistry;
use crate::cache::keys::{normalize_key, value_is_korean};
use crate::cache::{CacheBackend, CacheEventListener, CacheStats, PerformanceMetrics, KOREAN_TTL_BOOST};
use crate::config::ManagerConfig;
use crate::error::{CacheError, Result};

/// Lookups a backend must have served before its hit rate can fail the
/// health floor; cold caches are not reported unhealthy.
const MIN_HEALTH_SAMPLES: u64 = 20;

// == Backend Selection ==
/// The stats a backend contributes to adaptive selection.
#[derive(Debug, Clone)]
pub struct BackendSnapshot {
    /// Position in the manager's priority order
    pub index: usize,
    /// Whether the backend survives restarts
    pub durable: bool,
    /// Observed hit rate
    pub hit_rate: f64,
    /// Observed lookups backing that hit rate
    pub lookups: u64,
}

/// Chooses which backends receive a write, in order. Pure function, no I/O.
///
/// Small values go to every tier in priority order. Values at or above
/// `large_value_threshold` go to durable tiers only, so one oversized
/// document cannot churn a volatile tier's LRU; when no durable tier
/// exists the write falls back to every tier. Backends whose observed hit
/// rate (with enough samples) sits below `min_hit_rate` are deprioritized
/// to the end of the list.
pub fn select_backends(
    snapshots: &[BackendSnapshot],
    size_hint: Option<u64>,
    large_value_threshold: u64,
    min_hit_rate: f64,
) -> Vec<usize> {
    let large = size_hint.is_some_and(|size| size >= large_value_threshold);
    let mut order: Vec<&BackendSnapshot> = snapshots.iter().collect();
    if large && order.iter().any(|snap| snap.durable) {
        order.retain(|snap| snap.durable);
    }
    order.sort_by_key(|snap| {
        // Stable sort keeps priority order within each group.
        snap.lookups >= MIN_HEALTH_SAMPLES && snap.hit_rate < min_hit_rate
    });
    order.into_iter().map(|snap| snap.index).collect()
}

struct PerfTracker {
    ops: u64,
    errored_ops: u64,
    total_duration: Duration,
}

// == Cache Manager ==
/// Orchestrates one or more cache backends behind a single API.
///
/// Construct one per service and pass it by dependency injection; there is
/// no process-wide instance.
pub struct CacheManager {
    backends: Vec<Arc<dyn CacheBackend>>,
    config: ManagerConfig,
    events: EventRegistry,
    perf: Mutex<PerfTracker>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    shut_down: AtomicBool,
}

impl CacheManager {
    /// Creates a manager over `backends`, which must be given fastest-first:
    /// reads query them in order and stop at the first hit.
    pub fn new(backends: Vec<Arc<dyn CacheBackend>>, config: ManagerConfig) -> Self {
        Self::with_events(backends, config, EventRegistry::new())
    }

    /// Creates a manager sharing an event registry with its backends.
    pub fn with_events(
        backends: Vec<Arc<dyn CacheBackend>>,
        config: ManagerConfig,
        events: EventRegistry,
    ) -> Self {
        Self {
            backends,
            config,
            events,
            perf: Mutex::new(PerfTracker {
                ops: 0,
                errored_ops: 0,
                total_duration: Duration::ZERO,
            }),
            tasks: Mutex::new(Vec::new()),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Registers a listener for hit/miss/set/delete/eviction/cleanup/
    /// disk-usage events from backends sharing this manager's registry.
    pub fn subscribe(&self, listener: Arc<dyn CacheEventListener>) {
        self.events.subscribe(listener);
    }

    /// The shared event registry, for wiring backends at construction time.
    pub fn events(&self) -> &EventRegistry {
        &self.events
    }

    fn record_op(&self, started: Instant, errored: bool) {
        let mut perf = self.perf.lock().expect("perf lock poisoned");
        perf.ops += 1;
        if errored {
            perf.errored_ops += 1;
        }
        perf.total_duration += started.elapsed();
    }

    fn checked_key(&self, key: &str) -> Option<String> {
        let normalized = normalize_key(key);
        if normalized.is_empty() {
            warn!("Ignoring cache operation with empty key");
            return None;
        }
        Some(normalized)
    }

    // == Get ==
    /// Queries backends in priority order and returns the first hit,
    /// deserialized. A backend that errors is logged and treated as a miss
    /// for that backend only. Returns `None` when every backend misses or
    /// fails, or when the key is empty.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let key = self.checked_key(key)?;
        let started = Instant::now();
        let mut errored = false;

        for backend in &self.backends {
            match backend.get(&key).await {
                Ok(Some(value)) => match serde_json::from_value(value) {
                    Ok(typed) => {
                        debug!(key = %key, backend = backend.name(), "Cache hit");
                        self.record_op(started, errored);
                        return Some(typed);
                    }
                    Err(e) => {
                        warn!(key = %key, backend = backend.name(), error = %e,
                            "Cached value failed to deserialize, trying next backend");
                        errored = true;
                    }
                },
                Ok(None) => {}
                Err(e) => {
                    warn!(key = %key, backend = backend.name(), error = %e,
                        "Backend read failed, falling back");
                    errored = true;
                }
            }
        }
        self.record_op(started, errored);
        None
    }

    // == Set ==
    /// Writes through to the backends chosen by [`select_backends`], in
    /// parallel. Korean-language content gets its TTL boosted by
    /// [`KOREAN_TTL_BOOST`]. Per-backend failures are logged; only when
    /// every selected backend rejects the write does the call fail.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl_ms: Option<u64>) -> Result<()> {
        let Some(key) = self.checked_key(key) else {
            return Ok(());
        };
        let started = Instant::now();

        let value = serde_json::to_value(value)?;
        let size_hint = serde_json::to_vec(&value).map(|b| b.len() as u64).ok();

        let base_ttl = ttl_ms.unwrap_or(self.config.default_ttl_ms);
        let ttl = if value_is_korean(&value) {
            (base_ttl as f64 * KOREAN_TTL_BOOST) as u64
        } else {
            base_ttl
        };

        let snapshots = self.snapshots().await;
        let selected = select_backends(
            &snapshots,
            size_hint,
            self.config.large_value_threshold,
            self.config.min_hit_rate,
        );

        let writes = selected.iter().map(|&index| {
            let backend = self.backends[index].clone();
            let key = key.clone();
            let value = value.clone();
            async move {
                let result = backend.set(&key, value, Some(ttl)).await;
                (backend.name().to_string(), result)
            }
        });

        let mut failures = Vec::new();
        let mut successes = 0usize;
        for (name, result) in join_all(writes).await {
            match result {
                Ok(()) => successes += 1,
                Err(e) => {
                    warn!(key = %key, backend = %name, error = %e, "Backend write failed");
                    failures.push(format!("{}: {}", name, e));
                }
            }
        }

        self.record_op(started, !failures.is_empty());
        if successes == 0 {
            return Err(CacheError::AllBackendsFailed(failures.join("; ")));
        }
        Ok(())
    }

    // == Delete ==
    /// Deletes from every backend in parallel. Returns `true` if any backend
    /// confirmed a deletion.
    pub async fn delete(&self, key: &str) -> bool {
        let Some(key) = self.checked_key(key) else {
            return false;
        };
        let started = Instant::now();

        let deletes = self.backends.iter().map(|backend| {
            let backend = backend.clone();
            let key = key.clone();
            async move { (backend.name().to_string(), backend.delete(&key).await) }
        });

        let mut errored = false;
        let mut any = false;
        for (name, result) in join_all(deletes).await {
            match result {
                Ok(deleted) => any |= deleted,
                Err(e) => {
                    warn!(key = %key, backend = %name, error = %e, "Backend delete failed");
                    errored = true;
                }
            }
        }
        self.record_op(started, errored);
        any
    }

    // == Has ==
    /// Queries backends in priority order, short-circuiting on the first
    /// positive result.
    pub async fn has(&self, key: &str) -> bool {
        let Some(key) = self.checked_key(key) else {
            return false;
        };
        for backend in &self.backends {
            match backend.has(&key).await {
                Ok(true) => return true,
                Ok(false) => {}
                Err(e) => {
                    warn!(key = %key, backend = backend.name(), error = %e,
                        "Backend existence check failed, falling back");
                }
            }
        }
        false
    }

    async fn snapshots(&self) -> Vec<BackendSnapshot> {
        let mut snapshots = Vec::with_capacity(self.backends.len());
        for (index, backend) in self.backends.iter().enumerate() {
            let stats = backend.stats().await.unwrap_or_default();
            snapshots.push(BackendSnapshot {
                index,
                durable: backend.durable(),
                hit_rate: stats.hit_rate(),
                lookups: stats.lookups(),
            });
        }
        snapshots
    }

    // == Statistics ==
    /// Aggregated stats across all backends: summed counts, request-weighted
    /// hit rate, summed memory usage.
    pub async fn get_stats(&self) -> CacheStats {
        let mut merged = CacheStats::new();
        for backend in &self.backends {
            match backend.stats().await {
                Ok(stats) => merged.merge(&stats),
                Err(e) => warn!(backend = backend.name(), error = %e, "Backend stats failed"),
            }
        }
        merged
    }

    /// Aggregated stats plus derived metrics: overall hit rate, average
    /// response time, error rate, per-backend breakdown.
    pub async fn get_performance_metrics(&self) -> PerformanceMetrics {
        let mut backends = Vec::with_capacity(self.backends.len());
        let mut merged = CacheStats::new();
        for backend in &self.backends {
            let stats = backend.stats().await.unwrap_or_default();
            merged.merge(&stats);
            backends.push((backend.name().to_string(), stats));
        }

        let (avg_response_time_ms, error_rate) = {
            let perf = self.perf.lock().expect("perf lock poisoned");
            if perf.ops == 0 {
                (0.0, 0.0)
            } else {
                (
                    perf.total_duration.as_secs_f64() * 1000.0 / perf.ops as f64,
                    perf.errored_ops as f64 / perf.ops as f64,
                )
            }
        };

        PerformanceMetrics {
            overall_hit_rate: merged.hit_rate(),
            avg_response_time_ms,
            error_rate,
            backends,
        }
    }

    // == Health ==
    /// Returns `false` (with a warning) when any backend's observed hit rate
    /// is below the configured floor: a proxy for a cache that is thrashing
    /// rather than helping.
    pub async fn health_check(&self) -> bool {
        let mut healthy = true;
        for backend in &self.backends {
            let stats = backend.stats().await.unwrap_or_default();
            if stats.lookups() >= MIN_HEALTH_SAMPLES && stats.hit_rate() < self.config.min_hit_rate
            {
                warn!(
                    backend = backend.name(),
                    hit_rate = stats.hit_rate(),
                    floor = self.config.min_hit_rate,
                    "Backend hit rate below floor"
                );
                healthy = false;
            }
        }
        healthy
    }

    // == Warming ==
    /// Computes and stores a value for each key via `loader`. A loader or
    /// write failure for one key is logged and skipped; the batch never
    /// aborts. Returns how many keys were warmed.
    pub async fn warm_cache<F, Fut>(&self, keys: &[String], loader: F) -> usize
    where
        F: Fn(String) -> Fut,
        Fut: std::future::Future<Output = anyhow::Result<Value>>,
    {
        let mut warmed = 0usize;
        for key in keys {
            match loader(key.clone()).await {
                Ok(value) => match self.set(key, &value, None).await {
                    Ok(()) => warmed += 1,
                    Err(e) => warn!(key = %key, error = %e, "Cache warm write failed, skipping"),
                },
                Err(e) => warn!(key = %key, error = %e, "Cache warm loader failed, skipping"),
            }
        }
        info!(warmed, requested = keys.len(), "Cache warming finished");
        warmed
    }

    // == Cleanup ==
    /// Asks each backend to purge its expired entries; returns the total.
    pub async fn cleanup(&self) -> usize {
        let mut removed = 0usize;
        for backend in &self.backends {
            match backend.cleanup_expired().await {
                Ok(count) => removed += count,
                Err(e) => warn!(backend = backend.name(), error = %e, "Backend cleanup failed"),
            }
        }
        info!(removed, "Cache cleanup removed expired entries");
        removed
    }

    // == Maintenance ==
    /// Starts a periodic cleanup task per backend. Handles are aborted by
    /// [`CacheManager::shutdown`].
    pub fn start_maintenance(&self) {
        let interval = self.config.cleanup_interval_secs;
        let mut tasks = self.tasks.lock().expect("task lock poisoned");
        for backend in &self.backends {
            tasks.push(crate::tasks::spawn_cleanup_task(backend.clone(), interval));
        }
    }

    /// Adopts an externally spawned maintenance task (e.g. the file tier's
    /// disk-usage reconciliation) so shutdown aborts it too.
    pub fn register_maintenance(&self, handle: JoinHandle<()>) {
        self.tasks.lock().expect("task lock poisoned").push(handle);
    }

    // == Shutdown ==
    /// Stops maintenance tasks and shuts down every backend. Individual
    /// failures are logged and tolerated; never fails, and calling it twice
    /// is a no-op.
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }

        let handles: Vec<JoinHandle<()>> = {
            let mut tasks = self.tasks.lock().expect("task lock poisoned");
            tasks.drain(..).collect()
        };
        for handle in handles {
            handle.abort();
        }

        for backend in &self.backends {
            if !backend.health_check().await {
                warn!(backend = backend.name(), "Backend unhealthy at shutdown");
            }
            if let Err(e) = backend.shutdown().await {
                warn!(backend = backend.name(), error = %e, "Backend shutdown failed");
            }
        }
        info!("Cache manager shut down");
    }
}
