//! File Cache Module
//!
//! The durable tier: sharded, optionally gzip-compressed on-disk storage
//! with a persisted metadata file as the single source of truth.
//!
//! Crash safety comes from the temp-write-then-rename pattern: both data
//! files and the metadata file only ever become visible fully written, so an
//! interrupted process leaves either no final file or the prior valid
//! version. Corruption (missing files, size drift, checksum mismatch) is
//! self-healed by purging the stale entry and reporting a miss.
//!
//! Single-process only: the metadata map is guarded by one in-process lock,
//! and two processes sharing a base directory would race on metadata writes.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::cache::entry::{
    current_timestamp_ms, FileCacheEntry, FileCacheMetadata, METADATA_VERSION,
};
use crate::cache::events::{CacheEvent, EventRegistry};
use crate::cache::keys::{checksum, entry_relative_path, matches_pattern};
use crate::cache::{CacheBackend, CacheStats};
use crate::config::FileCacheConfig;
use crate::error::{CacheError, Result};

/// Name of the persisted metadata file inside the base directory.
const METADATA_FILE: &str = ".cache-metadata.json";

/// Sentinel key used by the health-check round trip.
const HEALTH_CHECK_KEY: &str = "__file_health_check__";

/// Allowed difference between a tracked entry size and the on-disk file size
/// before startup validation purges the entry (bytes).
const STARTUP_SIZE_TOLERANCE: u64 = 512;

/// Tracked-vs-actual disk usage drift tolerated before reconciliation adopts
/// the actual figure (bytes).
const DISK_USAGE_DRIFT_BYTES: u64 = 1024 * 1024;

/// TTL applied when a caller does not provide one (milliseconds).
const FALLBACK_TTL_MS: u64 = 86_400_000;

struct FileState {
    metadata: FileCacheMetadata,
    stats: CacheStats,
}

// == File Cache ==
/// Durable cache backend backed by sharded files under a base directory.
pub struct FileCache {
    config: FileCacheConfig,
    state: RwLock<FileState>,
    events: EventRegistry,
}

impl FileCache {
    /// Creates a new FileCache. No disk access happens until
    /// [`FileCache::initialize`] is called.
    pub fn new(config: FileCacheConfig) -> Self {
        Self::with_events(config, EventRegistry::new())
    }

    /// Creates a new FileCache that reports events to `events`.
    pub fn with_events(config: FileCacheConfig, events: EventRegistry) -> Self {
        Self {
            config,
            state: RwLock::new(FileState {
                metadata: FileCacheMetadata::new(),
                stats: CacheStats::new(),
            }),
            events,
        }
    }

    // == Initialization ==
    /// Prepares the base directory and loads persisted metadata.
    ///
    /// An unusable base directory is fatal and surfaces as
    /// [`CacheError::Configuration`]. A metadata file with a different format
    /// version is discarded and the cache starts empty. Every tracked entry
    /// is validated against the disk: entries whose file is missing or whose
    /// size drifted beyond a small tolerance are purged.
    pub async fn initialize(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.config.base_dir)
            .await
            .map_err(|e| {
                CacheError::Configuration(format!(
                    "Cannot create cache directory {}: {}",
                    self.config.base_dir.display(),
                    e
                ))
            })?;

        let mut metadata = self.load_metadata().await;
        self.validate_entries(&mut metadata).await;

        let mut guard = self.state.write().await;
        info!(
            entries = metadata.entries.len(),
            total_size = metadata.total_size,
            dir = %self.config.base_dir.display(),
            "File cache initialized"
        );
        guard.metadata = metadata;
        self.persist_metadata(&guard.metadata).await?;
        Ok(())
    }

    async fn load_metadata(&self) -> FileCacheMetadata {
        let path = self.metadata_path();
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(_) => return FileCacheMetadata::new(),
        };
        match serde_json::from_slice::<FileCacheMetadata>(&bytes) {
            Ok(metadata) if metadata.version == METADATA_VERSION => metadata,
            Ok(metadata) => {
                warn!(
                    found = metadata.version,
                    expected = METADATA_VERSION,
                    "Metadata format version mismatch, starting empty"
                );
                FileCacheMetadata::new()
            }
            Err(e) => {
                warn!(error = %e, "Unreadable cache metadata, starting empty");
                FileCacheMetadata::new()
            }
        }
    }

    async fn validate_entries(&self, metadata: &mut FileCacheMetadata) {
        let mut invalid: Vec<String> = Vec::new();
        for (key, entry) in &metadata.entries {
            let path = self.config.base_dir.join(&entry.file_path);
            match tokio::fs::metadata(&path).await {
                Ok(stat) => {
                    let drift = stat.len().abs_diff(entry.size);
                    if drift > STARTUP_SIZE_TOLERANCE {
                        warn!(key = %key, tracked = entry.size, actual = stat.len(),
                            "Cached file size drifted, purging entry");
                        invalid.push(key.clone());
                    }
                }
                Err(_) => {
                    warn!(key = %key, path = %path.display(),
                        "Cached file missing, purging entry");
                    invalid.push(key.clone());
                }
            }
        }
        for key in invalid {
            if let Some(entry) = metadata.entries.remove(&key) {
                metadata.total_size = metadata.total_size.saturating_sub(entry.size);
            }
        }
    }

    // == Paths ==
    fn metadata_path(&self) -> PathBuf {
        self.config.base_dir.join(METADATA_FILE)
    }

    fn data_path(&self, entry: &FileCacheEntry) -> PathBuf {
        self.config.base_dir.join(&entry.file_path)
    }

    // == Persistence ==
    /// Writes the metadata file via temp-write-then-rename, so a crash leaves
    /// either the previous metadata or the new one, never a partial file.
    async fn persist_metadata(&self, metadata: &FileCacheMetadata) -> Result<()> {
        if !self.config.enable_metadata {
            return Ok(());
        }
        let bytes = serde_json::to_vec(metadata)?;
        let path = self.metadata_path();
        write_atomic(&path, &bytes).await?;
        Ok(())
    }

    /// Removes an entry's bookkeeping and best-effort unlinks its file.
    /// The caller persists metadata afterwards.
    async fn purge_entry(&self, state: &mut FileState, key: &str) -> Option<FileCacheEntry> {
        let entry = state.metadata.entries.remove(key)?;
        state.metadata.total_size = state.metadata.total_size.saturating_sub(entry.size);
        let path = self.data_path(&entry);
        if let Err(e) = tokio::fs::remove_file(&path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(key = %key, error = %e, "Failed to remove cached file");
            }
        }
        Some(entry)
    }

    // == Capacity ==
    /// Evicts strict-LRU (oldest `last_accessed` first) until the incoming
    /// entry fits inside the size budget.
    async fn ensure_capacity(&self, state: &mut FileState, incoming: u64) {
        let budget = self.config.max_size_bytes();
        while state.metadata.total_size + incoming > budget && !state.metadata.entries.is_empty() {
            let victim = state
                .metadata
                .entries
                .values()
                .min_by_key(|entry| entry.last_accessed)
                .map(|entry| entry.key.clone());
            let Some(victim) = victim else { break };
            if let Some(entry) = self.purge_entry(state, &victim).await {
                state.stats.record_eviction();
                info!(key = %victim, freed = entry.size, "Evicted LRU entry to stay under size budget");
                self.events.emit(CacheEvent::Eviction {
                    backend: "file".to_string(),
                    key: victim,
                    freed: entry.size,
                });
            }
        }
    }

    // == Maintenance ==
    /// Recomputes actual bytes on disk across tracked entries and adopts the
    /// actual figure when drift exceeds the tolerance. Consumers see eventual,
    /// not instantaneous, consistency between `total_size` and the disk.
    pub async fn reconcile_disk_usage(&self) -> Result<u64> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;

        let mut actual: u64 = 0;
        for entry in state.metadata.entries.values() {
            if let Ok(stat) = tokio::fs::metadata(self.data_path(entry)).await {
                actual += stat.len();
            }
        }

        let tracked = state.metadata.total_size;
        if tracked.abs_diff(actual) > DISK_USAGE_DRIFT_BYTES {
            warn!(tracked, actual, "Disk usage drifted, adopting actual figure");
            self.events.emit(CacheEvent::DiskUsage {
                backend: "file".to_string(),
                tracked,
                actual,
            });
            state.metadata.total_size = actual;
            self.persist_metadata(&state.metadata).await?;
        }
        Ok(actual)
    }
}

#[async_trait]
impl CacheBackend for FileCache {
    fn name(&self) -> &str {
        "file"
    }

    fn durable(&self) -> bool {
        true
    }

    // == Read Path ==
    /// Metadata lookup, then file read. Any I/O, checksum, or deserialization
    /// failure purges the stale entry and reports a miss: the self-healing
    /// path for corruption or manual file deletion.
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;

        let miss = |state: &mut FileState| {
            state.stats.record_miss();
            self.events.emit(CacheEvent::Miss {
                backend: "file".to_string(),
                key: key.to_string(),
            });
        };

        let (expired, compressed, expected_checksum, path) =
            match state.metadata.entries.get(key) {
                None => {
                    miss(state);
                    return Ok(None);
                }
                Some(entry) => (
                    entry.is_expired(),
                    entry.compressed,
                    entry.checksum.clone(),
                    self.data_path(entry),
                ),
            };

        if expired {
            self.purge_entry(state, key).await;
            self.persist_metadata(&state.metadata).await?;
            miss(state);
            return Ok(None);
        }

        let value = match read_entry_file(&path, compressed, &expected_checksum).await {
            Ok(value) => value,
            Err(e) => {
                warn!(key = %key, error = %e, "Cached file unreadable, purging entry");
                self.purge_entry(state, key).await;
                self.persist_metadata(&state.metadata).await?;
                miss(state);
                return Ok(None);
            }
        };

        if let Some(entry) = state.metadata.entries.get_mut(key) {
            entry.access_count += 1;
            entry.last_accessed = current_timestamp_ms();
        }
        state.stats.record_hit();
        self.persist_metadata(&state.metadata).await?;
        self.events.emit(CacheEvent::Hit {
            backend: "file".to_string(),
            key: key.to_string(),
        });
        Ok(Some(value))
    }

    // == Write Path ==
    /// Serializes, checksums, optionally compresses, enforces capacity, then
    /// writes the data file and metadata with temp-write-then-rename.
    /// A serialized payload above `max_file_size` is rejected outright with
    /// [`CacheError::CapacityExceeded`] and nothing is written.
    async fn set(&self, key: &str, value: Value, ttl_ms: Option<u64>) -> Result<()> {
        let serialized = serde_json::to_vec(&value)?;
        let original_size = serialized.len() as u64;
        if original_size > self.config.max_file_size {
            return Err(CacheError::CapacityExceeded {
                size: original_size,
                max: self.config.max_file_size,
            });
        }

        let payload_checksum = checksum(&serialized);
        let is_korean = crate::cache::keys::value_is_korean(&value);

        let mut compressed = false;
        let mut data = serialized;
        if self.config.enable_compression && original_size > self.config.compression_threshold {
            match gzip(&data) {
                Ok(packed) => {
                    data = packed;
                    compressed = true;
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "Compression failed, storing uncompressed");
                }
            }
        }
        let stored_size = data.len() as u64;

        let rel_path = {
            let base = entry_relative_path(key, self.config.directory_depth);
            if compressed {
                format!("{}.gz", base)
            } else {
                base
            }
        };

        let now = current_timestamp_ms();
        let ttl = ttl_ms.unwrap_or(FALLBACK_TTL_MS).max(1);
        let entry = FileCacheEntry {
            key: key.to_string(),
            file_path: rel_path.clone(),
            created_at: now,
            expires_at: now + ttl,
            access_count: 0,
            last_accessed: now,
            tags: Vec::new(),
            is_korean,
            content_type: None,
            original_size,
            compressed_size: compressed.then_some(stored_size),
            compressed,
            checksum: payload_checksum,
            size: stored_size,
        };

        let mut guard = self.state.write().await;
        let state = &mut *guard;

        // Overwrite: drop the previous entry (and its file, when the path
        // changed by compression state) before accounting the new one.
        if let Some(old) = state.metadata.entries.remove(key) {
            state.metadata.total_size = state.metadata.total_size.saturating_sub(old.size);
            if old.file_path != rel_path {
                let old_path = self.config.base_dir.join(&old.file_path);
                let _ = tokio::fs::remove_file(&old_path).await;
            }
        }

        self.ensure_capacity(state, stored_size).await;

        let path = self.data_path(&entry);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        write_atomic(&path, &data).await?;

        debug!(key = %key, size = stored_size, compressed, "Stored file cache entry");
        state.metadata.entries.insert(key.to_string(), entry);
        state.metadata.total_size += stored_size;
        self.persist_metadata(&state.metadata).await?;
        self.events.emit(CacheEvent::Set {
            backend: "file".to_string(),
            key: key.to_string(),
            size: stored_size,
        });
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        let existed = self.purge_entry(state, key).await.is_some();
        if existed {
            self.persist_metadata(&state.metadata).await?;
            self.events.emit(CacheEvent::Delete {
                backend: "file".to_string(),
                key: key.to_string(),
            });
        }
        Ok(existed)
    }

    async fn has(&self, key: &str) -> Result<bool> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        let expired = matches!(state.metadata.entries.get(key), Some(entry) if entry.is_expired());
        if expired {
            self.purge_entry(state, key).await;
            self.persist_metadata(&state.metadata).await?;
            return Ok(false);
        }
        Ok(state.metadata.entries.contains_key(key))
    }

    async fn clear(&self) -> Result<()> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        let keys: Vec<String> = state.metadata.entries.keys().cloned().collect();
        for key in keys {
            self.purge_entry(state, &key).await;
        }
        state.metadata.total_size = 0;
        self.persist_metadata(&state.metadata).await?;
        Ok(())
    }

    async fn keys(&self, pattern: Option<&str>) -> Result<Vec<String>> {
        let guard = self.state.read().await;
        let keys = guard
            .metadata
            .entries
            .values()
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.key.clone())
            .filter(|key| pattern.map_or(true, |p| matches_pattern(key, p)))
            .collect();
        Ok(keys)
    }

    async fn size(&self) -> Result<usize> {
        let guard = self.state.read().await;
        Ok(guard
            .metadata
            .entries
            .values()
            .filter(|entry| !entry.is_expired())
            .count())
    }

    async fn stats(&self) -> Result<CacheStats> {
        let guard = self.state.read().await;
        let mut stats = guard.stats.clone();
        // Count like size(): entries past their TTL are gone to callers even
        // before cleanup purges them.
        let live = || guard.metadata.entries.values().filter(|e| !e.is_expired());
        stats.total_keys = live().count();
        stats.memory_usage = guard.metadata.total_size;
        stats.oldest_entry = live().map(|e| e.created_at).min();
        stats.newest_entry = live().map(|e| e.created_at).max();
        Ok(stats)
    }

    /// Synthetic set→get→delete round trip on a sentinel key. Never errors.
    async fn health_check(&self) -> bool {
        let roundtrip = async {
            self.set(HEALTH_CHECK_KEY, json!("ok"), Some(5_000)).await?;
            let read = self.get(HEALTH_CHECK_KEY).await?;
            self.delete(HEALTH_CHECK_KEY).await?;
            Ok::<bool, CacheError>(read == Some(json!("ok")))
        };
        roundtrip.await.unwrap_or(false)
    }

    async fn cleanup_expired(&self) -> Result<usize> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        let expired: Vec<String> = state
            .metadata
            .entries
            .values()
            .filter(|entry| entry.is_expired())
            .map(|entry| entry.key.clone())
            .collect();

        for key in &expired {
            self.purge_entry(state, key).await;
        }
        state.metadata.last_cleanup = Utc::now();
        self.persist_metadata(&state.metadata).await?;
        if !expired.is_empty() {
            info!(removed = expired.len(), "File cache cleanup removed expired entries");
            self.events.emit(CacheEvent::Cleanup {
                backend: "file".to_string(),
                removed: expired.len(),
            });
        }
        Ok(expired.len())
    }

    /// Persists metadata one final time. Idempotent and non-throwing, even if
    /// the cache was never initialized.
    async fn shutdown(&self) -> Result<()> {
        let guard = self.state.read().await;
        if let Err(e) = self.persist_metadata(&guard.metadata).await {
            warn!(error = %e, "Failed to persist metadata during shutdown");
        }
        Ok(())
    }
}

// == File Helpers ==

/// Writes `data` to `<path>.tmp` and atomically renames it into place, so the
/// final name is only ever visible once fully written.
async fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let tmp = path.with_extension(match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{}.tmp", ext),
        None => "tmp".to_string(),
    });
    tokio::fs::write(&tmp, data).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

/// Reads, checksums, and decodes one entry file.
async fn read_entry_file(path: &Path, compressed: bool, expected_checksum: &str) -> Result<Value> {
    let raw = tokio::fs::read(path).await?;
    let serialized = if compressed { gunzip(&raw)? } else { raw };
    let actual = checksum(&serialized);
    if actual != expected_checksum {
        return Err(CacheError::Backend(format!(
            "Checksum mismatch for {}",
            path.display()
        )));
    }
    Ok(serde_json::from_slice(&serialized)?)
}

fn gzip(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

fn gunzip(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}
