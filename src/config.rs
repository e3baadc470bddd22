//! Configuration Module
//!
//! Handles loading and managing cache configuration from environment variables.

use std::env;
use std::path::PathBuf;

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_bool(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
        .unwrap_or(default)
}

// == Manager Configuration ==
/// Configuration for the cache manager layer.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Default TTL in milliseconds for entries without explicit TTL
    pub default_ttl_ms: u64,
    /// Hit-rate floor below which a backend is considered unhealthy
    pub min_hit_rate: f64,
    /// Serialized size above which writes prefer the durable tier (bytes)
    pub large_value_threshold: u64,
    /// Interval in seconds between background expiry-cleanup runs
    pub cleanup_interval_secs: u64,
}

impl ManagerConfig {
    /// Creates a new ManagerConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_DEFAULT_TTL_MS` - Default TTL in milliseconds (default: 1800000)
    /// - `CACHE_MIN_HIT_RATE` - Health-check hit-rate floor (default: 0.2)
    /// - `CACHE_LARGE_VALUE_THRESHOLD` - Durable-tier routing threshold in bytes (default: 262144)
    /// - `CACHE_CLEANUP_INTERVAL` - Cleanup frequency in seconds (default: 300)
    pub fn from_env() -> Self {
        Self {
            default_ttl_ms: env_parse("CACHE_DEFAULT_TTL_MS", 1_800_000),
            min_hit_rate: env_parse("CACHE_MIN_HIT_RATE", 0.2),
            large_value_threshold: env_parse("CACHE_LARGE_VALUE_THRESHOLD", 256 * 1024),
            cleanup_interval_secs: env_parse("CACHE_CLEANUP_INTERVAL", 300),
        }
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            default_ttl_ms: 1_800_000,
            min_hit_rate: 0.2,
            large_value_threshold: 256 * 1024,
            cleanup_interval_secs: 300,
        }
    }
}

// == Memory Cache Configuration ==
/// Configuration for the in-memory cache tier.
#[derive(Debug, Clone)]
pub struct MemoryCacheConfig {
    /// Maximum number of entries the memory tier can hold
    pub max_entries: usize,
}

impl MemoryCacheConfig {
    /// Creates a new MemoryCacheConfig from environment variables.
    ///
    /// # Environment Variables
    /// - `MEMORY_CACHE_MAX_ENTRIES` - Maximum entries (default: 1000)
    pub fn from_env() -> Self {
        Self {
            max_entries: env_parse("MEMORY_CACHE_MAX_ENTRIES", 1000),
        }
    }
}

impl Default for MemoryCacheConfig {
    fn default() -> Self {
        Self { max_entries: 1000 }
    }
}

// == File Cache Configuration ==
/// Configuration for the durable file-based cache tier.
#[derive(Debug, Clone)]
pub struct FileCacheConfig {
    /// Base directory for cache files and metadata
    pub base_dir: PathBuf,
    /// Maximum total size of cached files in megabytes
    pub max_size_mb: u64,
    /// Interval in seconds between expiry-cleanup runs
    pub cleanup_interval_secs: u64,
    /// Whether to gzip payloads above the compression threshold
    pub enable_compression: bool,
    /// Serialized size in bytes above which payloads are compressed
    pub compression_threshold: u64,
    /// Number of nested 2-hex-character shard directories
    pub directory_depth: usize,
    /// Maximum serialized size of a single entry in bytes
    pub max_file_size: u64,
    /// Whether to persist the metadata file to disk
    pub enable_metadata: bool,
    /// Interval in seconds between disk-usage reconciliation runs
    pub disk_usage_interval_secs: u64,
}

impl FileCacheConfig {
    /// Creates a new FileCacheConfig from environment variables.
    ///
    /// # Environment Variables
    /// - `FILE_CACHE_DIR` - Base directory (default: ./.cache)
    /// - `FILE_CACHE_MAX_SIZE_MB` - Size budget in MB (default: 500)
    /// - `FILE_CACHE_CLEANUP_INTERVAL` - Cleanup frequency in seconds (default: 600)
    /// - `FILE_CACHE_COMPRESSION` - Enable gzip compression (default: true)
    /// - `FILE_CACHE_COMPRESSION_THRESHOLD` - Compression threshold in bytes (default: 1024)
    /// - `FILE_CACHE_DIRECTORY_DEPTH` - Shard directory depth (default: 2)
    /// - `FILE_CACHE_MAX_FILE_SIZE` - Per-entry size cap in bytes (default: 52428800)
    /// - `FILE_CACHE_METADATA` - Persist metadata file (default: true)
    /// - `FILE_CACHE_DISK_USAGE_INTERVAL` - Reconciliation frequency in seconds (default: 1800)
    pub fn from_env() -> Self {
        Self {
            base_dir: env::var("FILE_CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./.cache")),
            max_size_mb: env_parse("FILE_CACHE_MAX_SIZE_MB", 500),
            cleanup_interval_secs: env_parse("FILE_CACHE_CLEANUP_INTERVAL", 600),
            enable_compression: env_bool("FILE_CACHE_COMPRESSION", true),
            compression_threshold: env_parse("FILE_CACHE_COMPRESSION_THRESHOLD", 1024),
            directory_depth: env_parse("FILE_CACHE_DIRECTORY_DEPTH", 2),
            max_file_size: env_parse("FILE_CACHE_MAX_FILE_SIZE", 50 * 1024 * 1024),
            enable_metadata: env_bool("FILE_CACHE_METADATA", true),
            disk_usage_interval_secs: env_parse("FILE_CACHE_DISK_USAGE_INTERVAL", 1800),
        }
    }

    /// Returns the size budget in bytes.
    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_mb * 1024 * 1024
    }
}

impl Default for FileCacheConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("./.cache"),
            max_size_mb: 500,
            cleanup_interval_secs: 600,
            enable_compression: true,
            compression_threshold: 1024,
            directory_depth: 2,
            max_file_size: 50 * 1024 * 1024,
            enable_metadata: true,
            disk_usage_interval_secs: 1800,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manager_config_default() {
        let config = ManagerConfig::default();
        assert_eq!(config.default_ttl_ms, 1_800_000);
        assert_eq!(config.large_value_threshold, 256 * 1024);
        assert!(config.min_hit_rate > 0.0 && config.min_hit_rate < 1.0);
    }

    #[test]
    fn test_file_cache_config_default() {
        let config = FileCacheConfig::default();
        assert_eq!(config.max_size_mb, 500);
        assert_eq!(config.max_size_bytes(), 500 * 1024 * 1024);
        assert_eq!(config.directory_depth, 2);
        assert!(config.enable_compression);
        assert!(config.enable_metadata);
    }

    #[test]
    fn test_memory_config_default() {
        let config = MemoryCacheConfig::default();
        assert_eq!(config.max_entries, 1000);
    }
}
