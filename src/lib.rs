//! doc_cache - Multi-tier cache for a document retrieval service
//!
//! Fetching and parsing remote documents (network fetch, HTML parse,
//! Korean-text analysis) is expensive; this crate caches the results across
//! interchangeable storage tiers. A [`cache::CacheManager`] coordinates a
//! low-latency memory tier and a durable, compressed, crash-safe file tier
//! behind one API, degrading gracefully when any tier misbehaves.

pub mod cache;
pub mod config;
pub mod error;
pub mod tasks;

pub use cache::{CacheBackend, CacheManager, FileCache, MemoryCache};
pub use config::{FileCacheConfig, ManagerConfig, MemoryCacheConfig};
pub use error::{CacheError, Result};
pub use tasks::{spawn_cleanup_task, spawn_disk_usage_task};
