//! Cache Module
//!
//! The multi-tier cache subsystem: a backend contract, a low-latency memory
//! tier, a durable file tier, and a manager that coordinates them.

mod backend;
pub mod entry;
mod events;
mod file;
pub mod keys;
mod lru;
mod manager;
mod memory;
mod stats;


// Re-export public types
pub use backend::CacheBackend;
pub use entry::{FileCacheEntry, FileCacheMetadata, MemoryEntry, METADATA_VERSION};
pub use events::{CacheEvent, CacheEventListener, EventRegistry};
pub use file::FileCache;
pub use lru::LruTracker;
pub use manager::{select_backends, BackendSnapshot, CacheManager};
pub use memory::MemoryCache;
pub use stats::{CacheStats, PerformanceMetrics};

// == Public Constants ==
/// TTL multiplier applied to Korean-language content; Korean documents are
/// expensive to re-analyze, so they live longer.
pub const KOREAN_TTL_BOOST: f64 = 1.5;
