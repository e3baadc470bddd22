//! Cache Statistics Module
//!
//! Tracks cache performance metrics including hits, misses, and evictions,
//! and aggregates them across backends for the manager.

use serde::Serialize;

// == Cache Stats ==
/// Performance metrics for a single backend.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    /// Current number of entries in the backend
    pub total_keys: usize,
    /// Number of successful retrievals
    pub hits: u64,
    /// Number of failed retrievals (key not found or expired)
    pub misses: u64,
    /// Number of entries evicted by the LRU policy
    pub evictions: u64,
    /// Bytes held by the backend (tracked disk usage for the file tier)
    pub memory_usage: u64,
    /// Creation timestamp of the oldest entry (Unix milliseconds)
    pub oldest_entry: Option<u64>,
    /// Creation timestamp of the newest entry (Unix milliseconds)
    pub newest_entry: Option<u64>,
}

impl CacheStats {
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Calculates the hit rate: hits / (hits + misses), or 0.0 with no requests.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Total observed lookups (hits plus misses).
    pub fn lookups(&self) -> u64 {
        self.hits + self.misses
    }

    /// Increments the hit counter.
    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    /// Increments the miss counter.
    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    /// Increments the eviction counter.
    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    // == Merge ==
    /// Folds another backend's stats into this one. Counts are summed (the
    /// combined hit rate is therefore request-weighted), memory usage is
    /// summed, and oldest/newest span all merged backends.
    pub fn merge(&mut self, other: &CacheStats) {
        self.total_keys += other.total_keys;
        self.hits += other.hits;
        self.misses += other.misses;
        self.evictions += other.evictions;
        self.memory_usage += other.memory_usage;
        self.oldest_entry = match (self.oldest_entry, other.oldest_entry) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        self.newest_entry = match (self.newest_entry, other.newest_entry) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
    }
}

// == Performance Metrics ==
/// Derived metrics across all backends, reported by the manager.
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceMetrics {
    /// Request-weighted hit rate across all backends
    pub overall_hit_rate: f64,
    /// Mean latency of manager operations in milliseconds
    pub avg_response_time_ms: f64,
    /// Fraction of manager operations that saw at least one backend error
    pub error_rate: f64,
    /// Per-backend statistics, in priority order
    pub backends: Vec<(String, CacheStats)>,
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        let stats = CacheStats::new();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.evictions, 0);
        assert_eq!(stats.total_keys, 0);
        assert!(stats.oldest_entry.is_none());
    }

    #[test]
    fn test_hit_rate_no_requests() {
        let stats = CacheStats::new();
        assert_eq!(stats.hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate_mixed() {
        let mut stats = CacheStats::new();
        stats.record_hit();
        stats.record_miss();
        assert_eq!(stats.hit_rate(), 0.5);
        assert_eq!(stats.lookups(), 2);
    }

    #[test]
    fn test_merge_sums_counts() {
        let mut a = CacheStats {
            total_keys: 2,
            hits: 8,
            misses: 2,
            evictions: 1,
            memory_usage: 100,
            oldest_entry: Some(50),
            newest_entry: Some(200),
        };
        let b = CacheStats {
            total_keys: 3,
            hits: 1,
            misses: 9,
            evictions: 0,
            memory_usage: 400,
            oldest_entry: Some(10),
            newest_entry: Some(500),
        };

        a.merge(&b);
        assert_eq!(a.total_keys, 5);
        assert_eq!(a.hits, 9);
        assert_eq!(a.misses, 11);
        assert_eq!(a.memory_usage, 500);
        assert_eq!(a.oldest_entry, Some(10));
        assert_eq!(a.newest_entry, Some(500));
        // Weighted: 9 hits over 20 lookups, not the mean of 0.8 and 0.1.
        assert!((a.hit_rate() - 0.45).abs() < f64::EPSILON);
    }

    #[test]
    fn test_merge_with_empty() {
        let mut a = CacheStats::new();
        let b = CacheStats {
            oldest_entry: Some(42),
            newest_entry: Some(42),
            ..CacheStats::new()
        };
        a.merge(&b);
        assert_eq!(a.oldest_entry, Some(42));
        assert_eq!(a.newest_entry, Some(42));
    }
}
