//! Cache Entry Module
//!
//! Defines the entry structures for the in-memory and file-backed tiers,
//! plus the persisted metadata document for the file tier.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Format version of the persisted metadata file. A version mismatch at
/// load time discards the metadata and starts the cache empty.
pub const METADATA_VERSION: u32 = 1;

// == Memory Entry ==
/// A single entry in the in-memory tier, holding its value inline.
#[derive(Debug, Clone)]
pub struct MemoryEntry {
    /// The stored value
    pub value: Value,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Expiration timestamp (Unix milliseconds)
    pub expires_at: u64,
    /// Number of times this entry has been read
    pub access_count: u64,
    /// Last read timestamp (Unix milliseconds)
    pub last_accessed: u64,
    /// Whether the value was detected as Korean-language content
    pub is_korean: bool,
    /// Serialized size of the value in bytes
    pub size: u64,
}

impl MemoryEntry {
    /// Creates a new entry expiring `ttl_ms` milliseconds from now.
    pub fn new(value: Value, ttl_ms: u64, is_korean: bool, size: u64) -> Self {
        let now = current_timestamp_ms();
        Self {
            value,
            created_at: now,
            expires_at: now + ttl_ms.max(1),
            access_count: 0,
            last_accessed: now,
            is_korean,
            size,
        }
    }

    /// Checks if the entry has expired.
    ///
    /// Boundary condition: an entry is expired when the current time is
    /// greater than or equal to the expiration time.
    pub fn is_expired(&self) -> bool {
        current_timestamp_ms() >= self.expires_at
    }

    /// Records a read: bumps the access count and refreshes `last_accessed`.
    pub fn touch(&mut self) {
        self.access_count += 1;
        self.last_accessed = current_timestamp_ms();
    }
}

// == File Cache Entry ==
/// Bookkeeping record for one file-backed entry. The value itself lives on
/// disk at `file_path`; this record is the source of truth for its location,
/// size accounting, and integrity checksum.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileCacheEntry {
    /// The cache key
    pub key: String,
    /// Path of the data file, relative to the base directory (sharded)
    pub file_path: String,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Expiration timestamp (Unix milliseconds)
    pub expires_at: u64,
    /// Number of times this entry has been read
    pub access_count: u64,
    /// Last read timestamp (Unix milliseconds)
    pub last_accessed: u64,
    /// Free-form tags attached at write time
    #[serde(default)]
    pub tags: Vec<String>,
    /// Whether the value was detected as Korean-language content
    #[serde(default)]
    pub is_korean: bool,
    /// MIME-style content type hint, when known
    #[serde(default)]
    pub content_type: Option<String>,
    /// Size of the serialized payload before compression (bytes)
    pub original_size: u64,
    /// Size after gzip compression, when compressed (bytes)
    #[serde(default)]
    pub compressed_size: Option<u64>,
    /// Whether the on-disk file is gzip-compressed
    pub compressed: bool,
    /// SHA-256 hex digest of the serialized (uncompressed) payload
    pub checksum: String,
    /// Bytes this entry occupies on disk (compressed size when compressed)
    pub size: u64,
}

impl FileCacheEntry {
    /// Checks if the entry has expired (same boundary as [`MemoryEntry`]).
    pub fn is_expired(&self) -> bool {
        current_timestamp_ms() >= self.expires_at
    }
}

// == File Cache Metadata ==
/// The persisted metadata document for the file tier
/// (`<base_dir>/.cache-metadata.json`).
///
/// This map is the single source of truth: an entry present here but missing
/// on disk is invalid and gets purged on next access or validation pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileCacheMetadata {
    /// Format version, checked at load time
    pub version: u32,
    /// All tracked entries, keyed by cache key
    pub entries: HashMap<String, FileCacheEntry>,
    /// Sum of tracked entry sizes in bytes
    pub total_size: u64,
    /// When expired entries were last purged
    pub last_cleanup: DateTime<Utc>,
    /// When this cache directory was first initialized
    pub created: DateTime<Utc>,
}

impl FileCacheMetadata {
    /// Creates empty metadata at the current format version.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            version: METADATA_VERSION,
            entries: HashMap::new(),
            total_size: 0,
            last_cleanup: now,
            created: now,
        }
    }
}

impl Default for FileCacheMetadata {
    fn default() -> Self {
        Self::new()
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards")
        .as_millis() as u64
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn test_memory_entry_creation() {
        let entry = MemoryEntry::new(json!("value"), 60_000, false, 7);

        assert_eq!(entry.value, json!("value"));
        assert_eq!(entry.access_count, 0);
        assert!(entry.expires_at > entry.created_at);
        assert!(!entry.is_expired());
    }

    #[test]
    fn test_memory_entry_expiration() {
        let entry = MemoryEntry::new(json!("value"), 50, false, 7);

        assert!(!entry.is_expired());
        sleep(Duration::from_millis(80));
        assert!(entry.is_expired());
    }

    #[test]
    fn test_memory_entry_touch() {
        let mut entry = MemoryEntry::new(json!("value"), 60_000, false, 7);

        entry.touch();
        entry.touch();
        assert_eq!(entry.access_count, 2);
        assert!(entry.last_accessed >= entry.created_at);
    }

    #[test]
    fn test_expiration_boundary_condition() {
        let now = current_timestamp_ms();
        let entry = MemoryEntry {
            value: json!("v"),
            created_at: now,
            expires_at: now, // expires exactly at creation time
            access_count: 0,
            last_accessed: now,
            is_korean: false,
            size: 3,
        };

        assert!(entry.is_expired(), "Entry should be expired at boundary");
    }

    #[test]
    fn test_file_entry_roundtrips_through_json() {
        let entry = FileCacheEntry {
            key: "doc:1".to_string(),
            file_path: "ab/cd/doc_1_abcd1234".to_string(),
            created_at: 1,
            expires_at: 2,
            access_count: 3,
            last_accessed: 4,
            tags: vec!["news".to_string()],
            is_korean: true,
            content_type: Some("text/html".to_string()),
            original_size: 100,
            compressed_size: Some(40),
            compressed: true,
            checksum: "ff".repeat(32),
            size: 40,
        };

        let json = serde_json::to_string(&entry).unwrap();
        let back: FileCacheEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back.key, entry.key);
        assert_eq!(back.compressed_size, Some(40));
        assert!(back.is_korean);
    }

    #[test]
    fn test_metadata_defaults() {
        let meta = FileCacheMetadata::new();
        assert_eq!(meta.version, METADATA_VERSION);
        assert!(meta.entries.is_empty());
        assert_eq!(meta.total_size, 0);
    }
}
