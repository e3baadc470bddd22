//! Error types for the cache subsystem
//!
//! Provides unified error handling using thiserror.
//!
//! Almost every failure inside the cache is absorbed and turned into a miss
//! or a logged warning; the variants here cover the few cases that are
//! surfaced to callers (oversized payloads, unusable configuration, and an
//! all-backends write failure) plus the I/O and serialization sources that
//! backends handle internally.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache subsystem.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Serialized value exceeds the backend's maximum file size
    #[error("Value of {size} bytes exceeds maximum of {max} bytes")]
    CapacityExceeded {
        /// Serialized payload size in bytes
        size: u64,
        /// Configured maximum in bytes
        max: u64,
    },

    /// Base directory or other configuration is unusable at initialization
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Underlying file-system failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Value could not be serialized or deserialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend-local failure (network, storage, ...)
    #[error("Backend error: {0}")]
    Backend(String),

    /// Every configured backend rejected a write
    #[error("All cache backends failed: {0}")]
    AllBackendsFailed(String),
}

// == Result Type Alias ==
/// Convenience Result type for the cache subsystem.
pub type Result<T> = std::result::Result<T, CacheError>;
