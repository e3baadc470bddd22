//! Background Tasks Module
//!
//! Periodic maintenance that runs alongside foreground cache operations.
//!
//! # Tasks
//! - Expiry cleanup: removes TTL-expired entries from a backend
//! - Disk-usage reconciliation: re-syncs the file tier's size bookkeeping

mod cleanup;

pub use cleanup::{spawn_cleanup_task, spawn_disk_usage_task};
