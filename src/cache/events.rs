//! Cache Events Module
//!
//! Observer interface for cache notifications. Consumers register listeners
//! on the manager (or a backend) and receive hit/miss/set/delete/eviction/
//! cleanup/disk-usage events as they happen.

use std::sync::{Arc, RwLock};

// == Cache Event ==
/// A cache notification with its payload.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheEvent {
    /// A lookup found a live entry
    Hit { backend: String, key: String },
    /// A lookup found nothing (absent, expired, or unreadable)
    Miss { backend: String, key: String },
    /// An entry was written
    Set {
        backend: String,
        key: String,
        /// Bytes the entry occupies in the backend
        size: u64,
    },
    /// An entry was removed on request
    Delete { backend: String, key: String },
    /// An entry was removed to stay under the size budget
    Eviction {
        backend: String,
        key: String,
        /// Bytes released by the eviction
        freed: u64,
    },
    /// A cleanup pass finished
    Cleanup { backend: String, removed: usize },
    /// Disk-usage reconciliation found drift and adopted the actual figure
    DiskUsage {
        backend: String,
        /// Bytes the metadata claimed
        tracked: u64,
        /// Bytes actually on disk
        actual: u64,
    },
}

// == Listener Trait ==
/// Receives cache events. Implementations must be cheap and non-blocking;
/// events are emitted synchronously from cache operations.
pub trait CacheEventListener: Send + Sync {
    /// Called for every emitted event.
    fn on_event(&self, event: &CacheEvent);
}

impl<F> CacheEventListener for F
where
    F: Fn(&CacheEvent) + Send + Sync,
{
    fn on_event(&self, event: &CacheEvent) {
        self(event)
    }
}

// == Event Registry ==
/// Holds registered listeners and fans events out to them. Cloning shares
/// the listener list, so one registry can serve the manager and its backends.
#[derive(Clone, Default)]
pub struct EventRegistry {
    listeners: Arc<RwLock<Vec<Arc<dyn CacheEventListener>>>>,
}

impl EventRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener for all future events.
    pub fn subscribe(&self, listener: Arc<dyn CacheEventListener>) {
        self.listeners
            .write()
            .expect("event listener lock poisoned")
            .push(listener);
    }

    /// Delivers an event to every registered listener.
    pub fn emit(&self, event: CacheEvent) {
        let listeners = self
            .listeners
            .read()
            .expect("event listener lock poisoned");
        for listener in listeners.iter() {
            listener.on_event(&event);
        }
    }
}

impl std::fmt::Debug for EventRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.listeners.read().map(|l| l.len()).unwrap_or(0);
        f.debug_struct("EventRegistry")
            .field("listeners", &count)
            .finish()
    }
}
