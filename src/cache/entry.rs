//! Cache Entry Module
//!
//! Defines a single cached response together with its access metadata.

use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;

// == Cache Entry ==
/// A cached origin response.
///
/// The payload is immutable once captured; cloning it only bumps a
/// reference count, so readers can copy it out under the store lock cheaply.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Raw response bytes exactly as the origin sent them
    pub payload: Bytes,
    /// Last lookup hit or insertion (Unix milliseconds)
    pub last_accessed: u64,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new entry, stamped as accessed now.
    pub fn new(payload: Bytes) -> Self {
        Self {
            payload,
            last_accessed: current_timestamp_ms(),
        }
    }

    // == Size ==
    /// Byte length of the payload, the amount charged against the cache budget.
    pub fn size(&self) -> usize {
        self.payload.len()
    }

    // == Touch ==
    /// Refreshes the access timestamp.
    ///
    /// Clocks can step backwards; the timestamp never decreases.
    pub fn touch(&mut self) {
        self.last_accessed = self.last_accessed.max(current_timestamp_ms());
    }

    /// Milliseconds since the entry was last accessed.
    pub fn idle_ms(&self) -> u64 {
        current_timestamp_ms().saturating_sub(self.last_accessed)
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
