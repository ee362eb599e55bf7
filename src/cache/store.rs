//! Cache Store Module
//!
//! Shared response cache combining an O(1) LRU map with a byte budget.
//! One mutex guards the whole structure; it is held only for in-memory
//! work and never across network I/O.

use bytes::Bytes;
use lru::LruCache;
use parking_lot::Mutex;
use tracing::debug;

use crate::cache::{CacheEntry, CacheStats};
use crate::config::Config;

// == Cache Store ==
/// Thread-safe response cache bounded by total payload bytes.
///
/// Share it between connection tasks with an `Arc<CacheStore>`.
#[derive(Debug)]
pub struct CacheStore {
    inner: Mutex<CacheInner>,
    /// Total byte budget
    max_cache_size: usize,
    /// Per-entry byte limit
    max_object_size: usize,
}

#[derive(Debug)]
struct CacheInner {
    /// Entries ordered from most to least recently accessed
    entries: LruCache<String, CacheEntry>,
    /// Sum of all entry payload sizes
    total_size: usize,
    stats: CacheStats,
}

impl CacheInner {
    // == Evict One ==
    /// Unlinks the least recently accessed entry and releases its payload.
    fn evict_one(&mut self) -> Option<String> {
        let (key, entry) = self.entries.pop_lru()?;
        self.total_size -= entry.size();
        self.stats.record_eviction();
        debug!(key = %key, size = entry.size(), idle_ms = entry.idle_ms(), "Evicted cache entry");
        Some(key)
    }
}

impl CacheStore {
    // == Constructor ==
    /// Creates an empty store with the given byte budget and object limit.
    ///
    /// # Arguments
    /// * `max_cache_size` - Upper bound on the sum of all payload sizes
    /// * `max_object_size` - Payloads larger than this are never stored
    pub fn new(max_cache_size: usize, max_object_size: usize) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: LruCache::unbounded(),
                total_size: 0,
                stats: CacheStats::new(),
            }),
            max_cache_size,
            max_object_size,
        }
    }

    /// Creates an empty store sized from the configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.max_cache_size, config.max_object_size)
    }

    // == Lookup ==
    /// Returns the cached response for `key`, if any.
    ///
    /// A hit moves the entry to the front of the recency order and refreshes
    /// its timestamp. The returned `Bytes` shares the stored buffer, so the
    /// caller can write it out after the lock is gone.
    pub fn lookup(&self, key: &str) -> Option<Bytes> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        match inner.entries.get_mut(key) {
            Some(entry) => {
                entry.touch();
                let payload = entry.payload.clone();
                inner.stats.record_hit();
                Some(payload)
            }
            None => {
                inner.stats.record_miss();
                None
            }
        }
    }

    // == Insert ==
    /// Stores `payload` under `key`, replacing any previous entry for the key.
    ///
    /// Payloads over the object limit are refused and `false` is returned.
    /// After the new entry is linked, least recently accessed entries are
    /// evicted until the byte budget holds again.
    pub fn insert(&self, key: String, payload: Bytes) -> bool {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        if payload.len() > self.max_object_size {
            inner.stats.record_rejection();
            debug!(key = %key, size = payload.len(), "Refused oversized response");
            return false;
        }

        let entry = CacheEntry::new(payload);
        inner.total_size += entry.size();
        if let Some((_, replaced)) = inner.entries.push(key, entry) {
            inner.total_size -= replaced.size();
        }
        inner.stats.record_insertion();

        while inner.total_size > self.max_cache_size {
            if inner.evict_one().is_none() {
                break;
            }
        }
        true
    }

    // == Evict One ==
    /// Removes the least recently accessed entry, returning its key.
    ///
    /// Returns None if the store is empty.
    pub fn evict_one(&self) -> Option<String> {
        self.inner.lock().evict_one()
    }

    // == Stats ==
    /// Returns a snapshot of the cache statistics.
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        let mut stats = inner.stats.clone();
        stats.set_occupancy(inner.entries.len(), inner.total_size);
        stats
    }

    // == Contains ==
    /// Checks for `key` without refreshing its recency.
    pub fn contains(&self, key: &str) -> bool {
        self.inner.lock().entries.contains(key)
    }

    /// Sum of the payload sizes currently held.
    pub fn total_size(&self) -> usize {
        self.inner.lock().total_size
    }

    /// Returns the current number of entries in the cache.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    pub fn max_cache_size(&self) -> usize {
        self.max_cache_size
    }

    pub fn max_object_size(&self) -> usize {
        self.max_object_size
    }

    /// Recomputes the byte total from the entries themselves.
    #[cfg(test)]
    pub(crate) fn recount(&self) -> usize {
        let inner = self.inner.lock();
        inner.entries.iter().map(|(_, entry)| entry.size()).sum()
    }
}
