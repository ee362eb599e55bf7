//! Cache Module
//!
//! Provides the shared response cache: a byte-budgeted store with
//! least-recently-used eviction, keyed by the raw request URI.

mod entry;
mod stats;
mod store;


// Re-export public types
pub use entry::{current_timestamp_ms, CacheEntry};
pub use stats::CacheStats;
pub use store::CacheStore;

// == Public Constants ==
/// Total byte budget of the cache
pub const MAX_CACHE_SIZE: usize = 1_049_000;

/// Largest single response that may be cached
pub const MAX_OBJECT_SIZE: usize = 102_400;
