//! Cache Stats Reporter
//!
//! Background task that periodically logs cache statistics.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::info;

use crate::cache::CacheStore;

/// Spawns a background task that logs cache statistics every
/// `interval_secs` seconds.
///
/// The task runs until aborted through the returned handle, which happens
/// during graceful shutdown.
///
/// # Example
/// ```ignore
/// let cache = Arc::new(CacheStore::new(MAX_CACHE_SIZE, MAX_OBJECT_SIZE));
/// let reporter = spawn_stats_reporter(cache.clone(), 60);
/// // Later, during shutdown:
/// reporter.abort();
/// ```
pub fn spawn_stats_reporter(cache: Arc<CacheStore>, interval_secs: u64) -> JoinHandle<()> {
    let period = Duration::from_secs(interval_secs.max(1));

    tokio::spawn(async move {
        info!("Starting stats reporter with interval of {} seconds", interval_secs);

        let mut ticker = tokio::time::interval(period);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;

            // Snapshot under the store lock, log outside it
            let stats = cache.stats();
            info!(
                hits = stats.hits,
                misses = stats.misses,
                hit_rate = stats.hit_rate(),
                entries = stats.total_entries,
                bytes = stats.total_bytes,
                evictions = stats.evictions,
                rejected = stats.rejected,
                "Cache stats"
            );
        }
    })
}
