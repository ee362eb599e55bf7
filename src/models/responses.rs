//! Response DTOs for the admin API
//!
//! Defines the structure of outgoing admin response bodies.

use serde::Serialize;

use crate::cache::CacheStats;

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Lookups served from the cache
    pub hits: u64,
    /// Lookups forwarded to the origin
    pub misses: u64,
    /// Responses stored
    pub insertions: u64,
    /// Entries evicted to respect the byte budget
    pub evictions: u64,
    /// Responses refused as too large
    pub rejected: u64,
    /// Current number of entries in cache
    pub total_entries: usize,
    /// Current payload bytes held
    pub total_bytes: usize,
    /// Configured byte budget
    pub max_cache_size: usize,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
}

impl StatsResponse {
    /// Creates a new StatsResponse from a stats snapshot
    pub fn new(stats: &CacheStats, max_cache_size: usize) -> Self {
        Self {
            hits: stats.hits,
            misses: stats.misses,
            insertions: stats.insertions,
            evictions: stats.evictions,
            rejected: stats.rejected,
            total_entries: stats.total_entries,
            total_bytes: stats.total_bytes,
            max_cache_size,
            hit_rate: stats.hit_rate(),
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
    /// Seconds since the admin state was created
    pub uptime_secs: u64,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy(uptime_secs: u64) -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            uptime_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_response_from_snapshot() {
        let mut stats = CacheStats::new();
        for _ in 0..8 {
            stats.record_hit();
        }
        stats.record_miss();
        stats.record_miss();
        stats.set_occupancy(4, 2048);

        let resp = StatsResponse::new(&stats, 1_049_000);
        assert!((resp.hit_rate - 0.8).abs() < 0.001);
        assert_eq!(resp.total_bytes, 2048);
        assert_eq!(resp.max_cache_size, 1_049_000);
    }

    #[test]
    fn test_stats_response_zero_requests() {
        let resp = StatsResponse::new(&CacheStats::new(), 100);
        assert_eq!(resp.hit_rate, 0.0);
    }

    #[test]
    fn test_health_response_serialize() {
        let resp = HealthResponse::healthy(42);
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("healthy"));
        assert!(json.contains("timestamp"));
        assert!(json.contains("\"uptime_secs\":42"));
    }
}
