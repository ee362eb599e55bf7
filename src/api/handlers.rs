//! Admin API Handlers
//!
//! HTTP request handlers for each admin endpoint.

use std::sync::Arc;
use std::time::Instant;

use axum::{extract::State, Json};

use crate::cache::CacheStore;
use crate::models::{HealthResponse, StatsResponse};

/// Application state shared across all admin handlers.
///
/// Holds the same cache instance the connection handlers use.
#[derive(Clone)]
pub struct AppState {
    /// Shared response cache
    pub cache: Arc<CacheStore>,
    /// When the proxy started serving
    pub started_at: Instant,
}

impl AppState {
    /// Creates a new AppState around the shared cache.
    pub fn new(cache: Arc<CacheStore>) -> Self {
        Self {
            cache,
            started_at: Instant::now(),
        }
    }
}

/// Handler for GET /stats
///
/// Returns current cache statistics.
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let stats = state.cache.stats();
    Json(StatsResponse::new(&stats, state.cache.max_cache_size()))
}

/// Handler for GET /health
///
/// Returns health status of the proxy.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::healthy(state.started_at.elapsed().as_secs()))
}
