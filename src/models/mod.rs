//! Response models for the admin API
//!
//! Defines the JSON bodies served by the admin endpoints.

pub mod responses;

// Re-export commonly used types
pub use responses::{HealthResponse, StatsResponse};
