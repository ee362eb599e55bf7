//! Admin API Module
//!
//! Read-only HTTP endpoints for observing the running proxy.
//!
//! # Endpoints
//! - `GET /stats` - Get cache statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::{create_router, serve_admin};
