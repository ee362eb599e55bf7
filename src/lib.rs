//! Caching Proxy - A forwarding HTTP proxy with a shared response cache
//!
//! Relays GET requests to origin servers with rewritten headers and answers
//! repeat requests from a size-bounded LRU cache.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod proxy;
pub mod tasks;

pub use api::AppState;
pub use cache::CacheStore;
pub use config::Config;
pub use error::{ProxyError, Result, Stage};
pub use proxy::{ConnectionHandler, Outcome, ProxyListener};
pub use tasks::spawn_stats_reporter;
