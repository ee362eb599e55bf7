//! Background Tasks Module
//!
//! Contains background tasks that run periodically during proxy operation.
//!
//! # Tasks
//! - Stats reporter: logs cache statistics at a configured interval

mod reporter;

pub use reporter::spawn_stats_reporter;
