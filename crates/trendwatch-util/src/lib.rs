//! Shared utilities for trendwatch
//!
//! This crate provides:
//! - ID types (SiteId, TrendKey, RunId)
//! - Time utilities (mockable wall clock, formatting helpers)
//! - Alert dedup cache
//! - Default paths for config, data, session, and screenshot directories

mod dedup;
mod ids;
mod paths;
mod time;

pub use dedup::*;
pub use ids::*;
pub use paths::*;
pub use time::*;
