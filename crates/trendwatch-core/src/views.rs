//! Read-only views over stored trends

use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::warn;
use trendwatch_store::{StoreResult, TrendRecord, TrendStore};

/// Latest trends, or an empty list plus the reason the store could not be read
#[derive(Debug, Clone, Default, Serialize)]
pub struct DashboardView {
    pub trends: Vec<TrendRecord>,
    pub error: Option<String>,
}

/// Newest trends first. Never fails; store errors degrade to an empty view.
pub fn dashboard(store: &dyn TrendStore, limit: usize) -> DashboardView {
    match store.latest_trends(limit) {
        Ok(trends) => DashboardView { trends, error: None },
        Err(e) => {
            warn!(error = %e, "Dashboard query failed");
            DashboardView {
                trends: Vec::new(),
                error: Some(e.to_string()),
            }
        }
    }
}

/// Trends seen at or after `since`, hottest first
pub fn top_trends(store: &dyn TrendStore, since: DateTime<Local>, limit: usize) -> StoreResult<Vec<TrendRecord>> {
    store.trends_updated_since(since, limit)
}
