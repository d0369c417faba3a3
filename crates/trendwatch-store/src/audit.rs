//! Audit event types

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use trendwatch_util::{RunId, SiteId};

/// Types of audit events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEventType {
    /// Daemon started
    ServiceStarted,

    /// Daemon stopped
    ServiceStopped,

    /// A persisted session passed the liveness probe
    SessionRestored { site: SiteId },

    /// Interactive or manual login succeeded and the session was saved
    LoginCompleted { site: SiteId, manual: bool },

    /// Login gave up
    LoginFailed {
        site: SiteId,
        /// Last step that completed before the failure
        last_completed: String,
        error: String,
    },

    /// A scrape run stored its batch
    ScrapeCompleted {
        run_id: RunId,
        site: SiteId,
        extracted: usize,
        inserted: usize,
        updated: usize,
    },

    /// A scrape run failed before its batch was committed
    ScrapeFailed {
        run_id: RunId,
        site: SiteId,
        error: String,
    },

    /// New trends handed to the notifier
    TrendsReported { count: usize, titles: Vec<String> },

    /// A price alert was delivered
    PriceAlertFired {
        symbol: String,
        condition: String,
        target_price: f64,
        current_price: f64,
    },

    /// Summary of an alert sweep that fired or hit errors
    AlertSweepCompleted {
        checked: usize,
        fired: usize,
        suppressed: usize,
        errors: usize,
    },
}

/// Full audit event with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event ID
    pub id: i64,

    /// Event timestamp
    pub timestamp: DateTime<Local>,

    /// Event type and details
    pub event: AuditEventType,
}

impl AuditEvent {
    pub fn new(event: AuditEventType) -> Self {
        Self {
            id: 0, // Will be set by store
            timestamp: trendwatch_util::now(),
            event,
        }
    }
}
