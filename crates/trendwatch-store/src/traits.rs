//! Store trait definitions

use chrono::{DateTime, Local};
use trendwatch_util::TrendKey;

use crate::{AuditEvent, StoreResult, TrendMutation, TrendRecord};

/// Main store trait
pub trait TrendStore: Send + Sync {
    // Trend records

    /// Look up a record by identity
    fn get_trend(&self, key: &TrendKey) -> StoreResult<Option<TrendRecord>>;

    /// Apply all mutations in one transaction. Either every mutation is
    /// visible afterwards or none is.
    fn apply_batch(&self, mutations: &[TrendMutation]) -> StoreResult<()>;

    /// Most recently created records first
    fn latest_trends(&self, limit: usize) -> StoreResult<Vec<TrendRecord>>;

    /// Records touched at or after `since`, hottest first
    fn trends_updated_since(&self, since: DateTime<Local>, limit: usize) -> StoreResult<Vec<TrendRecord>>;

    fn count_trends(&self) -> StoreResult<usize>;

    // Audit log

    /// Append an audit event
    fn append_audit(&self, event: AuditEvent) -> StoreResult<()>;

    /// Get recent audit events, newest first
    fn get_recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>>;

    // Health

    /// Check if store is healthy
    fn is_healthy(&self) -> bool;
}
