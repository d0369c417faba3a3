//! Alert deduplication cache
//!
//! Remembers when an alert for a (subject, condition) pair last fired and
//! suppresses it again until the cooldown has elapsed. The cache is owned by a
//! single evaluator and has no internal synchronization.

use chrono::{DateTime, Local};
use std::collections::HashMap;
use std::time::Duration;

/// Default cooldown: one notification per rule per day
pub const DEFAULT_ALERT_COOLDOWN: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct AlertKey {
    subject: String,
    condition: String,
}

impl AlertKey {
    fn new(subject: &str, condition: &str) -> Self {
        Self {
            subject: subject.to_string(),
            condition: condition.to_string(),
        }
    }
}

/// Process-lifetime memory of fired alerts
#[derive(Debug)]
pub struct AlertDedupCache {
    cooldown: chrono::Duration,
    entries: HashMap<AlertKey, DateTime<Local>>,
}

impl AlertDedupCache {
    /// Create a cache with the given cooldown window
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown: chrono::Duration::from_std(cooldown).unwrap_or(chrono::Duration::MAX),
            entries: HashMap::new(),
        }
    }

    /// Whether an alert for this exact pair fired within the cooldown window
    pub fn should_suppress(&self, subject: &str, condition: &str) -> bool {
        self.should_suppress_at(subject, condition, crate::now())
    }

    /// Same as [`should_suppress`](Self::should_suppress) with an explicit clock
    pub fn should_suppress_at(&self, subject: &str, condition: &str, now: DateTime<Local>) -> bool {
        match self.entries.get(&AlertKey::new(subject, condition)) {
            Some(fired_at) => now.signed_duration_since(*fired_at) < self.cooldown,
            None => false,
        }
    }

    /// Record a successful notification, replacing any earlier timestamp
    pub fn record_fired(&mut self, subject: &str, condition: &str, at: DateTime<Local>) {
        self.entries.insert(AlertKey::new(subject, condition), at);
        tracing::info!(
            subject,
            condition,
            cooldown_secs = self.cooldown.num_seconds(),
            "Alert recorded, suppressing repeats"
        );
    }

    /// Drop entries whose cooldown has elapsed.
    ///
    /// Expired entries never suppress anything, so this only bounds memory.
    pub fn purge_expired(&mut self, now: DateTime<Local>) -> usize {
        let before = self.entries.len();
        let cooldown = self.cooldown;
        self.entries
            .retain(|_, fired_at| now.signed_duration_since(*fired_at) < cooldown);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for AlertDedupCache {
    fn default() -> Self {
        Self::new(DEFAULT_ALERT_COOLDOWN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_suppressed_within_cooldown() {
        let mut cache = AlertDedupCache::default();
        cache.record_fired("AAPL", "above", t0());

        assert!(cache.should_suppress_at("AAPL", "above", t0() + chrono::Duration::hours(1)));
        assert!(!cache.should_suppress_at("AAPL", "above", t0() + chrono::Duration::hours(25)));
    }

    #[test]
    fn test_cooldown_boundary_is_exclusive() {
        let mut cache = AlertDedupCache::default();
        cache.record_fired("AAPL", "above", t0());
        assert!(!cache.should_suppress_at("AAPL", "above", t0() + chrono::Duration::hours(24)));
    }

    #[test]
    fn test_scoped_by_exact_pair() {
        let mut cache = AlertDedupCache::default();
        cache.record_fired("AAPL", "above", t0());

        let later = t0() + chrono::Duration::minutes(5);
        assert!(!cache.should_suppress_at("AAPL", "below", later));
        assert!(!cache.should_suppress_at("MSFT", "above", later));
    }

    #[test]
    fn test_unknown_pair_not_suppressed() {
        let cache = AlertDedupCache::default();
        assert!(!cache.should_suppress_at("AAPL", "above", t0()));
    }

    #[test]
    fn test_record_overwrites() {
        let mut cache = AlertDedupCache::new(Duration::from_secs(3600));
        cache.record_fired("AAPL", "above", t0());
        let refired = t0() + chrono::Duration::hours(2);
        cache.record_fired("AAPL", "above", refired);

        assert!(cache.should_suppress_at("AAPL", "above", refired + chrono::Duration::minutes(30)));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_purge_expired_keeps_live_entries() {
        let mut cache = AlertDedupCache::default();
        cache.record_fired("AAPL", "above", t0());
        cache.record_fired("MSFT", "below", t0() + chrono::Duration::hours(20));

        let removed = cache.purge_expired(t0() + chrono::Duration::hours(30));
        assert_eq!(removed, 1);
        assert!(cache.should_suppress_at("MSFT", "below", t0() + chrono::Duration::hours(30)));
    }
}
