//! Identity-preserving upsert of scraped trends

use chrono::{DateTime, Local};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info};
use trendwatch_store::{StoreError, TrendMutation, TrendRecord, TrendStore};
use trendwatch_util::{TrendKey, normalize_title};

use crate::RawTrend;

/// The batch could not be committed; nothing from it is visible
#[derive(Debug, Error)]
#[error("Failed to persist trend batch: {0}")]
pub struct PersistenceFailure(#[from] pub StoreError);

/// Result of reconciling one batch
#[derive(Debug, Clone, Default)]
pub struct ReconcileOutcome {
    /// Records created by this batch, in first-sighting order
    pub inserted: Vec<TrendRecord>,
    /// Number of existing records that were touched
    pub updated_count: usize,
}

/// Merges scraped trends into the store by identity key
#[derive(Debug, Clone)]
pub struct Reconciler {
    search_url: String,
    source: String,
}

impl Reconciler {
    pub fn new(search_url: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            search_url: search_url.into(),
            source: source.into(),
        }
    }

    pub fn key_for(&self, title: &str) -> TrendKey {
        TrendKey::from_title(&self.search_url, title)
    }

    /// Classify every trend as new or updated and commit the batch atomically
    pub fn reconcile(
        &self,
        batch: &[RawTrend],
        store: &dyn TrendStore,
        now: DateTime<Local>,
    ) -> Result<ReconcileOutcome, PersistenceFailure> {
        // Collapse repeats: first sighting fixes the order, last one the score
        let mut order: Vec<TrendKey> = Vec::new();
        let mut sightings: HashMap<TrendKey, (String, f64)> = HashMap::new();
        for trend in batch {
            let title = normalize_title(&trend.title);
            if title.is_empty() {
                continue;
            }
            let key = self.key_for(&title);
            let score = trend.hot_score();
            match sightings.get_mut(&key) {
                Some(entry) => entry.1 = score,
                None => {
                    order.push(key.clone());
                    sightings.insert(key, (title, score));
                }
            }
        }

        let mut mutations = Vec::with_capacity(order.len());
        let mut outcome = ReconcileOutcome::default();
        for key in order {
            let Some((title, score)) = sightings.remove(&key) else {
                continue;
            };
            if store.get_trend(&key)?.is_some() {
                debug!(key = %key, score, "Known trend, updating score");
                mutations.push(TrendMutation::Touch {
                    key,
                    hot_score: score,
                    updated_at: now,
                });
                outcome.updated_count += 1;
            } else {
                let record = TrendRecord::first_seen(key, title, &self.source, score, now);
                mutations.push(TrendMutation::Insert(record.clone()));
                outcome.inserted.push(record);
            }
        }

        store.apply_batch(&mutations)?;

        info!(
            inserted = outcome.inserted.len(),
            updated = outcome.updated_count,
            "Trend batch reconciled"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use trendwatch_store::{AuditEvent, SqliteStore, StoreResult};

    const SEARCH: &str = "https://x.com/search";

    fn t0() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    fn trend(title: &str, score: &str) -> RawTrend {
        RawTrend {
            title: title.into(),
            raw_score_text: score.into(),
        }
    }

    fn reconciler() -> Reconciler {
        Reconciler::new(SEARCH, "X")
    }

    #[test]
    fn test_same_batch_twice_is_idempotent() {
        let store = SqliteStore::in_memory().unwrap();
        let batch = vec![trend("Rust", "10K posts"), trend("Ferris", "2K posts")];

        let first = reconciler().reconcile(&batch, &store, t0()).unwrap();
        assert_eq!(first.inserted.len(), 2);

        let later = t0() + Duration::hours(1);
        let rescored = vec![trend("Rust", "12K posts"), trend("Ferris", "2K posts")];
        let second = reconciler().reconcile(&rescored, &store, later).unwrap();
        assert!(second.inserted.is_empty());
        assert_eq!(second.updated_count, 2);

        assert_eq!(store.count_trends().unwrap(), 2);
        let rust = store.get_trend(&reconciler().key_for("Rust")).unwrap().unwrap();
        assert_eq!(rust.hot_score, 12_000.0);
        assert_eq!(rust.created_at, t0());
        assert_eq!(rust.updated_at, later);
    }

    #[test]
    fn test_only_new_trends_are_inserted() {
        let store = SqliteStore::in_memory().unwrap();
        reconciler().reconcile(&[trend("A", "1K posts")], &store, t0()).unwrap();

        let outcome = reconciler()
            .reconcile(&[trend("A", "3K posts"), trend("B", "500 posts")], &store, t0())
            .unwrap();

        let titles: Vec<_> = outcome.inserted.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["B"]);
        assert_eq!(outcome.updated_count, 1);
        assert_eq!(outcome.inserted[0].source, "X");
    }

    #[test]
    fn test_title_variants_share_identity() {
        let store = SqliteStore::in_memory().unwrap();
        let batch = vec![
            trend("  Breaking   News ", "1K posts"),
            trend("breaking news", "4K posts"),
        ];

        let outcome = reconciler().reconcile(&batch, &store, t0()).unwrap();
        assert_eq!(outcome.inserted.len(), 1);
        assert_eq!(outcome.inserted[0].title, "Breaking News");
        // Last sighting's score wins
        assert_eq!(outcome.inserted[0].hot_score, 4_000.0);
        assert_eq!(
            outcome.inserted[0].key.as_str(),
            "https://x.com/search?q=breaking%20news"
        );
    }

    /// Delegates to SQLite but fails on the N-th mutation inside the batch
    struct FailingStore {
        inner: SqliteStore,
        fail_at: usize,
    }

    impl TrendStore for FailingStore {
        fn get_trend(&self, key: &TrendKey) -> StoreResult<Option<TrendRecord>> {
            self.inner.get_trend(key)
        }

        fn apply_batch(&self, mutations: &[TrendMutation]) -> StoreResult<()> {
            // Sneak a conflicting insert in so the real transaction aborts part-way
            let mut poisoned = mutations.to_vec();
            if let Some(TrendMutation::Insert(first)) = mutations.first().cloned() {
                poisoned.insert(self.fail_at, TrendMutation::Insert(first));
            }
            self.inner.apply_batch(&poisoned)
        }

        fn latest_trends(&self, limit: usize) -> StoreResult<Vec<TrendRecord>> {
            self.inner.latest_trends(limit)
        }

        fn trends_updated_since(&self, since: DateTime<Local>, limit: usize) -> StoreResult<Vec<TrendRecord>> {
            self.inner.trends_updated_since(since, limit)
        }

        fn count_trends(&self) -> StoreResult<usize> {
            self.inner.count_trends()
        }

        fn append_audit(&self, event: AuditEvent) -> StoreResult<()> {
            self.inner.append_audit(event)
        }

        fn get_recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>> {
            self.inner.get_recent_audits(limit)
        }

        fn is_healthy(&self) -> bool {
            self.inner.is_healthy()
        }
    }

    #[test]
    fn test_failed_batch_leaves_nothing_behind() {
        let store = FailingStore {
            inner: SqliteStore::in_memory().unwrap(),
            fail_at: 2,
        };
        let batch = vec![trend("A", "1"), trend("B", "2"), trend("C", "3")];

        let result = reconciler().reconcile(&batch, &store, t0());
        assert!(matches!(result, Err(PersistenceFailure(_))));
        assert_eq!(store.count_trends().unwrap(), 0);
    }
}
