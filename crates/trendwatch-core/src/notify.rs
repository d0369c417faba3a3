//! Notifier that writes to the log and the audit journal

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;
use trendwatch_store::{AuditEvent, AuditEventType, TrendRecord, TrendStore};

use crate::{AlertError, AlertNotifier, TriggeredAlert};

/// Titles listed in a single `TrendsReported` journal entry
const MAX_REPORTED_TITLES: usize = 20;

/// Delivers notifications as structured log lines plus audit events
pub struct JournalNotifier {
    store: Arc<dyn TrendStore>,
}

impl JournalNotifier {
    pub fn new(store: Arc<dyn TrendStore>) -> Self {
        Self { store }
    }

    fn append(&self, event: AuditEventType) -> Result<(), AlertError> {
        self.store
            .append_audit(AuditEvent::new(event))
            .map_err(|e| AlertError::Notify(e.to_string()))
    }
}

#[async_trait]
impl AlertNotifier for JournalNotifier {
    async fn price_alert(&self, alert: &TriggeredAlert) -> Result<(), AlertError> {
        info!(
            symbol = %alert.symbol,
            condition = %alert.condition,
            target = alert.target_price,
            price = alert.current_price,
            at = %trendwatch_util::format_datetime_full(&alert.triggered_at),
            "PRICE ALERT: {} is {} {} (now {})",
            alert.symbol,
            alert.condition,
            alert.target_price,
            alert.current_price
        );
        self.append(AuditEventType::PriceAlertFired {
            symbol: alert.symbol.clone(),
            condition: alert.condition.clone(),
            target_price: alert.target_price,
            current_price: alert.current_price,
        })
    }

    async fn new_trends(&self, trends: &[TrendRecord]) -> Result<(), AlertError> {
        for trend in trends {
            info!(title = %trend.title, score = trend.hot_score, url = %trend.key, "New trend");
        }
        self.append(AuditEventType::TrendsReported {
            count: trends.len(),
            titles: trends
                .iter()
                .take(MAX_REPORTED_TITLES)
                .map(|t| t.title.clone())
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, TimeZone};
    use trendwatch_store::SqliteStore;
    use trendwatch_util::TrendKey;

    #[tokio::test]
    async fn test_price_alert_is_journaled() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let notifier = JournalNotifier::new(store.clone());

        let alert = TriggeredAlert {
            symbol: "AAPL".into(),
            condition: "above".into(),
            target_price: 190.0,
            current_price: 201.5,
            triggered_at: Local.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap(),
        };
        notifier.price_alert(&alert).await.unwrap();

        let events = store.get_recent_audits(10).unwrap();
        assert_eq!(
            events[0].event,
            AuditEventType::PriceAlertFired {
                symbol: "AAPL".into(),
                condition: "above".into(),
                target_price: 190.0,
                current_price: 201.5,
            }
        );
    }

    #[tokio::test]
    async fn test_long_trend_lists_are_capped() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let notifier = JournalNotifier::new(store.clone());
        let now = Local.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap();
        let trends: Vec<_> = (0..25)
            .map(|i| {
                let title = format!("topic {i}");
                TrendRecord::first_seen(TrendKey::from_title("https://x.com/search", &title), title, "X", 1.0, now)
            })
            .collect();

        notifier.new_trends(&trends).await.unwrap();

        match &store.get_recent_audits(1).unwrap()[0].event {
            AuditEventType::TrendsReported { count, titles } => {
                assert_eq!(*count, 25);
                assert_eq!(titles.len(), MAX_REPORTED_TITLES);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
}
