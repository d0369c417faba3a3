//! Price threshold alerts

use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use trendwatch_config::{AlertCondition, PriceAlertRule};
use trendwatch_store::TrendRecord;
use trendwatch_util::AlertDedupCache;

/// Errors from alert collaborators
#[derive(Debug, Error)]
pub enum AlertError {
    #[error("Quote lookup failed for {symbol}: {message}")]
    Quote { symbol: String, message: String },

    #[error("Notification failed: {0}")]
    Notify(String),
}

/// Where current prices come from
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Last traded price. `Ok(None)` when the source has no price for the symbol.
    async fn last_price(&self, symbol: &str) -> Result<Option<f64>, AlertError>;
}

/// Outbound delivery of alerts and newly seen trends
#[async_trait]
pub trait AlertNotifier: Send + Sync {
    async fn price_alert(&self, alert: &TriggeredAlert) -> Result<(), AlertError>;

    async fn new_trends(&self, trends: &[TrendRecord]) -> Result<(), AlertError>;
}

/// Payload for a rule whose threshold was crossed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TriggeredAlert {
    pub symbol: String,
    pub condition: String,
    pub target_price: f64,
    pub current_price: f64,
    pub triggered_at: DateTime<Local>,
}

/// Counters for one sweep over all rules
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub checked: usize,
    pub fired: usize,
    /// Still inside the cooldown window
    pub suppressed: usize,
    /// No price available
    pub skipped: usize,
    pub errors: usize,
}

impl SweepReport {
    /// Whether anything happened that is worth journaling
    pub fn is_notable(&self) -> bool {
        self.fired > 0 || self.errors > 0
    }
}

/// Evaluates price rules, owning the dedup cache
pub struct PriceAlertMonitor {
    rules: Vec<PriceAlertRule>,
    cache: AlertDedupCache,
}

impl PriceAlertMonitor {
    pub fn new(rules: Vec<PriceAlertRule>, cache: AlertDedupCache) -> Self {
        Self { rules, cache }
    }

    pub fn rules(&self) -> &[PriceAlertRule] {
        &self.rules
    }

    pub fn cache(&self) -> &AlertDedupCache {
        &self.cache
    }

    /// Check every rule once. Per-rule failures are counted and logged.
    pub async fn sweep(
        &mut self,
        quotes: &dyn QuoteSource,
        notifier: &dyn AlertNotifier,
        now: DateTime<Local>,
    ) -> SweepReport {
        let purged = self.cache.purge_expired(now);
        if purged > 0 {
            debug!(purged, "Expired alert cooldowns dropped");
        }

        let mut report = SweepReport::default();
        for rule in &self.rules {
            report.checked += 1;
            let condition = rule.condition.as_str();

            if self.cache.should_suppress_at(&rule.symbol, condition, now) {
                debug!(symbol = %rule.symbol, condition, "Alert in cooldown, skipping");
                report.suppressed += 1;
                continue;
            }

            let price = match quotes.last_price(&rule.symbol).await {
                Ok(Some(price)) => price,
                Ok(None) => {
                    warn!(symbol = %rule.symbol, "No price available");
                    report.skipped += 1;
                    continue;
                }
                Err(e) => {
                    warn!(symbol = %rule.symbol, error = %e, "Quote lookup failed");
                    report.errors += 1;
                    continue;
                }
            };

            if !rule.condition.is_met(price, rule.target_price) {
                continue;
            }

            let alert = TriggeredAlert {
                symbol: rule.symbol.clone(),
                condition: condition.to_string(),
                target_price: rule.target_price,
                current_price: price,
                triggered_at: now,
            };

            match notifier.price_alert(&alert).await {
                Ok(()) => {
                    info!(
                        symbol = %alert.symbol,
                        condition,
                        target = alert.target_price,
                        price = alert.current_price,
                        "Price alert fired"
                    );
                    self.cache.record_fired(&rule.symbol, condition, now);
                    report.fired += 1;
                }
                Err(e) => {
                    warn!(symbol = %rule.symbol, error = %e, "Price alert not delivered");
                    report.errors += 1;
                }
            }
        }

        report
    }
}

/// Describe a rule for logs and CLI output
pub fn describe_rule(rule: &PriceAlertRule) -> String {
    let op = match rule.condition {
        AlertCondition::Above => ">",
        AlertCondition::Below => "<",
    };
    format!("{} {} {}", rule.symbol, op, rule.target_price)
}
