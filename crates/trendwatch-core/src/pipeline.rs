//! One scrape run: session, extraction, reconciliation, notification

use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use trendwatch_store::{AuditEvent, AuditEventType, TrendRecord, TrendStore};
use trendwatch_util::RunId;

use crate::{
    AlertNotifier, ExtractionFailure, LoginFailure, PersistenceFailure, Reconciler, SessionManager,
    SessionSource, extract_trends,
};

/// Why a scrape run produced nothing
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error(transparent)]
    Login(#[from] LoginFailure),

    #[error("Trend extraction failed: {0}")]
    Extraction(#[from] ExtractionFailure),

    #[error(transparent)]
    Persistence(#[from] PersistenceFailure),
}

/// Summary of a successful run
#[derive(Debug, Clone)]
pub struct ScrapeReport {
    pub run_id: RunId,
    pub session: SessionSource,
    pub extracted: usize,
    pub skipped: usize,
    pub inserted: Vec<TrendRecord>,
    pub updated_count: usize,
}

/// Wires the session manager, extractor and reconciler together
pub struct ScrapePipeline {
    sessions: SessionManager,
    store: Arc<dyn TrendStore>,
    notifier: Arc<dyn AlertNotifier>,
    reconciler: Reconciler,
    screenshot_dir: PathBuf,
}

impl ScrapePipeline {
    pub fn new(
        sessions: SessionManager,
        store: Arc<dyn TrendStore>,
        notifier: Arc<dyn AlertNotifier>,
        screenshot_dir: impl Into<PathBuf>,
    ) -> Self {
        let site = sessions.site();
        let reconciler = Reconciler::new(&site.search_url, &site.source_label);
        Self {
            sessions,
            store,
            notifier,
            reconciler,
            screenshot_dir: screenshot_dir.into(),
        }
    }

    /// Run one scrape. Failures are journaled before they are returned.
    pub async fn run(&self) -> Result<ScrapeReport, ScrapeError> {
        let run_id = RunId::new();
        let site = self.sessions.site();
        info!(run_id = %run_id, site = %site.id, "Scrape run starting");

        let authed = match self.sessions.acquire(&site.id).await {
            Ok(authed) => authed,
            Err(failure) => {
                self.journal(AuditEventType::LoginFailed {
                    site: site.id.clone(),
                    last_completed: failure
                        .last_completed
                        .map(|s| s.as_str())
                        .unwrap_or("none")
                        .to_string(),
                    error: failure.reason.clone(),
                });
                return Err(self.fail(run_id, failure.into()));
            }
        };

        self.journal(match authed.source {
            SessionSource::Restored => AuditEventType::SessionRestored { site: site.id.clone() },
            SessionSource::LoggedIn => AuditEventType::LoginCompleted {
                site: site.id.clone(),
                manual: false,
            },
        });
        let session = authed.source;

        let extraction = extract_trends(authed.page(), site, &self.screenshot_dir).await;
        if let Err(e) = authed.close().await {
            debug!(error = %e, "Failed to close browsing context");
        }
        let extraction = extraction.map_err(|e| self.fail(run_id, e.into()))?;

        let outcome = self
            .reconciler
            .reconcile(&extraction.trends, self.store.as_ref(), trendwatch_util::now())
            .map_err(|e| self.fail(run_id, e.into()))?;

        self.journal(AuditEventType::ScrapeCompleted {
            run_id,
            site: site.id.clone(),
            extracted: extraction.trends.len(),
            inserted: outcome.inserted.len(),
            updated: outcome.updated_count,
        });
        info!(
            run_id = %run_id,
            extracted = extraction.trends.len(),
            skipped = extraction.skipped.len(),
            inserted = outcome.inserted.len(),
            updated = outcome.updated_count,
            "Scrape completed"
        );

        if !outcome.inserted.is_empty()
            && let Err(e) = self.notifier.new_trends(&outcome.inserted).await
        {
            warn!(error = %e, count = outcome.inserted.len(), "Could not report new trends");
        }

        Ok(ScrapeReport {
            run_id,
            session,
            extracted: extraction.trends.len(),
            skipped: extraction.skipped.len(),
            inserted: outcome.inserted,
            updated_count: outcome.updated_count,
        })
    }

    fn fail(&self, run_id: RunId, err: ScrapeError) -> ScrapeError {
        error!(run_id = %run_id, error = %err, "Scrape run failed");
        self.journal(AuditEventType::ScrapeFailed {
            run_id,
            site: self.sessions.site().id.clone(),
            error: err.to_string(),
        });
        err
    }

    fn journal(&self, event: AuditEventType) {
        if let Err(e) = self.store.append_audit(AuditEvent::new(event)) {
            warn!(error = %e, "Failed to write audit event");
        }
    }
}
