//! Service wiring and the scheduler loop

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{SignalKind, signal};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{error, info, warn};
use trendwatch_browser::Browser;
use trendwatch_config::{BrowserName, Settings, load_config};
use trendwatch_core::{
    AlertNotifier, JournalNotifier, PriceAlertMonitor, QuoteSource, ScrapePipeline, SessionManager,
    SweepReport, dashboard, describe_rule, top_trends,
};
use trendwatch_store::{AuditEvent, AuditEventType, FileSessionStore, SqliteStore, TrendStore};
use trendwatch_util::{AlertDedupCache, database_path, format_datetime_full, format_duration, screenshot_dir, session_dir};
use trendwatch_webdriver::{BrowserKind, WebDriverBrowser, WebDriverConfig};

use crate::quotes::HttpQuoteSource;

/// Loaded configuration plus the shared store
pub struct Service {
    settings: Settings,
    data_dir: PathBuf,
    store: Arc<dyn TrendStore>,
}

impl Service {
    pub fn new(config: &Path, data_dir: Option<PathBuf>) -> Result<Self> {
        let settings =
            load_config(config).with_context(|| format!("Failed to load config from {:?}", config))?;

        info!(
            config_path = %config.display(),
            site = %settings.site.id,
            price_alerts = settings.price_alerts.len(),
            "Configuration loaded"
        );

        let data_dir = data_dir.unwrap_or_else(|| settings.service.data_dir.clone());
        for dir in [data_dir.clone(), session_dir(&data_dir), screenshot_dir(&data_dir)] {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create directory {:?}", dir))?;
        }

        let db_path = database_path(&data_dir);
        let store: Arc<dyn TrendStore> = Arc::new(
            SqliteStore::open(&db_path)
                .with_context(|| format!("Failed to open database {:?}", db_path))?,
        );
        info!(db_path = %db_path.display(), "Store initialized");

        Ok(Self {
            settings,
            data_dir,
            store,
        })
    }

    fn browser(&self, headless: bool) -> Result<Arc<dyn Browser>> {
        let service = &self.settings.service;
        let config = WebDriverConfig {
            endpoint: service.webdriver_url.clone(),
            browser: match service.browser {
                BrowserName::Chrome => BrowserKind::Chrome,
                BrowserName::Firefox => BrowserKind::Firefox,
            },
            headless,
            user_agent: service.user_agent.clone(),
            ..Default::default()
        };
        let browser = WebDriverBrowser::new(config).context("Failed to create WebDriver client")?;
        Ok(Arc::new(browser))
    }

    fn session_manager(&self, headless: bool) -> Result<SessionManager> {
        let site = &self.settings.site;
        let credentials = site.credentials.resolve();
        if credentials.is_none() {
            warn!(
                username_env = %site.credentials.username_env,
                password_env = %site.credentials.password_env,
                "Login credentials not set; only a saved session can be used"
            );
        }

        Ok(SessionManager::new(
            self.browser(headless)?,
            Arc::new(FileSessionStore::new(session_dir(&self.data_dir))),
            site.clone(),
            credentials,
            screenshot_dir(&self.data_dir),
        ))
    }

    fn pipeline(&self, notifier: Arc<dyn AlertNotifier>) -> Result<ScrapePipeline> {
        Ok(ScrapePipeline::new(
            self.session_manager(self.settings.service.headless)?,
            self.store.clone(),
            notifier,
            screenshot_dir(&self.data_dir),
        ))
    }

    fn monitor(&self) -> PriceAlertMonitor {
        PriceAlertMonitor::new(
            self.settings.price_alerts.clone(),
            AlertDedupCache::new(self.settings.schedule.alert_cooldown),
        )
    }

    fn journal(&self, event: AuditEventType) {
        if let Err(e) = self.store.append_audit(AuditEvent::new(event)) {
            warn!(error = %e, "Failed to write audit event");
        }
    }

    /// Run the scheduler until SIGTERM or SIGINT
    pub async fn run(self) -> Result<()> {
        let notifier: Arc<dyn AlertNotifier> = Arc::new(JournalNotifier::new(self.store.clone()));
        let pipeline = self.pipeline(notifier.clone())?;
        let quotes = HttpQuoteSource::new(self.settings.quotes.clone())?;
        let mut monitor = self.monitor();

        let mut sigterm = signal(SignalKind::terminate()).context("Failed to create SIGTERM handler")?;
        let mut sigint = signal(SignalKind::interrupt()).context("Failed to create SIGINT handler")?;

        let schedule = &self.settings.schedule;
        let mut scrape_timer = tokio::time::interval_at(
            Instant::now() + schedule.initial_scrape_delay,
            schedule.scrape_interval,
        );
        scrape_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut alert_timer = tokio::time::interval(schedule.alert_interval);
        alert_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let has_rules = !monitor.rules().is_empty();

        self.journal(AuditEventType::ServiceStarted);
        info!(
            scrape_every = %format_duration(schedule.scrape_interval),
            alert_every = %format_duration(schedule.alert_interval),
            "Service running"
        );

        loop {
            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down gracefully");
                    break;
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down gracefully");
                    break;
                }

                // Runs are awaited inline, so at most one of each kind is in flight
                _ = scrape_timer.tick() => {
                    // Failures are logged and journaled by the pipeline; the next tick retries
                    let _ = pipeline.run().await;
                }

                _ = alert_timer.tick(), if has_rules => {
                    sweep(&mut monitor, &quotes, notifier.as_ref(), self.store.as_ref()).await;
                }
            }
        }

        self.journal(AuditEventType::ServiceStopped);
        info!("Service stopped");
        Ok(())
    }

    /// One scrape run, then exit
    pub async fn scrape_once(self) -> Result<()> {
        let notifier: Arc<dyn AlertNotifier> = Arc::new(JournalNotifier::new(self.store.clone()));
        let report = self.pipeline(notifier)?.run().await?;

        println!(
            "Extracted {} trends ({} skipped): {} new, {} updated",
            report.extracted,
            report.skipped,
            report.inserted.len(),
            report.updated_count
        );
        for trend in &report.inserted {
            println!("  + {} ({})", trend.title, trend.hot_score);
        }
        Ok(())
    }

    /// Operator-assisted login in a visible browser window
    pub async fn manual_login(self) -> Result<()> {
        let manager = self.session_manager(false)?;
        println!(
            "Log in to {} in the browser window (waiting up to {})",
            manager.site().login_url,
            format_duration(manager.site().timeouts.manual_login)
        );

        manager.manual_login().await?;
        self.journal(AuditEventType::LoginCompleted {
            site: self.settings.site.id.clone(),
            manual: true,
        });
        println!("Session saved for {}", self.settings.site.id);
        Ok(())
    }

    /// One sweep over all price alert rules, then exit
    pub async fn alerts_once(self) -> Result<()> {
        let mut monitor = self.monitor();
        if monitor.rules().is_empty() {
            println!("No price alerts configured");
            return Ok(());
        }

        let quotes = HttpQuoteSource::new(self.settings.quotes.clone())?;
        let notifier = JournalNotifier::new(self.store.clone());
        for rule in monitor.rules() {
            println!("  - {}", describe_rule(rule));
        }

        let report = sweep(&mut monitor, &quotes, &notifier, self.store.as_ref()).await;
        println!(
            "Checked {}: {} fired, {} without price, {} errors",
            report.checked, report.fired, report.skipped, report.errors
        );
        Ok(())
    }

    /// Print stored trends, newest first or hottest since a cutoff
    pub fn list(self, limit: Option<usize>, since: Option<Duration>) -> Result<()> {
        let limit = limit.unwrap_or(self.settings.schedule.dashboard_limit);

        let trends = match since {
            Some(window) => {
                let cutoff = trendwatch_util::now()
                    - chrono::Duration::from_std(window).context("Window too large")?;
                top_trends(self.store.as_ref(), cutoff, limit)?
            }
            None => {
                let view = dashboard(self.store.as_ref(), limit);
                if let Some(err) = view.error {
                    anyhow::bail!("Could not read trends: {err}");
                }
                view.trends
            }
        };

        if trends.is_empty() {
            println!("No trends stored yet");
        }
        for trend in trends {
            println!(
                "{:>12.0}  {}  {}",
                trend.hot_score,
                format_datetime_full(&trend.created_at),
                trend.title
            );
        }
        Ok(())
    }
}

/// Run one alert sweep and journal it when something fired or failed
pub async fn sweep(
    monitor: &mut PriceAlertMonitor,
    quotes: &dyn QuoteSource,
    notifier: &dyn AlertNotifier,
    store: &dyn TrendStore,
) -> SweepReport {
    let report = monitor.sweep(quotes, notifier, trendwatch_util::now()).await;
    if report.is_notable() {
        let event = AuditEventType::AlertSweepCompleted {
            checked: report.checked,
            fired: report.fired,
            suppressed: report.suppressed,
            errors: report.errors,
        };
        if let Err(e) = store.append_audit(AuditEvent::new(event)) {
            error!(error = %e, "Failed to journal alert sweep");
        }
    }
    report
}
