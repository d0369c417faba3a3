//! Integration tests for trendwatchd
//!
//! These tests drive the same components the daemon wires together, with the
//! mock browser standing in for WebDriver and real files for the store and
//! session snapshots.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use trendwatch_browser::{MockBrowser, MockEffect, MockElement, MockRoute, StorageState};
use trendwatch_config::{Credentials, Settings, SiteSettings, parse_config};
use trendwatch_core::{
    AlertError, JournalNotifier, PriceAlertMonitor, QuoteSource, ScrapePipeline, SessionManager,
    SessionSource, dashboard,
};
use trendwatch_store::{AuditEventType, FileSessionStore, SessionStateStore, SqliteStore, TrendStore};
use trendwatch_util::{AlertDedupCache, SiteId, database_path, screenshot_dir, session_dir};

const CONFIG: &str = r#"
config_version = 1

[site]
id = "x"
source_label = "X"

[schedule]
alert_cooldown_secs = 86400

[quotes]
url_template = "https://quotes.example.com/{symbol}"

[[price_alerts]]
symbol = "AAPL"
condition = "above"
target_price = 190.0

[[price_alerts]]
symbol = "TSLA"
condition = "below"
target_price = 100.0
"#;

fn settings() -> Settings {
    let mut settings = parse_config(CONFIG).unwrap();
    let t = &mut settings.site.timeouts;
    t.restore_probe = Duration::from_millis(50);
    t.navigation = Duration::from_millis(50);
    t.element = Duration::from_millis(50);
    t.password = Duration::from_millis(50);
    t.confirm = Duration::from_millis(50);
    t.settle = Duration::from_millis(1);
    settings
}

fn session_cookie() -> StorageState {
    StorageState {
        cookies: vec![trendwatch_browser::Cookie::new("auth_token", "abc").with_domain(".x.com")],
        origins: vec![],
    }
}

/// A fake x.com: login form, a home page, and a trending page
fn fake_site(site: &SiteSettings, trends: &[(&str, &str)]) -> MockBrowser {
    let s = &site.selectors;
    let home = format!("{}{}", site.base_url, site.home_path);

    let mut timeline = MockElement::new(&s.timeline);
    for (title, posts) in trends {
        timeline = timeline.child(
            MockElement::new(&s.trend_item)
                .child(MockElement::new(&s.trend_fragment).text("Trending"))
                .child(MockElement::new(&s.trend_title).text(*title))
                .child(MockElement::new(&s.trend_fragment).text(*posts)),
        );
    }

    MockBrowser::new()
        .with_route(&site.login_url, MockRoute::new().element(MockElement::new(&s.username)))
        .with_route(
            &home,
            MockRoute::new()
                .authenticated_only()
                .element(MockElement::new(&s.authenticated)),
        )
        .with_route(
            &site.base_url,
            MockRoute::new()
                .authenticated_only()
                .element(MockElement::new(&s.authenticated)),
        )
        .with_route(&site.trends_url, MockRoute::new().element(timeline))
        .on_press(&s.username, MockEffect::Reveal(MockElement::new(&s.password)))
        .on_press(
            &s.password,
            MockEffect::Navigate {
                url: home,
                authenticate: true,
            },
        )
        .accept_state(session_cookie())
        .issue_state(session_cookie())
}

fn pipeline(settings: &Settings, browser: &MockBrowser, data_dir: &Path, store: Arc<SqliteStore>) -> ScrapePipeline {
    let credentials = Credentials {
        username: "alice".into(),
        password: "hunter2".into(),
        verification_identifier: None,
    };
    let manager = SessionManager::new(
        Arc::new(browser.clone()),
        Arc::new(FileSessionStore::new(session_dir(data_dir))),
        settings.site.clone(),
        Some(credentials),
        screenshot_dir(data_dir),
    );
    ScrapePipeline::new(
        manager,
        store.clone(),
        Arc::new(JournalNotifier::new(store)),
        screenshot_dir(data_dir),
    )
}

#[tokio::test]
async fn test_session_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let settings = settings();
    let browser = fake_site(&settings.site, &[("Rust 2024", "12K posts"), ("Ferris", "800 posts")]);

    // First process: interactive login, session written to disk
    {
        let store = Arc::new(SqliteStore::open(database_path(dir.path())).unwrap());
        let report = pipeline(&settings, &browser, dir.path(), store).run().await.unwrap();
        assert_eq!(report.session, SessionSource::LoggedIn);
        assert_eq!(report.inserted.len(), 2);
    }

    let sessions = FileSessionStore::new(session_dir(dir.path()));
    assert!(sessions.path_for(&SiteId::new("x")).exists());
    assert_eq!(sessions.load(&SiteId::new("x")).unwrap(), Some(session_cookie()));

    // Second process: restored session, no typing, no new trends
    let fills_before = browser.filled_selectors().len();
    let store = Arc::new(SqliteStore::open(database_path(dir.path())).unwrap());
    let report = pipeline(&settings, &browser, dir.path(), store.clone())
        .run()
        .await
        .unwrap();
    assert_eq!(report.session, SessionSource::Restored);
    assert!(report.inserted.is_empty());
    assert_eq!(report.updated_count, 2);
    assert_eq!(browser.filled_selectors().len(), fills_before);

    let view = dashboard(store.as_ref(), 10);
    assert!(view.error.is_none());
    assert_eq!(view.trends.len(), 2);

    let reported: Vec<_> = store
        .get_recent_audits(50)
        .unwrap()
        .into_iter()
        .filter_map(|e| match e.event {
            AuditEventType::TrendsReported { count, .. } => Some(count),
            _ => None,
        })
        .collect();
    assert_eq!(reported, vec![2]);
}

#[tokio::test]
async fn test_corrupt_session_file_falls_back_to_login() {
    let dir = tempfile::tempdir().unwrap();
    let settings = settings();
    let browser = fake_site(&settings.site, &[("Rust", "1K posts")]);

    let sessions = FileSessionStore::new(session_dir(dir.path()));
    std::fs::create_dir_all(sessions.dir()).unwrap();
    std::fs::write(sessions.path_for(&SiteId::new("x")), "{ truncated").unwrap();

    let store = Arc::new(SqliteStore::open(database_path(dir.path())).unwrap());
    let report = pipeline(&settings, &browser, dir.path(), store).run().await.unwrap();
    assert_eq!(report.session, SessionSource::LoggedIn);
    assert_eq!(sessions.load(&SiteId::new("x")).unwrap(), Some(session_cookie()));
}

struct StaticQuotes(HashMap<&'static str, f64>);

#[async_trait]
impl QuoteSource for StaticQuotes {
    async fn last_price(&self, symbol: &str) -> Result<Option<f64>, AlertError> {
        Ok(self.0.get(symbol).copied())
    }
}

#[tokio::test]
async fn test_price_alerts_from_config() {
    let settings = settings();
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    let notifier = JournalNotifier::new(store.clone());
    let quotes = StaticQuotes(HashMap::from([("AAPL", 195.0), ("TSLA", 120.0)]));
    let mut monitor = PriceAlertMonitor::new(
        settings.price_alerts.clone(),
        AlertDedupCache::new(settings.schedule.alert_cooldown),
    );

    let now = trendwatch_util::now();
    let first = monitor.sweep(&quotes, &notifier, now).await;
    assert_eq!(first.checked, 2);
    assert_eq!(first.fired, 1);

    let again = monitor.sweep(&quotes, &notifier, now + chrono::Duration::hours(2)).await;
    assert_eq!(again.fired, 0);
    assert_eq!(again.suppressed, 1);

    let fired: Vec<_> = store
        .get_recent_audits(10)
        .unwrap()
        .into_iter()
        .filter_map(|e| match e.event {
            AuditEventType::PriceAlertFired { symbol, .. } => Some(symbol),
            _ => None,
        })
        .collect();
    assert_eq!(fired, vec!["AAPL".to_string()]);
}
