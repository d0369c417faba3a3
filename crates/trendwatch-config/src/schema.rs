//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Process-level settings
    #[serde(default)]
    pub service: RawServiceConfig,

    /// Job cadence
    #[serde(default)]
    pub schedule: RawScheduleConfig,

    /// The watched site
    #[serde(default)]
    pub site: RawSiteConfig,

    /// Quote retrieval for price alerts
    #[serde(default)]
    pub quotes: RawQuotesConfig,

    /// Price alert rules
    #[serde(default)]
    pub price_alerts: Vec<RawPriceAlert>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawServiceConfig {
    /// Data directory for the database, sessions and screenshots
    pub data_dir: Option<PathBuf>,

    /// WebDriver server endpoint (default: http://localhost:9515)
    pub webdriver_url: Option<String>,

    /// "chrome" or "firefox"
    pub browser: Option<String>,

    pub headless: Option<bool>,

    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawScheduleConfig {
    pub scrape_interval_secs: Option<u64>,
    pub alert_interval_secs: Option<u64>,
    pub initial_scrape_delay_secs: Option<u64>,
    pub alert_cooldown_secs: Option<u64>,
    /// Rows shown by the dashboard view
    pub dashboard_limit: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawSiteConfig {
    /// Site identifier, also the session file prefix
    pub id: Option<String>,

    /// Page used to probe a restored session
    pub base_url: Option<String>,
    pub login_url: Option<String>,

    /// Path of the authenticated landing route
    pub home_path: Option<String>,
    pub trends_url: Option<String>,

    /// Prefix of the identity key for trend records
    pub search_url: Option<String>,

    /// Tag written into every trend record's `source`
    pub source_label: Option<String>,

    /// Unit words that mark an item's popularity text
    pub popularity_keywords: Option<Vec<String>>,

    #[serde(default)]
    pub selectors: RawSelectors,

    #[serde(default)]
    pub timeouts: RawTimeouts,

    #[serde(default)]
    pub credentials: RawCredentials,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawSelectors {
    pub authenticated: Option<String>,
    pub username: Option<String>,
    pub challenge: Option<String>,
    pub password: Option<String>,
    pub timeline: Option<String>,
    pub trend_item: Option<String>,
    pub trend_title: Option<String>,
    pub trend_fragment: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawTimeouts {
    pub restore_probe_secs: Option<u64>,
    pub navigation_secs: Option<u64>,
    pub element_secs: Option<u64>,
    pub password_secs: Option<u64>,
    pub confirm_secs: Option<u64>,
    pub settle_ms: Option<u64>,
    pub manual_login_secs: Option<u64>,
}

/// Names of the environment variables holding credentials.
///
/// Secrets themselves never live in the config file.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawCredentials {
    pub username_env: Option<String>,
    pub password_env: Option<String>,
    pub verification_env: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawQuotesConfig {
    /// URL with a `{symbol}` placeholder, returning a JSON object
    pub url_template: Option<String>,

    /// Top-level JSON field carrying the last traded price
    pub price_field: Option<String>,

    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawPriceAlert {
    pub symbol: String,

    /// "above" or "below"
    pub condition: String,

    pub target_price: f64,
}
