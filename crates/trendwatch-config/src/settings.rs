//! Validated settings with defaults applied

use crate::schema::{
    RawConfig, RawCredentials, RawPriceAlert, RawQuotesConfig, RawScheduleConfig, RawSelectors, RawServiceConfig,
    RawSiteConfig, RawTimeouts,
};
use crate::validation::{parse_browser, parse_condition};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use trendwatch_util::{default_data_dir, SiteId, DEFAULT_ALERT_COOLDOWN, TRENDWATCH_DATA_DIR_ENV};

/// Validated configuration ready for use by the daemon
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub service: ServiceSettings,
    pub schedule: ScheduleSettings,
    pub site: SiteSettings,
    pub quotes: QuoteSettings,
    pub price_alerts: Vec<PriceAlertRule>,
}

impl Settings {
    /// Convert from raw config (after validation)
    pub fn from_raw(raw: RawConfig) -> Self {
        Self {
            service: ServiceSettings::from_raw(raw.service),
            schedule: ScheduleSettings::from_raw(raw.schedule),
            site: SiteSettings::from_raw(raw.site),
            quotes: QuoteSettings::from_raw(raw.quotes),
            price_alerts: raw.price_alerts.into_iter().filter_map(PriceAlertRule::from_raw).collect(),
        }
    }
}

/// Browser the WebDriver server should drive
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BrowserName {
    #[default]
    Chrome,
    Firefox,
}

#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub data_dir: PathBuf,
    pub webdriver_url: String,
    pub browser: BrowserName,
    pub headless: bool,
    pub user_agent: Option<String>,
}

impl ServiceSettings {
    fn from_raw(raw: RawServiceConfig) -> Self {
        let defaults = Self::default();
        Self {
            // The env var wins over the file so tests and one-off runs can redirect state
            data_dir: match std::env::var(TRENDWATCH_DATA_DIR_ENV) {
                Ok(dir) => PathBuf::from(dir),
                Err(_) => raw.data_dir.unwrap_or(defaults.data_dir),
            },
            webdriver_url: raw.webdriver_url.unwrap_or(defaults.webdriver_url),
            browser: raw
                .browser
                .and_then(|b| parse_browser(&b).ok())
                .unwrap_or(defaults.browser),
            headless: raw.headless.unwrap_or(defaults.headless),
            user_agent: raw.user_agent,
        }
    }
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            webdriver_url: "http://localhost:9515".into(),
            browser: BrowserName::Chrome,
            headless: true,
            user_agent: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScheduleSettings {
    pub scrape_interval: Duration,
    pub alert_interval: Duration,
    pub initial_scrape_delay: Duration,
    pub alert_cooldown: Duration,
    pub dashboard_limit: usize,
}

impl ScheduleSettings {
    fn from_raw(raw: RawScheduleConfig) -> Self {
        let defaults = Self::default();
        Self {
            scrape_interval: secs_or(raw.scrape_interval_secs, defaults.scrape_interval),
            alert_interval: secs_or(raw.alert_interval_secs, defaults.alert_interval),
            initial_scrape_delay: secs_or(raw.initial_scrape_delay_secs, defaults.initial_scrape_delay),
            alert_cooldown: secs_or(raw.alert_cooldown_secs, defaults.alert_cooldown),
            dashboard_limit: raw.dashboard_limit.unwrap_or(defaults.dashboard_limit),
        }
    }
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            scrape_interval: Duration::from_secs(3600),
            alert_interval: Duration::from_secs(60),
            initial_scrape_delay: Duration::from_secs(2),
            alert_cooldown: DEFAULT_ALERT_COOLDOWN,
            dashboard_limit: 50,
        }
    }
}

/// Everything needed to log into and scrape one site
#[derive(Debug, Clone)]
pub struct SiteSettings {
    pub id: SiteId,
    pub base_url: String,
    pub login_url: String,
    pub home_path: String,
    pub trends_url: String,
    pub search_url: String,
    pub source_label: String,
    pub popularity_keywords: Vec<String>,
    pub selectors: SelectorSettings,
    pub timeouts: TimeoutSettings,
    pub credentials: CredentialSettings,
}

impl SiteSettings {
    fn from_raw(raw: RawSiteConfig) -> Self {
        let defaults = Self::default();
        Self {
            id: raw.id.map(SiteId::new).unwrap_or(defaults.id),
            base_url: raw.base_url.unwrap_or(defaults.base_url),
            login_url: raw.login_url.unwrap_or(defaults.login_url),
            home_path: raw.home_path.unwrap_or(defaults.home_path),
            trends_url: raw.trends_url.unwrap_or(defaults.trends_url),
            search_url: raw.search_url.unwrap_or(defaults.search_url),
            source_label: raw.source_label.unwrap_or(defaults.source_label),
            popularity_keywords: raw.popularity_keywords.unwrap_or(defaults.popularity_keywords),
            selectors: SelectorSettings::from_raw(raw.selectors),
            timeouts: TimeoutSettings::from_raw(raw.timeouts),
            credentials: CredentialSettings::from_raw(raw.credentials),
        }
    }
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            id: SiteId::new("x"),
            base_url: "https://x.com".into(),
            login_url: "https://x.com/login".into(),
            home_path: "/home".into(),
            trends_url: "https://x.com/explore/tabs/trending".into(),
            search_url: "https://x.com/search".into(),
            source_label: "X".into(),
            popularity_keywords: vec!["posts".into()],
            selectors: SelectorSettings::default(),
            timeouts: TimeoutSettings::default(),
            credentials: CredentialSettings::default(),
        }
    }
}

/// CSS selectors for the login flow and the trending surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorSettings {
    /// Present only for a logged-in user
    pub authenticated: String,
    pub username: String,
    /// Security-verification input shown mid-login
    pub challenge: String,
    pub password: String,
    pub timeline: String,
    pub trend_item: String,
    pub trend_title: String,
    /// Text fragments scanned for the popularity keyword
    pub trend_fragment: String,
}

impl SelectorSettings {
    fn from_raw(raw: RawSelectors) -> Self {
        let d = Self::default();
        Self {
            authenticated: raw.authenticated.unwrap_or(d.authenticated),
            username: raw.username.unwrap_or(d.username),
            challenge: raw.challenge.unwrap_or(d.challenge),
            password: raw.password.unwrap_or(d.password),
            timeline: raw.timeline.unwrap_or(d.timeline),
            trend_item: raw.trend_item.unwrap_or(d.trend_item),
            trend_title: raw.trend_title.unwrap_or(d.trend_title),
            trend_fragment: raw.trend_fragment.unwrap_or(d.trend_fragment),
        }
    }
}

impl Default for SelectorSettings {
    fn default() -> Self {
        Self {
            authenticated: r#"[data-testid="primaryColumn"]"#.into(),
            username: r#"input[name="text"]"#.into(),
            challenge: r#"input[data-testid="ocfEnterTextTextInput"]"#.into(),
            password: r#"input[name="password"]"#.into(),
            timeline: r#"div[aria-label="Timeline: Explore"]"#.into(),
            trend_item: r#"div[data-testid="trend"]"#.into(),
            trend_title: "div.r-b88u0q > span".into(),
            trend_fragment: "span".into(),
        }
    }
}

/// Bounds for every browser wait
#[derive(Debug, Clone)]
pub struct TimeoutSettings {
    pub restore_probe: Duration,
    pub navigation: Duration,
    pub element: Duration,
    pub password: Duration,
    pub confirm: Duration,
    /// Pause after submitting a login step before probing the page
    pub settle: Duration,
    pub manual_login: Duration,
}

impl TimeoutSettings {
    fn from_raw(raw: RawTimeouts) -> Self {
        let d = Self::default();
        Self {
            restore_probe: secs_or(raw.restore_probe_secs, d.restore_probe),
            navigation: secs_or(raw.navigation_secs, d.navigation),
            element: secs_or(raw.element_secs, d.element),
            password: secs_or(raw.password_secs, d.password),
            confirm: secs_or(raw.confirm_secs, d.confirm),
            settle: raw.settle_ms.map(Duration::from_millis).unwrap_or(d.settle),
            manual_login: secs_or(raw.manual_login_secs, d.manual_login),
        }
    }
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            restore_probe: Duration::from_secs(30),
            navigation: Duration::from_secs(60),
            element: Duration::from_secs(30),
            password: Duration::from_secs(15),
            confirm: Duration::from_secs(60),
            settle: Duration::from_millis(3000),
            manual_login: Duration::from_secs(300),
        }
    }
}

/// Where to find the login secrets
#[derive(Debug, Clone)]
pub struct CredentialSettings {
    pub username_env: String,
    pub password_env: String,
    pub verification_env: String,
}

impl CredentialSettings {
    fn from_raw(raw: RawCredentials) -> Self {
        let d = Self::default();
        Self {
            username_env: raw.username_env.unwrap_or(d.username_env),
            password_env: raw.password_env.unwrap_or(d.password_env),
            verification_env: raw.verification_env.unwrap_or(d.verification_env),
        }
    }

    /// Read credentials from the process environment
    pub fn resolve(&self) -> Option<Credentials> {
        self.resolve_with(|name| std::env::var(name).ok())
    }

    /// Read credentials through `lookup`. Username and password are required;
    /// empty values count as missing.
    pub fn resolve_with(&self, lookup: impl Fn(&str) -> Option<String>) -> Option<Credentials> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let username = get(&self.username_env)?;
        let password = get(&self.password_env)?;
        Some(Credentials {
            username,
            password,
            verification_identifier: get(&self.verification_env),
        })
    }
}

impl Default for CredentialSettings {
    fn default() -> Self {
        Self {
            username_env: "X_USERNAME".into(),
            password_env: "X_PASSWORD".into(),
            verification_env: "X_VERIFICATION_IDENTIFIER".into(),
        }
    }
}

/// Resolved login secrets
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    /// Answer for the security-verification prompt (phone or email)
    pub verification_identifier: Option<String>,
}

impl Credentials {
    /// What to type into the verification prompt; falls back to the username
    pub fn challenge_answer(&self) -> &str {
        self.verification_identifier.as_deref().unwrap_or(&self.username)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("verification_identifier", &self.verification_identifier)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct QuoteSettings {
    pub url_template: Option<String>,
    pub price_field: String,
    pub request_timeout: Duration,
}

impl QuoteSettings {
    fn from_raw(raw: RawQuotesConfig) -> Self {
        let d = Self::default();
        Self {
            url_template: raw.url_template,
            price_field: raw.price_field.unwrap_or(d.price_field),
            request_timeout: secs_or(raw.request_timeout_secs, d.request_timeout),
        }
    }

    /// Quote URL for a symbol
    pub fn url_for(&self, symbol: &str) -> Option<String> {
        self.url_template
            .as_ref()
            .map(|t| t.replace("{symbol}", &urlencoding::encode(symbol.trim())))
    }
}

impl Default for QuoteSettings {
    fn default() -> Self {
        Self {
            url_template: None,
            price_field: "last_price".into(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Which side of the target triggers an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertCondition {
    Above,
    Below,
}

impl AlertCondition {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertCondition::Above => "above",
            AlertCondition::Below => "below",
        }
    }

    /// Strict comparison: equal to the target never triggers
    pub fn is_met(&self, price: f64, target: f64) -> bool {
        match self {
            AlertCondition::Above => price > target,
            AlertCondition::Below => price < target,
        }
    }
}

impl fmt::Display for AlertCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One price threshold to watch
#[derive(Debug, Clone, PartialEq)]
pub struct PriceAlertRule {
    pub symbol: String,
    pub condition: AlertCondition,
    pub target_price: f64,
}

impl PriceAlertRule {
    pub fn new(symbol: impl Into<String>, condition: AlertCondition, target_price: f64) -> Self {
        Self {
            symbol: symbol.into(),
            condition,
            target_price,
        }
    }

    fn from_raw(raw: RawPriceAlert) -> Option<Self> {
        let condition = parse_condition(&raw.condition).ok()?;
        Some(Self::new(raw.symbol.trim(), condition, raw.target_price))
    }
}

fn secs_or(value: Option<u64>, default: Duration) -> Duration {
    value.map(Duration::from_secs).unwrap_or(default)
}
