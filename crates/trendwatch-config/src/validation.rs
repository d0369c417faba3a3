//! Configuration validation

use crate::schema::{RawConfig, RawPriceAlert, RawSelectors, RawSiteConfig};
use std::collections::HashSet;
use thiserror::Error;

/// Validation error
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Price alert '{symbol}': {message}")]
    PriceAlertError { symbol: String, message: String },

    #[error("Duplicate price alert: {symbol} {condition}")]
    DuplicatePriceAlert { symbol: String, condition: String },

    #[error("Invalid URL for {field} '{value}': must start with http:// or https://")]
    InvalidUrl { field: String, value: String },

    #[error("{field} must be greater than zero")]
    ZeroDuration { field: String },

    #[error("Selector '{field}' cannot be empty")]
    EmptySelector { field: String },

    #[error("Site config error: {0}")]
    SiteError(String),

    #[error("Quotes config error: {0}")]
    QuotesError(String),

    #[error("Service config error: {0}")]
    ServiceError(String),
}

/// Validate a raw configuration
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if let Some(url) = &config.service.webdriver_url {
        check_url("service.webdriver_url", url, &mut errors);
    }
    if let Some(browser) = &config.service.browser
        && parse_browser(browser).is_err()
    {
        errors.push(ValidationError::ServiceError(format!(
            "unknown browser '{browser}' (expected \"chrome\" or \"firefox\")"
        )));
    }

    let schedule = &config.schedule;
    for (field, value) in [
        ("schedule.scrape_interval_secs", schedule.scrape_interval_secs),
        ("schedule.alert_interval_secs", schedule.alert_interval_secs),
    ] {
        if value == Some(0) {
            errors.push(ValidationError::ZeroDuration { field: field.into() });
        }
    }

    errors.extend(validate_site(&config.site));

    // Check for duplicate (symbol, condition) pairs
    let mut seen = HashSet::new();
    for alert in &config.price_alerts {
        if !seen.insert((alert.symbol.as_str(), alert.condition.as_str())) {
            errors.push(ValidationError::DuplicatePriceAlert {
                symbol: alert.symbol.clone(),
                condition: alert.condition.clone(),
            });
        }
    }

    for alert in &config.price_alerts {
        errors.extend(validate_price_alert(alert));
    }

    match &config.quotes.url_template {
        Some(template) => {
            check_url("quotes.url_template", template, &mut errors);
            if !template.contains("{symbol}") {
                errors.push(ValidationError::QuotesError(
                    "url_template must contain a {symbol} placeholder".into(),
                ));
            }
        }
        None if !config.price_alerts.is_empty() => {
            errors.push(ValidationError::QuotesError(
                "price alerts are configured but quotes.url_template is missing".into(),
            ));
        }
        None => {}
    }

    if let Some(field) = &config.quotes.price_field
        && field.trim().is_empty()
    {
        errors.push(ValidationError::QuotesError("price_field cannot be empty".into()));
    }

    errors
}

fn validate_site(site: &RawSiteConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if let Some(id) = &site.id
        && (id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'))
    {
        // The id becomes part of a file name
        errors.push(ValidationError::SiteError(format!(
            "id '{id}' must be non-empty and contain only letters, digits, '-' or '_'"
        )));
    }

    for (field, value) in [
        ("site.base_url", &site.base_url),
        ("site.login_url", &site.login_url),
        ("site.trends_url", &site.trends_url),
        ("site.search_url", &site.search_url),
    ] {
        if let Some(url) = value {
            check_url(field, url, &mut errors);
        }
    }

    if let Some(path) = &site.home_path
        && !path.starts_with('/')
    {
        errors.push(ValidationError::SiteError(format!("home_path '{path}' must start with '/'")));
    }

    if let Some(label) = &site.source_label
        && label.trim().is_empty()
    {
        errors.push(ValidationError::SiteError("source_label cannot be empty".into()));
    }

    if let Some(keywords) = &site.popularity_keywords
        && (keywords.is_empty() || keywords.iter().any(|k| k.trim().is_empty()))
    {
        errors.push(ValidationError::SiteError(
            "popularity_keywords must list at least one non-empty word".into(),
        ));
    }

    errors.extend(validate_selectors(&site.selectors));

    let t = &site.timeouts;
    for (field, value) in [
        ("site.timeouts.restore_probe_secs", t.restore_probe_secs),
        ("site.timeouts.navigation_secs", t.navigation_secs),
        ("site.timeouts.element_secs", t.element_secs),
        ("site.timeouts.password_secs", t.password_secs),
        ("site.timeouts.confirm_secs", t.confirm_secs),
        ("site.timeouts.manual_login_secs", t.manual_login_secs),
    ] {
        if value == Some(0) {
            errors.push(ValidationError::ZeroDuration { field: field.into() });
        }
    }

    let c = &site.credentials;
    for (field, value) in [
        ("username_env", &c.username_env),
        ("password_env", &c.password_env),
        ("verification_env", &c.verification_env),
    ] {
        if let Some(name) = value
            && name.trim().is_empty()
        {
            errors.push(ValidationError::SiteError(format!(
                "credentials.{field} cannot be empty"
            )));
        }
    }

    errors
}

fn validate_selectors(selectors: &RawSelectors) -> Vec<ValidationError> {
    [
        ("authenticated", &selectors.authenticated),
        ("username", &selectors.username),
        ("challenge", &selectors.challenge),
        ("password", &selectors.password),
        ("timeline", &selectors.timeline),
        ("trend_item", &selectors.trend_item),
        ("trend_title", &selectors.trend_title),
        ("trend_fragment", &selectors.trend_fragment),
    ]
    .into_iter()
    .filter(|(_, value)| value.as_deref().is_some_and(|s| s.trim().is_empty()))
    .map(|(field, _)| ValidationError::EmptySelector { field: field.into() })
    .collect()
}

fn validate_price_alert(alert: &RawPriceAlert) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let error = |message: String| ValidationError::PriceAlertError {
        symbol: alert.symbol.clone(),
        message,
    };

    if alert.symbol.trim().is_empty() {
        errors.push(error("symbol cannot be empty".into()));
    }

    if let Err(e) = parse_condition(&alert.condition) {
        errors.push(error(e));
    }

    if !alert.target_price.is_finite() || alert.target_price <= 0.0 {
        errors.push(error(format!(
            "target_price must be a positive number, got {}",
            alert.target_price
        )));
    }

    errors
}

fn check_url(field: &str, value: &str, errors: &mut Vec<ValidationError>) {
    if !(value.starts_with("http://") || value.starts_with("https://")) {
        errors.push(ValidationError::InvalidUrl {
            field: field.into(),
            value: value.into(),
        });
    }
}

/// Parse an alert condition name
pub fn parse_condition(s: &str) -> Result<crate::AlertCondition, String> {
    match s.trim().to_lowercase().as_str() {
        "above" => Ok(crate::AlertCondition::Above),
        "below" => Ok(crate::AlertCondition::Below),
        other => Err(format!("unknown condition '{other}' (expected \"above\" or \"below\")")),
    }
}

/// Parse a browser name
pub fn parse_browser(s: &str) -> Result<crate::BrowserName, String> {
    match s.trim().to_lowercase().as_str() {
        "chrome" | "chromium" => Ok(crate::BrowserName::Chrome),
        "firefox" => Ok(crate::BrowserName::Firefox),
        other => Err(format!("unknown browser '{other}'")),
    }
}
