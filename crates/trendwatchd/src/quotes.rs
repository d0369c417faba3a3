//! HTTP quote source

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;
use trendwatch_config::QuoteSettings;
use trendwatch_core::{AlertError, QuoteSource};

/// Fetches a JSON document per symbol from the configured URL template
pub struct HttpQuoteSource {
    client: reqwest::Client,
    settings: QuoteSettings,
}

impl HttpQuoteSource {
    pub fn new(settings: QuoteSettings) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()?;
        Ok(Self { client, settings })
    }
}

#[async_trait]
impl QuoteSource for HttpQuoteSource {
    async fn last_price(&self, symbol: &str) -> Result<Option<f64>, AlertError> {
        let quote_err = |message: String| AlertError::Quote {
            symbol: symbol.to_string(),
            message,
        };

        let url = self
            .settings
            .url_for(symbol)
            .ok_or_else(|| quote_err("no quote URL template configured".into()))?;

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| quote_err(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(quote_err(format!("HTTP {status}")));
        }

        let body: Value = response.json().await.map_err(|e| quote_err(e.to_string()))?;
        let price = price_field(&body, &self.settings.price_field);
        debug!(symbol, url = %url, price = ?price, "Quote fetched");
        Ok(price)
    }
}

/// Read a price out of a quote document. `field` may be a dotted path
/// (`data.last_price`); numbers and numeric strings are accepted.
pub fn price_field(body: &Value, field: &str) -> Option<f64> {
    let value = field
        .split('.')
        .try_fold(body, |node, segment| node.get(segment))?;

    let price = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().replace(',', "").parse().ok()?,
        _ => return None,
    };
    (price.is_finite() && price > 0.0).then_some(price)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_top_level_number() {
        assert_eq!(price_field(&json!({"last_price": 201.25}), "last_price"), Some(201.25));
    }

    #[test]
    fn test_nested_string() {
        let body = json!({"data": {"quote": {"price": "1,024.50"}}});
        assert_eq!(price_field(&body, "data.quote.price"), Some(1024.5));
    }

    #[test]
    fn test_missing_or_unusable() {
        assert_eq!(price_field(&json!({"last_price": null}), "last_price"), None);
        assert_eq!(price_field(&json!({"other": 1.0}), "last_price"), None);
        assert_eq!(price_field(&json!({"last_price": "n/a"}), "last_price"), None);
        assert_eq!(price_field(&json!({"last_price": 0}), "last_price"), None);
    }

    #[tokio::test]
    async fn test_unconfigured_template_is_error() {
        let source = HttpQuoteSource::new(QuoteSettings::default()).unwrap();
        assert!(matches!(
            source.last_price("AAPL").await,
            Err(AlertError::Quote { .. })
        ));
    }
}
