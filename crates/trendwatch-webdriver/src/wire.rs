//! WebDriver wire protocol: session commands and error mapping

use reqwest::{Client, Method};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};
use trendwatch_browser::{BrowserError, BrowserResult, ElementRef};

/// Key under which W3C WebDriver returns element references
pub(crate) const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Which browser the WebDriver server should launch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrowserKind {
    #[default]
    Chrome,
    Firefox,
}

/// Configuration for the WebDriver backend
#[derive(Debug, Clone)]
pub struct WebDriverConfig {
    /// Base URL of the WebDriver server (e.g. `http://localhost:9515`)
    pub endpoint: String,
    pub browser: BrowserKind,
    pub headless: bool,
    /// Upper bound for a single HTTP round-trip to the server
    pub request_timeout: Duration,
    pub user_agent: Option<String>,
}

impl Default for WebDriverConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:9515".into(),
            browser: BrowserKind::Chrome,
            headless: true,
            request_timeout: Duration::from_secs(90),
            user_agent: None,
        }
    }
}

/// Capabilities body for `POST /session`
pub(crate) fn new_session_body(config: &WebDriverConfig) -> Value {
    let mut args: Vec<String> = vec!["--window-size=1280,2000".into()];
    if config.headless {
        args.push("--headless=new".into());
    }
    if let Some(ua) = &config.user_agent {
        args.push(format!("--user-agent={ua}"));
    }

    let always_match = match config.browser {
        BrowserKind::Chrome => json!({
            "browserName": "chrome",
            "pageLoadStrategy": "eager",
            "goog:chromeOptions": { "args": args },
        }),
        BrowserKind::Firefox => {
            let mut ff_args = Vec::new();
            if config.headless {
                ff_args.push("-headless".to_string());
            }
            let mut prefs = serde_json::Map::new();
            if let Some(ua) = &config.user_agent {
                prefs.insert("general.useragent.override".into(), json!(ua));
            }
            json!({
                "browserName": "firefox",
                "pageLoadStrategy": "eager",
                "moz:firefoxOptions": { "args": ff_args, "prefs": prefs },
            })
        }
    };

    json!({ "capabilities": { "alwaysMatch": always_match } })
}

/// Pull element references out of a `find elements` result
pub(crate) fn parse_element_refs(value: &Value) -> BrowserResult<Vec<ElementRef>> {
    let items = value
        .as_array()
        .ok_or_else(|| BrowserError::Protocol(format!("expected element list, got {value}")))?;

    items.iter().map(parse_element_ref).collect()
}

pub(crate) fn parse_element_ref(value: &Value) -> BrowserResult<ElementRef> {
    value
        .get(ELEMENT_KEY)
        .and_then(Value::as_str)
        .map(ElementRef::new)
        .ok_or_else(|| BrowserError::Protocol(format!("malformed element reference: {value}")))
}

/// JSON form of an element reference, for script arguments
pub(crate) fn element_arg(element: &ElementRef) -> Value {
    json!({ ELEMENT_KEY: element.as_str() })
}

/// Translate a WebDriver error payload into a browser error
pub(crate) fn map_error(status: u16, body: &Value) -> BrowserError {
    let error = body
        .pointer("/value/error")
        .and_then(Value::as_str)
        .unwrap_or("unknown error");
    let message = body
        .pointer("/value/message")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    match error {
        "no such element" | "stale element reference" | "element not interactable" => {
            BrowserError::NoSuchElement(message)
        }
        "timeout" | "script timeout" => BrowserError::timeout(message, Duration::ZERO),
        "invalid session id" | "no such window" => BrowserError::Closed,
        _ => BrowserError::Protocol(format!("{error} (HTTP {status}): {message}")),
    }
}

/// One WebDriver session
pub(crate) struct WireSession {
    client: Client,
    base: String,
    session_id: String,
}

impl WireSession {
    /// Create a session on the server
    pub(crate) async fn start(client: Client, config: &WebDriverConfig) -> BrowserResult<Self> {
        let endpoint = config.endpoint.trim_end_matches('/').to_string();
        let body = new_session_body(config);

        let value = send(&client, Method::POST, &format!("{endpoint}/session"), Some(&body)).await?;
        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| BrowserError::Protocol(format!("no sessionId in {value}")))?
            .to_string();

        debug!(session_id = %session_id, "WebDriver session created");

        Ok(Self {
            base: format!("{endpoint}/session/{session_id}"),
            client,
            session_id,
        })
    }

    pub(crate) fn id(&self) -> &str {
        &self.session_id
    }

    pub(crate) async fn get(&self, path: &str) -> BrowserResult<Value> {
        send(&self.client, Method::GET, &format!("{}{}", self.base, path), None).await
    }

    pub(crate) async fn post(&self, path: &str, body: Value) -> BrowserResult<Value> {
        send(&self.client, Method::POST, &format!("{}{}", self.base, path), Some(&body)).await
    }

    /// Run a synchronous script in the page
    pub(crate) async fn execute(&self, script: &str, args: Vec<Value>) -> BrowserResult<Value> {
        self.post("/execute/sync", json!({ "script": script, "args": args }))
            .await
    }

    pub(crate) async fn delete(&self) -> BrowserResult<()> {
        send(&self.client, Method::DELETE, &self.base, None).await?;
        Ok(())
    }
}

/// Issue one command and unwrap its `value`
async fn send(client: &Client, method: Method, url: &str, body: Option<&Value>) -> BrowserResult<Value> {
    let mut request = client.request(method.clone(), url);
    if let Some(body) = body {
        request = request.json(body);
    }

    let response = request.send().await.map_err(|e| {
        if e.is_timeout() {
            BrowserError::timeout(format!("{method} {url}"), Duration::ZERO)
        } else {
            BrowserError::Protocol(format!("{method} {url}: {e}"))
        }
    })?;

    let status = response.status();
    let payload: Value = response
        .json()
        .await
        .map_err(|e| BrowserError::Protocol(format!("{method} {url}: invalid JSON: {e}")))?;

    if !status.is_success() {
        let err = map_error(status.as_u16(), &payload);
        warn!(%method, url, status = status.as_u16(), error = %err, "WebDriver command failed");
        return Err(err);
    }

    Ok(payload.get("value").cloned().unwrap_or(Value::Null))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chrome_headless_capabilities() {
        let body = new_session_body(&WebDriverConfig::default());
        let caps = &body["capabilities"]["alwaysMatch"];
        assert_eq!(caps["browserName"], "chrome");
        let args = caps["goog:chromeOptions"]["args"].as_array().unwrap();
        assert!(args.iter().any(|a| a == "--headless=new"));
    }

    #[test]
    fn firefox_visible_capabilities() {
        let config = WebDriverConfig {
            browser: BrowserKind::Firefox,
            headless: false,
            user_agent: Some("ua".into()),
            ..Default::default()
        };
        let body = new_session_body(&config);
        let caps = &body["capabilities"]["alwaysMatch"];
        assert_eq!(caps["browserName"], "firefox");
        assert!(caps["moz:firefoxOptions"]["args"].as_array().unwrap().is_empty());
        assert_eq!(caps["moz:firefoxOptions"]["prefs"]["general.useragent.override"], "ua");
    }

    #[test]
    fn parses_element_list() {
        let value = json!([{ ELEMENT_KEY: "a" }, { ELEMENT_KEY: "b" }]);
        let refs = parse_element_refs(&value).unwrap();
        assert_eq!(refs, vec![ElementRef::new("a"), ElementRef::new("b")]);

        assert!(parse_element_refs(&json!([{ "other": "x" }])).is_err());
        assert!(parse_element_refs(&json!({})).is_err());
    }

    #[test]
    fn maps_webdriver_errors() {
        let body = json!({ "value": { "error": "no such element", "message": "nope" } });
        assert!(matches!(map_error(404, &body), BrowserError::NoSuchElement(_)));

        let body = json!({ "value": { "error": "timeout", "message": "slow" } });
        assert!(map_error(500, &body).is_timeout());

        let body = json!({ "value": { "error": "invalid session id" } });
        assert!(matches!(map_error(404, &body), BrowserError::Closed));

        let body = json!({ "value": { "error": "unknown command", "message": "?" } });
        assert!(matches!(map_error(404, &body), BrowserError::Protocol(_)));
    }

    #[test]
    fn element_arg_roundtrips() {
        let el = ElementRef::new("abc");
        assert_eq!(parse_element_ref(&element_arg(&el)).unwrap(), el);
    }
}
