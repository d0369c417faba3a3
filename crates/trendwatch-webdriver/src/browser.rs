//! Browser, context and page implementations over WebDriver

use async_trait::async_trait;
use base64::Engine;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use trendwatch_browser::{
    Browser, BrowserContext, BrowserError, BrowserResult, Cookie, ElementRef, Key, OriginStorage, Page, StorageState,
};

use crate::wire::{element_arg, parse_element_ref, parse_element_refs, WebDriverConfig, WireSession};

const DUMP_STORAGE_SCRIPT: &str = r#"
const entries = [];
for (let i = 0; i < window.localStorage.length; i++) {
    const name = window.localStorage.key(i);
    entries.push({ name: name, value: window.localStorage.getItem(name) });
}
return { origin: window.location.origin, local_storage: entries };
"#;

const LOAD_STORAGE_SCRIPT: &str = r#"
for (const entry of arguments[0]) {
    window.localStorage.setItem(entry.name, entry.value);
}
"#;

const TEXT_CONTENT_SCRIPT: &str = "return arguments[0].textContent;";

/// Automation backend talking to a WebDriver server (chromedriver, geckodriver)
pub struct WebDriverBrowser {
    client: reqwest::Client,
    config: WebDriverConfig,
}

impl WebDriverBrowser {
    pub fn new(config: WebDriverConfig) -> BrowserResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| BrowserError::Protocol(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &WebDriverConfig {
        &self.config
    }
}

#[async_trait]
impl Browser for WebDriverBrowser {
    async fn new_context(&self, state: Option<&StorageState>) -> BrowserResult<Box<dyn BrowserContext>> {
        let session = Arc::new(WireSession::start(self.client.clone(), &self.config).await?);

        if let Some(state) = state
            && !state.is_empty()
        {
            if let Err(e) = restore_state(&session, state).await {
                // Don't leak the server-side session
                let _ = session.delete().await;
                return Err(e);
            }
            info!(
                session_id = session.id(),
                cookies = state.cookies.len(),
                origins = state.origins.len(),
                "Seeded browsing context from saved state"
            );
        }

        Ok(Box::new(WebDriverContext { session }))
    }
}

/// Install cookies and local storage. WebDriver only accepts both for the
/// document's current origin, so visit each origin first.
async fn restore_state(session: &WireSession, state: &StorageState) -> BrowserResult<()> {
    // Host-only cookies belong to the first recorded origin
    let fallback = state.origins.first().map(|o| o.origin.clone());

    let mut current_origin: Option<String> = None;
    let mut cookies: Vec<(String, &Cookie)> = Vec::with_capacity(state.cookies.len());
    for cookie in &state.cookies {
        match (&cookie.domain, &fallback) {
            (None, None) => warn!(cookie = %cookie.name, "Skipping host-only cookie with no known origin"),
            (_, fallback) => cookies.push((
                StorageState::origin_for_cookie(cookie, fallback.as_deref().unwrap_or_default()),
                cookie,
            )),
        }
    }
    cookies.sort_by(|a, b| a.0.cmp(&b.0));

    for (origin, cookie) in cookies {
        if current_origin.as_deref() != Some(origin.as_str()) {
            session.post("/url", json!({ "url": origin })).await?;
            current_origin = Some(origin);
        }

        let body = serde_json::to_value(cookie)
            .map_err(|e| BrowserError::Protocol(format!("unserializable cookie: {e}")))?;
        if let Err(e) = session.post("/cookie", json!({ "cookie": body })).await {
            warn!(cookie = %cookie.name, error = %e, "Skipping cookie the browser rejected");
        }
    }

    for origin in &state.origins {
        if origin.local_storage.is_empty() {
            continue;
        }
        if current_origin.as_deref() != Some(origin.origin.as_str()) {
            session.post("/url", json!({ "url": origin.origin })).await?;
            current_origin = Some(origin.origin.clone());
        }
        let entries = serde_json::to_value(&origin.local_storage)
            .map_err(|e| BrowserError::Protocol(format!("unserializable storage: {e}")))?;
        session.execute(LOAD_STORAGE_SCRIPT, vec![entries]).await?;
    }

    Ok(())
}

/// One WebDriver session acting as an isolated browsing context
pub struct WebDriverContext {
    session: Arc<WireSession>,
}

#[async_trait]
impl BrowserContext for WebDriverContext {
    async fn new_page(&self) -> BrowserResult<Box<dyn Page>> {
        Ok(Box::new(WebDriverPage {
            session: self.session.clone(),
        }))
    }

    async fn storage_state(&self) -> BrowserResult<StorageState> {
        let cookies: Vec<Cookie> = serde_json::from_value(self.session.get("/cookie").await?)
            .map_err(|e| BrowserError::Protocol(format!("unexpected cookie payload: {e}")))?;

        let dumped = self.session.execute(DUMP_STORAGE_SCRIPT, vec![]).await?;
        let origins = parse_origin_dump(dumped)?;

        debug!(cookies = cookies.len(), "Captured storage state");
        Ok(StorageState { cookies, origins })
    }

    async fn close(&self) -> BrowserResult<()> {
        debug!(session_id = self.session.id(), "Closing WebDriver session");
        self.session.delete().await
    }
}

fn parse_origin_dump(value: Value) -> BrowserResult<Vec<OriginStorage>> {
    if value.is_null() {
        return Ok(Vec::new());
    }
    let origin: OriginStorage = serde_json::from_value(value)
        .map_err(|e| BrowserError::Protocol(format!("unexpected storage payload: {e}")))?;

    // about:blank and friends report "null" as their origin
    if origin.origin == "null" || origin.local_storage.is_empty() {
        return Ok(Vec::new());
    }
    Ok(vec![origin])
}

/// The session's top-level window
pub struct WebDriverPage {
    session: Arc<WireSession>,
}

impl WebDriverPage {
    async fn first_match(&self, selector: &str) -> BrowserResult<ElementRef> {
        let value = self
            .session
            .post("/element", json!({ "using": "css selector", "value": selector }))
            .await?;
        parse_element_ref(&value)
    }

    async fn send_text(&self, element: &ElementRef, text: &str) -> BrowserResult<()> {
        self.session
            .post(&format!("/element/{element}/value"), json!({ "text": text }))
            .await?;
        Ok(())
    }
}

fn key_code(key: Key) -> &'static str {
    match key {
        Key::Enter => "\u{E007}",
    }
}

#[async_trait]
impl Page for WebDriverPage {
    async fn goto(&self, url: &str, timeout: Duration) -> BrowserResult<()> {
        debug!(url, "Navigating");
        let navigate = self.session.post("/url", json!({ "url": url }));
        match tokio::time::timeout(timeout, navigate).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) if e.is_timeout() => Err(BrowserError::timeout(format!("navigation to {url}"), timeout)),
            Ok(Err(e)) => Err(BrowserError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            }),
            Err(_) => Err(BrowserError::timeout(format!("navigation to {url}"), timeout)),
        }
    }

    async fn current_url(&self) -> BrowserResult<String> {
        let value = self.session.get("/url").await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| BrowserError::Protocol(format!("unexpected url payload: {value}")))
    }

    async fn query_all(&self, selector: &str) -> BrowserResult<Vec<ElementRef>> {
        let value = self
            .session
            .post("/elements", json!({ "using": "css selector", "value": selector }))
            .await?;
        parse_element_refs(&value)
    }

    async fn query_within(&self, parent: &ElementRef, selector: &str) -> BrowserResult<Vec<ElementRef>> {
        let value = self
            .session
            .post(
                &format!("/element/{parent}/elements"),
                json!({ "using": "css selector", "value": selector }),
            )
            .await?;
        parse_element_refs(&value)
    }

    async fn is_displayed(&self, element: &ElementRef) -> BrowserResult<bool> {
        match self.session.get(&format!("/element/{element}/displayed")).await {
            Ok(value) => Ok(value.as_bool().unwrap_or(false)),
            // Detached between query and check
            Err(BrowserError::NoSuchElement(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn text_content(&self, element: &ElementRef) -> BrowserResult<Option<String>> {
        let value = self
            .session
            .execute(TEXT_CONTENT_SCRIPT, vec![element_arg(element)])
            .await?;
        Ok(value.as_str().map(str::to_string))
    }

    async fn fill(&self, selector: &str, text: &str) -> BrowserResult<()> {
        let element = self.first_match(selector).await?;
        self.session
            .post(&format!("/element/{element}/clear"), json!({}))
            .await?;
        self.send_text(&element, text).await
    }

    async fn press(&self, selector: &str, key: Key) -> BrowserResult<()> {
        let element = self.first_match(selector).await?;
        self.send_text(&element, key_code(key)).await
    }

    async fn screenshot(&self, path: &Path) -> BrowserResult<()> {
        let value = self.session.get("/screenshot").await?;
        let encoded = value
            .as_str()
            .ok_or_else(|| BrowserError::Protocol("screenshot payload is not a string".into()))?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| BrowserError::Protocol(format!("invalid screenshot data: {e}")))?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, bytes).await?;
        info!(path = %path.display(), "Saved screenshot");
        Ok(())
    }
}
