//! Browser capability traits

use async_trait::async_trait;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::debug;

use crate::StorageState;

/// How often the provided wait helpers re-check the page
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Errors from browser operations
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("Timed out after {timeout:?} waiting for {what}")]
    Timeout { what: String, timeout: Duration },

    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("No such element: {0}")]
    NoSuchElement(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Browsing context closed")]
    Closed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BrowserError {
    pub fn timeout(what: impl Into<String>, timeout: Duration) -> Self {
        Self::Timeout {
            what: what.into(),
            timeout,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

pub type BrowserResult<T> = Result<T, BrowserError>;

/// Opaque reference to an element on a page.
///
/// Only meaningful to the page that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementRef(String);

impl ElementRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Keys that can be sent to a focused field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Enter,
}

/// Entry point of an automation backend
#[async_trait]
pub trait Browser: Send + Sync {
    /// Open a fresh, isolated browsing context, optionally seeded with a
    /// previously captured session state
    async fn new_context(&self, state: Option<&StorageState>) -> BrowserResult<Box<dyn BrowserContext>>;
}

/// An isolated browsing context (cookie jar + storage)
#[async_trait]
pub trait BrowserContext: Send + Sync {
    /// Open a page in this context
    async fn new_page(&self) -> BrowserResult<Box<dyn Page>>;

    /// Capture the context's authenticated state
    async fn storage_state(&self) -> BrowserResult<StorageState>;

    /// Close the context and release its resources
    async fn close(&self) -> BrowserResult<()>;
}

/// A page inside a browsing context.
///
/// Implementors provide the primitive queries; the `wait_*` helpers poll them
/// until a deadline.
#[async_trait]
pub trait Page: Send + Sync {
    /// Navigate and wait for the DOM to be ready
    async fn goto(&self, url: &str, timeout: Duration) -> BrowserResult<()>;

    async fn current_url(&self) -> BrowserResult<String>;

    /// All elements matching a CSS selector, in document order
    async fn query_all(&self, selector: &str) -> BrowserResult<Vec<ElementRef>>;

    /// All descendants of `parent` matching a CSS selector
    async fn query_within(&self, parent: &ElementRef, selector: &str) -> BrowserResult<Vec<ElementRef>>;

    async fn is_displayed(&self, element: &ElementRef) -> BrowserResult<bool>;

    async fn text_content(&self, element: &ElementRef) -> BrowserResult<Option<String>>;

    /// Replace the value of the first field matching `selector`
    async fn fill(&self, selector: &str, text: &str) -> BrowserResult<()>;

    /// Send a key to the first field matching `selector`
    async fn press(&self, selector: &str, key: Key) -> BrowserResult<()>;

    async fn screenshot(&self, path: &Path) -> BrowserResult<()>;

    /// Whether at least one element matches right now
    async fn is_present(&self, selector: &str) -> BrowserResult<bool> {
        Ok(!self.query_all(selector).await?.is_empty())
    }

    /// Wait until an element matching `selector` is attached
    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> BrowserResult<ElementRef> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(found) = self.query_all(selector).await?.into_iter().next() {
                return Ok(found);
            }
            pause_until(deadline, selector, timeout).await?;
        }
    }

    /// Wait until a descendant of `parent` matching `selector` is attached
    async fn wait_for_child(
        &self,
        parent: &ElementRef,
        selector: &str,
        timeout: Duration,
    ) -> BrowserResult<ElementRef> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(found) = self.query_within(parent, selector).await?.into_iter().next() {
                return Ok(found);
            }
            pause_until(deadline, selector, timeout).await?;
        }
    }

    /// Wait until an element matching `selector` is attached and displayed
    async fn wait_for_visible(&self, selector: &str, timeout: Duration) -> BrowserResult<ElementRef> {
        let deadline = Instant::now() + timeout;
        loop {
            for element in self.query_all(selector).await? {
                if self.is_displayed(&element).await? {
                    return Ok(element);
                }
            }
            pause_until(deadline, selector, timeout).await?;
        }
    }

    /// Wait until the current URL's path ends with `path_suffix`
    async fn wait_for_url(&self, path_suffix: &str, timeout: Duration) -> BrowserResult<()> {
        let deadline = Instant::now() + timeout;
        loop {
            let url = self.current_url().await?;
            if path_ends_with(&url, path_suffix) {
                return Ok(());
            }
            pause_until(deadline, &format!("url ending in {path_suffix}"), timeout).await?;
        }
    }
}

/// Sleep one poll interval, or fail if the deadline has passed
async fn pause_until(deadline: Instant, what: &str, timeout: Duration) -> BrowserResult<()> {
    let now = Instant::now();
    if now >= deadline {
        debug!(what, ?timeout, "Browser wait timed out");
        return Err(BrowserError::timeout(what, timeout));
    }
    tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
    Ok(())
}

/// Whether the path of `url` ends with `suffix`, ignoring trailing slashes.
/// A root suffix (`"/"`) only matches the root path.
pub fn path_ends_with(url: &str, suffix: &str) -> bool {
    let path = url_path(url).trim_end_matches('/');
    let suffix = suffix.trim_end_matches('/');
    if suffix.is_empty() {
        path.is_empty()
    } else {
        path.ends_with(suffix)
    }
}

/// Path component of a URL, without query or fragment
pub fn url_path(url: &str) -> &str {
    let without_scheme = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
    let path = match without_scheme.find('/') {
        Some(idx) => &without_scheme[idx..],
        None => "/",
    };
    path.split(['?', '#']).next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_path_strips_host_and_query() {
        assert_eq!(url_path("https://x.com/home"), "/home");
        assert_eq!(url_path("https://x.com/home?lang=en#top"), "/home");
        assert_eq!(url_path("https://x.com"), "/");
        assert_eq!(url_path("/i/flow/login"), "/i/flow/login");
    }

    #[test]
    fn root_suffix_matches_only_root() {
        assert!(path_ends_with("https://x.com/", "/"));
        assert!(path_ends_with("https://x.com", "/"));
        assert!(!path_ends_with("https://x.com/i/flow/login", "/"));
        assert!(path_ends_with("https://x.com/home/", "/home"));
        assert!(!path_ends_with("https://x.com/login", "/home"));
    }

    #[test]
    fn timeout_error_is_classified() {
        let err = BrowserError::timeout("input[name=\"password\"]", Duration::from_secs(15));
        assert!(err.is_timeout());
        assert!(!BrowserError::Closed.is_timeout());
        assert!(err.to_string().contains("password"));
    }
}
