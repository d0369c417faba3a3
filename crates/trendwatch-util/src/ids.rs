//! Strongly-typed identifiers for trendwatch

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier for a scraped site (e.g. "x"). Keys the persisted session state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SiteId(String);

impl SiteId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SiteId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SiteId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Stable identity of a trend record.
///
/// The key is the canonical search URL for the trend's normalized title, so an
/// operator can paste it into a browser and land on the source query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TrendKey(String);

impl TrendKey {
    /// Derive the key for a title as seen in the DOM.
    ///
    /// Surrounding whitespace, inner whitespace runs and letter case do not
    /// affect the key.
    pub fn from_title(search_url: &str, title: &str) -> Self {
        let normalized = normalize_title(title).to_lowercase();
        Self(format!(
            "{}?q={}",
            search_url.trim_end_matches('/'),
            urlencoding::encode(&normalized)
        ))
    }

    /// Wrap an already-derived key (e.g. read back from the store)
    pub fn from_raw(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrendKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Trim a title and collapse inner whitespace runs to a single space
pub fn normalize_title(title: &str) -> String {
    title.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Unique identifier for one scheduled run (scrape or alert sweep)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEARCH: &str = "https://x.com/search";

    #[test]
    fn site_id_equality() {
        assert_eq!(SiteId::new("x"), SiteId::from("x"));
        assert_ne!(SiteId::new("x"), SiteId::new("y"));
    }

    #[test]
    fn trend_key_ignores_whitespace_and_case() {
        let a = TrendKey::from_title(SEARCH, "  Rust Conf \n");
        let b = TrendKey::from_title(SEARCH, "rust   conf");
        assert_eq!(a, b);
    }

    #[test]
    fn trend_key_is_search_url() {
        let key = TrendKey::from_title(SEARCH, "#Bitcoin ETF");
        assert_eq!(key.as_str(), "https://x.com/search?q=%23bitcoin%20etf");
    }

    #[test]
    fn trend_key_tolerates_trailing_slash() {
        let a = TrendKey::from_title("https://x.com/search/", "abc");
        let b = TrendKey::from_title(SEARCH, "abc");
        assert_eq!(a, b);
    }

    #[test]
    fn run_id_uniqueness() {
        assert_ne!(RunId::new(), RunId::new());
    }

    #[test]
    fn ids_serialize_deserialize() {
        let key = TrendKey::from_title(SEARCH, "hello");
        let json = serde_json::to_string(&key).unwrap();
        let parsed: TrendKey = serde_json::from_str(&json).unwrap();
        assert_eq!(key, parsed);
    }
}
