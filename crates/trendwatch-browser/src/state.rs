//! Persistable authenticated-session state

use serde::{Deserialize, Serialize};

/// Serialized authenticated browsing context: cookies plus per-origin local
/// storage.
///
/// The snapshot carries no expiry of its own. Whether it is still usable is
/// decided by probing the site after restoring it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageState {
    #[serde(default)]
    pub cookies: Vec<Cookie>,

    #[serde(default)]
    pub origins: Vec<OriginStorage>,
}

impl StorageState {
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty() && self.origins.iter().all(|o| o.local_storage.is_empty())
    }

    /// Origin a cookie has to be installed from (WebDriver only accepts cookies
    /// for the document's current domain)
    pub fn origin_for_cookie(cookie: &Cookie, fallback: &str) -> String {
        match &cookie.domain {
            Some(domain) => format!("https://{}", domain.trim_start_matches('.')),
            None => fallback.to_string(),
        }
    }
}

/// A single cookie, shaped like the W3C WebDriver cookie object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cookie {
    pub name: String,
    pub value: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Expiry as seconds since the Unix epoch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<i64>,

    #[serde(default)]
    pub secure: bool,

    #[serde(default)]
    pub http_only: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub same_site: Option<String>,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: None,
            path: None,
            expiry: None,
            secure: false,
            http_only: false,
            same_site: None,
        }
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }
}

/// Local storage entries for one origin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginStorage {
    pub origin: String,

    #[serde(default)]
    pub local_storage: Vec<StorageEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageEntry {
    pub name: String,
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_state() {
        assert!(StorageState::default().is_empty());

        let state = StorageState {
            cookies: vec![],
            origins: vec![OriginStorage {
                origin: "https://x.com".into(),
                local_storage: vec![],
            }],
        };
        assert!(state.is_empty());
    }

    #[test]
    fn cookie_uses_webdriver_field_names() {
        let mut cookie = Cookie::new("auth_token", "abc").with_domain(".x.com");
        cookie.http_only = true;
        cookie.same_site = Some("Lax".into());

        let json = serde_json::to_value(&cookie).unwrap();
        assert_eq!(json["httpOnly"], true);
        assert_eq!(json["sameSite"], "Lax");
        assert!(json.get("expiry").is_none());
    }

    #[test]
    fn parses_minimal_cookie() {
        let cookie: Cookie = serde_json::from_str(r#"{"name":"a","value":"b"}"#).unwrap();
        assert_eq!(cookie, Cookie::new("a", "b"));
    }

    #[test]
    fn cookie_origin_strips_leading_dot() {
        let cookie = Cookie::new("a", "b").with_domain(".x.com");
        assert_eq!(StorageState::origin_for_cookie(&cookie, "https://y.com"), "https://x.com");
        assert_eq!(
            StorageState::origin_for_cookie(&Cookie::new("a", "b"), "https://y.com"),
            "https://y.com"
        );
    }
}
