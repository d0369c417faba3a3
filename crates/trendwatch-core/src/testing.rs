//! Shared fixtures for unit tests

use std::time::Duration;
use trendwatch_browser::{Cookie, MockBrowser, MockEffect, MockElement, MockRoute, StorageState};
use trendwatch_config::{Credentials, SiteSettings};

/// Default site with every wait shortened
pub fn fast_site() -> SiteSettings {
    let mut site = SiteSettings::default();
    let t = &mut site.timeouts;
    t.restore_probe = Duration::from_millis(50);
    t.navigation = Duration::from_millis(50);
    t.element = Duration::from_millis(50);
    t.password = Duration::from_millis(50);
    t.confirm = Duration::from_millis(50);
    t.manual_login = Duration::from_millis(50);
    t.settle = Duration::from_millis(1);
    site
}

pub fn creds() -> Credentials {
    Credentials {
        username: "alice".into(),
        password: "hunter2".into(),
        verification_identifier: Some("alice@example.com".into()),
    }
}

/// A login page with a username field, and a home page that only shows the
/// logged-in marker once the password has been submitted. Tests add the
/// reveal effects that decide which branch the flow takes.
pub fn login_site(site: &SiteSettings) -> MockBrowser {
    let s = &site.selectors;
    let home = format!("{}{}", site.base_url, site.home_path);
    MockBrowser::new()
        .with_route(&site.login_url, MockRoute::new().element(MockElement::new(&s.username)))
        .with_route(
            &home,
            MockRoute::new()
                .authenticated_only()
                .element(MockElement::new(&s.authenticated)),
        )
        .on_press(
            &s.password,
            MockEffect::Navigate {
                url: home,
                authenticate: true,
            },
        )
}

pub fn saved_state() -> StorageState {
    StorageState {
        cookies: vec![Cookie::new("auth_token", "t0k3n").with_domain(".x.com")],
        origins: vec![],
    }
}
