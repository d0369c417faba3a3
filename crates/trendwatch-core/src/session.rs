//! Authenticated browsing-context lifecycle
//!
//! Restores the saved session for a site when it still passes the liveness
//! probe, otherwise runs the interactive login and saves the new state.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use trendwatch_browser::{Browser, BrowserContext, BrowserResult, Page};
use trendwatch_config::{Credentials, SiteSettings};
use trendwatch_store::SessionStateStore;
use trendwatch_util::SiteId;

use crate::{LoginFailure, LoginFlow, LoginStep};

/// How the page in an [`AuthenticatedPage`] got logged in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionSource {
    /// Saved state passed the liveness probe
    Restored,
    /// Interactive login ran and a new state was saved
    LoggedIn,
}

/// A page that behaves as a logged-in user, plus the context that owns it
pub struct AuthenticatedPage {
    pub context: Box<dyn BrowserContext>,
    pub page: Box<dyn Page>,
    pub source: SessionSource,
}

impl AuthenticatedPage {
    pub fn page(&self) -> &dyn Page {
        self.page.as_ref()
    }

    /// Close the owning context
    pub async fn close(self) -> BrowserResult<()> {
        self.context.close().await
    }
}

/// Owns session acquisition for one configured site
pub struct SessionManager {
    browser: Arc<dyn Browser>,
    sessions: Arc<dyn SessionStateStore>,
    site: SiteSettings,
    credentials: Option<Credentials>,
    screenshot_dir: PathBuf,
}

impl SessionManager {
    pub fn new(
        browser: Arc<dyn Browser>,
        sessions: Arc<dyn SessionStateStore>,
        site: SiteSettings,
        credentials: Option<Credentials>,
        screenshot_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            browser,
            sessions,
            site,
            credentials,
            screenshot_dir: screenshot_dir.into(),
        }
    }

    pub fn site(&self) -> &SiteSettings {
        &self.site
    }

    /// Produce a logged-in page for `site`
    pub async fn acquire(&self, site: &SiteId) -> Result<AuthenticatedPage, LoginFailure> {
        if site != &self.site.id {
            return Err(LoginFailure::new(
                None,
                LoginStep::Unauthenticated,
                format!("unsupported site: {site}"),
            ));
        }

        if let Some(page) = self.try_restore().await {
            return Ok(page);
        }

        info!(site = %site, "No valid session, starting interactive login");
        self.login().await
    }

    /// Fast path. Any problem here is recoverable and only logged.
    async fn try_restore(&self) -> Option<AuthenticatedPage> {
        let site = &self.site.id;
        let state = match self.sessions.load(site) {
            Ok(Some(state)) => state,
            Ok(None) => {
                debug!(site = %site, "No saved session");
                return None;
            }
            Err(e) => {
                warn!(site = %site, error = %e, "Saved session unreadable, ignoring it");
                return None;
            }
        };

        let context = match self.browser.new_context(Some(&state)).await {
            Ok(context) => context,
            Err(e) => {
                warn!(site = %site, error = %e, "Could not restore saved session");
                return None;
            }
        };

        match self.probe(context.as_ref()).await {
            Ok(page) => {
                info!(site = %site, "Saved session is still valid");
                Some(AuthenticatedPage {
                    context,
                    page,
                    source: SessionSource::Restored,
                })
            }
            Err(e) => {
                warn!(site = %site, error = %e, "Saved session failed the liveness probe");
                if let Err(e) = context.close().await {
                    debug!(error = %e, "Failed to close probe context");
                }
                None
            }
        }
    }

    async fn probe(&self, context: &dyn BrowserContext) -> BrowserResult<Box<dyn Page>> {
        let page = context.new_page().await?;
        let timeouts = &self.site.timeouts;
        page.goto(&self.site.base_url, timeouts.navigation).await?;
        page.wait_for_selector(&self.site.selectors.authenticated, timeouts.restore_probe)
            .await?;
        Ok(page)
    }

    async fn login(&self) -> Result<AuthenticatedPage, LoginFailure> {
        let context = self
            .browser
            .new_context(None)
            .await
            .map_err(|e| LoginFailure::new(None, LoginStep::Unauthenticated, e.to_string()))?;

        let page = match context.new_page().await {
            Ok(page) => page,
            Err(e) => {
                let _ = context.close().await;
                return Err(LoginFailure::new(None, LoginStep::Unauthenticated, e.to_string()));
            }
        };

        let mut flow = LoginFlow::new(page.as_ref(), &self.site, self.credentials.as_ref());
        if let Err(failure) = flow.run().await {
            // Without credentials the page was never touched
            let screenshot = match self.credentials {
                Some(_) => {
                    let label = format!("login_failure_{}", self.site.id);
                    capture(page.as_ref(), &self.screenshot_dir, &label).await
                }
                None => None,
            };
            let _ = context.close().await;
            return Err(failure.with_screenshot(screenshot));
        }

        if let Err(e) = self.save_state(context.as_ref()).await {
            let _ = context.close().await;
            return Err(LoginFailure::new(
                Some(LoginStep::Confirming),
                LoginStep::Authenticated,
                format!("logged in but could not save session: {e}"),
            ));
        }

        Ok(AuthenticatedPage {
            context,
            page,
            source: SessionSource::LoggedIn,
        })
    }

    async fn save_state(&self, context: &dyn BrowserContext) -> Result<(), String> {
        let state = context.storage_state().await.map_err(|e| e.to_string())?;
        self.sessions
            .save(&self.site.id, &state)
            .map_err(|e| e.to_string())
    }

    /// Operator-assisted login in a visible browser.
    ///
    /// Opens the login page and waits (up to the manual-login bound) for the
    /// operator to reach the home route, then saves the session.
    pub async fn manual_login(&self) -> Result<(), LoginFailure> {
        let fail = |step, e: String| LoginFailure::new(None, step, e);

        let context = self
            .browser
            .new_context(None)
            .await
            .map_err(|e| fail(LoginStep::Unauthenticated, e.to_string()))?;

        let result = async {
            let page = context
                .new_page()
                .await
                .map_err(|e| fail(LoginStep::Unauthenticated, e.to_string()))?;
            page.goto(&self.site.login_url, self.site.timeouts.navigation)
                .await
                .map_err(|e| fail(LoginStep::Unauthenticated, e.to_string()))?;

            info!(
                site = %self.site.id,
                timeout_secs = self.site.timeouts.manual_login.as_secs(),
                "Waiting for manual login in the browser window"
            );
            page.wait_for_url(&self.site.home_path, self.site.timeouts.manual_login)
                .await
                .map_err(|e| fail(LoginStep::Confirming, e.to_string()))?;

            self.save_state(context.as_ref())
                .await
                .map_err(|e| LoginFailure::new(Some(LoginStep::Confirming), LoginStep::Authenticated, e))
        }
        .await;

        let _ = context.close().await;
        if result.is_ok() {
            info!(site = %self.site.id, "Manual login saved");
        }
        result
    }
}

/// Save a diagnostic screenshot; failures to capture are only logged
pub(crate) async fn capture(page: &dyn Page, dir: &Path, label: &str) -> Option<PathBuf> {
    let stamp = trendwatch_util::now().format("%Y%m%d_%H%M%S");
    let path = dir.join(format!("{label}_{stamp}.png"));
    match page.screenshot(&path).await {
        Ok(()) => {
            info!(path = %path.display(), "Diagnostic screenshot saved");
            Some(path)
        }
        Err(e) => {
            warn!(error = %e, "Could not capture diagnostic screenshot");
            None
        }
    }
}
