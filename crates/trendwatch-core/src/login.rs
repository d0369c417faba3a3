//! Interactive login state machine
//!
//! Unauthenticated -> Identifying -> ChallengeCheck -> [ChallengeAnswering] ->
//! PasswordEntry -> Confirming -> Authenticated
//!
//! Every step is bounded. The first step that times out or cannot find its
//! field ends the flow; there is no retry inside the machine.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info, warn};
use trendwatch_browser::{BrowserError, Key, Page};
use trendwatch_config::{Credentials, SiteSettings};

/// Position in the login flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoginStep {
    /// On the login page, nothing typed yet
    Unauthenticated,
    /// Submitting the username
    Identifying,
    /// Looking for a security-verification prompt
    ChallengeCheck,
    /// Answering the verification prompt
    ChallengeAnswering,
    PasswordEntry,
    /// Waiting for the home route and the logged-in marker
    Confirming,
    Authenticated,
}

impl LoginStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoginStep::Unauthenticated => "unauthenticated",
            LoginStep::Identifying => "identifying",
            LoginStep::ChallengeCheck => "challenge_check",
            LoginStep::ChallengeAnswering => "challenge_answering",
            LoginStep::PasswordEntry => "password_entry",
            LoginStep::Confirming => "confirming",
            LoginStep::Authenticated => "authenticated",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, LoginStep::Authenticated)
    }
}

impl fmt::Display for LoginStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal failure of a session acquisition
#[derive(Debug, Error)]
#[error(
    "login failed at {failed_at} (last completed: {}): {reason}",
    .last_completed.map(|s| s.as_str()).unwrap_or("none")
)]
pub struct LoginFailure {
    /// Last step that finished successfully, if any
    pub last_completed: Option<LoginStep>,
    /// Step that was running when the flow gave up
    pub failed_at: LoginStep,
    pub reason: String,
    /// Diagnostic screenshot, when one could be captured
    pub screenshot: Option<PathBuf>,
}

impl LoginFailure {
    pub fn new(last_completed: Option<LoginStep>, failed_at: LoginStep, reason: impl Into<String>) -> Self {
        Self {
            last_completed,
            failed_at,
            reason: reason.into(),
            screenshot: None,
        }
    }

    pub fn with_screenshot(mut self, path: Option<PathBuf>) -> Self {
        self.screenshot = path;
        self
    }
}

/// Drives one page through the login steps
pub struct LoginFlow<'a> {
    page: &'a dyn Page,
    site: &'a SiteSettings,
    credentials: Option<&'a Credentials>,
    step: LoginStep,
    completed: Vec<LoginStep>,
}

impl<'a> LoginFlow<'a> {
    pub fn new(page: &'a dyn Page, site: &'a SiteSettings, credentials: Option<&'a Credentials>) -> Self {
        Self {
            page,
            site,
            credentials,
            step: LoginStep::Unauthenticated,
            completed: Vec::new(),
        }
    }

    pub fn step(&self) -> LoginStep {
        self.step
    }

    /// Steps finished so far, in order
    pub fn completed(&self) -> &[LoginStep] {
        &self.completed
    }

    /// Run until authenticated or the first failure
    pub async fn run(&mut self) -> Result<(), LoginFailure> {
        while !self.step.is_terminal() {
            match self.transition().await {
                Ok(next) => {
                    debug!(from = %self.step, to = %next, "Login step completed");
                    self.completed.push(self.step);
                    self.step = next;
                }
                Err(reason) => {
                    warn!(step = %self.step, reason = %reason, "Login step failed");
                    return Err(LoginFailure::new(self.completed.last().copied(), self.step, reason));
                }
            }
        }

        info!(site = %self.site.id, "Interactive login succeeded");
        Ok(())
    }

    /// Perform the current step's work and pick the next step
    async fn transition(&self) -> Result<LoginStep, String> {
        let selectors = &self.site.selectors;
        let timeouts = &self.site.timeouts;

        match self.step {
            LoginStep::Unauthenticated => {
                if self.credentials.is_none() {
                    return Err(format!(
                        "no credentials: set ${} and ${}",
                        self.site.credentials.username_env, self.site.credentials.password_env
                    ));
                }
                self.page
                    .goto(&self.site.login_url, timeouts.navigation)
                    .await
                    .map_err(describe)?;
                self.page
                    .wait_for_visible(&selectors.username, timeouts.element)
                    .await
                    .map_err(describe)?;
                Ok(LoginStep::Identifying)
            }

            LoginStep::Identifying => {
                let creds = self.credentials()?;
                self.submit(&selectors.username, &creds.username).await?;
                Ok(LoginStep::ChallengeCheck)
            }

            LoginStep::ChallengeCheck => {
                tokio::time::sleep(timeouts.settle).await;
                if self.is_visible_now(&selectors.challenge).await? {
                    info!("Security verification prompt detected");
                    Ok(LoginStep::ChallengeAnswering)
                } else {
                    Ok(LoginStep::PasswordEntry)
                }
            }

            LoginStep::ChallengeAnswering => {
                let creds = self.credentials()?;
                self.submit(&selectors.challenge, creds.challenge_answer()).await?;
                tokio::time::sleep(timeouts.settle).await;
                Ok(LoginStep::PasswordEntry)
            }

            LoginStep::PasswordEntry => {
                let creds = self.credentials()?;
                self.page
                    .wait_for_visible(&selectors.password, timeouts.password)
                    .await
                    .map_err(describe)?;
                self.submit(&selectors.password, &creds.password).await?;
                Ok(LoginStep::Confirming)
            }

            LoginStep::Confirming => {
                self.page
                    .wait_for_url(&self.site.home_path, timeouts.confirm)
                    .await
                    .map_err(describe)?;
                self.page
                    .wait_for_selector(&selectors.authenticated, timeouts.element)
                    .await
                    .map_err(describe)?;
                Ok(LoginStep::Authenticated)
            }

            LoginStep::Authenticated => Ok(LoginStep::Authenticated),
        }
    }

    fn credentials(&self) -> Result<&'a Credentials, String> {
        self.credentials.ok_or_else(|| "no credentials".to_string())
    }

    /// Fill a field and commit it with Enter
    async fn submit(&self, selector: &str, text: &str) -> Result<(), String> {
        self.page.fill(selector, text).await.map_err(describe)?;
        self.page.press(selector, Key::Enter).await.map_err(describe)
    }

    async fn is_visible_now(&self, selector: &str) -> Result<bool, String> {
        for element in self.page.query_all(selector).await.map_err(describe)? {
            if self.page.is_displayed(&element).await.map_err(describe)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

fn describe(e: BrowserError) -> String {
    e.to_string()
}
