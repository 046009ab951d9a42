//! Page URL → content URL resolution through a real browser.
//!
//! The orchestrator only depends on the `BrowserLauncher` / `BrowserSession`
//! traits; `webdriver` provides the production implementation and tests plug
//! in in-process fakes.

mod error;
pub mod webdriver;

use std::thread;
use std::time::Duration;

use crate::config::BrowserConfig;
use crate::error::GrabError;

pub use error::BrowserError;
pub use webdriver::{WebDriverLauncher, WebDriverSession};

/// Minimal browser capability: navigate, read the location, close.
pub trait BrowserSession {
    fn navigate(&mut self, url: &str) -> Result<(), BrowserError>;
    /// Current top-level location; `None` when the browser reports none.
    fn current_url(&mut self) -> Result<Option<String>, BrowserError>;
    /// Ends the session. Calling it twice is harmless.
    fn close(&mut self) -> Result<(), BrowserError>;
}

/// Creates browser sessions presenting a given User-Agent.
pub trait BrowserLauncher {
    fn launch(&self, user_agent: &str) -> Result<Box<dyn BrowserSession>, BrowserError>;
}

/// Closes the wrapped session when dropped.
pub struct SessionGuard {
    session: Box<dyn BrowserSession>,
}

impl SessionGuard {
    pub fn new(session: Box<dyn BrowserSession>) -> Self {
        Self { session }
    }

    pub fn session(&mut self) -> &mut dyn BrowserSession {
        self.session.as_mut()
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        match self.session.close() {
            Ok(()) => tracing::debug!("browser session closed"),
            Err(e) => tracing::warn!("closing browser session failed: {}", e),
        }
    }
}

/// How long to wait for client-side redirects after navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlePolicy {
    pub interval: Duration,
    /// Total current-URL reads; the location counts as settled once two
    /// consecutive reads agree.
    pub max_polls: u32,
}

impl SettlePolicy {
    /// Read once, no waiting.
    pub const IMMEDIATE: SettlePolicy = SettlePolicy {
        interval: Duration::ZERO,
        max_polls: 1,
    };
}

impl From<&BrowserConfig> for SettlePolicy {
    fn from(cfg: &BrowserConfig) -> Self {
        Self {
            interval: Duration::from_millis(cfg.settle_interval_ms),
            max_polls: cfg.settle_max_polls.max(1),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UrlResolver {
    settle: SettlePolicy,
}

impl UrlResolver {
    pub fn new(settle: SettlePolicy) -> Self {
        Self { settle }
    }

    /// Navigates `session` to `page_url` and returns where it ended up.
    ///
    /// Fails with `GrabError::UrlResolution` naming `page_url` when the URL is
    /// malformed, the browser errors, or no location can be read back.
    pub fn resolve(
        &self,
        session: &mut dyn BrowserSession,
        page_url: &str,
    ) -> Result<String, GrabError> {
        let fail = |cause: Option<BrowserError>| GrabError::UrlResolution {
            page_url: page_url.to_string(),
            cause,
        };

        if url::Url::parse(page_url).is_err() {
            return Err(fail(Some(BrowserError::InvalidUrl(page_url.to_string()))));
        }

        session.navigate(page_url).map_err(|e| fail(Some(e)))?;
        let location = self.settled_location(session).map_err(|e| fail(Some(e)))?;

        match location {
            Some(url) if is_content_url(&url) => {
                tracing::info!(page = page_url, resolved = %url, "resolved content URL");
                Ok(url)
            }
            other => {
                tracing::warn!(
                    page = page_url,
                    location = ?other,
                    "no content URL after navigation"
                );
                Err(fail(None))
            }
        }
    }

    fn settled_location(
        &self,
        session: &mut dyn BrowserSession,
    ) -> Result<Option<String>, BrowserError> {
        let mut last = session.current_url()?;
        for _ in 1..self.settle.max_polls {
            if !self.settle.interval.is_zero() {
                thread::sleep(self.settle.interval);
            }
            let next = session.current_url()?;
            if next == last {
                break;
            }
            last = next;
        }
        Ok(last)
    }
}

impl Default for UrlResolver {
    fn default() -> Self {
        Self::new(SettlePolicy::from(&BrowserConfig::default()))
    }
}

fn is_content_url(url: &str) -> bool {
    let url = url.trim();
    !url.is_empty() && url != "about:blank"
}
