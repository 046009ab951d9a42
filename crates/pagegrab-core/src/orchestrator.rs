//! End-to-end run: check output → resolve in browser → transfer → re-check → rename.
//!
//! Any failing step aborts the rest and is returned unchanged. The browser
//! session lives in a `SessionGuard`, so it is closed on every exit path. There
//! is no internal retry; a failed transfer is resumed by running again with
//! `continue_at` pointing at the leftover temp file.

use std::path::{Path, PathBuf};

use crate::config::GrabConfig;
use crate::error::GrabError;
use crate::output::{self, OutputTarget, TempNaming};
use crate::progress::ProgressSink;
use crate::resolver::{
    BrowserLauncher, SessionGuard, SettlePolicy, UrlResolver, WebDriverLauncher,
};
use crate::transfer::{TransferEngine, TransferOptions, TransferRequest};
use crate::user_agent;

/// What the user asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrabRequest {
    pub page_url: String,
    pub output: PathBuf,
    pub force: bool,
    /// Interrupted temp file to resume into.
    pub continue_at: Option<PathBuf>,
    pub verbose: bool,
}

/// Receives the facts an operator needs to resume a failed run by hand.
/// Both are reported before the transfer starts.
pub trait RunReporter {
    fn resolved(&mut self, _content_url: &str) {}
    fn temp_file(&mut self, _path: &Path) {}
}

/// Reporter that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct Quiet;

impl RunReporter for Quiet {}

pub struct Downloader {
    launcher: Box<dyn BrowserLauncher>,
    resolver: UrlResolver,
    engine: TransferEngine,
    temp_naming: TempNaming,
    browser_user_agent: Option<String>,
}

impl Downloader {
    pub fn new(
        launcher: Box<dyn BrowserLauncher>,
        resolver: UrlResolver,
        engine: TransferEngine,
    ) -> Self {
        Self {
            launcher,
            resolver,
            engine,
            temp_naming: TempNaming::default(),
            browser_user_agent: None,
        }
    }

    /// WebDriver-backed downloader configured from `cfg`.
    pub fn from_config(cfg: &GrabConfig) -> Result<Self, GrabError> {
        let launcher =
            WebDriverLauncher::new(&cfg.webdriver_url, &cfg.browser).map_err(GrabError::Browser)?;
        Ok(Self::new(
            Box::new(launcher),
            UrlResolver::new(SettlePolicy::from(&cfg.browser)),
            TransferEngine::new(TransferOptions::from(&cfg.transfer)),
        )
        .temp_naming(cfg.temp_naming)
        .browser_user_agent(cfg.browser.user_agent.clone()))
    }

    pub fn temp_naming(mut self, naming: TempNaming) -> Self {
        self.temp_naming = naming;
        self
    }

    pub fn browser_user_agent(mut self, ua: Option<String>) -> Self {
        self.browser_user_agent = ua;
        self
    }

    pub fn engine(&self) -> &TransferEngine {
        &self.engine
    }

    /// Runs one grab and returns the committed output path.
    pub fn run(
        &mut self,
        request: &GrabRequest,
        sink: &mut dyn ProgressSink,
        reporter: &mut dyn RunReporter,
    ) -> Result<PathBuf, GrabError> {
        // fail fast, before any browser or network work
        output::check_writable(&request.output, request.force)?;

        let ua = user_agent::pick(self.browser_user_agent.as_deref());
        let session = self.launcher.launch(&ua).map_err(GrabError::Browser)?;
        let mut browser = SessionGuard::new(session);

        let content_url = self
            .resolver
            .resolve(browser.session(), &request.page_url)?;
        if content_url != request.page_url {
            tracing::debug!(page = %request.page_url, content = %content_url, "page redirected");
        }

        let (target, transfer) = match &request.continue_at {
            Some(temp) => {
                let transfer = TransferRequest::resume(content_url.as_str(), temp.as_path())
                    .map_err(|source| GrabError::Transfer {
                        url: content_url.clone(),
                        temp_path: temp.clone(),
                        source,
                    })?;
                (OutputTarget::continue_at(&request.output, temp), transfer)
            }
            None => {
                let target = OutputTarget::fresh(&request.output, self.temp_naming)?;
                let transfer =
                    TransferRequest::fresh(content_url.as_str(), target.temp_path.as_path());
                (target, transfer)
            }
        };
        let transfer = transfer.verbose(request.verbose);

        reporter.resolved(&content_url);
        reporter.temp_file(&target.temp_path);
        tracing::info!(
            url = %content_url,
            temp = %target.temp_path.display(),
            resume_offset = ?transfer.resume_offset,
            "downloading"
        );

        self.engine.download(&transfer, sink).map_err(|source| {
            if source.is_resume_rejection() {
                tracing::warn!(
                    temp = %target.temp_path.display(),
                    "server cannot resume this file; start over without --continue-at"
                );
            }
            GrabError::Transfer {
                url: content_url.clone(),
                temp_path: target.temp_path.clone(),
                source,
            }
        })?;

        // the destination may have appeared while we were downloading
        output::check_writable(&request.output, request.force)?;
        target.commit()?;
        tracing::info!(output = %target.final_path.display(), "download complete");

        drop(browser);
        Ok(target.final_path)
    }
}
