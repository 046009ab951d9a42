//! Resumable single-stream HTTP GET into a file.
//!
//! Every call to `TransferEngine::download` builds a brand-new libcurl handle
//! (`TransferSession`) with TLS verification, redirects, a freshly rotated
//! User-Agent and a progress callback bound to the caller's sink. The handle is
//! dropped when the call returns, successful or not.

mod error;
mod session;

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::progress::ProgressSink;
use crate::user_agent;

pub use error::TransferError;
pub use session::TransferSession;

/// One GET into one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub url: String,
    pub dest: PathBuf,
    /// Bytes already in `dest`; must equal its current size.
    pub resume_offset: Option<u64>,
    pub verbose: bool,
}

impl TransferRequest {
    pub fn fresh(url: impl Into<String>, dest: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            dest: dest.into(),
            resume_offset: None,
            verbose: false,
        }
    }

    /// Resume into `dest`, taking the offset from its current size.
    pub fn resume(url: impl Into<String>, dest: impl Into<PathBuf>) -> Result<Self, TransferError> {
        let dest = dest.into();
        let offset = resume_offset(&dest)?;
        Ok(Self {
            url: url.into(),
            dest,
            resume_offset: Some(offset),
            verbose: false,
        })
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

/// Size of an interrupted download, used as the resume offset.
pub fn resume_offset(path: &Path) -> Result<u64, TransferError> {
    std::fs::metadata(path)
        .map(|m| m.len())
        .map_err(|source| TransferError::ResumeSource {
            path: path.to_path_buf(),
            source,
        })
}

/// Transport settings re-applied to every session.
#[derive(Debug, Clone)]
pub struct TransferOptions {
    pub connect_timeout: Duration,
    pub low_speed_limit: u32,
    pub low_speed_time: Duration,
    pub max_redirections: u32,
    /// Fixed User-Agent; rotated per session when `None`.
    pub user_agent: Option<String>,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self::from(&crate::config::TransferConfig::default())
    }
}

pub struct TransferEngine {
    options: TransferOptions,
    sessions_opened: u64,
}

impl TransferEngine {
    pub fn new(options: TransferOptions) -> Self {
        Self {
            options,
            sessions_opened: 0,
        }
    }

    /// Number of transport handles built so far (one per `download`).
    pub fn sessions_opened(&self) -> u64 {
        self.sessions_opened
    }

    /// Performs `request`, reporting progress to `sink`. `sink.start()` and
    /// `sink.finish()` bracket the transfer on every path. On failure the
    /// destination file is left as-is for a later resume.
    pub fn download(
        &mut self,
        request: &TransferRequest,
        sink: &mut dyn ProgressSink,
    ) -> Result<u64, TransferError> {
        let ua = user_agent::pick(self.options.user_agent.as_deref());
        let session = TransferSession::open(&self.options, request, ua)?;
        self.sessions_opened += 1;
        tracing::debug!(
            url = %request.url,
            dest = %request.dest.display(),
            resume_offset = ?request.resume_offset,
            user_agent = session.user_agent(),
            "starting transfer"
        );

        sink.start();
        let result = session.run(sink);
        sink.finish();

        match &result {
            Ok(bytes) => tracing::info!(url = %request.url, bytes, "transfer finished"),
            Err(e) => tracing::warn!(url = %request.url, "transfer failed: {}", e),
        }
        result
    }
}

impl Default for TransferEngine {
    fn default() -> Self {
        Self::new(TransferOptions::default())
    }
}
