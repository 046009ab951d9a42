//! Top-level error for a grab run.
//!
//! Each variant names the step that failed and carries the path or URL the
//! operator needs to fix the problem and re-invoke (possibly with
//! `--continue-at`).

use std::path::PathBuf;

use thiserror::Error;

use crate::output::OutputFileError;
use crate::resolver::BrowserError;
use crate::transfer::TransferError;

#[derive(Debug, Error)]
pub enum GrabError {
    /// Destination directory missing, or destination exists without `--force`.
    #[error(transparent)]
    OutputFile(#[from] OutputFileError),

    /// The browser session could not be created.
    #[error("could not start browser session")]
    Browser(#[source] BrowserError),

    /// Navigation produced no usable content URL.
    #[error("content URL not found: {page_url}")]
    UrlResolution {
        page_url: String,
        #[source]
        cause: Option<BrowserError>,
    },

    /// Transport or local file failure; the partial temp file is kept.
    #[error("download of {url} into {} failed (partial data kept for --continue-at)", temp_path.display())]
    Transfer {
        url: String,
        temp_path: PathBuf,
        #[source]
        source: TransferError,
    },

    /// The download is complete but moving it into place failed.
    #[error(
        "could not rename {} to {}; the content is complete at the temporary path",
        from.display(),
        to.display()
    )]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
