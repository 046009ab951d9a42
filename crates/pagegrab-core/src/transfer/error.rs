//! Transfer failure kinds.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Why a single transfer failed. The temp file is never removed on any of these.
#[derive(Debug, Error)]
pub enum TransferError {
    /// libcurl reported an error (DNS, connect, TLS, timeout, too many redirects...).
    #[error("{0}")]
    Curl(#[from] curl::Error),

    /// Final response had a non-2xx status.
    #[error("HTTP {0}")]
    Http(u32),

    /// Resume was requested but the server sent the whole body instead of a range.
    #[error("server ignored the resume request at byte {offset}")]
    RangeIgnored { offset: u64 },

    /// Server refused the requested range (416, or a 206 for the wrong range).
    #[error("server rejected resume from byte {offset}")]
    RangeRejected { offset: u64 },

    /// The resume file's size does not match the requested offset.
    #[error("resume file {} holds {actual} bytes, expected {expected}", path.display())]
    OffsetMismatch {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    /// Could not stat the `--continue-at` file.
    #[error("cannot read resume file {}", path.display())]
    ResumeSource {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot open {}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Disk write or sync failed (disk full, permission denied...).
    #[error("cannot write {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl TransferError {
    /// True for failures caused by the server's handling of a resume request.
    pub fn is_resume_rejection(&self) -> bool {
        matches!(
            self,
            TransferError::RangeIgnored { .. } | TransferError::RangeRejected { .. }
        )
    }
}
