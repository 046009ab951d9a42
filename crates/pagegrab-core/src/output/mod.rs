//! Output path policy and temp-file lifecycle.
//!
//! `check_writable` is a side-effect-free predicate run before any browser or
//! network work and again right before the final rename. `OutputTarget` pairs
//! the final path with the temp sibling the transfer writes into.

mod target;

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub use target::{OutputTarget, TempNaming};

/// Suffix of the deterministic, resumable temp sibling.
pub const TEMP_SUFFIX: &str = ".downloading";

#[derive(Debug, Error)]
pub enum OutputFileError {
    #[error("no output directory: {}", .0.display())]
    MissingDirectory(PathBuf),
    #[error("output file already exists: {}", .0.display())]
    AlreadyExists(PathBuf),
    #[error("cannot create temporary file next to {}", path.display())]
    TempFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot resolve output path {}", path.display())]
    Unresolvable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Checks that `path` can receive the download.
///
/// Fails when the parent directory of the absolute path does not exist
/// (regardless of `force`), or when `path` exists and `force` is false.
/// Never creates anything.
pub fn check_writable(path: &Path, force: bool) -> Result<(), OutputFileError> {
    let abs = absolute(path)?;
    let dir_ok = abs.parent().map(Path::is_dir).unwrap_or(false);
    if !dir_ok {
        let dir = abs.parent().map(Path::to_path_buf).unwrap_or(abs);
        return Err(OutputFileError::MissingDirectory(dir));
    }
    // symlink_metadata so a dangling link still counts as "exists"
    if !force && std::fs::symlink_metadata(path).is_ok() {
        return Err(OutputFileError::AlreadyExists(path.to_path_buf()));
    }
    Ok(())
}

/// Absolute form of `path` without touching the filesystem beyond the cwd.
pub(crate) fn absolute(path: &Path) -> Result<PathBuf, OutputFileError> {
    std::path::absolute(path).map_err(|source| OutputFileError::Unresolvable {
        path: path.to_path_buf(),
        source,
    })
}

/// `<final>.downloading`, next to the absolute final path.
pub fn temp_path(final_path: &Path) -> Result<PathBuf, OutputFileError> {
    let mut o = absolute(final_path)?.into_os_string();
    o.push(TEMP_SUFFIX);
    Ok(PathBuf::from(o))
}
