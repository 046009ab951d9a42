//! Final path + temp sibling, and the atomic commit between them.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{absolute, temp_path, OutputFileError};
use crate::error::GrabError;

/// How a fresh (non-`--continue-at`) temp file is named.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TempNaming {
    /// `<output>.downloading`; a failed run can be resumed from it.
    #[default]
    Resumable,
    /// `<output>.<random>`, created exclusively so it never collides.
    Unique,
}

/// Where the transfer writes and where the result ends up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTarget {
    pub final_path: PathBuf,
    pub temp_path: PathBuf,
}

impl OutputTarget {
    /// Temp sibling for a fresh download. `Unique` creates an empty file so the
    /// name is reserved before the transfer starts.
    pub fn fresh(final_path: &Path, naming: TempNaming) -> Result<Self, OutputFileError> {
        let temp_path = match naming {
            TempNaming::Resumable => temp_path(final_path)?,
            TempNaming::Unique => unique_sibling(final_path)?,
        };
        Ok(Self {
            final_path: final_path.to_path_buf(),
            temp_path,
        })
    }

    /// Resume into a caller-chosen temp path, used verbatim.
    pub fn continue_at(final_path: &Path, temp_path: &Path) -> Self {
        Self {
            final_path: final_path.to_path_buf(),
            temp_path: temp_path.to_path_buf(),
        }
    }

    /// Atomically renames the temp file onto the final path. Fails (and leaves
    /// the temp file in place) across filesystems.
    pub fn commit(&self) -> Result<(), GrabError> {
        std::fs::rename(&self.temp_path, &self.final_path).map_err(|source| GrabError::Rename {
            from: self.temp_path.clone(),
            to: self.final_path.clone(),
            source,
        })?;
        tracing::debug!(
            from = %self.temp_path.display(),
            to = %self.final_path.display(),
            "committed download"
        );
        Ok(())
    }
}

fn unique_sibling(final_path: &Path) -> Result<PathBuf, OutputFileError> {
    let abs = absolute(final_path)?;
    let dir = abs
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| abs.clone());
    let prefix = match abs.file_name() {
        Some(name) => format!("{}.", name.to_string_lossy()),
        None => ".".to_string(),
    };
    let file = tempfile::Builder::new()
        .prefix(&prefix)
        .rand_bytes(8)
        .tempfile_in(&dir)
        .map_err(|source| OutputFileError::TempFile {
            path: abs.clone(),
            source,
        })?;
    let (_file, path) = file.keep().map_err(|e| OutputFileError::TempFile {
        path: abs.clone(),
        source: e.error,
    })?;
    Ok(path)
}
