//! Relocates accepted files into the destination tree, preserving the path
//! relative to the source root. Same-filesystem moves are an atomic rename;
//! cross-filesystem moves fall back to copy-then-delete.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MoveError {
    #[error("{0} is not under the source root")]
    NotUnderRoot(PathBuf),
    #[error("failed to create destination directory {path}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },
    #[error("rename failed for {path}: {source}")]
    Rename { path: PathBuf, source: io::Error },
    #[error("cross-device copy failed for {path}: {source}")]
    Copy { path: PathBuf, source: io::Error },
    /// The copy succeeded; a duplicate remains at the source.
    #[error("copied to {dest} but failed to delete source {path}: {source}")]
    SourceDelete {
        path: PathBuf,
        dest: PathBuf,
        source: io::Error,
    },
}

impl MoveError {
    /// True when the file did land at the destination despite the error.
    pub fn delivered(&self) -> bool {
        matches!(self, MoveError::SourceDelete { .. })
    }

    /// True when the source file disappeared before it could be relocated.
    pub fn source_vanished(&self) -> bool {
        match self {
            MoveError::Rename { source, .. } | MoveError::Copy { source, .. } => {
                source.kind() == io::ErrorKind::NotFound
            }
            _ => false,
        }
    }
}

#[cfg(unix)]
const CROSS_DEVICE_CODE: i32 = 18; // EXDEV
#[cfg(windows)]
const CROSS_DEVICE_CODE: i32 = 17; // ERROR_NOT_SAME_DEVICE

fn is_cross_device(err: &io::Error) -> bool {
    err.raw_os_error() == Some(CROSS_DEVICE_CODE)
}

/// Move `path` (which must live under `source_root`) to the mirrored location
/// under `dest_root`, returning the final destination path.
pub fn move_file(source_root: &Path, dest_root: &Path, path: &Path) -> Result<PathBuf, MoveError> {
    let rel = path
        .strip_prefix(source_root)
        .map_err(|_| MoveError::NotUnderRoot(path.to_path_buf()))?;
    let dest = dest_root.join(rel);

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|source| MoveError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    match fs::rename(path, &dest) {
        Ok(()) => Ok(dest),
        Err(e) if is_cross_device(&e) => {
            copy_then_delete(path, &dest)?;
            Ok(dest)
        }
        Err(source) => Err(MoveError::Rename {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Cross-device fallback. The delete runs strictly after the copy succeeds,
/// so a copy failure always leaves the source intact.
pub fn copy_then_delete(path: &Path, dest: &Path) -> Result<(), MoveError> {
    fs::copy(path, dest).map_err(|source| MoveError::Copy {
        path: path.to_path_buf(),
        source,
    })?;
    fs::remove_file(path).map_err(|source| MoveError::SourceDelete {
        path: path.to_path_buf(),
        dest: dest.to_path_buf(),
        source,
    })?;
    Ok(())
}
