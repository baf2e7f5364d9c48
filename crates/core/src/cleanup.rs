//! Post-batch source-tree cleanup: depth-first removal of disallowed leftover
//! files and now-empty directories. The source root itself is never removed.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use tracing::{debug, warn};

use crate::classify::Allowlist;

#[derive(Debug, Default, Clone, Copy)]
pub struct CleanupStats {
    pub files_deleted: usize,
    pub dirs_removed: usize,
}

pub fn sweep(root: &Path, allowlist: &Allowlist, strict: bool) -> CleanupStats {
    let mut stats = CleanupStats::default();
    sweep_dir(root, root, allowlist, strict, &mut stats);
    stats
}

fn sweep_dir(root: &Path, dir: &Path, allowlist: &Allowlist, strict: bool, stats: &mut CleanupStats) {
    // Children before parent, so emptied subdirectories can be removed on the
    // way back up.
    let subdirs = match list_dirs(dir) {
        Some(d) => d,
        None => return,
    };
    for sub in subdirs {
        sweep_dir(root, &sub, allowlist, strict, stats);
    }

    // Re-list after recursion; concurrent writers may have changed the tree.
    let entries = match fs::read_dir(dir) {
        Ok(e) => e,
        Err(err) => {
            if err.kind() != ErrorKind::NotFound {
                warn!(dir = %dir.display(), "cleanup listing failed: {err}");
            }
            return;
        }
    };

    let mut remaining = 0usize;
    for entry in entries.flatten() {
        let path = entry.path();
        let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
        if is_file && !allowlist.is_allowed(&path) {
            if !strict {
                debug!(path = %path.display(), "leaving disallowed leftover (strict mode off)");
                remaining += 1;
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => {
                    debug!(path = %path.display(), "deleted disallowed leftover");
                    stats.files_deleted += 1;
                }
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => {
                    warn!(path = %path.display(), "failed to delete leftover: {err}");
                    remaining += 1;
                }
            }
        } else {
            remaining += 1;
        }
    }

    if remaining == 0 && dir != root {
        match fs::remove_dir(dir) {
            Ok(()) => stats.dirs_removed += 1,
            // Raced by a concurrent writer or a parallel sweep; both expected.
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) if is_not_empty(&err) => {}
            Err(err) => warn!(dir = %dir.display(), "failed to remove empty directory: {err}"),
        }
    }
}

fn list_dirs(dir: &Path) -> Option<Vec<std::path::PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(e) => e,
        Err(err) => {
            if err.kind() != ErrorKind::NotFound {
                warn!(dir = %dir.display(), "cleanup listing failed: {err}");
            }
            return None;
        }
    };
    Some(
        entries
            .flatten()
            .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .map(|e| e.path())
            .collect(),
    )
}

#[cfg(unix)]
const NOT_EMPTY_CODE: i32 = 39; // ENOTEMPTY
#[cfg(windows)]
const NOT_EMPTY_CODE: i32 = 145; // ERROR_DIR_NOT_EMPTY

fn is_not_empty(err: &std::io::Error) -> bool {
    err.raw_os_error() == Some(NOT_EMPTY_CODE)
}
