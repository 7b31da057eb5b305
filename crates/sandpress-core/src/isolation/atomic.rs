//! Atomic copy primitives
//!
//! Uses copy→fsync→rename so the destination holds either its old bytes or
//! the complete new bytes, never a prefix.

use crate::errors::{io_error, Result};
use std::ffi::OsString;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

/// Sibling path used to stage a copy of `target`
pub fn staging_path(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(OsString::from)
        .unwrap_or_default();
    name.push(".sandpress-tmp");
    target.with_file_name(name)
}

/// Copy `source` next to `target` and flush it to disk; returns the staged path
pub fn stage_copy(source: &Path, target: &Path) -> Result<PathBuf> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|e| io_error("create_parent_dir", parent, e))?;
    }

    let staged = staging_path(target);
    let result = fs::copy(source, &staged)
        .and_then(|_| OpenOptions::new().write(true).open(&staged))
        .and_then(|f| f.sync_all());

    if let Err(e) = result {
        discard(&staged);
        return Err(io_error("stage_copy", source, e));
    }
    Ok(staged)
}

/// Move a staged copy over `target`
pub fn commit_staged(staged: &Path, target: &Path) -> Result<()> {
    fs::rename(staged, target).map_err(|e| {
        discard(staged);
        io_error("commit_staged", target, e)
    })
}

/// Best-effort removal of a staged file
pub fn discard(staged: &Path) {
    fs::remove_file(staged).ok();
}
