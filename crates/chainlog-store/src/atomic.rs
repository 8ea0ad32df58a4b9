//! Atomic write primitives
//!
//! Uses temp→rename so readers never see a partial file

use crate::errors::{io_error, Result};
use chainlog_core::errors::ExError;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Atomically write bytes to a file
///
/// The temp file is created next to the target so the rename stays on one
/// filesystem.
///
/// # Errors
///
/// Returns an IO error if the directory, the temp file or the rename fails.
pub fn atomic_write(target_path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = target_path.parent() {
        fs::create_dir_all(parent).map_err(|e| io_error("create_parent_dir", e))?;
    }

    let temp_path = sibling_temp_path(target_path);

    if let Err(e) = fs::write(&temp_path, content) {
        let err = io_error("write_temp", e).with_subject(temp_path.display().to_string());
        return Err(remove_after_failure(&temp_path, err));
    }

    fs::rename(&temp_path, target_path).map_err(|e| {
        let err = io_error("rename_temp", e).with_subject(target_path.display().to_string());
        remove_after_failure(&temp_path, err)
    })
}

/// Remove the leftover `path` of a failed write, keeping `err` as the failure
///
/// A removal failure other than a missing file is attached as suppressed.
pub fn remove_after_failure(path: &Path, err: ExError) -> ExError {
    match fs::remove_file(path) {
        Ok(()) => err,
        Err(e) if e.kind() == ErrorKind::NotFound => err,
        Err(e) => err.with_suppressed(
            io_error("remove_leftover", e).with_subject(path.display().to_string()),
        ),
    }
}

/// Move a file, copying when a rename across filesystems is refused
///
/// # Errors
///
/// Returns an IO error if neither rename nor copy succeeds.
pub fn move_file(from: &Path, to: &Path) -> Result<()> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).map_err(|e| io_error("create_parent_dir", e))?;
    }

    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            Err(io_error("move_file", e).with_subject(from.display().to_string()))
        }
        Err(_) => {
            let staged = sibling_temp_path(to);
            fs::copy(from, &staged).map_err(|e| {
                let err = io_error("copy_file", e).with_subject(to.display().to_string());
                remove_after_failure(&staged, err)
            })?;
            fs::rename(&staged, to).map_err(|e| {
                let err = io_error("rename_temp", e).with_subject(to.display().to_string());
                remove_after_failure(&staged, err)
            })?;
            fs::remove_file(from)
                .map_err(|e| io_error("remove_source", e).with_subject(from.display().to_string()))
        }
    }
}

fn sibling_temp_path(target_path: &Path) -> PathBuf {
    let name = target_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    target_path.with_file_name(format!(".{}.{}.tmp", name, Uuid::new_v4()))
}
