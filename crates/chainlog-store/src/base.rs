//! Persisted chain tail.
//!
//! The last digest of every sealed archive is stored per grouping so the
//! next archive, possibly written by a later run, continues the chain.

use crate::archive::naming::encode_name_key;
use crate::atomic::atomic_write;
use crate::errors::{io_error, persistence_error, Result};
use chainlog_core::DigestEntry;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub trait ArchiveBase {
    /// Tail of the last sealed archive of `group`, or the empty entry
    ///
    /// # Errors
    ///
    /// Fails when a stored tail exists but cannot be read.
    fn load_last_archive(&self, group: Option<&str>) -> Result<DigestEntry>;

    /// Record `entry` as the tail of `group`
    ///
    /// # Errors
    ///
    /// Fails when the tail cannot be stored.
    fn mark_archive_created(&self, group: Option<&str>, entry: &DigestEntry) -> Result<()>;
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredTail {
    group: Option<String>,
    last: DigestEntry,
    updated_at: DateTime<Utc>,
}

/// Chain tails as JSON files, one per grouping
#[derive(Debug, Clone)]
pub struct FsArchiveBase {
    root: PathBuf,
}

impl FsArchiveBase {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn tail_path(&self, group: Option<&str>) -> PathBuf {
        match group {
            Some(group) => self
                .root
                .join(format!("last-archive-{}.json", encode_name_key(group))),
            None => self.root.join("last-archive.json"),
        }
    }
}

impl ArchiveBase for FsArchiveBase {
    fn load_last_archive(&self, group: Option<&str>) -> Result<DigestEntry> {
        let path = self.tail_path(group);
        if !path.exists() {
            return Ok(DigestEntry::empty());
        }

        let content = std::fs::read(&path)
            .map_err(|e| io_error("load_last_archive", e).with_subject(path.display().to_string()))?;
        let stored: StoredTail = serde_json::from_slice(&content).map_err(|e| {
            persistence_error("load_last_archive", e.to_string())
                .with_subject(path.display().to_string())
        })?;
        Ok(stored.last)
    }

    fn mark_archive_created(&self, group: Option<&str>, entry: &DigestEntry) -> Result<()> {
        let stored = StoredTail {
            group: group.map(str::to_string),
            last: entry.clone(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_vec_pretty(&stored)
            .map_err(|e| persistence_error("mark_archive_created", e.to_string()))?;
        atomic_write(&self.tail_path(group), &json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_tail_is_empty() {
        let dir = TempDir::new().unwrap();
        let base = FsArchiveBase::new(dir.path());
        assert!(base.load_last_archive(None).unwrap().is_empty());
    }

    #[test]
    fn test_tails_are_kept_per_group() {
        let dir = TempDir::new().unwrap();
        let base = FsArchiveBase::new(dir.path());
        let a = DigestEntry::new("aa", "mlog-a.zip");
        let b = DigestEntry::new("bb", "mlog-b.zip");

        base.mark_archive_created(Some("EE-GOV-1"), &a).unwrap();
        base.mark_archive_created(None, &b).unwrap();

        assert_eq!(base.load_last_archive(Some("EE-GOV-1")).unwrap(), a);
        assert_eq!(base.load_last_archive(None).unwrap(), b);
        assert!(base.load_last_archive(Some("EE-GOV-2")).unwrap().is_empty());
    }

    #[test]
    fn test_colliding_readable_names_keep_separate_tails() {
        // Given two grouping keys whose readable names are both EE-GOV-1-a
        let dir = TempDir::new().unwrap();
        let base = FsArchiveBase::new(dir.path());
        let member = DigestEntry::new("aa", "mlog-member.zip");
        let subsystem = DigestEntry::new("bb", "mlog-subsystem.zip");

        // When both tails are stored
        base.mark_archive_created(Some("EE/GOV/1-a"), &member).unwrap();
        base.mark_archive_created(Some("EE/GOV/1/a"), &subsystem).unwrap();

        // Then each grouping reads back its own tail
        assert_eq!(base.load_last_archive(Some("EE/GOV/1-a")).unwrap(), member);
        assert_eq!(base.load_last_archive(Some("EE/GOV/1/a")).unwrap(), subsystem);
        assert!(dir.path().join("last-archive-EE%2FGOV%2F1-a.json").exists());
        assert!(dir.path().join("last-archive-EE%2FGOV%2F1%2Fa.json").exists());
    }

    #[test]
    fn test_corrupt_tail_is_an_error() {
        let dir = TempDir::new().unwrap();
        let base = FsArchiveBase::new(dir.path());
        std::fs::write(dir.path().join("last-archive.json"), b"{not json").unwrap();

        let err = base.load_last_archive(None).unwrap_err();
        assert_eq!(err.kind(), chainlog_core::ExErrorKind::Persistence);
    }
}
