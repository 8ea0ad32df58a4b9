//! Grouping-aware archive driver.
//!
//! Records arrive ordered by client. The writer keeps one cache for the
//! grouping of the current record and seals it when the grouping changes,
//! when the cache rotates, or on `close`. Sealing moves the archive into
//! the archive directory, persists the chain tail and restarts the chain
//! from that tail.

use super::cache::LogArchiveCache;
use super::naming::archive_file_name;
use crate::atomic::{move_file, remove_after_failure};
use crate::base::ArchiveBase;
use crate::errors::Result;
use chainlog_core::encryption::{ArchiveEncryptor, EncryptionConfigProvider};
use chainlog_core::errors::ChainLogError;
use chainlog_core::{
    log_op_end, log_op_error, log_op_start, ArchiveRecord, ArchiverSettings, DigestAlgorithm,
    DigestEntry, Grouping, GroupingStrategy, LinkingInfoBuilder, SharedLinkingInfo,
};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Instant;
use tracing::info;

struct GroupState {
    grouping: Grouping,
    linking_info: SharedLinkingInfo,
    cache: LogArchiveCache,
}

pub struct LogArchiveWriter<B: ArchiveBase> {
    archive_dir: PathBuf,
    work_dir: PathBuf,
    digest_algorithm: DigestAlgorithm,
    max_archive_size: u64,
    grouping_strategy: GroupingStrategy,
    provider: Box<dyn EncryptionConfigProvider>,
    encryptor: Option<Rc<dyn ArchiveEncryptor>>,
    base: B,
    current: Option<GroupState>,
}

impl<B: ArchiveBase> LogArchiveWriter<B> {
    pub fn new(
        settings: &ArchiverSettings,
        provider: Box<dyn EncryptionConfigProvider>,
        encryptor: Option<Rc<dyn ArchiveEncryptor>>,
        base: B,
    ) -> Self {
        Self {
            archive_dir: settings.archive_path.clone(),
            work_dir: settings.temp_dir().to_path_buf(),
            digest_algorithm: settings.digest_algorithm,
            max_archive_size: settings.max_archive_size,
            grouping_strategy: settings.encryption.grouping,
            provider,
            encryptor,
            base,
            current: None,
        }
    }

    /// Archive one record
    ///
    /// Returns `true` when an archive was sealed while handling it.
    ///
    /// # Errors
    ///
    /// Fails when the grouping cannot be started, the record cannot be
    /// written or a sealed archive cannot be stored. After a write failure
    /// the grouping is dropped and restarts from its persisted tail.
    pub fn write(&mut self, record: &ArchiveRecord) -> Result<bool> {
        let mut sealed = false;

        let belongs = self
            .current
            .as_ref()
            .is_some_and(|group| group.grouping.matches(record));
        if !belongs {
            sealed |= self.seal_current()?.is_some();
            self.current = Some(self.start_group(record)?);
        }

        let Some(group) = self.current.as_mut() else {
            return Err(ChainLogError::Internal {
                message: "no active grouping".to_string(),
            }
            .into());
        };
        if let Err(err) = group.cache.add(Some(record)) {
            self.current = None;
            return Err(err);
        }

        if group.cache.is_rotating() {
            sealed |= self.seal_current()?.is_some();
        }
        Ok(sealed)
    }

    /// Seal the current archive if it holds any record
    ///
    /// Returns the stored archive's path.
    ///
    /// # Errors
    ///
    /// Fails when sealing, moving or persisting the tail fails.
    pub fn seal_current(&mut self) -> Result<Option<PathBuf>> {
        let Some(group) = self.current.as_mut() else {
            return Ok(None);
        };
        if group.cache.is_empty() {
            return Ok(None);
        }

        let start = Instant::now();
        let group_name = group.grouping.name();
        log_op_start!("store_archive", group = group_name.as_deref().unwrap_or("-"));

        match store_archive(group, &self.archive_dir, &self.base) {
            Ok(path) => {
                log_op_end!(
                    "store_archive",
                    duration_ms = start.elapsed().as_millis() as u64,
                    archive_name = %path.display()
                );
                Ok(Some(path))
            }
            Err(err) => {
                log_op_error!("store_archive", err, duration_ms = start.elapsed().as_millis() as u64);
                self.current = None;
                Err(err)
            }
        }
    }

    /// Seal what is pending and release the grouping
    ///
    /// # Errors
    ///
    /// Fails when the pending archive cannot be stored.
    pub fn close(&mut self) -> Result<Option<PathBuf>> {
        let sealed = self.seal_current()?;
        self.current = None;
        Ok(sealed)
    }

    /// Chain of the current grouping
    pub fn linking_info(&self) -> Option<SharedLinkingInfo> {
        self.current.as_ref().map(|g| g.linking_info.clone())
    }

    pub fn grouping(&self) -> Option<&Grouping> {
        self.current.as_ref().map(|g| &g.grouping)
    }

    pub fn base(&self) -> &B {
        &self.base
    }

    pub fn archive_dir(&self) -> &Path {
        &self.archive_dir
    }

    fn start_group(&self, record: &ArchiveRecord) -> Result<GroupState> {
        let grouping = self.grouping_strategy.for_client(&record.client);
        let group_name = grouping.name();
        let origin = self.base.load_last_archive(grouping.key().as_deref())?;
        let encryption = self.provider.for_grouping(&grouping)?;

        info!(
            component = "archive_writer",
            op = "start_group",
            group = group_name.as_deref().unwrap_or("-"),
            origin = origin.label(),
            encrypted = encryption.is_enabled(),
        );

        let linking_info = LinkingInfoBuilder::shared(self.digest_algorithm, origin);
        let cache = LogArchiveCache::new(
            linking_info.clone(),
            encryption,
            self.encryptor.clone(),
            &self.work_dir,
            self.max_archive_size,
        )?;

        Ok(GroupState {
            grouping,
            linking_info,
            cache,
        })
    }
}

/// Persist `entry` as the tail of `group` and restart the chain from it
///
/// # Errors
///
/// Fails when the tail cannot be persisted; the chain is then left as is.
pub fn commit_archive(
    base: &dyn ArchiveBase,
    group: Option<&str>,
    linking_info: &SharedLinkingInfo,
    entry: DigestEntry,
) -> Result<()> {
    base.mark_archive_created(group, &entry)?;
    linking_info.borrow_mut().reset(entry);
    Ok(())
}

fn store_archive(group: &mut GroupState, archive_dir: &Path, base: &dyn ArchiveBase) -> Result<PathBuf> {
    let (Some(start), Some(end)) = (group.cache.start_time(), group.cache.end_time()) else {
        return Err(ChainLogError::Internal {
            message: "non-empty archive without record times".to_string(),
        }
        .into());
    };
    let suffix = group.cache.encrypted_suffix().map(str::to_string);
    let group_name = group.grouping.name();

    let temp_path = group.cache.get_archive_file()?;
    let tail = group.linking_info.borrow().tail_digest().to_string();
    let name = archive_file_name(group_name.as_deref(), start, end, &tail, suffix.as_deref());
    let target = archive_dir.join(&name);

    if let Err(err) = move_file(&temp_path, &target) {
        return Err(remove_after_failure(&temp_path, err));
    }

    commit_archive(
        base,
        group.grouping.key().as_deref(),
        &group.linking_info,
        DigestEntry::new(tail, name),
    )?;
    Ok(target)
}
