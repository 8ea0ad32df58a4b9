//! Chained archive writer.
//!
//! A `LogArchiveCache` streams record containers into one physical zip
//! archive at a time. Each entry's digest extends the shared linking chain,
//! and sealing the archive appends the chain's ledger as the `linkinginfo`
//! entry. When the bytes written pass the size ceiling the cache turns
//! `Rotating`: the caller is expected to take the archive with
//! `get_archive_file` before adding more.
//!
//! States:
//!
//! ```text
//! New --add--> Adding --(bytes > ceiling)--> Rotating
//!  ^                                            |
//!  +---------- get_archive_file / add ----------+
//! ```

use super::naming::EntryNames;
use super::sink::{ArchiveSink, CountingWriter, TempArtifact};
use crate::errors::{archive_aborted, io_error, zip_error, Result};
use chainlog_core::encryption::{ArchiveEncryptor, EncryptionConfig};
use chainlog_core::errors::{ChainLogError, ExError};
use chainlog_core::{log_op_end, log_op_error, log_op_start, ArchiveRecord, SharedLinkingInfo};
use chrono::{DateTime, Utc};
use std::cell::Cell;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;
use zip::write::{SimpleFileOptions, StreamWriter};
use zip::{CompressionMethod, ZipWriter};

/// Name of the ledger entry closing every archive
pub const LINKING_INFO_ENTRY: &str = "linkinginfo";

const TEMP_PREFIX: &str = "mlog-";
const TEMP_SUFFIX: &str = ".zip.tmp";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    New,
    Adding,
    Rotating,
}

type ArchiveZip = ZipWriter<StreamWriter<CountingWriter<ArchiveSink>>>;

struct OpenArchive {
    zip: Option<ArchiveZip>,
    written: Rc<Cell<u64>>,
    temp: TempArtifact,
    names: EntryNames,
}

pub struct LogArchiveCache {
    linking_info: SharedLinkingInfo,
    encryption: EncryptionConfig,
    encryptor: Option<Rc<dyn ArchiveEncryptor>>,
    work_dir: PathBuf,
    max_archive_size: u64,
    state: CacheState,
    archive: Option<OpenArchive>,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
}

impl LogArchiveCache {
    /// Create a cache writing into `work_dir`
    ///
    /// # Errors
    ///
    /// Returns `EncryptorMissing` when `encryption` is enabled but no
    /// encryptor is given.
    pub fn new(
        linking_info: SharedLinkingInfo,
        encryption: EncryptionConfig,
        encryptor: Option<Rc<dyn ArchiveEncryptor>>,
        work_dir: impl Into<PathBuf>,
        max_archive_size: u64,
    ) -> Result<Self> {
        if encryption.is_enabled() && encryptor.is_none() {
            return Err(ChainLogError::EncryptorMissing.into());
        }

        Ok(Self {
            linking_info,
            encryption,
            encryptor,
            work_dir: work_dir.into(),
            max_archive_size,
            state: CacheState::New,
            archive: None,
            start_time: None,
            end_time: None,
        })
    }

    /// Add one record to the current archive
    ///
    /// # Errors
    ///
    /// Rejects an absent record. Any write failure aborts the current
    /// archive; its temp file is removed and the failure is returned with
    /// cleanup errors attached.
    pub fn add(&mut self, record: Option<&ArchiveRecord>) -> Result<()> {
        let record = record.ok_or_else(|| ChainLogError::InvalidRecord {
            reason: "record must not be absent".to_string(),
        })?;

        if self.state == CacheState::Rotating {
            warn!(
                component = "archive_cache",
                op = "archive_add",
                "Archive was not taken before adding, discarding it"
            );
            self.discard_archive();
        }

        if self.archive.is_none() {
            self.archive = Some(self.open_archive()?);
        }

        if let Err(cause) = self.write_entry(record) {
            return Err(self.abort("archive_add", cause));
        }

        self.start_time = Some(self.start_time.map_or(record.time, |t| t.min(record.time)));
        self.end_time = Some(self.end_time.map_or(record.time, |t| t.max(record.time)));

        let written = self.bytes_written();
        self.state = if written > self.max_archive_size {
            CacheState::Rotating
        } else {
            CacheState::Adding
        };

        debug!(
            component = "archive_cache",
            op = "archive_add",
            bytes_written = written,
            rotating = self.state == CacheState::Rotating,
        );
        Ok(())
    }

    /// Seal the current archive and hand over its file
    ///
    /// Appends the `linkinginfo` ledger, closes the streams and returns the
    /// path of the sealed temp file, which now belongs to the caller. The
    /// cache starts over in `New`; the linking chain is left as is.
    ///
    /// # Errors
    ///
    /// Any failure aborts the archive and removes its temp file.
    pub fn get_archive_file(&mut self) -> Result<PathBuf> {
        let start = Instant::now();
        log_op_start!("seal_archive");

        if self.archive.is_none() {
            self.archive = Some(self.open_archive()?);
        }

        let ledger = self.linking_info.borrow().build();
        let sealed = match self.archive.as_mut() {
            Some(archive) => seal(archive, &ledger),
            None => Err(ChainLogError::Internal {
                message: "no open archive to seal".to_string(),
            }
            .into()),
        };
        if let Err(cause) = sealed {
            let err = self.abort("seal_archive", cause);
            log_op_error!("seal_archive", err, duration_ms = start.elapsed().as_millis() as u64);
            return Err(err);
        }

        let Some(archive) = self.archive.take() else {
            return Err(ChainLogError::Internal {
                message: "sealed archive disappeared".to_string(),
            }
            .into());
        };
        let entry_count = archive.names.len();
        let path = archive.temp.keep();
        self.reset_physical_state();

        log_op_end!(
            "seal_archive",
            duration_ms = start.elapsed().as_millis() as u64,
            entry_count = entry_count,
            archive_name = %path.display()
        );
        Ok(path)
    }

    /// Discard any unsealed archive
    pub fn close(&mut self) {
        if self.archive.is_some() {
            self.discard_archive();
        }
    }

    pub fn state(&self) -> CacheState {
        self.state
    }

    pub fn is_rotating(&self) -> bool {
        self.state == CacheState::Rotating
    }

    /// No record written since the last seal
    pub fn is_empty(&self) -> bool {
        self.archive.as_ref().map_or(true, |a| a.names.is_empty())
    }

    /// Earliest record time in the current archive
    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.start_time
    }

    /// Latest record time in the current archive
    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end_time
    }

    /// Bytes written to the current archive, before encryption
    pub fn bytes_written(&self) -> u64 {
        self.archive.as_ref().map_or(0, |a| a.written.get())
    }

    pub fn encryption(&self) -> &EncryptionConfig {
        &self.encryption
    }

    /// Suffix of sealed files, when encrypted
    pub fn encrypted_suffix(&self) -> Option<&str> {
        match &self.encryptor {
            Some(encryptor) if self.encryption.is_enabled() => Some(encryptor.file_suffix()),
            _ => None,
        }
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    fn open_archive(&self) -> Result<OpenArchive> {
        fs::create_dir_all(&self.work_dir)
            .map_err(|e| io_error("create_work_dir", e).with_subject(self.work_dir.display().to_string()))?;

        let path = self
            .work_dir
            .join(format!("{}{}{}", TEMP_PREFIX, Uuid::new_v4(), TEMP_SUFFIX));
        let file = File::create(&path)
            .map_err(|e| io_error("create_temp_archive", e).with_subject(path.display().to_string()))?;
        let temp = TempArtifact::new(path);

        let sink = match (&self.encryptor, self.encryption.is_enabled()) {
            (Some(encryptor), true) => ArchiveSink::Encrypted(encryptor.wrap(file, &self.encryption)?),
            _ => ArchiveSink::Plain(BufWriter::new(file)),
        };

        let (counting, written) = CountingWriter::new(sink);
        debug!(
            component = "archive_cache",
            op = "open_archive",
            temp_file = %temp.path().display(),
            encrypted = self.encryption.is_enabled(),
        );

        Ok(OpenArchive {
            zip: Some(ZipWriter::new_stream(counting)),
            written,
            temp,
            names: EntryNames::new(),
        })
    }

    fn write_entry(&mut self, record: &ArchiveRecord) -> Result<()> {
        let archive = self.archive.as_mut().ok_or_else(|| ChainLogError::Internal {
            message: "no open archive".to_string(),
        })?;
        let zip = archive.zip.as_mut().ok_or_else(|| ChainLogError::Internal {
            message: "archive stream already closed".to_string(),
        })?;

        let name = archive.names.next_for(record);
        zip.start_file(name.as_str(), entry_options())
            .map_err(|e| zip_error("write_entry", e).with_subject(name.clone()))?;
        zip.write_all(&record.container)
            .map_err(|e| io_error("write_entry", e).with_subject(name.clone()))?;
        zip.flush()
            .map_err(|e| io_error("flush_entry", e).with_subject(name.clone()))?;

        let mut linking_info = self.linking_info.borrow_mut();
        let digest = linking_info.hash_algorithm().digest(&record.container);
        linking_info.add_next_file(&name, &digest);
        Ok(())
    }

    /// Drop the current archive, delete its file and return the failure
    fn abort(&mut self, op: &str, cause: ExError) -> ExError {
        let mut err = archive_aborted(op, cause);
        if let Some(archive) = self.archive.take() {
            let OpenArchive { zip, temp, .. } = archive;
            drop(zip);
            if let Err(cleanup) = temp.discard() {
                err = err.with_suppressed(cleanup);
            }
        }
        self.reset_physical_state();
        err
    }

    fn discard_archive(&mut self) {
        if let Some(archive) = self.archive.take() {
            let OpenArchive { zip, temp, .. } = archive;
            drop(zip);
            if let Err(e) = temp.discard() {
                warn!(
                    component = "archive_cache",
                    op = "discard_archive",
                    error = %e,
                    "Could not remove unsealed archive"
                );
            }
        }
        self.reset_physical_state();
    }

    fn reset_physical_state(&mut self) {
        self.state = CacheState::New;
        self.start_time = None;
        self.end_time = None;
    }
}

impl Drop for LogArchiveCache {
    fn drop(&mut self) {
        self.close();
    }
}

fn entry_options() -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default())
}

/// Append the ledger, finish the zip and close the physical output
fn seal(archive: &mut OpenArchive, ledger: &[u8]) -> Result<()> {
    let mut zip = archive.zip.take().ok_or_else(|| ChainLogError::Internal {
        message: "archive stream already closed".to_string(),
    })?;

    zip.start_file(LINKING_INFO_ENTRY, entry_options())
        .map_err(|e| zip_error("write_linking_info", e))?;
    zip.write_all(ledger)
        .map_err(|e| io_error("write_linking_info", e))?;

    let stream = zip.finish().map_err(|e| zip_error("finish_archive", e))?;
    stream.into_inner().into_inner().finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainlog_core::{ClientId, DigestAlgorithm, DigestEntry, LinkingInfoBuilder};
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn cache(dir: &Path, max: u64) -> (LogArchiveCache, SharedLinkingInfo) {
        let linking = LinkingInfoBuilder::shared(DigestAlgorithm::Sha512, DigestEntry::empty());
        let cache = LogArchiveCache::new(
            linking.clone(),
            EncryptionConfig::disabled(),
            None,
            dir,
            max,
        )
        .unwrap();
        (cache, linking)
    }

    fn record(id: u64, millis: i64) -> ArchiveRecord {
        ArchiveRecord::new(
            id,
            "ID1",
            false,
            Utc.timestamp_millis_opt(millis).unwrap(),
            ClientId::member("EE", "GOV", "1"),
            b"This one goes out to normal size container".to_vec(),
        )
    }

    #[test]
    fn test_new_cache_is_empty() {
        let dir = TempDir::new().unwrap();
        let (cache, _) = cache(dir.path(), 1000);
        assert!(cache.is_empty());
        assert_eq!(cache.state(), CacheState::New);
        assert!(cache.start_time().is_none());
    }

    #[test]
    fn test_times_track_min_and_max() {
        let dir = TempDir::new().unwrap();
        let (mut cache, _) = cache(dir.path(), u64::MAX);
        cache.add(Some(&record(0, 2_000))).unwrap();
        cache.add(Some(&record(1, 1_000))).unwrap();
        cache.add(Some(&record(2, 3_000))).unwrap();

        assert_eq!(cache.start_time().unwrap().timestamp_millis(), 1_000);
        assert_eq!(cache.end_time().unwrap().timestamp_millis(), 3_000);
        assert_eq!(cache.state(), CacheState::Adding);
    }

    #[test]
    fn test_encryption_without_encryptor_rejected() {
        let linking = LinkingInfoBuilder::shared(DigestAlgorithm::Sha512, DigestEntry::empty());
        let config = EncryptionConfig::new(
            chainlog_core::RecipientPolicy::SingleDefaultKey(None),
            None,
        );
        let result = LogArchiveCache::new(linking, config, None, "/tmp", 10);
        assert!(result.is_err());
    }

    #[test]
    fn test_close_removes_temp_file() {
        let dir = TempDir::new().unwrap();
        let (mut cache, _) = cache(dir.path(), u64::MAX);
        cache.add(Some(&record(0, 1))).unwrap();
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);

        cache.close();

        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_seal_leaves_chain_untouched() {
        let dir = TempDir::new().unwrap();
        let (mut cache, linking) = cache(dir.path(), u64::MAX);
        cache.add(Some(&record(0, 1))).unwrap();

        let path = cache.get_archive_file().unwrap();

        assert!(path.exists());
        assert_eq!(linking.borrow().entries().len(), 1);
        assert_eq!(cache.state(), CacheState::New);
    }
}
