//! Physical output of one archive: the temp file, optional encryption and
//! the byte counter used for rotation.

use crate::errors::{io_error, Result};
use chainlog_core::encryption::EncryptedSink;
use std::cell::Cell;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::warn;

/// Where zip bytes end up
pub enum ArchiveSink {
    Plain(BufWriter<File>),
    Encrypted(Box<dyn EncryptedSink>),
}

impl ArchiveSink {
    /// Flush everything and release the file
    ///
    /// # Errors
    ///
    /// Fails when the final flush or the encryption primitive fails.
    pub fn finish(self) -> Result<()> {
        match self {
            ArchiveSink::Plain(mut out) => {
                out.flush().map_err(|e| io_error("flush_archive", e))?;
                let file = out
                    .into_inner()
                    .map_err(|e| io_error("flush_archive", e.into_error()))?;
                file.sync_all().map_err(|e| io_error("sync_archive", e))
            }
            ArchiveSink::Encrypted(sink) => sink.finish(),
        }
    }
}

impl Write for ArchiveSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            ArchiveSink::Plain(out) => out.write(buf),
            ArchiveSink::Encrypted(sink) => sink.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            ArchiveSink::Plain(out) => out.flush(),
            ArchiveSink::Encrypted(sink) => sink.flush(),
        }
    }
}

/// Counts bytes passed to the inner writer
///
/// The counter is shared so the owner can read it while the zip writer
/// holds the stream.
pub struct CountingWriter<W> {
    inner: W,
    written: Rc<Cell<u64>>,
}

impl<W: Write> CountingWriter<W> {
    pub fn new(inner: W) -> (Self, Rc<Cell<u64>>) {
        let written = Rc::new(Cell::new(0));
        (
            Self {
                inner,
                written: written.clone(),
            },
            written,
        )
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written.set(self.written.get() + n as u64);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Temp file that is deleted on drop unless kept
#[derive(Debug)]
pub struct TempArtifact {
    path: PathBuf,
    armed: bool,
}

impl TempArtifact {
    pub fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Keep the file and hand over its path
    pub fn keep(mut self) -> PathBuf {
        self.armed = false;
        std::mem::take(&mut self.path)
    }

    /// Delete the file now, reporting failure
    ///
    /// # Errors
    ///
    /// Fails when the file exists and cannot be removed.
    pub fn discard(mut self) -> Result<()> {
        self.armed = false;
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error("discard_temp_archive", e)
                .with_subject(self.path.display().to_string())),
        }
    }
}

impl Drop for TempArtifact {
    fn drop(&mut self) {
        if self.armed {
            if let Err(e) = fs::remove_file(&self.path) {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!(
                        component = "temp_artifact",
                        op = "drop_temp_archive",
                        path = %self.path.display(),
                        error = %e,
                        "Could not remove temporary archive"
                    );
                }
            }
        }
    }
}
