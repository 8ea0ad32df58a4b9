//! `ArchiveEncryptor` backed by the `gpg` command line tool.
//!
//! Zip bytes are piped to `gpg --encrypt` and the ciphertext goes straight
//! into the archive file. Without explicit recipients the key store's own
//! key is used (`--default-recipient-self`).

use crate::errors::{encryption_error, Result};
use chainlog_core::encryption::{ArchiveEncryptor, EncryptedSink, EncryptionConfig};
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread::{self, JoinHandle};

const DEFAULT_PROGRAM: &str = "gpg";

#[derive(Debug, Clone)]
pub struct GpgEncryptor {
    program: PathBuf,
}

impl Default for GpgEncryptor {
    fn default() -> Self {
        Self {
            program: PathBuf::from(DEFAULT_PROGRAM),
        }
    }
}

impl GpgEncryptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use another gpg binary
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn command(&self, config: &EncryptionConfig) -> Command {
        let mut command = Command::new(&self.program);
        command.args(["--batch", "--yes", "--no-tty", "--trust-model", "always"]);
        if let Some(home) = config.key_store_location() {
            command.arg("--homedir").arg(home);
        }
        command.arg("--encrypt");

        let recipients = config.recipients();
        if recipients.is_empty() {
            command.arg("--default-recipient-self");
        } else {
            for recipient in &recipients {
                command.arg("--recipient").arg(recipient);
            }
        }
        command
    }
}

impl ArchiveEncryptor for GpgEncryptor {
    fn wrap(&self, output: File, config: &EncryptionConfig) -> Result<Box<dyn EncryptedSink>> {
        let mut child = self
            .command(config)
            .stdin(Stdio::piped())
            .stdout(Stdio::from(output))
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| encryption_error("spawn_gpg", e.to_string()))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| encryption_error("spawn_gpg", "gpg stdin not available"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| encryption_error("spawn_gpg", "gpg stderr not available"))?;

        // gpg may fill stderr before it consumes stdin
        let stderr = thread::spawn(move || {
            let mut buf = Vec::new();
            stderr.read_to_end(&mut buf).map(|_| buf)
        });

        Ok(Box::new(GpgSink {
            child: Some(child),
            stdin: Some(stdin),
            stderr: Some(stderr),
        }))
    }
}

struct GpgSink {
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr: Option<JoinHandle<io::Result<Vec<u8>>>>,
}

impl GpgSink {
    fn stdin(&mut self) -> io::Result<&mut ChildStdin> {
        self.stdin
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "gpg input already closed"))
    }
}

impl Write for GpgSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stdin()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stdin()?.flush()
    }
}

impl EncryptedSink for GpgSink {
    fn finish(mut self: Box<Self>) -> Result<()> {
        drop(self.stdin.take());
        let mut child = self
            .child
            .take()
            .ok_or_else(|| encryption_error("finish_gpg", "gpg already finished"))?;

        let status = child
            .wait()
            .map_err(|e| encryption_error("finish_gpg", e.to_string()))?;
        let stderr = match self.stderr.take().map(JoinHandle::join) {
            Some(Ok(Ok(buf))) => buf,
            Some(Ok(Err(e))) => return Err(encryption_error("finish_gpg", e.to_string())),
            Some(Err(_)) => return Err(encryption_error("finish_gpg", "stderr reader panicked")),
            None => Vec::new(),
        };
        if !status.success() {
            return Err(encryption_error(
                "finish_gpg",
                format!(
                    "gpg exited with {}: {}",
                    status,
                    String::from_utf8_lossy(&stderr).trim()
                ),
            ));
        }
        Ok(())
    }
}

impl Drop for GpgSink {
    fn drop(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            if child.kill().is_ok() {
                if let Err(e) = child.wait() {
                    tracing::warn!(
                        component = "gpg_sink",
                        op = "abandon_gpg",
                        error = %e,
                        "Could not reap gpg"
                    );
                }
            }
        }
        if let Some(stderr) = self.stderr.take() {
            drop(stderr.join());
        }
    }
}
