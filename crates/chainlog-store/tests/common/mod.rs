#![allow(dead_code)]

use chainlog_core::encryption::{ArchiveEncryptor, EncryptedSink, EncryptionConfig};
use chainlog_core::errors::{ExError, ExErrorKind, Result};
use chainlog_core::{ArchiveRecord, ClientId};
use chrono::{TimeZone, Utc};
use std::fs::File;
use std::io::{self, Cursor, Read, Write};
use std::path::Path;

pub const LOG_TIME_REQUEST_NORMAL_LATEST: i64 = 1_428_664_947_372;
pub const LOG_TIME_REQUEST_LARGE_EARLIEST: i64 = 1_428_664_660_610;
pub const LOG_TIME_RESPONSE_NORMAL: i64 = 1_428_664_927_050;

pub const TOO_LARGE_CONTAINER_SIZE: usize = 10_000;

pub fn client() -> ClientId {
    ClientId::member("EE", "GOV", "1234")
}

pub fn container_of_normal_size() -> Vec<u8> {
    b"This one goes out to normal size container".to_vec()
}

/// Pseudo-random bytes that deflate cannot shrink much
pub fn container_too_large() -> Vec<u8> {
    let mut state: u32 = 0x2545_f491;
    (0..TOO_LARGE_CONTAINER_SIZE)
        .map(|_| {
            state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            (state >> 16) as u8
        })
        .collect()
}

pub fn record(
    id: u64,
    query_id: &str,
    response: bool,
    container: Vec<u8>,
    millis: i64,
    client: ClientId,
) -> ArchiveRecord {
    ArchiveRecord::new(
        id,
        query_id,
        response,
        Utc.timestamp_millis_opt(millis).unwrap(),
        client,
        container,
    )
}

pub fn request_normal(id: u64) -> ArchiveRecord {
    record(
        id,
        "ID1",
        false,
        container_of_normal_size(),
        LOG_TIME_REQUEST_NORMAL_LATEST,
        client(),
    )
}

pub fn request_too_large(id: u64) -> ArchiveRecord {
    record(
        id,
        "ID2",
        false,
        container_too_large(),
        LOG_TIME_REQUEST_LARGE_EARLIEST,
        client(),
    )
}

pub fn response_normal(id: u64) -> ArchiveRecord {
    record(
        id,
        "ID3",
        true,
        container_of_normal_size(),
        LOG_TIME_RESPONSE_NORMAL,
        client(),
    )
}

/// Entry names and contents of a zip, in archive order
pub fn zip_entries(bytes: &[u8]) -> Vec<(String, Vec<u8>)> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    (0..archive.len())
        .map(|i| {
            let mut file = archive.by_index(i).unwrap();
            let mut content = Vec::new();
            file.read_to_end(&mut content).unwrap();
            (file.name().to_string(), content)
        })
        .collect()
}

pub fn entry_names(bytes: &[u8]) -> Vec<String> {
    zip_entries(bytes).into_iter().map(|(name, _)| name).collect()
}

pub fn files_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

pub const XOR_KEY: u8 = 0x5a;

/// Reversible stand-in for a real encryption primitive
pub struct XorEncryptor;

struct XorSink {
    file: File,
}

impl Write for XorSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let masked: Vec<u8> = buf.iter().map(|b| b ^ XOR_KEY).collect();
        self.file.write_all(&masked)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl EncryptedSink for XorSink {
    fn finish(mut self: Box<Self>) -> Result<()> {
        self.file
            .flush()
            .map_err(|e| ExError::new(ExErrorKind::Encryption).with_message(e.to_string()))
    }
}

impl ArchiveEncryptor for XorEncryptor {
    fn wrap(&self, output: File, _config: &EncryptionConfig) -> Result<Box<dyn EncryptedSink>> {
        Ok(Box::new(XorSink { file: output }))
    }
}

pub fn xor_decrypt(bytes: &[u8]) -> Vec<u8> {
    bytes.iter().map(|b| b ^ XOR_KEY).collect()
}

/// Encryptor whose output breaks after `limit` bytes
pub struct FailingEncryptor {
    pub limit: usize,
}

struct FailingSink {
    file: File,
    remaining: usize,
}

impl Write for FailingSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.len() > self.remaining {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "encryptor died"));
        }
        self.remaining -= buf.len();
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl EncryptedSink for FailingSink {
    fn finish(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

impl ArchiveEncryptor for FailingEncryptor {
    fn wrap(&self, output: File, _config: &EncryptionConfig) -> Result<Box<dyn EncryptedSink>> {
        Ok(Box::new(FailingSink {
            file: output,
            remaining: self.limit,
        }))
    }
}
