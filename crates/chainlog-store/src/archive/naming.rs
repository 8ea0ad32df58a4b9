//! Entry and archive file names.

use chainlog_core::ArchiveRecord;
use chrono::{DateTime, Utc};
use std::collections::HashSet;

const ENTRY_EXTENSION: &str = ".asice";
const ARCHIVE_PREFIX: &str = "mlog";
const ARCHIVE_EXTENSION: &str = ".zip";
const TIME_FORMAT: &str = "%Y%m%d%H%M%S";
const SUFFIX_LEN: usize = 10;

/// Replace everything outside `[A-Za-z0-9._-]` with `_`
pub fn escape_name_part(value: &str) -> String {
    value
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Reversible file-name form of `value`
///
/// Bytes outside `[A-Za-z0-9._-]` become `%XX`, so distinct values give
/// distinct names.
pub fn encode_name_key(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for b in value.bytes() {
        if b.is_ascii_alphanumeric() || b == b'.' || b == b'_' || b == b'-' {
            out.push(char::from(b));
        } else {
            out.push('%');
            out.push_str(&hex::encode_upper([b]));
        }
    }
    out
}

/// `<query id>-<request|response>-<record id>`, without extension
pub fn entry_base_name(record: &ArchiveRecord) -> String {
    format!(
        "{}-{}-{}",
        escape_name_part(&record.query_id),
        record.direction(),
        record.id
    )
}

/// Names already used inside one physical archive
#[derive(Debug, Default)]
pub struct EntryNames {
    used: HashSet<String>,
}

impl EntryNames {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unique entry name for `record`; clashes get `-<n>` before the extension
    pub fn next_for(&mut self, record: &ArchiveRecord) -> String {
        let base = entry_base_name(record);
        let mut candidate = format!("{}{}", base, ENTRY_EXTENSION);
        let mut counter = 1u32;
        while self.used.contains(&candidate) {
            candidate = format!("{}-{}{}", base, counter, ENTRY_EXTENSION);
            counter += 1;
        }
        self.used.insert(candidate.clone());
        candidate
    }

    pub fn len(&self) -> usize {
        self.used.len()
    }

    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }
}

/// `mlog[-<group>]-<start>-<end>-<tail prefix>.zip[<encrypted suffix>]`
pub fn archive_file_name(
    group: Option<&str>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    tail_digest: &str,
    encrypted_suffix: Option<&str>,
) -> String {
    let mut name = String::from(ARCHIVE_PREFIX);
    if let Some(group) = group {
        name.push('-');
        name.push_str(&escape_name_part(group));
    }
    name.push('-');
    name.push_str(&start.format(TIME_FORMAT).to_string());
    name.push('-');
    name.push_str(&end.format(TIME_FORMAT).to_string());
    name.push('-');
    name.push_str(&tail_digest.chars().take(SUFFIX_LEN).collect::<String>());
    name.push_str(ARCHIVE_EXTENSION);
    if let Some(suffix) = encrypted_suffix {
        name.push_str(suffix);
    }
    name
}
