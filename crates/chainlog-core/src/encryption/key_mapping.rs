//! Member to key mapping file.
//!
//! One `member id = key id` pair per line. Blank lines are ignored and a
//! line whose first non-blank character is an unescaped `#` is a comment.
//! A backslash makes the next character literal, so `\=`, `\#` and `\\`
//! can appear in identifiers. The first unescaped `=` separates the two
//! sides, which are trimmed. Lines without a separator or with an empty
//! side are logged and skipped. A member listed several times is encrypted
//! for the union of its keys.

use crate::errors::{ChainLogError, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::warn;

const OP_PARSE: &str = "parse_key_mapping";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyMapping {
    keys: BTreeMap<String, BTreeSet<String>>,
}

enum ParsedLine {
    Blank,
    Pair(String, String),
    Malformed,
}

impl KeyMapping {
    /// Load a mapping file
    ///
    /// A missing file yields an empty mapping.
    ///
    /// # Errors
    ///
    /// Returns `KeyMappingUnreadable` when the file exists but cannot be read.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!(
                component = "encryption",
                op = "load_key_mapping",
                mapping_file = %path.display(),
                "Key mapping file not found, no member keys configured"
            );
            return Ok(Self::default());
        }

        let content =
            std::fs::read_to_string(path).map_err(|e| ChainLogError::KeyMappingUnreadable {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self::parse(&content, &path.display().to_string()))
    }

    /// Parse mapping text; `origin` names the source in log output
    pub fn parse(content: &str, origin: &str) -> Self {
        let mut mapping = Self::default();

        for (index, line) in content.lines().enumerate() {
            match parse_line(line) {
                ParsedLine::Blank => {}
                ParsedLine::Pair(member, key) => {
                    mapping.keys.entry(member).or_default().insert(key);
                }
                ParsedLine::Malformed => {
                    warn!(
                        component = "encryption",
                        op = OP_PARSE,
                        mapping_file = origin,
                        line_no = index + 1,
                        "Skipping malformed key mapping line"
                    );
                }
            }
        }

        mapping
    }

    /// Keys configured for `member_id`
    pub fn get(&self, member_id: &str) -> Option<&BTreeSet<String>> {
        self.keys.get(member_id)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &BTreeSet<String>)> {
        self.keys.iter()
    }
}

fn parse_line(line: &str) -> ParsedLine {
    let trimmed = line.trim_start();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return ParsedLine::Blank;
    }

    let mut left = String::new();
    let mut right = String::new();
    let mut separated = false;
    let mut chars = trimmed.chars();

    while let Some(c) = chars.next() {
        let target = if separated { &mut right } else { &mut left };
        match c {
            '\\' => match chars.next() {
                Some(escaped) => target.push(escaped),
                None => target.push('\\'),
            },
            '=' if !separated => separated = true,
            _ => target.push(c),
        }
    }

    let member = left.trim();
    let key = right.trim();
    if !separated || member.is_empty() || key.is_empty() {
        return ParsedLine::Malformed;
    }

    ParsedLine::Pair(member.to_string(), key.to_string())
}
