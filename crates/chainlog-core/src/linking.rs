//! Linking info: the digest chain that ties archived records together.
//!
//! Every archived entry extends the chain:
//!
//! ```text
//! tail_n = hash( tail_{n-1} ++ hex(content_digest_n) )
//! ```
//!
//! where `tail_{n-1}` is the previous hex digest string (the origin's digest
//! for the first entry, empty for a fresh chain). The chain is serialized as
//! a text ledger stored in every archive under the name `linkinginfo`:
//!
//! ```text
//! <origin digest or -> <origin label or -> <algorithm id>
//! <digest 1> <label 1>
//! <digest 2> <label 2>
//! ```
//!
//! A verifier recomputes line *i* from line *i-1* and the content digest of
//! the file named on line *i*. Removing, reordering or altering any file
//! breaks that line and every line after it.
//!
//! The builder is shared between consecutive archive caches of one grouping
//! and only ever reset by the orchestrator, after the sealed archive has
//! been stored and its final entry persisted.

use crate::digest::{DigestAlgorithm, DigestEntry};
use std::cell::RefCell;
use std::rc::Rc;

/// Shared handle to a linking chain, owned by the orchestrator
///
/// Single-threaded by construction: one grouping, one driver.
pub type SharedLinkingInfo = Rc<RefCell<LinkingInfoBuilder>>;

const BLANK_FIELD: &str = "-";

#[derive(Debug, Clone)]
pub struct LinkingInfoBuilder {
    hash_algorithm: DigestAlgorithm,
    chain_tail_digest: String,
    chain_origin: DigestEntry,
    entries: Vec<DigestEntry>,
}

impl LinkingInfoBuilder {
    /// Start a chain continuing from `origin` (use `DigestEntry::empty()`
    /// when there is no previous archive)
    pub fn new(hash_algorithm: DigestAlgorithm, origin: DigestEntry) -> Self {
        Self {
            hash_algorithm,
            chain_tail_digest: origin.digest().to_string(),
            chain_origin: origin,
            entries: Vec::new(),
        }
    }

    /// Wrap a new builder in a shared handle
    pub fn shared(hash_algorithm: DigestAlgorithm, origin: DigestEntry) -> SharedLinkingInfo {
        Rc::new(RefCell::new(Self::new(hash_algorithm, origin)))
    }

    /// Extend the chain with the content digest of the file named `label`
    pub fn add_next_file(&mut self, label: &str, content_digest: &[u8]) {
        let mut input = String::with_capacity(self.chain_tail_digest.len() + content_digest.len() * 2);
        input.push_str(&self.chain_tail_digest);
        input.push_str(&hex::encode(content_digest));

        let new_tail = hex::encode(self.hash_algorithm.digest(input.as_bytes()));
        self.entries
            .push(DigestEntry::new(new_tail.clone(), label.to_string()));
        self.chain_tail_digest = new_tail;
    }

    /// Serialize the chain as the `linkinginfo` ledger
    pub fn build(&self) -> Vec<u8> {
        let mut ledger = String::new();
        ledger.push_str(or_blank(self.chain_origin.digest()));
        ledger.push(' ');
        ledger.push_str(or_blank(self.chain_origin.label()));
        ledger.push(' ');
        ledger.push_str(self.hash_algorithm.id());
        ledger.push('\n');

        for entry in &self.entries {
            ledger.push_str(entry.digest());
            ledger.push(' ');
            ledger.push_str(entry.label());
            ledger.push('\n');
        }

        ledger.into_bytes()
    }

    /// Drop accumulated entries and continue the chain from `origin`
    pub fn reset(&mut self, origin: DigestEntry) {
        self.entries.clear();
        self.chain_tail_digest = origin.digest().to_string();
        self.chain_origin = origin;
    }

    /// Current tail digest (hex)
    pub fn tail_digest(&self) -> &str {
        &self.chain_tail_digest
    }

    /// Tail of the chain as an entry: the last appended entry, or the origin
    pub fn last_digest(&self) -> DigestEntry {
        self.entries
            .last()
            .cloned()
            .unwrap_or_else(|| self.chain_origin.clone())
    }

    pub fn origin(&self) -> &DigestEntry {
        &self.chain_origin
    }

    pub fn entries(&self) -> &[DigestEntry] {
        &self.entries
    }

    pub fn hash_algorithm(&self) -> DigestAlgorithm {
        self.hash_algorithm
    }
}

fn or_blank(value: &str) -> &str {
    if value.is_empty() {
        BLANK_FIELD
    } else {
        value
    }
}
