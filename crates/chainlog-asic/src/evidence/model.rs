//! Evidence record and ASiC manifest data model.
//!
//! Shapes follow RFC 4998 (as serialized by RFC 6283) and the ASiC
//! `ASiCManifest` of ETSI EN 319 162. Digests are raw bytes; the XML layer
//! base64-encodes them.

use chainlog_core::DigestAlgorithm;

pub const EVIDENCE_RECORD_VERSION: &str = "1.0";
pub const RFC3161_TOKEN_TYPE: &str = "RFC3161";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvidenceRecord {
    pub version: String,
    pub chains: Vec<ArchiveTimeStampChain>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveTimeStampChain {
    pub order: u32,
    pub digest_method: String,
    pub canonicalization_method: String,
    pub time_stamps: Vec<ArchiveTimeStamp>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveTimeStamp {
    pub order: u32,
    pub hash_tree: Vec<HashTreeSequence>,
    pub token: TimeStampToken,
}

impl ArchiveTimeStamp {
    /// Reduce the hash tree to the value its token must cover
    ///
    /// Sequences are taken by `order`. Each step digests the sorted
    /// concatenation of the sequence values and the previous result.
    /// `None` for an empty tree.
    pub fn hash_tree_root(&self, algorithm: DigestAlgorithm) -> Option<Vec<u8>> {
        let mut sequences: Vec<&HashTreeSequence> = self.hash_tree.iter().collect();
        sequences.sort_by_key(|s| s.order);

        sequences.into_iter().fold(None, |previous, sequence| {
            let mut values: Vec<&[u8]> = sequence.digest_values.iter().map(Vec::as_slice).collect();
            if let Some(previous) = previous.as_deref() {
                values.push(previous);
            }
            values.sort_unstable();
            Some(algorithm.digest(&values.concat()))
        })
    }

    /// Does the first sequence carry `digest`
    pub fn covers(&self, digest: &[u8]) -> bool {
        self.hash_tree
            .iter()
            .min_by_key(|s| s.order)
            .is_some_and(|s| s.digest_values.iter().any(|v| v == digest))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashTreeSequence {
    pub order: u32,
    pub digest_values: Vec<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeStampToken {
    pub token_type: String,
    pub der: Vec<u8>,
}

impl EvidenceRecord {
    /// The first time stamp of the first chain, which covers the protected data
    pub fn initial_time_stamp(&self) -> Option<&ArchiveTimeStamp> {
        self.initial_chain()
            .and_then(|c| c.time_stamps.iter().min_by_key(|t| t.order))
    }

    pub fn initial_chain(&self) -> Option<&ArchiveTimeStampChain> {
        self.chains.iter().min_by_key(|c| c.order)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigReference {
    pub uri: String,
    pub mime_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataObjectReference {
    pub uri: String,
    pub mime_type: String,
    pub digest_method: String,
    pub digest_value: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsicManifest {
    pub sig_reference: SigReference,
    pub data_objects: Vec<DataObjectReference>,
}
