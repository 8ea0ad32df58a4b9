//! Hash chain to evidence record transformation.
//!
//! The protected object is the container's signature document. Its
//! canonical form is digested with SHA-512 and becomes the first hash-tree
//! sequence; the hash-chain steps follow in reverse declaration order, so
//! the tree reads from the signature up to the timestamped top. The
//! RFC 3161 token over that top closes the single archive time stamp.

use super::marshal::{evidence_record_to_xml, manifest_to_xml};
use super::model::{
    ArchiveTimeStamp, ArchiveTimeStampChain, AsicManifest, DataObjectReference, EvidenceRecord,
    HashTreeSequence, SigReference, TimeStampToken, EVIDENCE_RECORD_VERSION, RFC3161_TOKEN_TYPE,
};
use crate::errors::{base64_error, Result};
use crate::file_names::{EVIDENCE_RECORD_FILE_NAME, EVIDENCE_RECORD_MANIFEST_FILE_NAME, XML_MIME_TYPE};
use crate::hashchain::{HashChain, HashChainResult};
use crate::xml::{canonicalize, C14N_OMIT_COMMENTS_URI};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chainlog_core::{log_op_end, log_op_error, log_op_start, DigestAlgorithm};
use std::time::Instant;
use tracing::debug;

/// Digest over the canonical signature document
pub const SIGNATURE_DIGEST_ALGORITHM: DigestAlgorithm = DigestAlgorithm::Sha512;

/// Timestamp proof for one signed record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampProof {
    /// Base64 RFC 3161 token over the hash-tree top
    pub time_stamp_token: String,
    /// Informational; parsed but not part of the evidence
    pub hash_chain_result: String,
    pub hash_chain: String,
}

/// Evidence record and its manifest, modelled and marshalled
#[derive(Debug, Clone)]
pub struct EvidenceBundle {
    pub evidence_record: EvidenceRecord,
    pub manifest: AsicManifest,
    pub evidence_record_xml: Vec<u8>,
    pub manifest_xml: Vec<u8>,
}

impl EvidenceBundle {
    /// Container entries, in the order they are written
    pub fn entries(&self) -> [(&'static str, &[u8]); 2] {
        [
            (EVIDENCE_RECORD_FILE_NAME, self.evidence_record_xml.as_slice()),
            (EVIDENCE_RECORD_MANIFEST_FILE_NAME, self.manifest_xml.as_slice()),
        ]
    }
}

/// SHA-512 over the Canonical XML 1.0 form of `signature_xml`
///
/// # Errors
///
/// Fails when the signature is not well-formed XML.
pub fn signature_digest(signature_xml: &str) -> Result<Vec<u8>> {
    Ok(SIGNATURE_DIGEST_ALGORITHM.digest(&canonicalize(signature_xml)?))
}

/// Evidence record over `sig_digest` and `chain`, with one time stamp
pub fn evidence_record(sig_digest: &[u8], chain: &HashChain, token_der: Vec<u8>) -> EvidenceRecord {
    let mut hash_tree = Vec::with_capacity(chain.steps.len() + 1);
    hash_tree.push(HashTreeSequence {
        order: 1,
        digest_values: vec![sig_digest.to_vec()],
    });
    for step in chain.steps.iter().rev() {
        hash_tree.push(HashTreeSequence {
            order: hash_tree.len() as u32 + 1,
            digest_values: vec![step.digest.clone()],
        });
    }

    EvidenceRecord {
        version: EVIDENCE_RECORD_VERSION.to_string(),
        chains: vec![ArchiveTimeStampChain {
            order: 1,
            digest_method: chain.digest_method.uri().to_string(),
            canonicalization_method: C14N_OMIT_COMMENTS_URI.to_string(),
            time_stamps: vec![ArchiveTimeStamp {
                order: 1,
                hash_tree,
                token: TimeStampToken {
                    token_type: RFC3161_TOKEN_TYPE.to_string(),
                    der: token_der,
                },
            }],
        }],
    }
}

/// Manifest binding the evidence record to the signature it protects
pub fn evidence_record_manifest(
    sig_digest: &[u8],
    chain: &HashChain,
    signature_file_name: &str,
) -> AsicManifest {
    AsicManifest {
        sig_reference: SigReference {
            uri: EVIDENCE_RECORD_FILE_NAME.to_string(),
            mime_type: XML_MIME_TYPE.to_string(),
        },
        data_objects: vec![DataObjectReference {
            uri: signature_file_name.to_string(),
            mime_type: XML_MIME_TYPE.to_string(),
            digest_method: chain.digest_method.uri().to_string(),
            digest_value: sig_digest.to_vec(),
        }],
    }
}

#[derive(Debug, Clone)]
pub struct HashChainToEvidenceRecordTransformer {
    signature_file_name: String,
}

impl HashChainToEvidenceRecordTransformer {
    /// `signature_file_name` is the container entry the manifest points at
    pub fn new(signature_file_name: impl Into<String>) -> Self {
        Self {
            signature_file_name: signature_file_name.into(),
        }
    }

    /// Build the evidence record and manifest for `signature_xml`
    ///
    /// # Errors
    ///
    /// Any parse, canonicalization, decoding or marshalling failure aborts
    /// the whole construction.
    pub fn transform(&self, proof: &TimestampProof, signature_xml: &str) -> Result<EvidenceBundle> {
        let start = Instant::now();
        log_op_start!("transform_evidence_record");

        match self.build(proof, signature_xml) {
            Ok(bundle) => {
                log_op_end!(
                    "transform_evidence_record",
                    duration_ms = start.elapsed().as_millis() as u64,
                    sequences = bundle
                        .evidence_record
                        .initial_time_stamp()
                        .map_or(0, |t| t.hash_tree.len())
                );
                Ok(bundle)
            }
            Err(err) => {
                log_op_error!(
                    "transform_evidence_record",
                    err,
                    duration_ms = start.elapsed().as_millis() as u64
                );
                Err(err)
            }
        }
    }

    fn build(&self, proof: &TimestampProof, signature_xml: &str) -> Result<EvidenceBundle> {
        let token_der = STANDARD
            .decode(proof.time_stamp_token.trim())
            .map_err(|e| base64_error("decode_time_stamp", "TimeStampToken", e))?;
        let chain = HashChain::parse(&proof.hash_chain)?;
        let result = HashChainResult::parse(&proof.hash_chain_result)?;
        debug!(
            component = "evidence",
            op = "transform_evidence_record",
            hash_chain_result_uri = result.uri.as_deref().unwrap_or("-"),
            steps = chain.steps.len(),
        );

        let sig_digest = signature_digest(signature_xml)?;
        let evidence_record = evidence_record(&sig_digest, &chain, token_der);
        let manifest = evidence_record_manifest(&sig_digest, &chain, &self.signature_file_name);

        Ok(EvidenceBundle {
            evidence_record_xml: evidence_record_to_xml(&evidence_record)?,
            manifest_xml: manifest_to_xml(&manifest)?,
            evidence_record,
            manifest,
        })
    }
}
