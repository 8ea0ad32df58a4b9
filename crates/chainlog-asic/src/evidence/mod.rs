//! RFC 4998 evidence records built from hash-chain proofs.

pub mod marshal;
pub mod model;
pub mod transformer;

pub use model::{
    ArchiveTimeStamp, ArchiveTimeStampChain, AsicManifest, DataObjectReference, EvidenceRecord,
    HashTreeSequence, SigReference, TimeStampToken,
};
pub use transformer::{
    evidence_record, evidence_record_manifest, signature_digest, EvidenceBundle,
    HashChainToEvidenceRecordTransformer, TimestampProof, SIGNATURE_DIGEST_ALGORITHM,
};
