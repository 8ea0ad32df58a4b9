//! chainlog asic - long-term evidence for signed records
//!
//! Provides:
//! - Inclusive canonical XML (1.0 and 1.1, without comments) over `quick-xml`
//! - Hash-chain document parsing with strict step ids
//! - The hash chain to RFC 4998 evidence record transformation, with the
//!   ASiC evidence-record manifest
//! - ASiC-E container assembly and archival-depth verification against a
//!   trust-root snapshot: XAdES signature values, RFC 3161 tokens and
//!   issuer paths

pub mod container;
pub mod crypto;
pub mod errors;
pub mod evidence;
pub mod file_names;
pub mod hashchain;
pub mod xml;

pub use container::{
    AssembledContainer, AssemblerSettings, ContainerAssembler, ContainerInput, ContainerVerifier,
    DirectoryTrustSnapshot, TrustRootSnapshot, ValidationLevel, ValidationPolicy,
    VerificationReport,
};
pub use errors::Result;
pub use evidence::{EvidenceBundle, HashChainToEvidenceRecordTransformer, TimestampProof};
pub use hashchain::{HashChain, HashStep};
