//! ASiC-E containers: assembly and archival-depth verification.

pub mod assembler;
pub mod timestamp;
pub mod trust;
pub mod verifier;
pub mod xades;

pub use assembler::{AssembledContainer, AssemblerSettings, ContainerAssembler, ContainerInput};
pub use timestamp::{verify_time_stamp, TimeStampImprint};
pub use trust::{DirectoryTrustSnapshot, TrustRootSnapshot, TrustedCertificateSource};
pub use verifier::{ContainerVerifier, ValidationLevel, ValidationPolicy, VerificationReport};
