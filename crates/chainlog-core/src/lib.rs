//! chainlog core - chain-linked message-log archival kernel
//!
//! This crate provides the building blocks shared by the archive writer
//! and the evidence tooling:
//! - Error facility with stable error codes and secondary causes
//! - Structured logging facility (`tracing` based)
//! - Digest algorithms and the `DigestEntry` chain element
//! - `LinkingInfoBuilder`, the digest chain and its text ledger
//! - Client identifiers, grouping strategies and archive records
//! - Encryption recipient policies and the key-mapping file parser
//! - Archiver settings loaded from TOML

pub mod digest;
pub mod encryption;
pub mod errors;
pub mod grouping;
pub mod identifier;
pub mod linking;
pub mod logging_facility;
pub mod record;
pub mod settings;

pub use chainlog_core_types;

// Re-export commonly used types
pub use digest::{DigestAlgorithm, DigestEntry};
pub use encryption::{EncryptionConfig, EncryptionConfigProvider, RecipientPolicy};
pub use errors::{ChainLogError, ExError, ExErrorKind, Result};
pub use grouping::{Grouping, GroupingStrategy};
pub use identifier::ClientId;
pub use linking::{LinkingInfoBuilder, SharedLinkingInfo};
pub use record::ArchiveRecord;
pub use settings::ArchiverSettings;
