//! Archive encryption: recipient policies and the providers that pick them.
//!
//! An `EncryptionConfig` is resolved once per archive grouping and stays
//! fixed for every physical archive of that grouping. The encryption
//! primitive itself is external and plugged in through `ArchiveEncryptor`.

pub mod config;
pub mod key_mapping;
pub mod provider;

pub use config::{EncryptionConfig, EncryptionMember, RecipientPolicy};
pub use key_mapping::KeyMapping;
pub use provider::{
    provider_from_settings, DisabledEncryptionConfigProvider, MemberEncryptionConfigProvider,
    ServerEncryptionConfigProvider,
};

use crate::errors::Result;
use crate::grouping::Grouping;
use crate::identifier::ClientId;
use std::fs::File;
use std::io::Write;

/// Chooses recipients for archives
///
/// Implementations are immutable after construction.
pub trait EncryptionConfigProvider: Send + Sync {
    /// Whether archives are encrypted at all
    fn is_enabled(&self) -> bool;

    /// Resolve the recipients for archives of `grouping`
    ///
    /// # Errors
    ///
    /// Per-member providers reject groupings without a client.
    fn for_grouping(&self, grouping: &Grouping) -> Result<EncryptionConfig>;

    /// Report, per distinct member, which keys its archives would use
    fn for_diagnostics(&self, members: &[ClientId]) -> EncryptionConfig;
}

/// Output side of an encryption primitive
pub trait EncryptedSink: Write {
    /// Flush remaining ciphertext and release the primitive
    ///
    /// # Errors
    ///
    /// Fails when the primitive reports an error on completion.
    fn finish(self: Box<Self>) -> Result<()>;
}

/// Encryption primitive wrapping a physical archive file
pub trait ArchiveEncryptor {
    /// Wrap `output` so that everything written is encrypted for `config`
    ///
    /// # Errors
    ///
    /// Fails when the primitive cannot be started.
    fn wrap(&self, output: File, config: &EncryptionConfig) -> Result<Box<dyn EncryptedSink>>;

    /// File name suffix of encrypted archives, e.g. `.gpg`
    fn file_suffix(&self) -> &str {
        ".gpg"
    }
}
