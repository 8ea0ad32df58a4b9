//! chainlog store - archive files on disk
//!
//! Provides:
//! - `LogArchiveCache`, the writer that streams records into one physical
//!   zip archive, feeds the linking chain and rotates on size
//! - `LogArchiveWriter`, the grouping-aware driver that seals archives,
//!   stores them under their final names and carries the chain forward
//! - `ArchiveBase` with a file-backed implementation for the chain tail
//! - `GpgEncryptor`, an `ArchiveEncryptor` backed by the `gpg` binary
//! - Atomic write and move helpers

pub mod archive;
pub mod atomic;
pub mod base;
pub mod errors;
pub mod gpg;

pub use archive::{LogArchiveCache, LogArchiveWriter};
pub use base::{ArchiveBase, FsArchiveBase};
pub use errors::Result;
pub use gpg::GpgEncryptor;
