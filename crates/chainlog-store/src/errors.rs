//! Error handling for chainlog-store
//!
//! Wraps chainlog-core ExError with archive-specific helpers

use chainlog_core::errors::{ExError, ExErrorKind};

pub use chainlog_core::errors::io_error;

/// Result type alias using ExError
pub type Result<T> = std::result::Result<T, ExError>;

/// Create an error from a zip writer failure
pub fn zip_error(operation: &str, err: zip::result::ZipError) -> ExError {
    match err {
        zip::result::ZipError::Io(e) => io_error(operation, e),
        other => ExError::new(ExErrorKind::Io)
            .with_op(operation.to_string())
            .with_message(other.to_string()),
    }
}

/// Wrap the failure that aborted an in-progress archive
pub fn archive_aborted(operation: &str, cause: ExError) -> ExError {
    ExError::new(ExErrorKind::ArchiveAborted)
        .with_op(operation.to_string())
        .with_message("Archive aborted, unsealed data discarded")
        .with_source(cause)
}

/// Create an encryption primitive error
pub fn encryption_error(operation: &str, reason: impl Into<String>) -> ExError {
    ExError::new(ExErrorKind::Encryption)
        .with_op(operation.to_string())
        .with_message(reason)
}

/// Create a chain tail persistence error
pub fn persistence_error(operation: &str, reason: impl Into<String>) -> ExError {
    ExError::new(ExErrorKind::Persistence)
        .with_op(operation.to_string())
        .with_message(reason)
}
