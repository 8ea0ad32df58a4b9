//! Error handling for chainlog-asic
//!
//! Wraps chainlog-core ExError with XML, container and evidence helpers

use chainlog_core::errors::{ChainLogError, ExError, ExErrorKind};
use std::fmt::Display;

pub use chainlog_core::errors::io_error;

/// Result type alias using ExError
pub type Result<T> = std::result::Result<T, ExError>;

/// Create an error from an XML reader or writer failure
pub fn xml_error(operation: &str, err: impl Display) -> ExError {
    ExError::from(ChainLogError::Xml {
        message: err.to_string(),
    })
    .with_op(operation.to_string())
}

/// Create an error from a zip reader or writer failure
pub fn zip_error(operation: &str, err: zip::result::ZipError) -> ExError {
    match err {
        zip::result::ZipError::Io(e) => io_error(operation, e),
        zip::result::ZipError::FileNotFound => ExError::new(ExErrorKind::NotFound)
            .with_op(operation.to_string())
            .with_message("Container entry not found"),
        other => ExError::new(ExErrorKind::InvalidManifest)
            .with_op(operation.to_string())
            .with_message(other.to_string()),
    }
}

/// A required element, attribute or entry is absent
pub fn missing_field(operation: &str, field: &str) -> ExError {
    ExError::new(ExErrorKind::MissingField)
        .with_op(operation.to_string())
        .with_subject(field.to_string())
        .with_message("Required field missing")
}

/// A recomputed value does not match the recorded one
pub fn integrity_error(operation: &str, subject: &str, reason: impl Into<String>) -> ExError {
    ExError::from(ChainLogError::Integrity {
        subject: subject.to_string(),
        reason: reason.into(),
    })
    .with_op(operation.to_string())
}

/// Invalid base64 in an XML text node
pub fn base64_error(operation: &str, field: &str, err: base64::DecodeError) -> ExError {
    ExError::new(ExErrorKind::Xml)
        .with_op(operation.to_string())
        .with_subject(field.to_string())
        .with_message(format!("Invalid base64 content: {}", err))
}

/// A certificate that cannot be parsed
pub fn certificate_error(operation: &str, err: impl Display) -> ExError {
    ExError::new(ExErrorKind::InvalidInput)
        .with_op(operation.to_string())
        .with_subject("certificate")
        .with_message(format!("Unreadable certificate: {}", err))
}

/// A time-stamp token that is not a well-formed RFC 3161 token
pub fn token_error(operation: &str, err: impl Display) -> ExError {
    ExError::new(ExErrorKind::InvalidInput)
        .with_op(operation.to_string())
        .with_subject("TimeStampToken")
        .with_message(format!("Malformed time-stamp token: {}", err))
}

/// A signature or digest algorithm outside the supported set
pub fn unsupported_algorithm(operation: &str, algorithm: &str) -> ExError {
    ExError::new(ExErrorKind::UnsupportedAlgorithm)
        .with_op(operation.to_string())
        .with_subject(algorithm.to_string())
        .with_message("Unsupported algorithm")
}
