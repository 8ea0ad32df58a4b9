use thiserror::Error;

/// Result type alias using ExError
pub type Result<T> = std::result::Result<T, ExError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Each kind maps to a stable error code that can be used for programmatic
/// error handling, testing, and operator-facing diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExErrorKind {
    // Input validation
    InvalidInput,
    InvalidIdentifier,
    MalformedHashChain,
    UnsupportedAlgorithm,

    // Configuration
    Configuration,

    // Archive writing
    Io,
    Encryption,
    ArchiveAborted,

    // Evidence and containers
    Xml,
    InvalidManifest,
    MissingField,
    IntegrityViolation,
    UntrustedCertificate,

    // Persistence of the chain tail
    Persistence,
    NotFound,

    Serialization,

    // Internal
    Internal,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::InvalidInput => "ERR_INVALID_INPUT",
            ExErrorKind::InvalidIdentifier => "ERR_INVALID_IDENTIFIER",
            ExErrorKind::MalformedHashChain => "ERR_MALFORMED_HASH_CHAIN",
            ExErrorKind::UnsupportedAlgorithm => "ERR_UNSUPPORTED_ALGORITHM",
            ExErrorKind::Configuration => "ERR_CONFIGURATION",
            ExErrorKind::Io => "ERR_IO",
            ExErrorKind::Encryption => "ERR_ENCRYPTION",
            ExErrorKind::ArchiveAborted => "ERR_ARCHIVE_ABORTED",
            ExErrorKind::Xml => "ERR_XML",
            ExErrorKind::InvalidManifest => "ERR_INVALID_MANIFEST",
            ExErrorKind::MissingField => "ERR_MISSING_FIELD",
            ExErrorKind::IntegrityViolation => "ERR_INTEGRITY_VIOLATION",
            ExErrorKind::UntrustedCertificate => "ERR_UNTRUSTED_CERTIFICATE",
            ExErrorKind::Persistence => "ERR_PERSISTENCE",
            ExErrorKind::NotFound => "ERR_NOT_FOUND",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }
}

/// Canonical structured error type
///
/// Carries a classification kind, optional operation and subject context,
/// an optional cause, and any secondary errors raised while cleaning up
/// after the primary failure. Secondary errors never replace the primary.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    subject: Option<String>,
    message: String,
    source: Option<Box<ExError>>,
    suppressed: Vec<ExError>,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            subject: None,
            message: String::new(),
            source: None,
            suppressed: Vec::new(),
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add subject context (entry name, group, file path, step id)
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Add source error
    pub fn with_source(mut self, source: ExError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Attach an error raised while cleaning up after this one
    pub fn with_suppressed(mut self, secondary: ExError) -> Self {
        self.suppressed.push(secondary);
        self
    }

    /// Get the error kind
    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// Get the operation context, if any
    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    /// Get the subject context, if any
    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the source error, if any
    pub fn source_error(&self) -> Option<&ExError> {
        self.source.as_deref()
    }

    /// Errors raised during cleanup, in the order they occurred
    pub fn suppressed(&self) -> &[ExError] {
        &self.suppressed
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(subject) = &self.subject {
            write!(f, " (subject: {})", subject)?;
        }
        if let Some(source) = &self.source {
            write!(f, "; caused by {}", source)?;
        }
        for secondary in &self.suppressed {
            write!(f, "; suppressed {}", secondary)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

// ========== End Error Facility ==========

/// Domain error taxonomy for archiving and evidence operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChainLogError {
    /// A record handed to the archive writer was absent or unusable
    #[error("Invalid archive record: {reason}")]
    InvalidRecord { reason: String },

    /// Member-keyed encryption was asked for a grouping without a client
    #[error("Expected a grouping with a client identifier")]
    MissingGroupingClient,

    /// Client identifier string could not be parsed
    #[error("Invalid client identifier: {value}")]
    InvalidClientId { value: String },

    /// Hash chain step id does not match STEP<n>
    #[error("Invalid hash step id: {step_id}")]
    InvalidStepId { step_id: String },

    /// Hash chain document is structurally broken
    #[error("Malformed hash chain: {reason}")]
    MalformedHashChain { reason: String },

    /// Digest algorithm identifier or URI not supported
    #[error("Unsupported digest algorithm: {algorithm}")]
    UnsupportedDigestAlgorithm { algorithm: String },

    /// Key mapping file exists but could not be read
    #[error("Could not read key mapping file {path}: {reason}")]
    KeyMappingUnreadable { path: String, reason: String },

    /// Encryption is enabled but no encryption primitive was supplied
    #[error("Archive encryption is enabled but no encryptor is configured")]
    EncryptorMissing,

    /// Invalid settings
    #[error("Invalid configuration: {reason}")]
    InvalidConfiguration { reason: String },

    /// XML parsing or marshalling failure
    #[error("XML error: {message}")]
    Xml { message: String },

    /// Recomputed digest does not match the recorded one
    #[error("Integrity violation in {subject}: {reason}")]
    Integrity { subject: String, reason: String },

    /// Serialization error (JSON/TOML encoding/decoding)
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Generic internal error
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl From<ChainLogError> for ExError {
    fn from(err: ChainLogError) -> Self {
        match err {
            ChainLogError::InvalidRecord { reason } => ExError::new(ExErrorKind::InvalidInput)
                .with_op("archive_add")
                .with_message(format!("Invalid archive record: {}", reason)),

            ChainLogError::MissingGroupingClient => ExError::new(ExErrorKind::InvalidInput)
                .with_op("encryption_for_grouping")
                .with_message("Expected a grouping with a client identifier"),

            ChainLogError::InvalidClientId { value } => {
                ExError::new(ExErrorKind::InvalidIdentifier)
                    .with_subject(value)
                    .with_message("Invalid client identifier")
            }

            ChainLogError::InvalidStepId { step_id } => {
                ExError::new(ExErrorKind::MalformedHashChain)
                    .with_subject(step_id)
                    .with_message("Hash step id must match STEP<n>")
            }

            ChainLogError::MalformedHashChain { reason } => {
                ExError::new(ExErrorKind::MalformedHashChain).with_message(reason)
            }

            ChainLogError::UnsupportedDigestAlgorithm { algorithm } => {
                ExError::new(ExErrorKind::UnsupportedAlgorithm)
                    .with_subject(algorithm)
                    .with_message("Unsupported digest algorithm")
            }

            ChainLogError::KeyMappingUnreadable { path, reason } => {
                ExError::new(ExErrorKind::Configuration)
                    .with_op("load_key_mapping")
                    .with_subject(path)
                    .with_message(reason)
            }

            ChainLogError::EncryptorMissing => ExError::new(ExErrorKind::Configuration)
                .with_message("Archive encryption is enabled but no encryptor is configured"),

            ChainLogError::InvalidConfiguration { reason } => {
                ExError::new(ExErrorKind::Configuration).with_message(reason)
            }

            ChainLogError::Xml { message } => ExError::new(ExErrorKind::Xml).with_message(message),

            ChainLogError::Integrity { subject, reason } => {
                ExError::new(ExErrorKind::IntegrityViolation)
                    .with_subject(subject)
                    .with_message(reason)
            }

            ChainLogError::Serialization { message } => {
                ExError::new(ExErrorKind::Serialization).with_message(message)
            }

            ChainLogError::Internal { message } => {
                ExError::new(ExErrorKind::Internal).with_message(message)
            }
        }
    }
}

/// Conversion from serde_json::Error to ChainLogError
impl From<serde_json::Error> for ChainLogError {
    fn from(err: serde_json::Error) -> Self {
        ChainLogError::Serialization {
            message: err.to_string(),
        }
    }
}

/// Conversion from toml::de::Error to ChainLogError
impl From<toml::de::Error> for ChainLogError {
    fn from(err: toml::de::Error) -> Self {
        ChainLogError::Serialization {
            message: err.to_string(),
        }
    }
}

/// Create an IO error
pub fn io_error(operation: &str, err: std::io::Error) -> ExError {
    ExError::new(ExErrorKind::Io)
        .with_op(operation.to_string())
        .with_message(err.to_string())
}
