//! Archiver settings.
//!
//! Loaded from TOML:
//!
//! ```toml
//! archive_path = "/var/lib/chainlog/archive"
//! temp_path = "/var/lib/chainlog/tmp"
//! digest_algorithm = "SHA-512"
//! max_archive_size = 33554432
//!
//! [encryption]
//! enabled = true
//! grouping = "member"
//! default_key_id = "B23B8E993AC4632A896D39A27BE94D3451C16D55"
//! key_mapping_file = "/etc/chainlog/mlog-keys.ini"
//! key_store_location = "/etc/chainlog/gpghome"
//! ```

use crate::digest::DigestAlgorithm;
use crate::errors::{io_error, ChainLogError, Result};
use crate::grouping::GroupingStrategy;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default ceiling for one physical archive, 32 MiB
pub const DEFAULT_MAX_ARCHIVE_SIZE: u64 = 33_554_432;

#[derive(Debug, Clone, Deserialize)]
pub struct ArchiverSettings {
    pub archive_path: PathBuf,

    /// Working directory for unsealed archives; defaults to `archive_path`
    #[serde(default)]
    pub temp_path: Option<PathBuf>,

    #[serde(default = "default_digest_algorithm")]
    pub digest_algorithm: DigestAlgorithm,

    #[serde(default = "default_max_archive_size")]
    pub max_archive_size: u64,

    #[serde(default)]
    pub encryption: EncryptionSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EncryptionSettings {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub grouping: GroupingStrategy,

    #[serde(default)]
    pub default_key_id: Option<String>,

    #[serde(default)]
    pub key_mapping_file: Option<PathBuf>,

    #[serde(default)]
    pub key_store_location: Option<PathBuf>,
}

fn default_digest_algorithm() -> DigestAlgorithm {
    DigestAlgorithm::Sha512
}

fn default_max_archive_size() -> u64 {
    DEFAULT_MAX_ARCHIVE_SIZE
}

impl ArchiverSettings {
    /// Settings with defaults for everything but the archive directory
    pub fn new(archive_path: impl Into<PathBuf>) -> Self {
        Self {
            archive_path: archive_path.into(),
            temp_path: None,
            digest_algorithm: default_digest_algorithm(),
            max_archive_size: DEFAULT_MAX_ARCHIVE_SIZE,
            encryption: EncryptionSettings::default(),
        }
    }

    /// Load settings from a TOML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| io_error("load_settings", e).with_subject(path.display().to_string()))?;
        Self::from_toml(&content)
    }

    /// Parse settings from TOML text
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or the values are unusable.
    pub fn from_toml(content: &str) -> Result<Self> {
        let settings: Self = toml::from_str(content).map_err(ChainLogError::from)?;
        settings.validate()?;
        Ok(settings)
    }

    /// # Errors
    ///
    /// Rejects a zero archive size ceiling and an empty archive path.
    pub fn validate(&self) -> Result<()> {
        if self.archive_path.as_os_str().is_empty() {
            return Err(ChainLogError::InvalidConfiguration {
                reason: "archive_path must not be empty".to_string(),
            }
            .into());
        }
        if self.max_archive_size == 0 {
            return Err(ChainLogError::InvalidConfiguration {
                reason: "max_archive_size must be greater than zero".to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Directory for unsealed archives
    pub fn temp_dir(&self) -> &Path {
        self.temp_path.as_deref().unwrap_or(&self.archive_path)
    }
}
