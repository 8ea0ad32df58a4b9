//! Digest algorithms and chain elements.
//!
//! `DigestAlgorithm` names the SHA-2 variants the archiver and the evidence
//! tooling understand, by both their short identifier (`SHA-512`) and their
//! XML Signature URI. `DigestEntry` is the `(digest, label)` pair that makes
//! up the linking chain and is persisted as the chain tail between archives.

use crate::errors::{ChainLogError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha384, Sha512};
use std::fmt;
use std::str::FromStr;

/// Supported digest algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DigestAlgorithm {
    #[serde(rename = "SHA-256")]
    Sha256,
    #[serde(rename = "SHA-384")]
    Sha384,
    #[serde(rename = "SHA-512")]
    Sha512,
}

impl DigestAlgorithm {
    /// Short identifier, as written in the linking ledger header
    pub fn id(&self) -> &'static str {
        match self {
            DigestAlgorithm::Sha256 => "SHA-256",
            DigestAlgorithm::Sha384 => "SHA-384",
            DigestAlgorithm::Sha512 => "SHA-512",
        }
    }

    /// XML Signature / XML Encryption algorithm URI
    pub fn uri(&self) -> &'static str {
        match self {
            DigestAlgorithm::Sha256 => "http://www.w3.org/2001/04/xmlenc#sha256",
            DigestAlgorithm::Sha384 => "http://www.w3.org/2001/04/xmldsig-more#sha384",
            DigestAlgorithm::Sha512 => "http://www.w3.org/2001/04/xmlenc#sha512",
        }
    }

    /// Resolve an algorithm from its XML URI
    pub fn from_uri(uri: &str) -> Result<Self> {
        [
            DigestAlgorithm::Sha256,
            DigestAlgorithm::Sha384,
            DigestAlgorithm::Sha512,
        ]
        .into_iter()
        .find(|alg| alg.uri() == uri)
        .ok_or_else(|| {
            ChainLogError::UnsupportedDigestAlgorithm {
                algorithm: uri.to_string(),
            }
            .into()
        })
    }

    /// Digest a complete byte slice
    pub fn digest(&self, data: &[u8]) -> Vec<u8> {
        let mut hasher = self.hasher();
        hasher.update(data);
        hasher.finalize()
    }

    /// Start an incremental digest computation
    pub fn hasher(&self) -> Hasher {
        match self {
            DigestAlgorithm::Sha256 => Hasher::Sha256(Sha256::new()),
            DigestAlgorithm::Sha384 => Hasher::Sha384(Sha384::new()),
            DigestAlgorithm::Sha512 => Hasher::Sha512(Sha512::new()),
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for DigestAlgorithm {
    type Err = crate::errors::ExError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().replace('_', "-").as_str() {
            "SHA-256" | "SHA256" => Ok(DigestAlgorithm::Sha256),
            "SHA-384" | "SHA384" => Ok(DigestAlgorithm::Sha384),
            "SHA-512" | "SHA512" => Ok(DigestAlgorithm::Sha512),
            _ => Err(ChainLogError::UnsupportedDigestAlgorithm {
                algorithm: s.to_string(),
            }
            .into()),
        }
    }
}

/// Incremental digest state for one of the supported algorithms
pub enum Hasher {
    Sha256(Sha256),
    Sha384(Sha384),
    Sha512(Sha512),
}

impl Hasher {
    pub fn update(&mut self, data: &[u8]) {
        match self {
            Hasher::Sha256(h) => h.update(data),
            Hasher::Sha384(h) => h.update(data),
            Hasher::Sha512(h) => h.update(data),
        }
    }

    pub fn finalize(self) -> Vec<u8> {
        match self {
            Hasher::Sha256(h) => h.finalize().to_vec(),
            Hasher::Sha384(h) => h.finalize().to_vec(),
            Hasher::Sha512(h) => h.finalize().to_vec(),
        }
    }
}

/// One element of the linking chain: a hex digest and the label it covers
///
/// `DigestEntry::empty()` is the "no prior chain" sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct DigestEntry {
    digest: String,
    label: String,
}

impl DigestEntry {
    pub fn new(digest: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            digest: digest.into(),
            label: label.into(),
        }
    }

    /// Sentinel entry with both fields blank
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_empty(&self) -> bool {
        self.digest.is_empty() && self.label.is_empty()
    }
}
