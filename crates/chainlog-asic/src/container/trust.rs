//! Trust roots for container verification.
//!
//! Verification anchors trust only in the certificates a
//! `TrustRootSnapshot` hands over: timestamping authorities, certification
//! authorities and OCSP responders. A certificate is trusted when it is a
//! snapshot certificate or chains to one through issuer signatures.
//! Nothing is fetched from the network.

use crate::errors::{certificate_error, io_error, Result};
use chainlog_core::errors::{ExError, ExErrorKind};
use chainlog_core::DigestAlgorithm;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use x509_parser::prelude::*;

/// Longest issuer path walked from a leaf to an anchor
const MAX_PATH_LENGTH: usize = 8;

/// Certificates (DER) the verifier may anchor trust in
pub trait TrustRootSnapshot {
    /// # Errors
    ///
    /// Fails when the snapshot cannot be read.
    fn tsa_certificates(&self) -> Result<Vec<Vec<u8>>>;

    /// # Errors
    ///
    /// Fails when the snapshot cannot be read.
    fn ca_certificates(&self) -> Result<Vec<Vec<u8>>>;

    /// # Errors
    ///
    /// Fails when the snapshot cannot be read.
    fn ocsp_responder_certificates(&self) -> Result<Vec<Vec<u8>>>;
}

/// Snapshot laid out as `<root>/{tsa,ca,ocsp}/*` with DER or PEM files
#[derive(Debug, Clone)]
pub struct DirectoryTrustSnapshot {
    root: PathBuf,
}

impl DirectoryTrustSnapshot {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn load(&self, category: &str) -> Result<Vec<Vec<u8>>> {
        let dir = self.root.join(category);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut paths = fs::read_dir(&dir)
            .map_err(|e| io_error("read_trust_snapshot", e))?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<Vec<_>>>()
            .map_err(|e| io_error("read_trust_snapshot", e))?;
        paths.sort();

        let mut certificates = Vec::new();
        for path in paths.iter().filter(|p| p.is_file()) {
            certificates.extend(read_certificates(path)?);
        }
        debug!(
            component = "trust",
            op = "read_trust_snapshot",
            category = category,
            certificates = certificates.len(),
        );
        Ok(certificates)
    }
}

impl TrustRootSnapshot for DirectoryTrustSnapshot {
    fn tsa_certificates(&self) -> Result<Vec<Vec<u8>>> {
        self.load("tsa")
    }

    fn ca_certificates(&self) -> Result<Vec<Vec<u8>>> {
        self.load("ca")
    }

    fn ocsp_responder_certificates(&self) -> Result<Vec<Vec<u8>>> {
        self.load("ocsp")
    }
}

/// Read one certificate file: a PEM bundle or a single DER certificate
///
/// Every certificate must parse as X.509.
fn read_certificates(path: &Path) -> Result<Vec<Vec<u8>>> {
    const OP: &str = "read_certificate";
    let bytes = fs::read(path).map_err(|e| io_error(OP, e))?;
    let mut certificates = rustls_pemfile::certs(&mut bytes.as_slice())
        .map_err(|e| io_error(OP, e).with_subject(path.display().to_string()))?;
    if certificates.is_empty() {
        certificates.push(bytes);
    }

    for der in &certificates {
        X509Certificate::from_der(der)
            .map_err(|e| certificate_error(OP, e).with_subject(path.display().to_string()))?;
    }
    Ok(certificates)
}

/// Trusted certificates seeded from the three snapshot categories only
#[derive(Debug, Clone, Default)]
pub struct TrustedCertificateSource {
    certificates: Vec<Vec<u8>>,
}

impl TrustedCertificateSource {
    /// # Errors
    ///
    /// Fails when any snapshot category cannot be read or holds a
    /// certificate that does not parse.
    pub fn from_snapshot(snapshot: &dyn TrustRootSnapshot) -> Result<Self> {
        let mut certificates: Vec<Vec<u8>> = Vec::new();
        for der in snapshot
            .tsa_certificates()?
            .into_iter()
            .chain(snapshot.ca_certificates()?)
            .chain(snapshot.ocsp_responder_certificates()?)
        {
            X509Certificate::from_der(&der).map_err(|e| {
                certificate_error("load_trust_roots", e).with_subject(fingerprint(&der))
            })?;
            if !certificates.contains(&der) {
                certificates.push(der);
            }
        }
        Ok(Self { certificates })
    }

    /// Is `der` itself a snapshot certificate
    pub fn is_trusted(&self, der: &[u8]) -> bool {
        self.certificates.iter().any(|c| c == der)
    }

    pub fn certificates(&self) -> &[Vec<u8>] {
        &self.certificates
    }

    pub fn len(&self) -> usize {
        self.certificates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.certificates.is_empty()
    }

    /// Check that `leaf` is a snapshot certificate or chains to one
    ///
    /// Each step needs a CA issuer whose subject equals the child's issuer
    /// name and whose key verifies the child's signature. `pool` offers
    /// untrusted intermediates, such as those shipped with a signature.
    ///
    /// # Errors
    ///
    /// `UntrustedCertificate` when no such path exists, `InvalidInput`
    /// when `leaf` does not parse.
    pub fn verify_path(&self, leaf: &[u8], pool: &[Vec<u8>]) -> Result<()> {
        const OP: &str = "verify_certificate_path";
        if self.is_trusted(leaf) {
            return Ok(());
        }

        let (_, leaf_certificate) =
            X509Certificate::from_der(leaf).map_err(|e| certificate_error(OP, e))?;
        let anchors = parse_all(&self.certificates);
        let intermediates = parse_all(pool);

        let mut current = &leaf_certificate;
        for _ in 0..MAX_PATH_LENGTH {
            if let Some(anchor) = anchors.iter().find(|a| issued_by(current, a)) {
                debug!(
                    component = "trust",
                    op = OP,
                    anchor = %anchor.subject(),
                    leaf = %leaf_certificate.subject(),
                );
                return Ok(());
            }
            match intermediates.iter().find(|c| issued_by(current, c)) {
                Some(issuer) if issuer.subject().as_raw() != current.subject().as_raw() => {
                    current = issuer;
                }
                _ => break,
            }
        }

        Err(ExError::new(ExErrorKind::UntrustedCertificate)
            .with_op(OP)
            .with_subject(fingerprint(leaf))
            .with_message(format!(
                "No path from '{}' to a trust-root snapshot certificate",
                leaf_certificate.subject()
            )))
    }
}

fn parse_all(certificates: &[Vec<u8>]) -> Vec<X509Certificate<'_>> {
    certificates
        .iter()
        .filter_map(|der| X509Certificate::from_der(der).ok().map(|(_, c)| c))
        .collect()
}

fn is_ca(certificate: &X509Certificate<'_>) -> bool {
    matches!(certificate.basic_constraints(), Ok(Some(bc)) if bc.value.ca)
}

fn issued_by(child: &X509Certificate<'_>, issuer: &X509Certificate<'_>) -> bool {
    is_ca(issuer)
        && child.issuer().as_raw() == issuer.subject().as_raw()
        && child.verify_signature(Some(issuer.public_key())).is_ok()
}

/// SHA-256 fingerprint, lower-case hex
pub fn fingerprint(der: &[u8]) -> String {
    hex::encode(DigestAlgorithm::Sha256.digest(der))
}
