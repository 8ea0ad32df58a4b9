//! Container verification at archival depth.
//!
//! Checks, in order: container structure, the signed documents named by
//! the ODF manifest, the signature's reference digests and signed
//! properties, the signing certificate's path to the snapshot, and the
//! signature value. Long-term depth adds the signature time stamps;
//! archival depth adds the evidence record, whose hash tree is reduced and
//! matched against its verified RFC 3161 token. Trust is anchored only in
//! the snapshot.

use super::timestamp::verify_time_stamp;
use super::trust::{fingerprint, TrustRootSnapshot, TrustedCertificateSource};
use super::xades::{
    check_same_document_reference, decode_text, key_info_certificates, verify_signature_time_stamps,
    verify_signature_value,
};
use crate::errors::{integrity_error, io_error, missing_field, zip_error, Result};
use crate::evidence::marshal::{evidence_record_from_xml, manifest_from_xml};
use crate::evidence::model::RFC3161_TOKEN_TYPE;
use crate::evidence::signature_digest;
use crate::file_names::{
    EVIDENCE_RECORD_FILE_NAME, EVIDENCE_RECORD_MANIFEST_FILE_NAME, MANIFEST_FILE_NAME,
    MIMETYPE_FILE_NAME, SIGNATURE_FILE_NAME,
};
use crate::xml::XmlElement;
use chainlog_core::errors::{ChainLogError, ExError, ExErrorKind};
use chainlog_core::{log_op_end, log_op_error, log_op_start, DigestAlgorithm};
use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use std::path::Path;
use std::time::Instant;
use tracing::warn;
use zip::{CompressionMethod, ZipArchive};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ValidationLevel {
    BasicSignatures,
    LongTermData,
    ArchivalData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationPolicy {
    pub extract_all_tokens: bool,
    pub level: ValidationLevel,
    pub aia_fetching: bool,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            extract_all_tokens: true,
            level: ValidationLevel::ArchivalData,
            aia_fetching: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationReport {
    pub container: String,
    pub level: ValidationLevel,
    pub signed_documents: Vec<String>,
    /// SHA-256 fingerprint of the signing certificate
    pub signing_certificate: String,
    pub evidence_record_verified: bool,
    /// DER timestamp tokens found, when the policy extracts them
    pub time_stamp_tokens: Vec<Vec<u8>>,
}

struct ContainerEntries {
    order: Vec<String>,
    first_compression: Option<CompressionMethod>,
    content: BTreeMap<String, Vec<u8>>,
}

impl ContainerEntries {
    fn read(bytes: &[u8]) -> Result<Self> {
        const OP: &str = "read_container";
        let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(|e| zip_error(OP, e))?;
        let mut entries = Self {
            order: Vec::with_capacity(archive.len()),
            first_compression: None,
            content: BTreeMap::new(),
        };
        for index in 0..archive.len() {
            let mut file = archive.by_index(index).map_err(|e| zip_error(OP, e))?;
            if index == 0 {
                entries.first_compression = Some(file.compression());
            }
            let mut content = Vec::new();
            file.read_to_end(&mut content).map_err(|e| io_error(OP, e))?;
            entries.order.push(file.name().to_string());
            entries.content.insert(file.name().to_string(), content);
        }
        Ok(entries)
    }

    fn get(&self, name: &str) -> Option<&[u8]> {
        self.content.get(name).map(Vec::as_slice)
    }

    fn require(&self, op: &str, name: &str) -> Result<&[u8]> {
        self.get(name).ok_or_else(|| missing_field(op, name))
    }

    fn require_text(&self, op: &str, name: &str) -> Result<&str> {
        std::str::from_utf8(self.require(op, name)?).map_err(|e| {
            ExError::new(ExErrorKind::Xml)
                .with_op(op.to_string())
                .with_subject(name.to_string())
                .with_message(e.to_string())
        })
    }
}

fn invalid_manifest(op: &str, subject: &str, reason: impl Into<String>) -> ExError {
    ExError::new(ExErrorKind::InvalidManifest)
        .with_op(op.to_string())
        .with_subject(subject.to_string())
        .with_message(reason)
}

pub struct ContainerVerifier {
    trust: Box<dyn TrustRootSnapshot>,
    policy: ValidationPolicy,
}

impl ContainerVerifier {
    /// Verifier with the archival policy
    pub fn new(trust: Box<dyn TrustRootSnapshot>) -> Self {
        Self::with_policy(trust, ValidationPolicy::default())
    }

    pub fn with_policy(trust: Box<dyn TrustRootSnapshot>, policy: ValidationPolicy) -> Self {
        Self { trust, policy }
    }

    pub fn policy(&self) -> &ValidationPolicy {
        &self.policy
    }

    /// Verify the container at `path`
    ///
    /// # Errors
    ///
    /// Fails when the container cannot be read or any check fails.
    pub fn verify(&self, path: &Path) -> Result<VerificationReport> {
        let bytes = std::fs::read(path).map_err(|e| io_error("read_container", e))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.verify_bytes(&name, &bytes)
    }

    /// Verify container `bytes` reported as `name`
    ///
    /// # Errors
    ///
    /// `InvalidManifest` for structural problems, `IntegrityViolation` for
    /// digest mismatches and signatures that do not verify,
    /// `UntrustedCertificate` when the signer or a TSA does not chain to the
    /// snapshot, `Configuration` for a policy asking for network trust.
    pub fn verify_bytes(&self, name: &str, bytes: &[u8]) -> Result<VerificationReport> {
        let start = Instant::now();
        log_op_start!("verify_container", container = name, level = ?self.policy.level);

        match self.run(name, bytes) {
            Ok(report) => {
                log_op_end!(
                    "verify_container",
                    duration_ms = start.elapsed().as_millis() as u64,
                    evidence_record_verified = report.evidence_record_verified,
                    signing_certificate = report.signing_certificate.as_str()
                );
                Ok(report)
            }
            Err(err) => {
                log_op_error!(
                    "verify_container",
                    err,
                    duration_ms = start.elapsed().as_millis() as u64,
                    container = name
                );
                Err(err)
            }
        }
    }

    fn run(&self, name: &str, bytes: &[u8]) -> Result<VerificationReport> {
        if self.policy.aia_fetching {
            return Err(ChainLogError::InvalidConfiguration {
                reason: "network certificate lookups are not supported".to_string(),
            }
            .into());
        }
        let trusted = TrustedCertificateSource::from_snapshot(self.trust.as_ref())?;

        let entries = ContainerEntries::read(bytes)?;
        check_structure(&entries)?;
        let signed_documents = check_manifest(&entries)?;

        let signature_xml = entries.require_text("verify_signature", SIGNATURE_FILE_NAME)?;
        let signature = XmlElement::parse(signature_xml)?;
        check_references(&entries, signature_xml, &signature)?;
        let certificates = key_info_certificates(&signature)?;
        let (leaf, intermediates) = certificates
            .split_first()
            .ok_or_else(|| missing_field("verify_signing_certificate", "X509Certificate"))?;
        let signing_certificate = check_signing_certificate(leaf, intermediates, &trusted)?;
        verify_signature_value(signature_xml, &signature, leaf)?;

        let mut time_stamp_tokens = Vec::new();
        if self.policy.level >= ValidationLevel::LongTermData {
            time_stamp_tokens.extend(verify_signature_time_stamps(signature_xml, &signature, &trusted)?);
        }

        let mut evidence_record_verified = false;
        if self.policy.level >= ValidationLevel::ArchivalData {
            if entries.get(EVIDENCE_RECORD_FILE_NAME).is_some() {
                time_stamp_tokens.push(check_evidence_record(&entries, signature_xml, &trusted)?);
                evidence_record_verified = true;
            } else {
                warn!(
                    component = "verifier",
                    op = "verify_evidence_record",
                    container = name,
                    "Container carries no evidence record"
                );
            }
        }

        if !self.policy.extract_all_tokens {
            time_stamp_tokens.clear();
        }

        Ok(VerificationReport {
            container: name.to_string(),
            level: self.policy.level,
            signed_documents,
            signing_certificate,
            evidence_record_verified,
            time_stamp_tokens,
        })
    }
}

fn check_structure(entries: &ContainerEntries) -> Result<()> {
    const OP: &str = "verify_structure";
    if entries.order.first().map(String::as_str) != Some(MIMETYPE_FILE_NAME) {
        return Err(invalid_manifest(OP, MIMETYPE_FILE_NAME, "mimetype must be the first entry"));
    }
    if entries.first_compression != Some(CompressionMethod::Stored) {
        return Err(invalid_manifest(OP, MIMETYPE_FILE_NAME, "mimetype must be stored uncompressed"));
    }
    let mime_type = entries.require(OP, MIMETYPE_FILE_NAME)?;
    if !mime_type.starts_with(b"application/vnd.etsi.asic-") {
        return Err(invalid_manifest(
            OP,
            MIMETYPE_FILE_NAME,
            format!("unexpected media type '{}'", String::from_utf8_lossy(mime_type)),
        ));
    }
    entries.require(OP, SIGNATURE_FILE_NAME)?;
    Ok(())
}

/// Signed documents from the ODF manifest; each must be present
fn check_manifest(entries: &ContainerEntries) -> Result<Vec<String>> {
    const OP: &str = "verify_manifest";
    let manifest = XmlElement::parse(entries.require_text(OP, MANIFEST_FILE_NAME)?)?;

    let mut documents = Vec::new();
    for entry in manifest.children_named("file-entry") {
        let path = entry.require_attribute(OP, "full-path")?;
        if path == "/" {
            continue;
        }
        if entries.get(path).is_none() {
            return Err(invalid_manifest(OP, path, "manifest names a missing entry"));
        }
        documents.push(path.to_string());
    }
    if documents.is_empty() {
        return Err(invalid_manifest(OP, MANIFEST_FILE_NAME, "no signed documents"));
    }
    Ok(documents)
}

/// Recompute the digest of every reference: container entries by name,
/// signed properties by `#Id`
fn check_references(entries: &ContainerEntries, signature_xml: &str, signature: &XmlElement) -> Result<()> {
    const OP: &str = "verify_references";
    let mut references = Vec::new();
    signature.descendants("Reference", &mut references);

    let mut covered = 0;
    for reference in references {
        let uri = reference.attribute("URI").unwrap_or_default();
        if uri.is_empty() {
            continue;
        }
        if let Some(id) = uri.strip_prefix('#') {
            check_same_document_reference(signature_xml, reference, id)?;
            continue;
        }
        let content = entries
            .get(uri)
            .ok_or_else(|| invalid_manifest(OP, uri, "signature references a missing entry"))?;
        let algorithm = DigestAlgorithm::from_uri(
            reference
                .require_child(OP, "DigestMethod")?
                .require_attribute(OP, "Algorithm")?,
        )?;
        let expected = decode_text(OP, reference.require_child(OP, "DigestValue")?)?;
        if algorithm.digest(content) != expected {
            return Err(integrity_error(OP, uri, "signed document digest mismatch"));
        }
        covered += 1;
    }

    if covered == 0 {
        return Err(invalid_manifest(OP, SIGNATURE_FILE_NAME, "signature references no documents"));
    }
    Ok(())
}

/// The signing certificate must chain to the snapshot; returns its fingerprint
fn check_signing_certificate(
    leaf: &[u8],
    intermediates: &[Vec<u8>],
    trusted: &TrustedCertificateSource,
) -> Result<String> {
    trusted
        .verify_path(leaf, intermediates)
        .map_err(|e| e.with_op("verify_signing_certificate"))?;
    Ok(fingerprint(leaf))
}

/// Check the evidence record against the signature; returns its token
fn check_evidence_record(
    entries: &ContainerEntries,
    signature_xml: &str,
    trusted: &TrustedCertificateSource,
) -> Result<Vec<u8>> {
    const OP: &str = "verify_evidence_record";
    let sig_digest = signature_digest(signature_xml)?;

    let manifest = manifest_from_xml(entries.require_text(OP, EVIDENCE_RECORD_MANIFEST_FILE_NAME)?)?;
    if manifest.sig_reference.uri != EVIDENCE_RECORD_FILE_NAME {
        return Err(invalid_manifest(
            OP,
            EVIDENCE_RECORD_MANIFEST_FILE_NAME,
            format!("SigReference points at '{}'", manifest.sig_reference.uri),
        ));
    }
    let reference = manifest
        .data_objects
        .iter()
        .find(|r| r.uri == SIGNATURE_FILE_NAME)
        .ok_or_else(|| missing_field(OP, "DataObjectReference"))?;
    if reference.digest_value != sig_digest {
        return Err(integrity_error(OP, EVIDENCE_RECORD_MANIFEST_FILE_NAME, "signature digest mismatch"));
    }

    let record = evidence_record_from_xml(entries.require_text(OP, EVIDENCE_RECORD_FILE_NAME)?)?;
    let chain = record
        .initial_chain()
        .ok_or_else(|| missing_field(OP, "ArchiveTimeStampChain"))?;
    let time_stamp = record
        .initial_time_stamp()
        .ok_or_else(|| missing_field(OP, "ArchiveTimeStamp"))?;
    if !time_stamp.covers(&sig_digest) {
        return Err(integrity_error(
            OP,
            EVIDENCE_RECORD_FILE_NAME,
            "first hash-tree sequence does not cover the signature",
        ));
    }

    let token = &time_stamp.token;
    if token.token_type != RFC3161_TOKEN_TYPE {
        return Err(invalid_manifest(
            OP,
            EVIDENCE_RECORD_FILE_NAME,
            format!("unsupported time stamp type '{}'", token.token_type),
        ));
    }

    let algorithm = DigestAlgorithm::from_uri(&chain.digest_method)?;
    let root = time_stamp
        .hash_tree_root(algorithm)
        .ok_or_else(|| missing_field(OP, "Sequence"))?;
    let imprint = verify_time_stamp(&token.der, trusted)?;
    if imprint.algorithm != algorithm || imprint.digest != root {
        return Err(integrity_error(
            OP,
            EVIDENCE_RECORD_FILE_NAME,
            "time stamp does not cover the hash-tree root",
        ));
    }
    Ok(token.der.clone())
}
