//! RFC 3161 time-stamp tokens.
//!
//! A token is a CMS `SignedData` wrapping a `TSTInfo`. It is accepted when
//! the signer's `messageDigest` attribute matches the `TSTInfo`, the signed
//! attributes verify with an enclosed or snapshot certificate, and that
//! certificate chains to the trust-root snapshot.

use super::trust::{fingerprint, TrustedCertificateSource};
use crate::crypto::{digest_from_oid, verify_signature, SignatureScheme};
use crate::errors::{integrity_error, missing_field, token_error, Result};
use chainlog_core::DigestAlgorithm;
use cms::cert::CertificateChoices;
use cms::content_info::ContentInfo;
use cms::signed_data::SignedData;
use der::asn1::{ObjectIdentifier, OctetString};
use der::{Decode, Encode};
use x509_tsp::TstInfo;

const ID_SIGNED_DATA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.2");
const ID_CT_TST_INFO: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.16.1.4");
const ID_MESSAGE_DIGEST: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.4");

const OP: &str = "verify_time_stamp";

/// What a verified token attests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeStampImprint {
    pub algorithm: DigestAlgorithm,
    pub digest: Vec<u8>,
    /// SHA-256 fingerprint of the TSA certificate
    pub tsa_certificate: String,
}

impl TimeStampImprint {
    /// Does the token cover `data`
    pub fn covers(&self, data: &[u8]) -> bool {
        self.algorithm.digest(data) == self.digest
    }
}

/// Verify `token` and return its message imprint
///
/// # Errors
///
/// `InvalidInput` for a token that does not decode, `IntegrityViolation`
/// when the content digest or signature does not verify,
/// `UntrustedCertificate` when the TSA does not chain to the snapshot.
pub fn verify_time_stamp(token: &[u8], trusted: &TrustedCertificateSource) -> Result<TimeStampImprint> {
    let content_info = ContentInfo::from_der(token).map_err(|e| token_error(OP, e))?;
    if content_info.content_type != ID_SIGNED_DATA {
        return Err(token_error(OP, format!("content type {}", content_info.content_type)));
    }
    let signed_der = content_info.content.to_der().map_err(|e| token_error(OP, e))?;
    let signed = SignedData::from_der(&signed_der).map_err(|e| token_error(OP, e))?;

    let encapsulated = &signed.encap_content_info;
    if encapsulated.econtent_type != ID_CT_TST_INFO {
        return Err(token_error(OP, format!("encapsulated {}", encapsulated.econtent_type)));
    }
    let tst_der = encapsulated
        .econtent
        .as_ref()
        .ok_or_else(|| missing_field(OP, "eContent"))?
        .value();
    let tst_info = TstInfo::from_der(tst_der).map_err(|e| token_error(OP, e))?;

    let enclosed = signed
        .certificates
        .iter()
        .flat_map(|set| set.0.iter())
        .filter_map(|choice| match choice {
            CertificateChoices::Certificate(certificate) => Some(certificate.to_der()),
            _ => None,
        })
        .collect::<der::Result<Vec<_>>>()
        .map_err(|e| token_error(OP, e))?;

    let signer = signed
        .signer_infos
        .0
        .iter()
        .next()
        .ok_or_else(|| missing_field(OP, "SignerInfo"))?;
    let digest_algorithm = digest_from_oid(&signer.digest_alg.oid.to_string())?;
    let signed_attributes = signer
        .signed_attrs
        .as_ref()
        .ok_or_else(|| missing_field(OP, "signedAttrs"))?;

    let message_digest = signed_attributes
        .iter()
        .find(|attribute| attribute.oid == ID_MESSAGE_DIGEST)
        .and_then(|attribute| attribute.values.iter().next())
        .ok_or_else(|| missing_field(OP, "messageDigest"))?;
    let message_digest = OctetString::from_der(&message_digest.to_der().map_err(|e| token_error(OP, e))?)
        .map_err(|e| token_error(OP, e))?;
    if message_digest.as_bytes() != digest_algorithm.digest(tst_der).as_slice() {
        return Err(integrity_error(OP, "TimeStampToken", "messageDigest does not match TSTInfo"));
    }

    let scheme = SignatureScheme::from_cms_oid(&signer.signature_algorithm.oid.to_string(), digest_algorithm)?;
    let signed_bytes = signed_attributes.to_der().map_err(|e| token_error(OP, e))?;
    let signature = signer.signature.as_bytes();
    let tsa_certificate = enclosed
        .iter()
        .chain(trusted.certificates())
        .find(|der| verify_signature(der, scheme, &signed_bytes, signature).is_ok())
        .ok_or_else(|| {
            integrity_error(OP, "TimeStampToken", "signature does not verify with any known TSA key")
        })?;
    trusted.verify_path(tsa_certificate, &enclosed)?;

    let imprint = &tst_info.message_imprint;
    Ok(TimeStampImprint {
        algorithm: digest_from_oid(&imprint.hash_algorithm.oid.to_string())?,
        digest: imprint.hashed_message.as_bytes().to_vec(),
        tsa_certificate: fingerprint(tsa_certificate),
    })
}
