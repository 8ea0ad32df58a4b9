//! XAdES signature checks: the signature value over `SignedInfo`,
//! same-document references and signature time stamps.

use super::timestamp::verify_time_stamp;
use super::trust::TrustedCertificateSource;
use crate::crypto::{verify_signature, SignatureScheme};
use crate::errors::{base64_error, integrity_error, missing_field, unsupported_algorithm, Result};
use crate::xml::{canonicalize_subtree, is_supported_method, Apex, XmlElement};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chainlog_core::errors::ExErrorKind;
use chainlog_core::DigestAlgorithm;

/// Base64 text content, ignoring line breaks and indentation
pub fn decode_text(op: &str, element: &XmlElement) -> Result<Vec<u8>> {
    let compact: String = element.text().chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD
        .decode(compact)
        .map_err(|e| base64_error(op, &element.name, e))
}

/// Certificates of `KeyInfo`, the signing certificate first
///
/// # Errors
///
/// `MissingField` when the signature carries no certificate.
pub fn key_info_certificates(signature: &XmlElement) -> Result<Vec<Vec<u8>>> {
    const OP: &str = "read_key_info";
    let mut found = Vec::new();
    signature
        .descendant("KeyInfo")
        .ok_or_else(|| missing_field(OP, "KeyInfo"))?
        .descendants("X509Certificate", &mut found);
    if found.is_empty() {
        return Err(missing_field(OP, "X509Certificate"));
    }
    found.into_iter().map(|c| decode_text(OP, c)).collect()
}

fn check_canonicalization(op: &str, parent: &XmlElement) -> Result<()> {
    if let Some(method) = parent.child("CanonicalizationMethod") {
        let uri = method.require_attribute(op, "Algorithm")?;
        if !is_supported_method(uri) {
            return Err(unsupported_algorithm(op, uri));
        }
    }
    Ok(())
}

/// Verify `SignatureValue` over the canonical `SignedInfo`
///
/// # Errors
///
/// `IntegrityViolation` when the value does not verify with
/// `certificate`, `UnsupportedAlgorithm` for an unsupported
/// canonicalization or signature method.
pub fn verify_signature_value(signature_xml: &str, signature: &XmlElement, certificate: &[u8]) -> Result<()> {
    const OP: &str = "verify_signature_value";
    let signed_info = signature
        .descendant("SignedInfo")
        .ok_or_else(|| missing_field(OP, "SignedInfo"))?;
    let method = signed_info.require_child(OP, "CanonicalizationMethod")?;
    let c14n = method.require_attribute(OP, "Algorithm")?;
    if !is_supported_method(c14n) {
        return Err(unsupported_algorithm(OP, c14n));
    }
    let scheme = SignatureScheme::from_xml_uri(
        signed_info
            .require_child(OP, "SignatureMethod")?
            .require_attribute(OP, "Algorithm")?,
    )?;

    let canonical = canonicalize_subtree(signature_xml, Apex::LocalName("SignedInfo"))?;
    let value = decode_text(
        OP,
        signature
            .descendant("SignatureValue")
            .ok_or_else(|| missing_field(OP, "SignatureValue"))?,
    )?;
    verify_signature(certificate, scheme, &canonical, &value).map_err(|e| match e.kind() {
        ExErrorKind::IntegrityViolation => e.with_op(OP).with_subject("SignatureValue"),
        _ => e,
    })
}

/// Recompute a `#id` reference over the element carrying that `Id`
///
/// # Errors
///
/// `IntegrityViolation` on a digest mismatch, `UnsupportedAlgorithm` for a
/// transform other than inclusive canonicalization.
pub fn check_same_document_reference(signature_xml: &str, reference: &XmlElement, id: &str) -> Result<()> {
    const OP: &str = "verify_references";
    if let Some(transforms) = reference.child("Transforms") {
        for transform in transforms.children_named("Transform") {
            let uri = transform.require_attribute(OP, "Algorithm")?;
            if !is_supported_method(uri) {
                return Err(unsupported_algorithm(OP, uri));
            }
        }
    }
    let algorithm = DigestAlgorithm::from_uri(
        reference
            .require_child(OP, "DigestMethod")?
            .require_attribute(OP, "Algorithm")?,
    )?;
    let expected = decode_text(OP, reference.require_child(OP, "DigestValue")?)?;

    let canonical = canonicalize_subtree(signature_xml, Apex::Id(id))?;
    if algorithm.digest(&canonical) != expected {
        return Err(integrity_error(OP, id, "signed property digest mismatch"));
    }
    Ok(())
}

/// Verify every `SignatureTimeStamp` over the canonical `SignatureValue`
///
/// Returns the DER tokens.
///
/// # Errors
///
/// Fails when a token does not verify, is not trusted, or covers other
/// data.
pub fn verify_signature_time_stamps(
    signature_xml: &str,
    signature: &XmlElement,
    trusted: &TrustedCertificateSource,
) -> Result<Vec<Vec<u8>>> {
    const OP: &str = "verify_signature_time_stamps";
    let mut stamps = Vec::new();
    signature.descendants("SignatureTimeStamp", &mut stamps);
    if stamps.is_empty() {
        return Ok(Vec::new());
    }

    let signature_value = canonicalize_subtree(signature_xml, Apex::LocalName("SignatureValue"))?;
    let mut tokens = Vec::new();
    for stamp in stamps {
        check_canonicalization(OP, stamp)?;
        for encapsulated in stamp.children_named("EncapsulatedTimeStamp") {
            let token = decode_text(OP, encapsulated)?;
            let imprint = verify_time_stamp(&token, trusted)?;
            if !imprint.covers(&signature_value) {
                return Err(integrity_error(
                    OP,
                    stamp.attribute("Id").unwrap_or("SignatureTimeStamp"),
                    "time stamp does not cover the signature value",
                ));
            }
            tokens.push(token);
        }
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::trust::TrustRootSnapshot;

    const SIGNATURE_XML: &str = include_str!("../../tests/fixtures/signatures.xml");
    const SIGNER: &[u8] = include_bytes!("../../tests/fixtures/signer.der");
    const CA: &[u8] = include_bytes!("../../tests/fixtures/ca.der");
    const SIGNATURE_TOKEN: &[u8] = include_bytes!("../../tests/fixtures/signature-time-stamp.der");

    struct Roots;

    impl TrustRootSnapshot for Roots {
        fn tsa_certificates(&self) -> Result<Vec<Vec<u8>>> {
            Ok(Vec::new())
        }
        fn ca_certificates(&self) -> Result<Vec<Vec<u8>>> {
            Ok(vec![CA.to_vec()])
        }
        fn ocsp_responder_certificates(&self) -> Result<Vec<Vec<u8>>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_key_info_yields_signer() {
        let signature = XmlElement::parse(SIGNATURE_XML).unwrap();
        assert_eq!(key_info_certificates(&signature).unwrap(), vec![SIGNER.to_vec()]);
    }

    #[test]
    fn test_signature_value_verifies_over_signed_info() {
        let signature = XmlElement::parse(SIGNATURE_XML).unwrap();
        verify_signature_value(SIGNATURE_XML, &signature, SIGNER).unwrap();
    }

    #[test]
    fn test_changed_signed_info_fails() {
        // Given: SignedInfo pointing at another document name
        let xml = SIGNATURE_XML.replace(r#"URI="message.xml""#, r#"URI="other.xml""#);
        let signature = XmlElement::parse(&xml).unwrap();

        // When: The signature value is checked
        let err = verify_signature_value(&xml, &signature, SIGNER).unwrap_err();

        // Then: It no longer verifies
        assert_eq!(err.kind(), ExErrorKind::IntegrityViolation);
        assert_eq!(err.subject(), Some("SignatureValue"));
    }

    #[test]
    fn test_signed_properties_reference_checked_by_id() {
        let signature = XmlElement::parse(SIGNATURE_XML).unwrap();
        let mut references = Vec::new();
        signature.descendants("Reference", &mut references);
        let properties = references
            .into_iter()
            .find(|r| r.attribute("URI") == Some("#S0-SignedProperties"))
            .unwrap();

        check_same_document_reference(SIGNATURE_XML, properties, "S0-SignedProperties").unwrap();
    }

    #[test]
    fn test_signature_time_stamp_covers_signature_value() {
        // Given: A snapshot holding the root that issued the TSA
        let trusted = TrustedCertificateSource::from_snapshot(&Roots).unwrap();
        let signature = XmlElement::parse(SIGNATURE_XML).unwrap();

        // When: The signature time stamps are verified
        let tokens = verify_signature_time_stamps(SIGNATURE_XML, &signature, &trusted).unwrap();

        // Then: The embedded token is returned
        assert_eq!(tokens, vec![SIGNATURE_TOKEN.to_vec()]);
    }
}
