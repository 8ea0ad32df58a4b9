//! Signature checks with certificate public keys.
//!
//! Keys come from X.509 certificates; verification is done by `ring`.
//! XML signatures carry ECDSA values as `r || s`, CMS signers as a DER
//! `Ecdsa-Sig-Value`.

use crate::errors::{certificate_error, integrity_error, unsupported_algorithm, Result};
use chainlog_core::DigestAlgorithm;
use ring::signature::{self, UnparsedPublicKey, VerificationAlgorithm};
use x509_parser::prelude::*;

const EC_PUBLIC_KEY: &str = "1.2.840.10045.2.1";
const RSA_ENCRYPTION: &str = "1.2.840.113549.1.1.1";
const CURVE_P256: &str = "1.2.840.10045.3.1.7";
const CURVE_P384: &str = "1.3.132.0.34";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureScheme {
    EcdsaFixed(DigestAlgorithm),
    EcdsaDer(DigestAlgorithm),
    RsaPkcs1(DigestAlgorithm),
}

impl SignatureScheme {
    /// Scheme named by an XML signature method URI
    ///
    /// # Errors
    ///
    /// `UnsupportedAlgorithm` for any other method.
    pub fn from_xml_uri(uri: &str) -> Result<Self> {
        use DigestAlgorithm::*;
        let scheme = match uri {
            "http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha256" => Self::EcdsaFixed(Sha256),
            "http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha384" => Self::EcdsaFixed(Sha384),
            "http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha512" => Self::EcdsaFixed(Sha512),
            "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256" => Self::RsaPkcs1(Sha256),
            "http://www.w3.org/2001/04/xmldsig-more#rsa-sha384" => Self::RsaPkcs1(Sha384),
            "http://www.w3.org/2001/04/xmldsig-more#rsa-sha512" => Self::RsaPkcs1(Sha512),
            other => return Err(unsupported_algorithm("signature_scheme", other)),
        };
        Ok(scheme)
    }

    /// Scheme of a CMS signer from its signature algorithm OID
    ///
    /// A bare `rsaEncryption` OID takes the signer's digest algorithm.
    ///
    /// # Errors
    ///
    /// `UnsupportedAlgorithm` for any other OID.
    pub fn from_cms_oid(oid: &str, digest: DigestAlgorithm) -> Result<Self> {
        use DigestAlgorithm::*;
        let scheme = match oid {
            "1.2.840.10045.4.3.2" => Self::EcdsaDer(Sha256),
            "1.2.840.10045.4.3.3" => Self::EcdsaDer(Sha384),
            "1.2.840.10045.4.3.4" => Self::EcdsaDer(Sha512),
            RSA_ENCRYPTION => Self::RsaPkcs1(digest),
            "1.2.840.113549.1.1.11" => Self::RsaPkcs1(Sha256),
            "1.2.840.113549.1.1.12" => Self::RsaPkcs1(Sha384),
            "1.2.840.113549.1.1.13" => Self::RsaPkcs1(Sha512),
            other => return Err(unsupported_algorithm("signature_scheme", other)),
        };
        Ok(scheme)
    }
}

/// Digest algorithm named by its OID
///
/// # Errors
///
/// `UnsupportedAlgorithm` outside SHA-256, SHA-384 and SHA-512.
pub fn digest_from_oid(oid: &str) -> Result<DigestAlgorithm> {
    match oid {
        "2.16.840.1.101.3.4.2.1" => Ok(DigestAlgorithm::Sha256),
        "2.16.840.1.101.3.4.2.2" => Ok(DigestAlgorithm::Sha384),
        "2.16.840.1.101.3.4.2.3" => Ok(DigestAlgorithm::Sha512),
        other => Err(unsupported_algorithm("digest_algorithm", other)),
    }
}

/// Check `signature` over `message` with the key of certificate `der`
///
/// # Errors
///
/// `IntegrityViolation` when the signature does not verify,
/// `UnsupportedAlgorithm` when the key cannot be used with `scheme`.
pub fn verify_signature(
    der: &[u8],
    scheme: SignatureScheme,
    message: &[u8],
    signature: &[u8],
) -> Result<()> {
    const OP: &str = "verify_signature";
    let (_, certificate) =
        X509Certificate::from_der(der).map_err(|e| certificate_error(OP, e))?;
    let key = certificate.public_key();
    let algorithm = ring_algorithm(key, scheme)?;

    UnparsedPublicKey::new(algorithm, &*key.subject_public_key.data)
        .verify(message, signature)
        .map_err(|_| {
            integrity_error(
                OP,
                &certificate.subject().to_string(),
                "signature does not verify with the certificate key",
            )
        })
}

fn ring_algorithm(
    key: &SubjectPublicKeyInfo<'_>,
    scheme: SignatureScheme,
) -> Result<&'static dyn VerificationAlgorithm> {
    use DigestAlgorithm::*;
    use SignatureScheme::*;

    let key_type = key.algorithm.algorithm.to_id_string();
    let curve = key
        .algorithm
        .parameters
        .as_ref()
        .and_then(|p| p.as_oid().ok())
        .map(|oid| oid.to_id_string());

    let algorithm: &'static dyn VerificationAlgorithm = match (key_type.as_str(), curve.as_deref(), scheme) {
        (EC_PUBLIC_KEY, Some(CURVE_P256), EcdsaFixed(Sha256)) => &signature::ECDSA_P256_SHA256_FIXED,
        (EC_PUBLIC_KEY, Some(CURVE_P384), EcdsaFixed(Sha384)) => &signature::ECDSA_P384_SHA384_FIXED,
        (EC_PUBLIC_KEY, Some(CURVE_P256), EcdsaDer(Sha256)) => &signature::ECDSA_P256_SHA256_ASN1,
        (EC_PUBLIC_KEY, Some(CURVE_P256), EcdsaDer(Sha384)) => &signature::ECDSA_P256_SHA384_ASN1,
        (EC_PUBLIC_KEY, Some(CURVE_P384), EcdsaDer(Sha256)) => &signature::ECDSA_P384_SHA256_ASN1,
        (EC_PUBLIC_KEY, Some(CURVE_P384), EcdsaDer(Sha384)) => &signature::ECDSA_P384_SHA384_ASN1,
        (RSA_ENCRYPTION, _, RsaPkcs1(Sha256)) => &signature::RSA_PKCS1_2048_8192_SHA256,
        (RSA_ENCRYPTION, _, RsaPkcs1(Sha384)) => &signature::RSA_PKCS1_2048_8192_SHA384,
        (RSA_ENCRYPTION, _, RsaPkcs1(Sha512)) => &signature::RSA_PKCS1_2048_8192_SHA512,
        _ => {
            return Err(unsupported_algorithm(
                "signature_scheme",
                &format!("{:?} with key {} ({})", scheme, key_type, curve.as_deref().unwrap_or_default()),
            ))
        }
    };
    Ok(algorithm)
}
