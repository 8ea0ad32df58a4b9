//! ASiC-E assembly and verification
//!
//! Containers are assembled from signed fixtures and verified against an
//! in-memory trust snapshot holding their issuing root.

mod common;

use chainlog_asic::evidence::TimestampProof;
use chainlog_asic::file_names::SIGNATURE_FILE_NAME;
use chainlog_asic::{
    AssemblerSettings, ContainerAssembler, ContainerInput, ContainerVerifier, ValidationLevel,
    ValidationPolicy,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chainlog_core::ExErrorKind;
use common::*;
use std::io::{Cursor, Read, Write};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

fn assemble(with_evidence: bool, attachment: Option<&[u8]>) -> Vec<u8> {
    let signature = signature_xml();
    let proof = proof(&["STEP1", "STEP2", "STEP3"]);
    let input = ContainerInput {
        message: MESSAGE,
        attachment,
        signature: &signature,
        timestamp: with_evidence.then_some(&proof),
    };
    ContainerAssembler::default().assemble(&input).unwrap().bytes
}

fn assemble_with(signature: &str, proof: &TimestampProof) -> Vec<u8> {
    let input = ContainerInput {
        message: MESSAGE,
        attachment: None,
        signature,
        timestamp: Some(proof),
    };
    ContainerAssembler::default().assemble(&input).unwrap().bytes
}

/// The signature with one bit of its `SignatureValue` flipped
fn with_altered_signature_value(signature: &str) -> String {
    let start = signature.find(r#"Id="S0-SIG">"#).unwrap() + r#"Id="S0-SIG">"#.len();
    let end = start + signature[start..].find("</ds:SignatureValue>").unwrap();
    let mut value = STANDARD.decode(&signature[start..end]).unwrap();
    value[10] ^= 0x01;
    format!("{}{}{}", &signature[..start], STANDARD.encode(value), &signature[end..])
}

fn basic() -> ValidationPolicy {
    ValidationPolicy {
        level: ValidationLevel::BasicSignatures,
        ..ValidationPolicy::default()
    }
}

fn entries(bytes: &[u8]) -> Vec<(String, CompressionMethod, Vec<u8>)> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    (0..archive.len())
        .map(|i| {
            let mut file = archive.by_index(i).unwrap();
            let mut content = Vec::new();
            file.read_to_end(&mut content).unwrap();
            (file.name().to_string(), file.compression(), content)
        })
        .collect()
}

/// Copy a container, replacing the content of one entry
fn replace_entry(bytes: &[u8], name: &str, content: &[u8]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (entry, method, original) in entries(bytes) {
        zip.start_file(entry.as_str(), SimpleFileOptions::default().compression_method(method))
            .unwrap();
        zip.write_all(if entry == name { content } else { &original })
            .unwrap();
    }
    zip.finish().unwrap().into_inner()
}

#[test]
fn test_container_layout() {
    // Given: A message with an attachment and a timestamp proof
    // When: The container is assembled
    let bytes = assemble(true, Some(b"attachment bytes"));

    // Then: Entries come in the fixed order, mimetype first and stored
    let entries = entries(&bytes);
    let names: Vec<&str> = entries.iter().map(|(n, _, _)| n.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "mimetype",
            "message.xml",
            "attachment1",
            "META-INF/signatures.xml",
            "META-INF/manifest.xml",
            "META-INF/evidencerecord.xml",
            "META-INF/ASiCEvidenceRecordManifest001.xml",
        ]
    );
    assert_eq!(entries[0].1, CompressionMethod::Stored);
    assert_eq!(entries[0].2, b"application/vnd.etsi.asic-e+zip");
    assert_eq!(entries[1].2, MESSAGE);
}

#[test]
fn test_assembly_is_deterministic() {
    assert_eq!(assemble(true, None), assemble(true, None));
}

#[test]
fn test_signature_name_comes_from_settings() {
    // Given: Settings forcing another signature entry name
    let settings = AssemblerSettings {
        signature_file_name: "META-INF/signatures0.xml".to_string(),
        ..AssemblerSettings::default()
    };
    let signature = signature_xml();
    let proof = proof(&["STEP1"]);

    // When: A container is assembled
    let container = ContainerAssembler::new(settings)
        .assemble(&ContainerInput {
            message: MESSAGE,
            attachment: None,
            signature: &signature,
            timestamp: Some(&proof),
        })
        .unwrap();

    // Then: The signature and the evidence manifest use that name
    let entries = entries(&container.bytes);
    assert!(entries.iter().any(|(n, _, _)| n == "META-INF/signatures0.xml"));
    let manifest = entries
        .iter()
        .find(|(n, _, _)| n == "META-INF/ASiCEvidenceRecordManifest001.xml")
        .unwrap();
    assert!(String::from_utf8_lossy(&manifest.2).contains(r#"URI="META-INF/signatures0.xml""#));
}

#[test]
fn test_assembled_container_verifies_at_archival_depth() {
    // Given: A container with an evidence record written to disk
    let dir = TempDir::new().unwrap();
    let signature = signature_xml();
    let proof = proof(&["STEP1", "STEP2", "STEP3"]);
    let container = ContainerAssembler::default()
        .assemble(&ContainerInput {
            message: MESSAGE,
            attachment: None,
            signature: &signature,
            timestamp: Some(&proof),
        })
        .unwrap();
    let path = container.write_to(dir.path()).unwrap();
    assert_eq!(
        path.file_name().unwrap(),
        "container-signed-xades-baseline-lt.asice"
    );

    // When: It is verified against a snapshot holding the issuing root
    let report = ContainerVerifier::new(trusting_signer()).verify(&path).unwrap();

    // Then: Every check passed and both verified tokens were extracted
    assert_eq!(report.level, ValidationLevel::ArchivalData);
    assert_eq!(report.signed_documents, vec!["message.xml"]);
    assert!(report.evidence_record_verified);
    assert_eq!(
        report.time_stamp_tokens,
        vec![SIGNATURE_TOKEN.to_vec(), TOKEN_DER.to_vec()]
    );
    assert_eq!(report.signing_certificate.len(), 64);
}

#[test]
fn test_container_without_evidence_still_verifies() {
    let report = ContainerVerifier::new(trusting_signer())
        .verify_bytes("plain.asice", &assemble(false, None))
        .unwrap();

    assert!(!report.evidence_record_verified);
    assert_eq!(report.time_stamp_tokens, vec![SIGNATURE_TOKEN.to_vec()]);
}

#[test]
fn test_tokens_dropped_when_policy_does_not_extract() {
    let policy = ValidationPolicy {
        extract_all_tokens: false,
        ..ValidationPolicy::default()
    };

    let report = ContainerVerifier::with_policy(trusting_signer(), policy)
        .verify_bytes("x.asice", &assemble(true, None))
        .unwrap();

    assert!(report.evidence_record_verified);
    assert!(report.time_stamp_tokens.is_empty());
}

#[test]
fn test_altered_message_breaks_reference_digest() {
    // Given: A container whose message was changed after signing
    let bytes = replace_entry(&assemble(true, None), "message.xml", b"<tampered/>");

    // When: It is verified
    let err = ContainerVerifier::new(trusting_signer())
        .verify_bytes("x.asice", &bytes)
        .unwrap_err();

    // Then: The integrity violation names the document
    assert_eq!(err.kind(), ExErrorKind::IntegrityViolation);
    assert_eq!(err.subject(), Some("message.xml"));
}

#[test]
fn test_altered_signature_value_fails_at_basic_level() {
    // Given: A container whose SignatureValue no longer matches SignedInfo
    let signature = with_altered_signature_value(&signature_xml());
    let bytes = replace_entry(&assemble(false, None), SIGNATURE_FILE_NAME, signature.as_bytes());

    // When: It is verified at basic level
    let err = ContainerVerifier::with_policy(trusting_signer(), basic())
        .verify_bytes("x.asice", &bytes)
        .unwrap_err();

    // Then: The signature value does not verify with the signer's key
    assert_eq!(err.kind(), ExErrorKind::IntegrityViolation);
    assert_eq!(err.subject(), Some("SignatureValue"));
}

#[test]
fn test_altered_signing_time_fails_at_basic_level() {
    // Given: A signature whose signed properties changed after signing
    let signature = signature_xml().replace("2026-10-17T10:00:00Z", "2026-10-17T11:00:00Z");
    let bytes = replace_entry(&assemble(false, None), SIGNATURE_FILE_NAME, signature.as_bytes());

    // When: It is verified at basic level
    let err = ContainerVerifier::with_policy(trusting_signer(), basic())
        .verify_bytes("x.asice", &bytes)
        .unwrap_err();

    // Then: The SignedProperties reference no longer matches
    assert_eq!(err.kind(), ExErrorKind::IntegrityViolation);
    assert_eq!(err.subject(), Some("S0-SignedProperties"));
}

#[test]
fn test_replaced_step_digests_break_evidence_record() {
    // Given: An evidence record built from steps the token was not issued over
    let mut proof = proof(&["STEP1", "STEP2", "STEP3"]);
    proof.hash_chain = proof
        .hash_chain
        .replace("AQEBAQ==", "BQUFBQ==")
        .replace("AgICAg==", "BgYGBg==")
        .replace("AwMDAw==", "BwcHBw==");
    let bytes = assemble_with(&signature_xml(), &proof);

    // When: It is verified at archival depth
    let err = ContainerVerifier::new(trusting_signer())
        .verify_bytes("x.asice", &bytes)
        .unwrap_err();

    // Then: The reduced root differs from the time-stamped one
    assert_eq!(err.kind(), ExErrorKind::IntegrityViolation);
    assert_eq!(err.op(), Some("verify_evidence_record"));

    // And: A basic-level check does not look at the evidence
    assert!(ContainerVerifier::with_policy(trusting_signer(), basic())
        .verify_bytes("x.asice", &bytes)
        .is_ok());
}

#[test]
fn test_single_replaced_step_digest_breaks_evidence_record() {
    let mut proof = proof(&["STEP1", "STEP2", "STEP3"]);
    proof.hash_chain = proof.hash_chain.replace("AgICAg==", "AgICAw==");

    let err = ContainerVerifier::new(trusting_signer())
        .verify_bytes("x.asice", &assemble_with(&signature_xml(), &proof))
        .unwrap_err();

    assert_eq!(err.kind(), ExErrorKind::IntegrityViolation);
}

#[test]
fn test_evidence_token_must_verify() {
    // Given: An evidence record whose token signature was altered
    let mut token = TOKEN_DER.to_vec();
    let last = token.len() - 1;
    token[last] ^= 0x01;
    let mut proof = proof(&["STEP1", "STEP2", "STEP3"]);
    proof.time_stamp_token = STANDARD.encode(token);

    // When: It is verified at archival depth
    let err = ContainerVerifier::new(trusting_signer())
        .verify_bytes("x.asice", &assemble_with(&signature_xml(), &proof))
        .unwrap_err();

    // Then: No TSA key verifies it
    assert_eq!(err.kind(), ExErrorKind::IntegrityViolation);
    assert_eq!(err.subject(), Some("TimeStampToken"));
}

#[test]
fn test_signer_outside_snapshot_is_untrusted() {
    // Given: A snapshot holding a root that did not issue the signer
    let snapshot = Box::new(FixedSnapshot {
        ca: vec![OTHER_CA.to_vec()],
    });

    // When: The container is verified
    let err = ContainerVerifier::new(snapshot)
        .verify_bytes("x.asice", &assemble(true, None))
        .unwrap_err();

    // Then: The signer has no path to the snapshot
    assert_eq!(err.kind(), ExErrorKind::UntrustedCertificate);
    assert_eq!(err.op(), Some("verify_signing_certificate"));
}

#[test]
fn test_signer_is_trusted_through_its_issuer_only() {
    // Given: A snapshot holding the signer leaf but not its issuer
    let snapshot = Box::new(FixedSnapshot {
        ca: vec![SIGNER_CERTIFICATE.to_vec()],
    });

    // When: The container is verified with time stamps
    let err = ContainerVerifier::new(snapshot)
        .verify_bytes("x.asice", &assemble(true, None))
        .unwrap_err();

    // Then: The leaf does not vouch for the TSA
    assert_eq!(err.kind(), ExErrorKind::UntrustedCertificate);
}

#[test]
fn test_compressed_mimetype_rejected() {
    // Given: A container whose mimetype entry is deflated
    let original = assemble(false, None);
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, _, content) in entries(&original) {
        zip.start_file(
            name.as_str(),
            SimpleFileOptions::default().compression_method(CompressionMethod::Deflated),
        )
        .unwrap();
        zip.write_all(&content).unwrap();
    }
    let bytes = zip.finish().unwrap().into_inner();

    // Then: The structure check fails
    let err = ContainerVerifier::new(trusting_signer())
        .verify_bytes("x.asice", &bytes)
        .unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::InvalidManifest);
}

#[test]
fn test_network_trust_lookups_refused() {
    let policy = ValidationPolicy {
        aia_fetching: true,
        ..ValidationPolicy::default()
    };

    let err = ContainerVerifier::with_policy(trusting_signer(), policy)
        .verify_bytes("x.asice", &assemble(false, None))
        .unwrap_err();

    assert_eq!(err.kind(), ExErrorKind::Configuration);
}
