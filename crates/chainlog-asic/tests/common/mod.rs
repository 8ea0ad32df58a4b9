#![allow(dead_code)]

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chainlog_asic::errors::Result;
use chainlog_asic::evidence::TimestampProof;
use chainlog_asic::TrustRootSnapshot;

pub const MESSAGE: &[u8] = b"<soap:Envelope xmlns:soap=\"http://schemas.xmlsoap.org/soap/envelope/\"><soap:Body>hello</soap:Body></soap:Envelope>";

/// Signer leaf issued by `CA`, carried in the signature's `KeyInfo`
pub const SIGNER_CERTIFICATE: &[u8] = include_bytes!("../fixtures/signer.der");

/// Root that issued the signer and the TSA
pub const CA: &[u8] = include_bytes!("../fixtures/ca.der");

pub const OTHER_CA: &[u8] = include_bytes!("../fixtures/other-ca.der");

/// RFC 3161 token over the hash-tree root of `SIGNATURE_XML` and `STEP_DIGESTS`
pub const TOKEN_DER: &[u8] = include_bytes!("../fixtures/evidence-time-stamp.der");

/// RFC 3161 token over the canonical `SignatureValue`, also embedded in the signature
pub const SIGNATURE_TOKEN: &[u8] = include_bytes!("../fixtures/signature-time-stamp.der");

/// XAdES signature over `MESSAGE` as `message.xml`, signed by `SIGNER_CERTIFICATE`
pub const SIGNATURE_XML: &str = include_str!("../fixtures/signatures.xml");

pub const STEP_DIGESTS: [[u8; 4]; 3] = [[1, 1, 1, 1], [2, 2, 2, 2], [3, 3, 3, 3]];

pub fn signature_xml() -> String {
    SIGNATURE_XML.to_string()
}

pub fn hash_chain_xml(step_ids: &[&str]) -> String {
    let steps: String = step_ids
        .iter()
        .zip(STEP_DIGESTS.iter())
        .map(|(id, digest)| {
            format!(
                r#"<HashStep Id="{}"><HashValue><DigestValue>{}</DigestValue></HashValue></HashStep>"#,
                id,
                STANDARD.encode(digest)
            )
        })
        .collect();
    format!(
        r#"<HashChain xmlns="http://www.ria.ee/xsd/hashchain"><DefaultDigestMethod Algorithm="http://www.w3.org/2001/04/xmlenc#sha256"/>{}</HashChain>"#,
        steps
    )
}

pub fn hash_chain_result_xml() -> String {
    r#"<HashChainResult xmlns="http://www.ria.ee/xsd/hashchain" URI="/hashchain.xml#STEP0"><DigestMethod Algorithm="http://www.w3.org/2001/04/xmlenc#sha256"/><DigestValue>BAQEBA==</DigestValue></HashChainResult>"#
        .to_string()
}

pub fn proof(step_ids: &[&str]) -> TimestampProof {
    TimestampProof {
        time_stamp_token: STANDARD.encode(TOKEN_DER),
        hash_chain_result: hash_chain_result_xml(),
        hash_chain: hash_chain_xml(step_ids),
    }
}

pub struct FixedSnapshot {
    pub ca: Vec<Vec<u8>>,
}

impl TrustRootSnapshot for FixedSnapshot {
    fn tsa_certificates(&self) -> Result<Vec<Vec<u8>>> {
        Ok(Vec::new())
    }

    fn ca_certificates(&self) -> Result<Vec<Vec<u8>>> {
        Ok(self.ca.clone())
    }

    fn ocsp_responder_certificates(&self) -> Result<Vec<Vec<u8>>> {
        Ok(Vec::new())
    }
}

/// Snapshot holding the root that issued the signer and the TSA
pub fn trusting_signer() -> Box<FixedSnapshot> {
    Box::new(FixedSnapshot { ca: vec![CA.to_vec()] })
}
