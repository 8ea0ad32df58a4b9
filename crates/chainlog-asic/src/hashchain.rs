//! Hash-chain documents.
//!
//! A hash chain proves that one record's digest is part of a Merkle tree
//! whose top was timestamped:
//!
//! ```xml
//! <HashChain xmlns="http://www.ria.ee/xsd/hashchain">
//!   <DefaultDigestMethod Algorithm="http://www.w3.org/2001/04/xmlenc#sha512"/>
//!   <HashStep Id="STEP1">
//!     <HashValue><DigestValue>...</DigestValue></HashValue>
//!     <StepRef URI="#STEP2"/>
//!   </HashStep>
//!   <HashStep Id="STEP2">
//!     <HashValue><DigestValue>...</DigestValue></HashValue>
//!     <DataRef URI="/message.xml"><DigestValue>...</DigestValue></DataRef>
//!   </HashStep>
//! </HashChain>
//! ```
//!
//! Each step contributes one digest, taken from its `HashValue`. A step
//! without one falls back to the digest of its `DataRef`, which otherwise
//! only marks the step covering the signed payload.

use crate::errors::{base64_error, missing_field, Result};
use crate::xml::XmlElement;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chainlog_core::errors::ChainLogError;
use chainlog_core::DigestAlgorithm;

const STEP_PREFIX: &str = "STEP";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashStep {
    pub id: String,
    pub digest: Vec<u8>,
    pub data_ref: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashChain {
    pub digest_method: DigestAlgorithm,
    pub steps: Vec<HashStep>,
}

/// Top of the hash tree as reported alongside a chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashChainResult {
    pub digest_method: Option<String>,
    pub digest: Vec<u8>,
    pub uri: Option<String>,
}

/// Does `id` have the shape `STEP<n>`
pub fn is_valid_step_id(id: &str) -> bool {
    id.strip_prefix(STEP_PREFIX)
        .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}

impl HashChain {
    /// Parse a hash-chain document
    ///
    /// # Errors
    ///
    /// `MalformedHashChain` for a step id other than `STEP<n>`, a step
    /// without a digest, or an empty chain; `MissingField` when the digest
    /// method is absent; `UnsupportedAlgorithm` for an unknown method.
    pub fn parse(xml: &str) -> Result<Self> {
        const OP: &str = "parse_hash_chain";
        let root = XmlElement::parse(xml)?;
        if root.name != "HashChain" {
            return Err(ChainLogError::MalformedHashChain {
                reason: format!("unexpected root element '{}'", root.name),
            }
            .into());
        }

        let algorithm = root
            .require_child(OP, "DefaultDigestMethod")?
            .require_attribute(OP, "Algorithm")?;
        let digest_method = DigestAlgorithm::from_uri(algorithm)?;

        let steps = root
            .children_named("HashStep")
            .map(parse_step)
            .collect::<Result<Vec<_>>>()?;
        if steps.is_empty() {
            return Err(ChainLogError::MalformedHashChain {
                reason: "hash chain has no steps".to_string(),
            }
            .into());
        }

        Ok(Self {
            digest_method,
            steps,
        })
    }
}

fn parse_step(step: &XmlElement) -> Result<HashStep> {
    const OP: &str = "parse_hash_step";
    let id = step.require_attribute(OP, "Id")?;
    if !is_valid_step_id(id) {
        return Err(ChainLogError::InvalidStepId {
            step_id: id.to_string(),
        }
        .into());
    }

    let digest_value = step
        .child("HashValue")
        .or_else(|| step.child("DataRef"))
        .and_then(|c| c.child("DigestValue"))
        .ok_or_else(|| ChainLogError::MalformedHashChain {
            reason: format!("step {} has no digest value", id),
        })?;
    let digest = STANDARD
        .decode(digest_value.text())
        .map_err(|e| base64_error(OP, "DigestValue", e))?;

    let data_ref = step
        .child("DataRef")
        .and_then(|r| r.attribute("URI"))
        .map(str::to_string);

    Ok(HashStep {
        id: id.to_string(),
        digest,
        data_ref,
    })
}

impl HashChainResult {
    /// # Errors
    ///
    /// Fails on malformed XML or a missing or undecodable digest value.
    pub fn parse(xml: &str) -> Result<Self> {
        const OP: &str = "parse_hash_chain_result";
        let root = XmlElement::parse(xml)?;
        let digest_value = root
            .child("DigestValue")
            .ok_or_else(|| missing_field(OP, "DigestValue"))?;
        Ok(Self {
            digest_method: root
                .child("DigestMethod")
                .and_then(|m| m.attribute("Algorithm"))
                .map(str::to_string),
            digest: STANDARD
                .decode(digest_value.text())
                .map_err(|e| base64_error(OP, "DigestValue", e))?,
            uri: root.attribute("URI").map(str::to_string),
        })
    }
}
