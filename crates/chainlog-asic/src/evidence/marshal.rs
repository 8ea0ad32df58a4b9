//! XML (un)marshalling of evidence records and ASiC manifests.

use super::model::{
    ArchiveTimeStamp, ArchiveTimeStampChain, AsicManifest, DataObjectReference, EvidenceRecord,
    HashTreeSequence, SigReference, TimeStampToken,
};
use crate::errors::{base64_error, missing_field, xml_error, Result};
use crate::xml::XmlElement;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

pub const ERS_NAMESPACE: &str = "urn:ietf:params:xml:ns:ers";
pub const ASIC_NAMESPACE: &str = "http://uri.etsi.org/02918/v1.2.1#";
pub const XMLDSIG_NAMESPACE: &str = "http://www.w3.org/2000/09/xmldsig#";

/// Element-at-a-time writer; one per document
pub(crate) struct XmlOut {
    writer: Writer<Vec<u8>>,
    op: &'static str,
}

impl XmlOut {
    pub(crate) fn new(op: &'static str) -> Result<Self> {
        let mut out = Self {
            writer: Writer::new_with_indent(Vec::new(), b' ', 2),
            op,
        };
        out.event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
        Ok(out)
    }

    fn event(&mut self, event: Event<'_>) -> Result<()> {
        self.writer
            .write_event(event)
            .map_err(|e| xml_error(self.op, e))
    }

    fn element<'a>(name: &'a str, attributes: &[(&'a str, &'a str)]) -> BytesStart<'a> {
        let mut start = BytesStart::new(name);
        for attribute in attributes {
            start.push_attribute(*attribute);
        }
        start
    }

    pub(crate) fn start(&mut self, name: &str, attributes: &[(&str, &str)]) -> Result<()> {
        self.event(Event::Start(Self::element(name, attributes)))
    }

    pub(crate) fn end(&mut self, name: &str) -> Result<()> {
        self.event(Event::End(BytesEnd::new(name)))
    }

    pub(crate) fn empty(&mut self, name: &str, attributes: &[(&str, &str)]) -> Result<()> {
        self.event(Event::Empty(Self::element(name, attributes)))
    }

    pub(crate) fn text_element(&mut self, name: &str, attributes: &[(&str, &str)], text: &str) -> Result<()> {
        self.start(name, attributes)?;
        self.event(Event::Text(BytesText::new(text)))?;
        self.end(name)
    }

    pub(crate) fn finish(self) -> Vec<u8> {
        self.writer.into_inner()
    }
}

/// Serialize an evidence record
///
/// # Errors
///
/// Fails when the XML writer fails.
pub fn evidence_record_to_xml(record: &EvidenceRecord) -> Result<Vec<u8>> {
    let mut out = XmlOut::new("marshal_evidence_record")?;
    out.start(
        "EvidenceRecord",
        &[("xmlns", ERS_NAMESPACE), ("Version", record.version.as_str())],
    )?;
    out.start("ArchiveTimeStampSequence", &[])?;
    for chain in &record.chains {
        let order = chain.order.to_string();
        out.start("ArchiveTimeStampChain", &[("Order", order.as_str())])?;
        out.empty("DigestMethod", &[("Algorithm", chain.digest_method.as_str())])?;
        out.empty(
            "CanonicalizationMethod",
            &[("Algorithm", chain.canonicalization_method.as_str())],
        )?;
        for time_stamp in &chain.time_stamps {
            let order = time_stamp.order.to_string();
            out.start("ArchiveTimeStamp", &[("Order", order.as_str())])?;
            out.start("HashTree", &[])?;
            for sequence in &time_stamp.hash_tree {
                let order = sequence.order.to_string();
                out.start("Sequence", &[("Order", order.as_str())])?;
                for value in &sequence.digest_values {
                    out.text_element("DigestValue", &[], &STANDARD.encode(value))?;
                }
                out.end("Sequence")?;
            }
            out.end("HashTree")?;
            out.start("TimeStamp", &[])?;
            out.text_element(
                "TimeStampToken",
                &[("Type", time_stamp.token.token_type.as_str())],
                &STANDARD.encode(&time_stamp.token.der),
            )?;
            out.end("TimeStamp")?;
            out.end("ArchiveTimeStamp")?;
        }
        out.end("ArchiveTimeStampChain")?;
    }
    out.end("ArchiveTimeStampSequence")?;
    out.end("EvidenceRecord")?;
    Ok(out.finish())
}

/// Serialize an ASiC evidence-record manifest
///
/// # Errors
///
/// Fails when the XML writer fails.
pub fn manifest_to_xml(manifest: &AsicManifest) -> Result<Vec<u8>> {
    let mut out = XmlOut::new("marshal_asic_manifest")?;
    out.start(
        "asic:ASiCManifest",
        &[("xmlns:asic", ASIC_NAMESPACE), ("xmlns:ds", XMLDSIG_NAMESPACE)],
    )?;
    out.empty(
        "asic:SigReference",
        &[
            ("URI", manifest.sig_reference.uri.as_str()),
            ("MimeType", manifest.sig_reference.mime_type.as_str()),
        ],
    )?;
    for reference in &manifest.data_objects {
        out.start(
            "asic:DataObjectReference",
            &[
                ("URI", reference.uri.as_str()),
                ("MimeType", reference.mime_type.as_str()),
            ],
        )?;
        out.empty("ds:DigestMethod", &[("Algorithm", reference.digest_method.as_str())])?;
        out.text_element("ds:DigestValue", &[], &STANDARD.encode(&reference.digest_value))?;
        out.end("asic:DataObjectReference")?;
    }
    out.end("asic:ASiCManifest")?;
    Ok(out.finish())
}

fn order_of(op: &str, element: &XmlElement) -> Result<u32> {
    let order = element.require_attribute(op, "Order")?;
    order
        .parse()
        .map_err(|_| xml_error(op, format!("invalid Order '{}'", order)))
}

fn algorithm_of(op: &str, parent: &XmlElement, name: &str) -> Result<String> {
    Ok(parent
        .require_child(op, name)?
        .require_attribute(op, "Algorithm")?
        .to_string())
}

/// Read an evidence record
///
/// # Errors
///
/// Fails on malformed XML, missing elements or invalid base64.
pub fn evidence_record_from_xml(xml: &str) -> Result<EvidenceRecord> {
    const OP: &str = "unmarshal_evidence_record";
    let root = XmlElement::parse(xml)?;
    if root.name != "EvidenceRecord" {
        return Err(missing_field(OP, "EvidenceRecord"));
    }
    let sequence = root.require_child(OP, "ArchiveTimeStampSequence")?;

    let mut chains = Vec::new();
    for chain in sequence.children_named("ArchiveTimeStampChain") {
        let mut time_stamps = Vec::new();
        for time_stamp in chain.children_named("ArchiveTimeStamp") {
            let mut hash_tree = Vec::new();
            if let Some(tree) = time_stamp.child("HashTree") {
                for sequence in tree.children_named("Sequence") {
                    let digest_values = sequence
                        .children_named("DigestValue")
                        .map(|v| {
                            STANDARD
                                .decode(v.text())
                                .map_err(|e| base64_error(OP, "DigestValue", e))
                        })
                        .collect::<Result<Vec<_>>>()?;
                    hash_tree.push(HashTreeSequence {
                        order: order_of(OP, sequence)?,
                        digest_values,
                    });
                }
            }

            let token = time_stamp
                .require_child(OP, "TimeStamp")?
                .require_child(OP, "TimeStampToken")?;
            time_stamps.push(ArchiveTimeStamp {
                order: order_of(OP, time_stamp)?,
                hash_tree,
                token: TimeStampToken {
                    token_type: token.require_attribute(OP, "Type")?.to_string(),
                    der: STANDARD
                        .decode(token.text())
                        .map_err(|e| base64_error(OP, "TimeStampToken", e))?,
                },
            });
        }

        chains.push(ArchiveTimeStampChain {
            order: order_of(OP, chain)?,
            digest_method: algorithm_of(OP, chain, "DigestMethod")?,
            canonicalization_method: algorithm_of(OP, chain, "CanonicalizationMethod")?,
            time_stamps,
        });
    }

    Ok(EvidenceRecord {
        version: root.require_attribute(OP, "Version")?.to_string(),
        chains,
    })
}

/// Read an ASiC manifest
///
/// # Errors
///
/// Fails on malformed XML, missing elements or invalid base64.
pub fn manifest_from_xml(xml: &str) -> Result<AsicManifest> {
    const OP: &str = "unmarshal_asic_manifest";
    let root = XmlElement::parse(xml)?;
    if root.name != "ASiCManifest" {
        return Err(missing_field(OP, "ASiCManifest"));
    }

    let sig_reference = root.require_child(OP, "SigReference")?;
    let data_objects = root
        .children_named("DataObjectReference")
        .map(|reference| {
            Ok(DataObjectReference {
                uri: reference.require_attribute(OP, "URI")?.to_string(),
                mime_type: reference.attribute("MimeType").unwrap_or_default().to_string(),
                digest_method: algorithm_of(OP, reference, "DigestMethod")?,
                digest_value: STANDARD
                    .decode(reference.require_child(OP, "DigestValue")?.text())
                    .map_err(|e| base64_error(OP, "DigestValue", e))?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(AsicManifest {
        sig_reference: SigReference {
            uri: sig_reference.require_attribute(OP, "URI")?.to_string(),
            mime_type: sig_reference.attribute("MimeType").unwrap_or_default().to_string(),
        },
        data_objects,
    })
}
