//! Well-known entry names and media types inside ASiC-E containers.

/// First entry of every container, stored uncompressed
pub const MIMETYPE_FILE_NAME: &str = "mimetype";

pub const ASIC_E_MIME_TYPE: &str = "application/vnd.etsi.asic-e+zip";

/// Signature entry name; library defaults differ, readers expect this one
pub const SIGNATURE_FILE_NAME: &str = "META-INF/signatures.xml";

pub const MANIFEST_FILE_NAME: &str = "META-INF/manifest.xml";

pub const EVIDENCE_RECORD_FILE_NAME: &str = "META-INF/evidencerecord.xml";

pub const EVIDENCE_RECORD_MANIFEST_FILE_NAME: &str = "META-INF/ASiCEvidenceRecordManifest001.xml";

pub const MESSAGE_FILE_NAME: &str = "message.xml";

pub const ATTACHMENT_FILE_NAME: &str = "attachment1";

pub const XML_MIME_TYPE: &str = "text/xml";

pub const BINARY_MIME_TYPE: &str = "application/octet-stream";

/// Container file extension for a container media type
pub fn container_extension(mime_type: &str) -> &'static str {
    match mime_type {
        "application/vnd.etsi.asic-s+zip" => "asics",
        _ => "asice",
    }
}
