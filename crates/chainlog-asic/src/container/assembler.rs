//! ASiC-E container assembly.
//!
//! Layout, in write order:
//!
//! ```text
//! mimetype                                  stored, first
//! message.xml                               signed document
//! attachment1                               signed document, optional
//! META-INF/signatures.xml                   signature document
//! META-INF/manifest.xml                     ODF manifest of signed documents
//! META-INF/evidencerecord.xml               with a timestamp proof
//! META-INF/ASiCEvidenceRecordManifest001.xml
//! ```

use crate::errors::{io_error, zip_error, Result};
use crate::evidence::marshal::XmlOut;
use crate::evidence::{EvidenceBundle, HashChainToEvidenceRecordTransformer, TimestampProof};
use crate::file_names::{
    container_extension, ASIC_E_MIME_TYPE, ATTACHMENT_FILE_NAME, BINARY_MIME_TYPE,
    MANIFEST_FILE_NAME, MESSAGE_FILE_NAME, MIMETYPE_FILE_NAME, SIGNATURE_FILE_NAME, XML_MIME_TYPE,
};
use chainlog_core::{log_op_end, log_op_error, log_op_start};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

const ODF_MANIFEST_NAMESPACE: &str = "urn:oasis:names:tc:opendocument:xmlns:manifest:1.0";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblerSettings {
    /// Entry name forced onto the signature document
    pub signature_file_name: String,
    pub message_file_name: String,
    pub attachment_file_name: String,
    pub signing_operation: String,
    pub signature_level: String,
    pub container_mime_type: String,
}

impl Default for AssemblerSettings {
    fn default() -> Self {
        Self {
            signature_file_name: SIGNATURE_FILE_NAME.to_string(),
            message_file_name: MESSAGE_FILE_NAME.to_string(),
            attachment_file_name: ATTACHMENT_FILE_NAME.to_string(),
            signing_operation: "signed".to_string(),
            signature_level: "XAdES_BASELINE_LT".to_string(),
            container_mime_type: ASIC_E_MIME_TYPE.to_string(),
        }
    }
}

impl AssemblerSettings {
    /// `container-<operation>-<level>.<asice|asics>`, lower case
    pub fn container_name(&self) -> String {
        let part = |value: &str| value.trim().to_ascii_lowercase().replace(['_', ' '], "-");
        format!(
            "container-{}-{}.{}",
            part(&self.signing_operation),
            part(&self.signature_level),
            container_extension(&self.container_mime_type)
        )
    }
}

/// What goes into one container
#[derive(Debug, Clone, Copy)]
pub struct ContainerInput<'a> {
    pub message: &'a [u8],
    pub attachment: Option<&'a [u8]>,
    pub signature: &'a str,
    pub timestamp: Option<&'a TimestampProof>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledContainer {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl AssembledContainer {
    /// Write the container into `dir` under its name
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be written.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(&self.name);
        std::fs::write(&path, &self.bytes).map_err(|e| io_error("write_container", e))?;
        Ok(path)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ContainerAssembler {
    settings: AssemblerSettings,
}

impl ContainerAssembler {
    pub fn new(settings: AssemblerSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &AssemblerSettings {
        &self.settings
    }

    /// Package `input` into an ASiC-E container
    ///
    /// # Errors
    ///
    /// Fails when the evidence record cannot be built or the zip cannot
    /// be written. Nothing is returned on failure.
    pub fn assemble(&self, input: &ContainerInput<'_>) -> Result<AssembledContainer> {
        let start = Instant::now();
        log_op_start!("assemble_container", with_evidence = input.timestamp.is_some());

        match self.build(input) {
            Ok(container) => {
                log_op_end!(
                    "assemble_container",
                    duration_ms = start.elapsed().as_millis() as u64,
                    container = container.name.as_str(),
                    size = container.bytes.len()
                );
                Ok(container)
            }
            Err(err) => {
                log_op_error!("assemble_container", err, duration_ms = start.elapsed().as_millis() as u64);
                Err(err)
            }
        }
    }

    fn build(&self, input: &ContainerInput<'_>) -> Result<AssembledContainer> {
        let evidence: Option<EvidenceBundle> = input
            .timestamp
            .map(|proof| {
                HashChainToEvidenceRecordTransformer::new(self.settings.signature_file_name.as_str())
                    .transform(proof, input.signature)
            })
            .transpose()?;

        let mut signed = vec![(self.settings.message_file_name.as_str(), input.message, XML_MIME_TYPE)];
        if let Some(attachment) = input.attachment {
            signed.push((self.settings.attachment_file_name.as_str(), attachment, BINARY_MIME_TYPE));
        }
        let manifest = self.odf_manifest(&signed)?;

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let stored = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Stored)
            .last_modified_time(zip::DateTime::default());
        let deflated = stored.compression_method(CompressionMethod::Deflated);

        write_entry(&mut zip, MIMETYPE_FILE_NAME, self.settings.container_mime_type.as_bytes(), stored)?;
        for (name, content, _) in &signed {
            write_entry(&mut zip, name, content, deflated)?;
        }
        write_entry(&mut zip, &self.settings.signature_file_name, input.signature.as_bytes(), deflated)?;
        write_entry(&mut zip, MANIFEST_FILE_NAME, &manifest, deflated)?;
        if let Some(evidence) = &evidence {
            for (name, content) in evidence.entries() {
                write_entry(&mut zip, name, content, deflated)?;
            }
        }

        let bytes = zip
            .finish()
            .map_err(|e| zip_error("finish_container", e))?
            .into_inner();
        Ok(AssembledContainer {
            name: self.settings.container_name(),
            bytes,
        })
    }

    fn odf_manifest(&self, signed: &[(&str, &[u8], &str)]) -> Result<Vec<u8>> {
        let mut out = XmlOut::new("marshal_odf_manifest")?;
        out.start(
            "manifest:manifest",
            &[("xmlns:manifest", ODF_MANIFEST_NAMESPACE), ("manifest:version", "1.2")],
        )?;
        out.empty(
            "manifest:file-entry",
            &[
                ("manifest:full-path", "/"),
                ("manifest:media-type", self.settings.container_mime_type.as_str()),
            ],
        )?;
        for (name, _, mime_type) in signed {
            out.empty(
                "manifest:file-entry",
                &[("manifest:full-path", *name), ("manifest:media-type", *mime_type)],
            )?;
        }
        out.end("manifest:manifest")?;
        Ok(out.finish())
    }
}

fn write_entry(
    zip: &mut ZipWriter<Cursor<Vec<u8>>>,
    name: &str,
    content: &[u8],
    options: SimpleFileOptions,
) -> Result<()> {
    zip.start_file(name, options)
        .map_err(|e| zip_error("write_container_entry", e))?;
    zip.write_all(content)
        .map_err(|e| io_error("write_container_entry", e))
}
