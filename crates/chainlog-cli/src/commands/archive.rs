//! Archive command

use chainlog_core::encryption::{provider_from_settings, ArchiveEncryptor};
use chainlog_core::{ArchiveRecord, ArchiverSettings, ClientId};
use chainlog_store::{FsArchiveBase, GpgEncryptor, LogArchiveWriter};
use chrono::{DateTime, Utc};
use clap::Args;
use std::path::PathBuf;
use std::rc::Rc;

const CONTAINER_EXTENSION: &str = "asice";
const RESPONSE_SUFFIX: &str = "-response";
const REQUEST_SUFFIX: &str = "-request";

#[derive(Debug, Args)]
pub struct ArchiveArgs {
    /// Archiver settings (TOML)
    #[arg(long)]
    pub config: PathBuf,

    /// Directory of `*.asice` record containers
    #[arg(long)]
    pub input: PathBuf,

    /// Client the records belong to (INSTANCE/CLASS/CODE[/SUBSYSTEM])
    #[arg(long)]
    pub client: String,

    /// Where chain tails are kept; defaults to `<archive_path>/.chainlog`
    #[arg(long)]
    pub state: Option<PathBuf>,
}

pub fn execute(args: ArchiveArgs) -> Result<(), Box<dyn std::error::Error>> {
    let settings = ArchiverSettings::from_file(&args.config)?;
    let client: ClientId = args.client.parse()?;

    let provider = provider_from_settings(&settings.encryption)?;
    let encryptor: Option<Rc<dyn ArchiveEncryptor>> = if provider.is_enabled() {
        Some(Rc::new(GpgEncryptor::new()))
    } else {
        None
    };
    let state = args
        .state
        .unwrap_or_else(|| settings.archive_path.join(".chainlog"));
    let mut writer = LogArchiveWriter::new(&settings, provider, encryptor, FsArchiveBase::new(state));

    let mut inputs: Vec<PathBuf> = std::fs::read_dir(&args.input)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<_, _>>()?;
    inputs.retain(|p| p.extension().is_some_and(|ext| ext == CONTAINER_EXTENSION));
    inputs.sort();

    let mut sealed = 0;
    for (id, path) in inputs.iter().enumerate() {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let (query_id, response) = match stem.strip_suffix(RESPONSE_SUFFIX) {
            Some(query_id) => (query_id.to_string(), true),
            None => (stem.strip_suffix(REQUEST_SUFFIX).unwrap_or(&stem).to_string(), false),
        };
        let time: DateTime<Utc> = std::fs::metadata(path)?.modified()?.into();
        let record = ArchiveRecord::new(
            id as u64,
            query_id,
            response,
            time,
            client.clone(),
            std::fs::read(path)?,
        );
        if writer.write(&record)? {
            sealed += 1;
        }
    }
    if let Some(path) = writer.close()? {
        sealed += 1;
        println!("Last archive: {}", path.display());
    }

    println!("Archived {} records into {} archives", inputs.len(), sealed);
    Ok(())
}
