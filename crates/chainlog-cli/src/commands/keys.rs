//! Encryption key diagnostics

use chainlog_core::encryption::{EncryptionConfigProvider, KeyMapping, MemberEncryptionConfigProvider};
use chainlog_core::ClientId;
use clap::Args;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct KeysArgs {
    /// Member key mapping file
    #[arg(long)]
    pub mapping: PathBuf,

    /// Key used for members without a mapping
    #[arg(long)]
    pub default_key: Option<String>,

    /// Key store shown in the report
    #[arg(long)]
    pub key_store: Option<PathBuf>,

    /// Member to resolve keys for; repeatable
    #[arg(long = "member", required = true)]
    pub members: Vec<String>,
}

pub fn execute(args: KeysArgs) -> Result<(), Box<dyn std::error::Error>> {
    let members = args
        .members
        .iter()
        .map(|m| m.parse::<ClientId>())
        .collect::<Result<Vec<_>, _>>()?;

    let provider = MemberEncryptionConfigProvider::new(
        KeyMapping::load(&args.mapping)?,
        args.default_key,
        args.key_store,
    );
    let config = provider.for_diagnostics(&members);

    println!("{}", serde_json::to_string_pretty(config.members())?);
    Ok(())
}
