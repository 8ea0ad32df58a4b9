//! Container assembly command

use chainlog_asic::{AssemblerSettings, ContainerAssembler, ContainerInput, TimestampProof};
use clap::Args;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct AssembleArgs {
    /// Signed message
    #[arg(long)]
    pub message: PathBuf,

    #[arg(long)]
    pub attachment: Option<PathBuf>,

    /// Signature document covering the message
    #[arg(long)]
    pub signature: PathBuf,

    /// Base64 RFC 3161 token over the hash-tree top
    #[arg(long, requires_all = ["hash_chain", "hash_chain_result"])]
    pub time_stamp: Option<PathBuf>,

    #[arg(long, requires = "time_stamp")]
    pub hash_chain: Option<PathBuf>,

    #[arg(long, requires = "time_stamp")]
    pub hash_chain_result: Option<PathBuf>,

    /// Output directory
    #[arg(long)]
    pub out: PathBuf,
}

pub fn execute(args: AssembleArgs) -> Result<(), Box<dyn std::error::Error>> {
    let message = fs::read(&args.message)?;
    let attachment = args.attachment.as_ref().map(fs::read).transpose()?;
    let signature = fs::read_to_string(&args.signature)?;

    let proof = match (&args.time_stamp, &args.hash_chain, &args.hash_chain_result) {
        (Some(token), Some(chain), Some(result)) => Some(TimestampProof {
            time_stamp_token: fs::read_to_string(token)?,
            hash_chain_result: fs::read_to_string(result)?,
            hash_chain: fs::read_to_string(chain)?,
        }),
        _ => None,
    };

    let container = ContainerAssembler::new(AssemblerSettings::default()).assemble(&ContainerInput {
        message: &message,
        attachment: attachment.as_deref(),
        signature: &signature,
        timestamp: proof.as_ref(),
    })?;

    fs::create_dir_all(&args.out)?;
    let path = container.write_to(&args.out)?;
    println!("Container written: {}", path.display());
    Ok(())
}
