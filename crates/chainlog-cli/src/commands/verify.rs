//! Container verification command

use chainlog_asic::{ContainerVerifier, DirectoryTrustSnapshot, ValidationLevel, ValidationPolicy};
use clap::{Args, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LevelArg {
    Basic,
    LongTerm,
    Archival,
}

impl From<LevelArg> for ValidationLevel {
    fn from(level: LevelArg) -> Self {
        match level {
            LevelArg::Basic => ValidationLevel::BasicSignatures,
            LevelArg::LongTerm => ValidationLevel::LongTermData,
            LevelArg::Archival => ValidationLevel::ArchivalData,
        }
    }
}

#[derive(Debug, Args)]
pub struct VerifyArgs {
    #[arg(long)]
    pub container: PathBuf,

    /// Trust-root snapshot directory with `tsa/`, `ca/` and `ocsp/`
    #[arg(long)]
    pub trust: PathBuf,

    #[arg(long, value_enum, default_value = "archival")]
    pub level: LevelArg,
}

pub fn execute(args: VerifyArgs) -> Result<(), Box<dyn std::error::Error>> {
    let policy = ValidationPolicy {
        level: args.level.into(),
        ..ValidationPolicy::default()
    };
    let verifier = ContainerVerifier::with_policy(Box::new(DirectoryTrustSnapshot::new(args.trust)), policy);
    let report = verifier.verify(&args.container)?;

    println!("Container: {}", report.container);
    println!("Level: {:?}", report.level);
    println!("Signed documents: {}", report.signed_documents.join(", "));
    println!("Signing certificate: {}", report.signing_certificate);
    println!(
        "Evidence record: {}",
        if report.evidence_record_verified { "verified" } else { "absent" }
    );
    println!("Time stamp tokens: {}", report.time_stamp_tokens.len());
    Ok(())
}
