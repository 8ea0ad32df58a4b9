//! chainlog CLI
//!
//! Command-line interface for archiving message logs and handling their
//! long-term evidence containers

use chainlog_core::logging_facility::{self, Profile};
use chainlog_core::{log_op_end, log_op_start};
use chainlog_core_types::schema::EVENT_END_ERROR;
use clap::{Parser, Subcommand, ValueEnum};
use std::time::Instant;

mod commands;

#[derive(Debug, Parser)]
#[command(name = "chainlog")]
#[command(about = "chainlog - chain-linked message log archiver", long_about = None)]
struct Cli {
    /// Emit logs to stdout in this format
    #[arg(long, global = true, value_enum)]
    log: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Archive a directory of signed record containers
    Archive(commands::archive::ArchiveArgs),
    /// Show which keys members' archives are encrypted for
    Keys(commands::keys::KeysArgs),
    /// Package a signed message into an ASiC-E container
    Assemble(commands::assemble::AssembleArgs),
    /// Verify an ASiC-E container against a trust-root snapshot
    Verify(commands::verify::VerifyArgs),
}

impl Commands {
    fn op(&self) -> &'static str {
        match self {
            Commands::Archive(_) => "cli_archive",
            Commands::Keys(_) => "cli_keys",
            Commands::Assemble(_) => "cli_assemble",
            Commands::Verify(_) => "cli_verify",
        }
    }
}

fn main() {
    let cli = Cli::parse();

    match cli.log {
        Some(LogFormat::Pretty) => logging_facility::init(Profile::Development),
        Some(LogFormat::Json) => logging_facility::init(Profile::Production),
        None => {}
    }

    let op = cli.command.op();
    let start = Instant::now();
    log_op_start!(op);

    let result = match cli.command {
        Commands::Archive(args) => commands::archive::execute(args),
        Commands::Keys(args) => commands::keys::execute(args),
        Commands::Assemble(args) => commands::assemble::execute(args),
        Commands::Verify(args) => commands::verify::execute(args),
    };

    let duration_ms = start.elapsed().as_millis() as u64;
    match result {
        Ok(()) => log_op_end!(op, duration_ms = duration_ms),
        Err(e) => {
            tracing::error!(op, event = EVENT_END_ERROR, duration_ms, error = %e);
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
