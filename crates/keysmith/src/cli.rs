//! CLI argument parsing with clap

use clap::{Parser, Subcommand};

pub use crate::commands::kms::KmsCommands;

/// Keysmith - multi-region AWS KMS keys for a file-based secret store
#[derive(Parser, Debug)]
#[command(name = "keysmith")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress progress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// AWS KMS operations
    #[command(subcommand)]
    Kms(KmsCommands),
}
