//! Keysmith CLI - multi-region AWS KMS keys for a file-based secret store
//!
//! This is the main entry point for the keysmith command-line interface.

mod cli;
mod commands;
mod output;
mod utils;

use clap::Parser;
use keysmith_kms::KmsError;
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.quiet);

    let result = match cli.command {
        Commands::Kms(cmd) => commands::kms::run(cmd, cli.quiet).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            output::error(&format!("{:#}", err));
            if let Some(hint) = hint_for(&err) {
                output::hint(hint);
            }
            ExitCode::FAILURE
        }
    }
}

/// Initialize tracing with appropriate verbosity.
///
/// Logs go to stderr; progress lines are printed separately, so the default
/// level only shows warnings.
fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Advice for AWS error codes with a well-known fix
fn hint_for(err: &anyhow::Error) -> Option<&'static str> {
    let code = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<KmsError>())
        .and_then(KmsError::code)?;

    match code {
        "MissingRegion" => Some("Check or set the AWS_REGION environment variable."),
        "ExpiredToken" | "ExpiredTokenException" => Some("Refresh your credentials."),
        "InvalidCiphertextException" => Some("key_ciphertext may be corrupted."),
        _ => None,
    }
}
