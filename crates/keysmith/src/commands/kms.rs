//! AWS KMS commands
//!
//! `kms init` provisions one key per region for a label and records the keys
//! in the store's key template. `kms grants list` shows the grants on the keys
//! protecting a secret.

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use indicatif::ProgressBar;
use keysmith_core::config::{
    parse_regions, validate_algorithm, DEFAULT_ALGORITHM, DEFAULT_LABEL, DEFAULT_REGIONS,
    KMS_KEY_MANAGER,
};
use keysmith_core::{FileStore, Label, ProvisioningRequest, RegionKeys};
use keysmith_kms::{
    discover_or_create_keys, list_grants_for_secret, reconcile_template, AwsClientFactory,
    ClientFactory, KmsError, ProvisionObserver, TracingObserver, KEY_TEMPLATE,
};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

use crate::output;
use crate::utils::{friendly_join, pluralize};

#[derive(Subcommand, Debug)]
pub enum KmsCommands {
    /// Print the AWS identity in use
    GetCallerIdentity,

    /// Provision a KMS key in each region and add them to the key template
    Init(InitArgs),

    /// Inspect KMS grants
    #[command(subcommand)]
    Grants(GrantsCommands),
}

#[derive(Subcommand, Debug)]
pub enum GrantsCommands {
    /// List the grants on the keys protecting a secret
    List(GrantsListArgs),
}

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Comma-delimited regions to provision keys in
    #[arg(long, env = "KEYSMITH_REGIONS", default_value = DEFAULT_REGIONS)]
    pub regions: String,

    /// Label for the keys; names the alias and the CloudFormation stack
    #[arg(short, long, env = "KEYSMITH_LABEL", default_value = DEFAULT_LABEL)]
    pub label: String,

    /// Provision keys in regions that lack them even if other regions already have one
    #[arg(long)]
    pub create_missing_keys: bool,

    /// Create an IAM role and instance profile allowed to use each key
    #[arg(long)]
    pub create_simple_roles: bool,

    /// Comma-delimited principals allowed to administer the keys (you are always included)
    #[arg(short = 'd', long, default_value = "")]
    pub administrators: String,

    /// Comma-delimited principals allowed to use the keys (you are always included)
    #[arg(short, long, default_value = "")]
    pub users: String,

    /// Only the key policy controls access; IAM policies in the account are ignored
    #[arg(long)]
    pub disable_iam_policies: bool,

    /// Use this CloudFormation template instead of the built-in one
    #[arg(long)]
    pub cloudformation_template_url: Option<String>,

    /// Secret store file
    #[arg(short, long, env = "KEYSMITH_FILENAME")]
    pub filename: PathBuf,

    /// Encryption algorithm recorded for the keys
    #[arg(short, long, env = "KEYSMITH_ALGORITHM", default_value = DEFAULT_ALGORITHM)]
    pub algorithm: String,
}

#[derive(Args, Debug)]
pub struct GrantsListArgs {
    /// Name of the secret to list grants for
    pub name: String,

    /// Secret store file
    #[arg(short, long, env = "KEYSMITH_FILENAME")]
    pub filename: PathBuf,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct IdentityOutput {
    account: String,
    arn: String,
}

pub async fn run(cmd: KmsCommands, quiet: bool) -> Result<()> {
    match cmd {
        KmsCommands::GetCallerIdentity => get_caller_identity().await,
        KmsCommands::Init(args) => init(args, quiet).await,
        KmsCommands::Grants(GrantsCommands::List(args)) => grants_list(args, quiet).await,
    }
}

async fn get_caller_identity() -> Result<()> {
    let factory = AwsClientFactory::new();
    let identity = factory.identity().await?.caller_identity().await?;

    print!(
        "{}",
        serde_yaml_ng::to_string(&IdentityOutput {
            account: identity.account,
            arn: identity.arn,
        })?
    );
    Ok(())
}

async fn init(args: InitArgs, quiet: bool) -> Result<()> {
    let label = Label::new(args.label.as_str())?;
    validate_algorithm(&args.algorithm)?;
    let regions = parse_regions(&args.regions);
    if regions.is_empty() {
        bail!("At least one region is required (--regions)");
    }

    let request = ProvisioningRequest {
        label,
        regions,
        administrators: args.administrators,
        users: args.users,
        create_missing_keys: args.create_missing_keys,
        create_simple_roles: args.create_simple_roles,
        disable_iam_policies: args.disable_iam_policies,
        template_url: args.cloudformation_template_url,
        algorithm: args.algorithm,
    };
    debug!("Provisioning request: {:?}", request);

    let factory = AwsClientFactory::new();
    let observer: Box<dyn ProvisionObserver> = if quiet {
        Box::new(TracingObserver)
    } else {
        Box::new(TerminalObserver)
    };

    let keys = discover_or_create_keys(&factory, &request, KEY_TEMPLATE, observer.as_ref()).await?;

    let store = FileStore::new(&args.filename);
    reconcile_template(&store, &keys, KMS_KEY_MANAGER, &request.algorithm).with_context(|| {
        format!(
            "Failed to update the key template in {}",
            args.filename.display()
        )
    })?;

    if !quiet {
        output::success(&format!(
            "The template used by {} has been updated to include {}: [{}].",
            args.filename.display(),
            pluralize("key", keys.len()),
            keys.values().cloned().collect::<Vec<_>>().join(", ")
        ));
    }
    print!("{}", keys_document(&keys)?);
    Ok(())
}

/// YAML document of region → key alias ARN, in region order
fn keys_document(keys: &RegionKeys) -> Result<String> {
    Ok(serde_yaml_ng::to_string(keys)?)
}

async fn grants_list(args: GrantsListArgs, quiet: bool) -> Result<()> {
    let store = FileStore::new(&args.filename);
    let factory = AwsClientFactory::new();

    let spinner = if quiet {
        ProgressBar::hidden()
    } else {
        output::spinner(&format!("Listing grants for '{}'...", args.name))
    };
    let grants = list_grants_for_secret(&factory, &store, &args.name).await;
    spinner.finish_and_clear();

    let grants = grants?;
    debug!("Found grants under {} aliases", grants.len());
    if !grants.is_empty() {
        print!("{}", serde_yaml_ng::to_string(&grants)?);
    }
    Ok(())
}

/// Renders provisioning progress on the terminal
struct TerminalObserver;

impl ProvisionObserver for TerminalObserver {
    fn on_probe_start(&self, regions: &[String], label: &str) {
        output::info(&format!(
            "Checking {} for the '{}' label.",
            friendly_join(regions),
            label
        ));
    }

    fn on_probe_error(&self, region: &str, error: &KmsError) {
        output::error(&format!("{}: {}", region, error));
    }

    fn on_existing_keys(&self, count: usize) {
        output::info(&format!(
            "Found {} pre-existing {}.",
            count,
            pluralize("key", count)
        ));
    }

    fn on_caller(&self, account: &str, arn: &str) {
        output::info(&format!(
            "Detected account ID #{} and that I am {}.",
            account, arn
        ));
    }

    fn on_principals(&self, administrators: &[String], users: &[String]) {
        output::info(&format!(
            "Administrative actions will be allowed by [{}]",
            administrators.join(", ")
        ));
        output::info(&format!(
            "User actions will be allowed by [{}]",
            users.join(", ")
        ));
    }

    fn on_provision_start(&self, regions: &[String]) {
        output::info(&format!(
            "{} {} need to be provisioned.",
            pluralize("Region", regions.len()),
            friendly_join(regions)
        ));
    }

    fn on_unit_started(&self, region: &str) {
        output::region(
            region,
            "Creating resources using CloudFormation. This may take a while.",
        );
    }

    fn on_unit_waiting(&self, region: &str, stack_id: &str) {
        output::region(
            region,
            &format!("Waiting for CloudFormation stack {}.", stack_id),
        );
    }

    fn on_unit_alias(&self, region: &str, alias: &str, key_arn: &str) {
        output::region(
            region,
            &format!("creating alias '{}' for key {}.", alias, key_arn),
        );
    }

    fn on_unit_finished(&self, region: &str, elapsed: Duration) {
        output::region(region, &format!("finished in {:.1?}.", elapsed));
    }

    fn on_unit_error(&self, region: &str, error: &KmsError) {
        output::error(&format!("{}: {}", region, error));
    }
}
