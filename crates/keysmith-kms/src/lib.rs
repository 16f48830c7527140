//! AWS KMS key management for keysmith
//!
//! This crate provides:
//! - **Provisioning**: probe regions for a label's key, then create the missing
//!   regions concurrently through CloudFormation
//! - **Key template**: merge provisioned keys into the store's `_keys` entry
//! - **Grant inventory**: fold a secret's per-region grants into logical grants
//!
//! All AWS access goes through the `ClientFactory` seam; `AwsClientFactory` is
//! the real implementation.

pub mod aws;
pub mod clients;
pub mod error;
pub mod grants;
pub mod observer;
pub mod probe;
pub mod provision;
pub mod reconcile;
pub mod template;

pub use aws::AwsClientFactory;
pub use clients::{
    AliasEntry, CallerIdentity, ClientFactory, GrantEntry, IdentityService, KeyService,
    StackService, StackSpec, TemplateSource,
};
pub use error::{KmsError, RegionFailure, Result};
pub use grants::list_grants_for_secret;
pub use observer::{NoOpObserver, ProvisionObserver, TracingObserver};
pub use probe::{probe_regions, ProbeOutcome, ProbeReport, RegionProbe, RegionState};
pub use provision::{discover_or_create_keys, Principals};
pub use reconcile::reconcile_template;
pub use template::KEY_TEMPLATE;
