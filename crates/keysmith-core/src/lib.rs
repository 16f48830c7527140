//! # keysmith-core
//!
//! Core library for keysmith providing:
//! - Principal canonicalization and alias ARN parsing
//! - Key template, grant and provisioning types
//! - The YAML secret store file
//! - Command defaults and validation

pub mod arn;
pub mod config;
pub mod error;
pub mod store;
pub mod types;

pub use error::{Error, Result};
pub use store::FileStore;
pub use types::{
    AggregatedGrant, GrantRecord, GrantsByAlias, Label, ProvisioningRequest, RegionKeys,
    StoredValue,
};
