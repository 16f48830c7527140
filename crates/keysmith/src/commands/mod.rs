//! CLI command implementations

pub mod kms;
