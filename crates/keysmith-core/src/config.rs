//! Defaults and validation for command settings
//!
//! Every value here can be overridden from the command line or the
//! environment (`KEYSMITH_*`); these are the fallbacks.

use crate::error::{Error, Result};

/// Regions used when none are requested
pub const DEFAULT_REGIONS: &str = "us-east-1,us-west-1,us-west-2";

/// Label used when none is requested
pub const DEFAULT_LABEL: &str = "default";

/// Algorithm recorded in the key template when none is requested
pub const DEFAULT_ALGORITHM: &str = "aesgcm256";

/// Envelope algorithms a template entry may name
pub const ALGORITHMS: &[&str] = &["aesgcm256", "secretbox", "none"];

/// Key manager label for AWS KMS entries
pub const KMS_KEY_MANAGER: &str = "kms";

/// Store name under which the key template lives
pub const KEY_TEMPLATE_NAME: &str = "_keys";

/// Prefix shared by stack and alias names
pub const NAME_PREFIX: &str = "keysmith-";

/// Check that an algorithm is one we know how to record
pub fn validate_algorithm(algorithm: &str) -> Result<()> {
    if ALGORITHMS.contains(&algorithm) {
        Ok(())
    } else {
        Err(Error::InvalidAlgorithm {
            algorithm: algorithm.to_string(),
            valid: ALGORITHMS.join(", "),
        })
    }
}

/// Split a comma-delimited region list, dropping blanks and duplicates.
///
/// Order is preserved from the input; callers sort for display.
pub fn parse_regions(raw: &str) -> Vec<String> {
    let mut regions: Vec<String> = Vec::new();
    for region in raw.split(',').map(str::trim).filter(|r| !r.is_empty()) {
        if !regions.iter().any(|r| r == region) {
            regions.push(region.to_string());
        }
    }
    regions
}
