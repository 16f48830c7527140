//! Shared data types for key provisioning and grant inventory

use crate::config::NAME_PREFIX;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Region → key identifier, ordered by region for deterministic output
pub type RegionKeys = BTreeMap<String, String>;

/// User-chosen tag naming a logical key group.
///
/// The same label maps to one alias and one stack name in every region.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Label(String);

impl Label {
    /// Validate and wrap a label
    pub fn new(label: impl Into<String>) -> Result<Self> {
        let label = label.into();
        if label.is_empty() {
            return Err(Error::invalid_label(label, "label must not be empty"));
        }
        if let Some(c) = label
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        {
            return Err(Error::invalid_label(
                label.clone(),
                format!("character '{}' is not allowed (use letters, digits, '-' or '_')", c),
            ));
        }
        Ok(Self(label))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// KMS alias name, e.g. `alias/keysmith-default`
    pub fn alias_name(&self) -> String {
        format!("alias/{}{}", NAME_PREFIX, self.0)
    }

    /// CloudFormation stack name, e.g. `keysmith-default`
    pub fn stack_name(&self) -> String {
        format!("{}{}", NAME_PREFIX, self.0)
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One record stored under a name in the secret store.
///
/// Key template entries carry only the key fields; secret values also carry
/// the wrapped data key and ciphertext, which keysmith never inspects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredValue {
    pub key_id: String,
    pub key_manager: String,
    pub algorithm: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub key_ciphertext: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ciphertext: String,
}

impl StoredValue {
    /// A key template entry
    pub fn template_entry(
        key_id: impl Into<String>,
        key_manager: impl Into<String>,
        algorithm: impl Into<String>,
    ) -> Self {
        Self {
            key_id: key_id.into(),
            key_manager: key_manager.into(),
            algorithm: algorithm.into(),
            key_ciphertext: String::new(),
            ciphertext: String::new(),
        }
    }

    /// Composite identity used for de-duplication in the key template
    pub fn template_key(&self) -> String {
        format!("{}{}", self.key_manager, self.key_id)
    }
}

/// Keep only values owned by one key manager
pub fn filter_by_key_manager(values: Vec<StoredValue>, key_manager: &str) -> Vec<StoredValue> {
    values
        .into_iter()
        .filter(|v| v.key_manager == key_manager)
        .collect()
}

/// Everything `kms init` needs, fixed for the lifetime of one invocation
#[derive(Debug, Clone)]
pub struct ProvisioningRequest {
    pub label: Label,
    pub regions: Vec<String>,
    /// Comma-delimited administrator principals as typed by the user
    pub administrators: String,
    /// Comma-delimited user principals as typed by the user
    pub users: String,
    pub create_missing_keys: bool,
    pub create_simple_roles: bool,
    pub disable_iam_policies: bool,
    pub template_url: Option<String>,
    pub algorithm: String,
}

impl ProvisioningRequest {
    /// Target regions sorted for display
    pub fn sorted_regions(&self) -> Vec<String> {
        let mut regions = self.regions.clone();
        regions.sort();
        regions
    }
}

/// A grant as returned by one region, before aggregation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantRecord {
    /// Grants created by AWS services often carry no name
    pub name: Option<String>,
    pub grantee_principal: String,
    pub retiring_principal: Option<String>,
    pub encryption_context_subset: Option<BTreeMap<String, String>>,
    pub operations: Vec<String>,
    pub grant_id: String,
    pub region: String,
}

impl GrantRecord {
    /// Key under which this record is folded across regions.
    ///
    /// Named grants share a key by name. A nameless grant is keyed by its own
    /// grant ID so it never merges with another grant.
    pub fn fold_key(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => self.grant_id.clone(),
        }
    }
}

/// One logical grant folded across every region of an alias
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AggregatedGrant {
    pub grantee_principal: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retiring_principal: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encryption_context_subset: Option<BTreeMap<String, String>>,
    pub operations: Vec<String>,
    pub grant_ids: BTreeMap<String, String>,
}

impl AggregatedGrant {
    /// Seed an aggregate from the first record seen for a grant name
    pub fn seed(record: &GrantRecord) -> Self {
        let mut grant_ids = BTreeMap::new();
        grant_ids.insert(record.region.clone(), record.grant_id.clone());
        Self {
            grantee_principal: record.grantee_principal.clone(),
            retiring_principal: record.retiring_principal.clone(),
            encryption_context_subset: record.encryption_context_subset.clone(),
            operations: record.operations.clone(),
            grant_ids,
        }
    }

    /// True when a later record describes the same permission as the seed
    pub fn agrees_with(&self, record: &GrantRecord) -> bool {
        self.grantee_principal == record.grantee_principal
            && self.retiring_principal == record.retiring_principal
            && self.encryption_context_subset == record.encryption_context_subset
            && self.operations == record.operations
    }
}

/// Alias name → grant name → aggregated grant
pub type GrantsByAlias = BTreeMap<String, BTreeMap<String, AggregatedGrant>>;
