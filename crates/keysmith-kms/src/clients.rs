//! Remote service seams
//!
//! Every AWS call the orchestration makes goes through these traits. A
//! `ClientFactory` hands out clients bound to one region, so nothing relies on
//! process-wide session state.

use crate::error::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Stack creation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackSpec {
    pub stack_name: String,
    pub parameters: BTreeMap<String, String>,
    pub template: TemplateSource,
}

/// Where CloudFormation reads the template from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSource {
    Body(String),
    Url(String),
}

/// An alias record from ListAliases
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasEntry {
    pub alias_name: String,
    pub alias_arn: String,
    pub target_key_id: Option<String>,
}

/// A grant record from ListGrants
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantEntry {
    pub name: Option<String>,
    pub grant_id: String,
    pub grantee_principal: String,
    pub retiring_principal: Option<String>,
    pub encryption_context_subset: Option<BTreeMap<String, String>>,
    pub operations: Vec<String>,
}

/// Identity of the credentials in use
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub account: String,
    pub arn: String,
}

/// CloudFormation operations in one region
#[async_trait]
pub trait StackService: Send + Sync {
    /// Describe a stack by name or ID and return its outputs.
    ///
    /// A stack that does not exist surfaces as the service's own error.
    async fn describe_stack(&self, stack: &str) -> Result<BTreeMap<String, String>>;

    /// Submit a stack and return its ID
    async fn create_stack(&self, spec: &StackSpec) -> Result<String>;

    /// Block until the stack reaches CREATE_COMPLETE
    async fn wait_for_create_complete(&self, stack_id: &str) -> Result<()>;
}

/// KMS operations in one region
#[async_trait]
pub trait KeyService: Send + Sync {
    /// Every alias in the region, across all pages
    async fn list_aliases(&self) -> Result<Vec<AliasEntry>>;

    /// Whether the key is enabled
    async fn key_enabled(&self, key_id: &str) -> Result<bool>;

    async fn create_alias(&self, alias_name: &str, target_key_id: &str) -> Result<()>;

    /// Every grant on the key, across all pages
    async fn list_grants(&self, key_id: &str) -> Result<Vec<GrantEntry>>;

    /// Look up one alias by name
    async fn find_alias(&self, alias_name: &str) -> Result<Option<AliasEntry>> {
        Ok(self
            .list_aliases()
            .await?
            .into_iter()
            .find(|alias| alias.alias_name == alias_name))
    }
}

/// STS operations
#[async_trait]
pub trait IdentityService: Send + Sync {
    async fn caller_identity(&self) -> Result<CallerIdentity>;
}

/// Builds region-bound clients on demand
#[async_trait]
pub trait ClientFactory: Send + Sync {
    async fn stacks(&self, region: &str) -> Result<Arc<dyn StackService>>;

    async fn keys(&self, region: &str) -> Result<Arc<dyn KeyService>>;

    /// Identity client using the default region resolution
    async fn identity(&self) -> Result<Arc<dyn IdentityService>>;
}
