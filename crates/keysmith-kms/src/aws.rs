//! AWS SDK implementations of the client seams
//!
//! Credentials come from the standard provider chain (environment, shared
//! config, instance roles). Every client is built for an explicit region.

use crate::clients::{
    AliasEntry, CallerIdentity, ClientFactory, GrantEntry, IdentityService, KeyService,
    StackService, StackSpec, TemplateSource,
};
use crate::error::{KmsError, Result};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_cloudformation::client::Waiters;
use aws_sdk_cloudformation::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_cloudformation::types::{Capability, OnFailure, Parameter};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// CloudFormation's own give-up window for stack creation
const STACK_CREATE_MAX_WAIT: Duration = Duration::from_secs(60 * 60);

/// Factory producing real AWS clients
#[derive(Debug, Clone, Default)]
pub struct AwsClientFactory;

impl AwsClientFactory {
    pub fn new() -> Self {
        Self
    }

    async fn load_config(region: Option<&str>) -> SdkConfig {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(Region::new(region.to_string()));
        }
        loader.load().await
    }
}

#[async_trait]
impl ClientFactory for AwsClientFactory {
    async fn stacks(&self, region: &str) -> Result<Arc<dyn StackService>> {
        let config = Self::load_config(Some(region)).await;
        Ok(Arc::new(AwsStacks {
            client: aws_sdk_cloudformation::Client::new(&config),
            region: region.to_string(),
        }))
    }

    async fn keys(&self, region: &str) -> Result<Arc<dyn KeyService>> {
        let config = Self::load_config(Some(region)).await;
        Ok(Arc::new(AwsKeys {
            client: aws_sdk_kms::Client::new(&config),
            region: region.to_string(),
        }))
    }

    async fn identity(&self) -> Result<Arc<dyn IdentityService>> {
        let config = Self::load_config(None).await;
        if config.region().is_none() {
            return Err(KmsError::MissingRegion);
        }
        Ok(Arc::new(AwsIdentity {
            client: aws_sdk_sts::Client::new(&config),
        }))
    }
}

/// Convert an SDK error into a `KmsError::Remote`, keeping the AWS error code
fn sdk_error<E>(operation: &str, err: E) -> KmsError
where
    E: ProvideErrorMetadata + std::error::Error,
{
    let message = match err.message() {
        Some(message) => message.to_string(),
        None => DisplayErrorContext(&err).to_string(),
    };
    KmsError::remote(operation, err.code(), message)
}

struct AwsStacks {
    client: aws_sdk_cloudformation::Client,
    region: String,
}

#[async_trait]
impl StackService for AwsStacks {
    async fn describe_stack(&self, stack: &str) -> Result<BTreeMap<String, String>> {
        debug!("{}: describing stack {}", self.region, stack);
        let resp = self
            .client
            .describe_stacks()
            .stack_name(stack)
            .send()
            .await
            .map_err(|e| sdk_error("DescribeStacks", e))?;

        let described = resp
            .stacks()
            .first()
            .ok_or_else(|| KmsError::EmptyStackList {
                stack: stack.to_string(),
            })?;

        Ok(described
            .outputs()
            .iter()
            .filter_map(|output| {
                Some((
                    output.output_key()?.to_string(),
                    output.output_value()?.to_string(),
                ))
            })
            .collect())
    }

    async fn create_stack(&self, spec: &StackSpec) -> Result<String> {
        debug!("{}: creating stack {}", self.region, spec.stack_name);
        let mut request = self
            .client
            .create_stack()
            .stack_name(&spec.stack_name)
            .capabilities(Capability::CapabilityIam)
            .on_failure(OnFailure::Rollback);

        for (key, value) in &spec.parameters {
            request = request.parameters(
                Parameter::builder()
                    .parameter_key(key)
                    .parameter_value(value)
                    .build(),
            );
        }

        request = match &spec.template {
            TemplateSource::Body(body) => request.template_body(body),
            TemplateSource::Url(url) => request.template_url(url),
        };

        let resp = request
            .send()
            .await
            .map_err(|e| sdk_error("CreateStack", e))?;

        resp.stack_id()
            .map(String::from)
            .ok_or_else(|| KmsError::remote("CreateStack", None, "response carried no stack ID"))
    }

    async fn wait_for_create_complete(&self, stack_id: &str) -> Result<()> {
        self.client
            .wait_until_stack_create_complete()
            .stack_name(stack_id)
            .wait(STACK_CREATE_MAX_WAIT)
            .await
            .map_err(|e| {
                KmsError::remote(
                    "WaitUntilStackCreateComplete",
                    None,
                    DisplayErrorContext(&e).to_string(),
                )
            })?;
        debug!("{}: stack {} is complete", self.region, stack_id);
        Ok(())
    }
}

struct AwsKeys {
    client: aws_sdk_kms::Client,
    region: String,
}

#[async_trait]
impl KeyService for AwsKeys {
    async fn list_aliases(&self) -> Result<Vec<AliasEntry>> {
        let mut aliases = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let resp = self
                .client
                .list_aliases()
                .set_marker(marker.take())
                .send()
                .await
                .map_err(|e| sdk_error("ListAliases", e))?;

            for alias in resp.aliases() {
                if let (Some(name), Some(arn)) = (alias.alias_name(), alias.alias_arn()) {
                    aliases.push(AliasEntry {
                        alias_name: name.to_string(),
                        alias_arn: arn.to_string(),
                        target_key_id: alias.target_key_id().map(String::from),
                    });
                }
            }

            match resp.next_marker() {
                Some(next) => marker = Some(next.to_string()),
                None => break,
            }
        }

        debug!("{}: found {} aliases", self.region, aliases.len());
        Ok(aliases)
    }

    async fn key_enabled(&self, key_id: &str) -> Result<bool> {
        let resp = self
            .client
            .describe_key()
            .key_id(key_id)
            .send()
            .await
            .map_err(|e| sdk_error("DescribeKey", e))?;

        let metadata = resp.key_metadata().ok_or_else(|| {
            KmsError::remote("DescribeKey", None, format!("no metadata for {}", key_id))
        })?;
        Ok(metadata.enabled())
    }

    async fn create_alias(&self, alias_name: &str, target_key_id: &str) -> Result<()> {
        self.client
            .create_alias()
            .alias_name(alias_name)
            .target_key_id(target_key_id)
            .send()
            .await
            .map_err(|e| sdk_error("CreateAlias", e))?;
        Ok(())
    }

    async fn list_grants(&self, key_id: &str) -> Result<Vec<GrantEntry>> {
        let mut grants = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let resp = self
                .client
                .list_grants()
                .key_id(key_id)
                .set_marker(marker.take())
                .send()
                .await
                .map_err(|e| sdk_error("ListGrants", e))?;

            for grant in resp.grants() {
                grants.push(GrantEntry {
                    name: grant
                        .name()
                        .filter(|name| !name.is_empty())
                        .map(String::from),
                    grant_id: grant.grant_id().unwrap_or_default().to_string(),
                    grantee_principal: grant.grantee_principal().unwrap_or_default().to_string(),
                    retiring_principal: grant.retiring_principal().map(String::from),
                    encryption_context_subset: grant
                        .constraints()
                        .and_then(|c| c.encryption_context_subset())
                        .map(|subset| {
                            subset
                                .iter()
                                .map(|(k, v)| (k.clone(), v.clone()))
                                .collect()
                        }),
                    operations: grant
                        .operations()
                        .iter()
                        .map(|op| op.as_str().to_string())
                        .collect(),
                });
            }

            match resp.next_marker() {
                Some(next) => marker = Some(next.to_string()),
                None => break,
            }
        }

        debug!("{}: found {} grants on {}", self.region, grants.len(), key_id);
        Ok(grants)
    }
}

struct AwsIdentity {
    client: aws_sdk_sts::Client,
}

#[async_trait]
impl IdentityService for AwsIdentity {
    async fn caller_identity(&self) -> Result<CallerIdentity> {
        let resp = self
            .client
            .get_caller_identity()
            .send()
            .await
            .map_err(|e| sdk_error("GetCallerIdentity", e))?;

        Ok(CallerIdentity {
            account: resp.account().unwrap_or_default().to_string(),
            arn: resp.arn().unwrap_or_default().to_string(),
        })
    }
}
