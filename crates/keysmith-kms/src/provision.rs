//! Multi-region key provisioning
//!
//! `discover_or_create_keys` is the whole `kms init` orchestration short of
//! writing the template: probe every region, apply the gap-filling gate,
//! resolve principals, then create the missing regions concurrently.

use crate::clients::{ClientFactory, StackSpec, TemplateSource};
use crate::error::{KmsError, RegionFailure, Result};
use crate::observer::ProvisionObserver;
use crate::probe::probe_regions;
use futures::future::join_all;
use keysmith_core::arn::{canonicalize_principals, validate_principals};
use keysmith_core::{ProvisioningRequest, RegionKeys};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, info};

/// Stack output holding the new key's ARN
pub const KEY_ARN_OUTPUT: &str = "KeyArn";

/// Canonical principal lists for the key policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principals {
    pub administrators: Vec<String>,
    pub users: Vec<String>,
}

/// Probe, gate, and provision. Returns region → alias ARN for every
/// requested region.
pub async fn discover_or_create_keys(
    factory: &dyn ClientFactory,
    request: &ProvisioningRequest,
    template_body: &str,
    observer: &dyn ProvisionObserver,
) -> Result<RegionKeys> {
    observer.on_probe_start(&request.sorted_regions(), request.label.as_str());

    let report = probe_regions(factory, &request.regions, &request.label).await;
    for (region, error) in report.errors() {
        observer.on_probe_error(region, error);
    }
    let outcome = report.into_outcome()?;

    check_fill_gaps(&outcome.existing, &outcome.missing, request)?;

    if !outcome.existing.is_empty() {
        observer.on_existing_keys(outcome.existing.len());
    }

    let mut keys = outcome.existing;
    if outcome.missing.is_empty() {
        return Ok(keys);
    }

    let principals = resolve_principals(factory, request, observer).await?;
    let spec = stack_spec(request, &principals, template_body);
    let created = provision_regions(
        factory,
        &outcome.missing,
        &spec,
        &request.label.alias_name(),
        observer,
    )
    .await?;

    keys.extend(created);
    Ok(keys)
}

/// Refuse to silently widen a key's footprint.
///
/// Fails when some regions already have keys, others do not, and filling the
/// gaps was not requested.
pub fn check_fill_gaps(
    existing: &RegionKeys,
    missing: &[String],
    request: &ProvisioningRequest,
) -> Result<()> {
    if !existing.is_empty() && !missing.is_empty() && !request.create_missing_keys {
        return Err(KmsError::MissingKeysNotAllowed {
            requested: request.regions.len(),
            existing: existing.len(),
            label: request.label.to_string(),
        });
    }
    Ok(())
}

/// Canonicalize the requested administrators and users, each extended with
/// the invoking identity.
pub async fn resolve_principals(
    factory: &dyn ClientFactory,
    request: &ProvisioningRequest,
    observer: &dyn ProvisionObserver,
) -> Result<Principals> {
    let caller = factory.identity().await?.caller_identity().await?;
    observer.on_caller(&caller.account, &caller.arn);

    let administrators = role_principals(
        "Administrator",
        &caller.account,
        &request.administrators,
        &caller.arn,
    )?;
    let users = role_principals("User", &caller.account, &request.users, &caller.arn)?;

    observer.on_principals(&administrators, &users);
    Ok(Principals {
        administrators,
        users,
    })
}

/// Canonical principals for one key policy role, the caller included.
///
/// An empty result is an error tagged with `role`.
pub fn role_principals(
    role: &'static str,
    account: &str,
    requested: &str,
    caller_arn: &str,
) -> Result<Vec<String>> {
    let principals = canonicalize_principals(account, &format!("{},{}", requested, caller_arn));
    validate_principals(&principals).map_err(|source| KmsError::Principals { role, source })?;
    Ok(principals)
}

/// The stack request shared by every region
pub fn stack_spec(
    request: &ProvisioningRequest,
    principals: &Principals,
    template_body: &str,
) -> StackSpec {
    let mut parameters = BTreeMap::new();
    parameters.insert(
        "AdministratorPrincipals".to_string(),
        principals.administrators.join(","),
    );
    parameters.insert("UserPrincipals".to_string(), principals.users.join(","));
    parameters.insert(
        "KeyDescription".to_string(),
        format!("Key used for securing secrets ({}).", request.label),
    );
    parameters.insert(
        "CreateSimpleRoles".to_string(),
        request.create_simple_roles.to_string(),
    );
    parameters.insert(
        "AllowIAMPoliciesToControlKeyAccess".to_string(),
        (!request.disable_iam_policies).to_string(),
    );

    let template = match request.template_url.as_deref() {
        Some(url) if !url.is_empty() => TemplateSource::Url(url.to_string()),
        _ => TemplateSource::Body(template_body.to_string()),
    };

    StackSpec {
        stack_name: request.label.stack_name(),
        parameters,
        template,
    }
}

/// Create the key stack and alias in every region concurrently.
///
/// Every unit runs to completion. If any fail, all failures are reported to
/// the observer and returned together, ordered by region.
pub async fn provision_regions(
    factory: &dyn ClientFactory,
    regions: &[String],
    spec: &StackSpec,
    alias_name: &str,
    observer: &dyn ProvisionObserver,
) -> Result<RegionKeys> {
    let mut regions = regions.to_vec();
    regions.sort();
    observer.on_provision_start(&regions);

    let results = join_all(regions.iter().map(|region| async move {
        let started = Instant::now();
        observer.on_unit_started(region);
        let result = provision_region(factory, region, spec, alias_name, observer).await;
        observer.on_unit_finished(region, started.elapsed());
        (region.clone(), result)
    }))
    .await;

    let mut created = RegionKeys::new();
    let mut failures = Vec::new();
    for (region, result) in results {
        match result {
            Ok(alias_arn) => {
                created.insert(region, alias_arn);
            }
            Err(error) => failures.push(RegionFailure { region, error }),
        }
    }

    if failures.is_empty() {
        info!("Provisioned {} regions", created.len());
        return Ok(created);
    }

    for failure in &failures {
        observer.on_unit_error(&failure.region, &failure.error);
    }
    Err(KmsError::ProvisioningFailed { failures })
}

/// One unit: stack, wait, read the key ARN, alias it, return the alias ARN
async fn provision_region(
    factory: &dyn ClientFactory,
    region: &str,
    spec: &StackSpec,
    alias_name: &str,
    observer: &dyn ProvisionObserver,
) -> Result<String> {
    let stacks = factory.stacks(region).await?;
    let stack_id = stacks.create_stack(spec).await?;
    observer.on_unit_waiting(region, &stack_id);
    stacks.wait_for_create_complete(&stack_id).await?;

    let outputs = stacks.describe_stack(&stack_id).await?;
    let key_arn = outputs
        .get(KEY_ARN_OUTPUT)
        .filter(|arn| !arn.is_empty())
        .ok_or_else(|| KmsError::MissingStackOutput {
            stack: spec.stack_name.clone(),
            output: KEY_ARN_OUTPUT.to_string(),
        })?;

    observer.on_unit_alias(region, alias_name, key_arn);
    let keys = factory.keys(region).await?;
    keys.create_alias(alias_name, key_arn).await?;

    debug!("{}: fetching ARN for alias {}", region, alias_name);
    let alias = keys
        .find_alias(alias_name)
        .await?
        .ok_or_else(|| KmsError::AliasNotFound {
            alias: alias_name.to_string(),
        })?;
    Ok(alias.alias_arn)
}
