//! Grant inventory for a stored secret
//!
//! A secret's KMS values name alias ARNs. Those are grouped by alias, each
//! region's grants are fetched from the key behind the alias, and grants
//! sharing a name are folded into one entry with a grant ID per region.

use crate::clients::ClientFactory;
use crate::error::{KmsError, Result};
use futures::future::join_all;
use keysmith_core::arn::parse_alias_arn;
use keysmith_core::config::KMS_KEY_MANAGER;
use keysmith_core::types::filter_by_key_manager;
use keysmith_core::{AggregatedGrant, FileStore, GrantRecord, GrantsByAlias, StoredValue};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Alias name → regions holding a key under that alias
pub type AliasRegions = BTreeMap<String, BTreeSet<String>>;

/// Group values by the alias their key ID names
pub fn resolve_aliases(values: &[StoredValue]) -> Result<AliasRegions> {
    let mut aliases = AliasRegions::new();
    for value in values {
        let parsed = parse_alias_arn(&value.key_id)?;
        aliases
            .entry(parsed.alias_name)
            .or_default()
            .insert(parsed.region);
    }
    Ok(aliases)
}

/// Fetch the grants on the key behind `alias_name` in every region
pub async fn fetch_alias_grants(
    factory: &dyn ClientFactory,
    alias_name: &str,
    regions: &BTreeSet<String>,
) -> Result<Vec<GrantRecord>> {
    let results = join_all(
        regions
            .iter()
            .map(|region| fetch_region_grants(factory, alias_name, region)),
    )
    .await;

    let mut records = Vec::new();
    for result in results {
        records.extend(result?);
    }
    Ok(records)
}

async fn fetch_region_grants(
    factory: &dyn ClientFactory,
    alias_name: &str,
    region: &str,
) -> Result<Vec<GrantRecord>> {
    let keys = factory.keys(region).await?;
    let alias = keys
        .find_alias(alias_name)
        .await?
        .ok_or_else(|| KmsError::AliasMissingInRegion {
            alias: alias_name.to_string(),
            region: region.to_string(),
        })?;
    let key_id = alias
        .target_key_id
        .ok_or_else(|| KmsError::AliasMissingInRegion {
            alias: alias_name.to_string(),
            region: region.to_string(),
        })?;

    let grants = keys.list_grants(&key_id).await?;
    debug!("{}: {} grants on {}", region, grants.len(), alias_name);

    Ok(grants
        .into_iter()
        .map(|grant| GrantRecord {
            name: grant.name,
            grantee_principal: grant.grantee_principal,
            retiring_principal: grant.retiring_principal,
            encryption_context_subset: grant.encryption_context_subset,
            operations: grant.operations,
            grant_id: grant.grant_id,
            region: region.to_string(),
        })
        .collect())
}

/// Fold per-region records into one entry per grant name.
///
/// Nameless grants are keyed by grant ID and never folded together. The
/// first record for a name supplies the grantee, retiring principal,
/// constraints and operations. Later records only add their grant ID; if they
/// disagree with the first, the first wins and a warning is logged.
pub fn fold_grants(records: &[GrantRecord]) -> BTreeMap<String, AggregatedGrant> {
    let mut folded: BTreeMap<String, AggregatedGrant> = BTreeMap::new();
    for record in records {
        let key = record.fold_key();
        match folded.get_mut(&key) {
            Some(entry) => {
                if !entry.agrees_with(record) {
                    warn!(
                        "Grant '{}' in {} differs from the grant of the same name in {}; \
                         keeping the first",
                        key,
                        record.region,
                        entry.grant_ids.keys().cloned().collect::<Vec<_>>().join(", ")
                    );
                }
                entry
                    .grant_ids
                    .insert(record.region.clone(), record.grant_id.clone());
            }
            None => {
                folded.insert(key, AggregatedGrant::seed(record));
            }
        }
    }
    folded
}

/// Every grant protecting the secret `name`, keyed by alias.
///
/// Aliases without grants are left out; an empty map means nothing to show.
pub async fn list_grants_for_secret(
    factory: &dyn ClientFactory,
    store: &FileStore,
    name: &str,
) -> Result<GrantsByAlias> {
    let values = filter_by_key_manager(store.get(name)?, KMS_KEY_MANAGER);
    let aliases = resolve_aliases(&values)?;

    let mut output = GrantsByAlias::new();
    for (alias_name, regions) in &aliases {
        let records = fetch_alias_grants(factory, alias_name, regions).await?;
        let folded = fold_grants(&records);
        if !folded.is_empty() {
            output.insert(alias_name.clone(), folded);
        }
    }
    Ok(output)
}
