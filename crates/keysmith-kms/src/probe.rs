//! Per-region discovery of existing key infrastructure
//!
//! Each region is checked for the label's stack and alias independently.
//! A failure in one region never stops the others; the report carries every
//! region's outcome and is folded into "may proceed" or "must stop" at the end.

use crate::clients::ClientFactory;
use crate::error::{KmsError, RegionFailure, Result};
use futures::future::join_all;
use keysmith_core::{Label, RegionKeys};
use tracing::debug;

/// What ListAliases/DescribeKey say about the label's alias
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AliasState {
    Missing,
    Enabled { alias_arn: String },
    Disabled,
}

/// Classification of one region's infrastructure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionState {
    /// Alias exists and its key is enabled
    Present,
    /// Neither stack nor alias exists
    Absent,
    /// Stack exists without its alias
    Inconsistent,
    /// Alias exists but its key is disabled
    Disabled,
}

/// Classify a region from the stack and alias checks
pub fn classify(stack_exists: bool, alias: &AliasState) -> RegionState {
    match (stack_exists, alias) {
        (_, AliasState::Enabled { .. }) => RegionState::Present,
        (_, AliasState::Disabled) => RegionState::Disabled,
        (true, AliasState::Missing) => RegionState::Inconsistent,
        (false, AliasState::Missing) => RegionState::Absent,
    }
}

/// Outcome of probing one region
#[derive(Debug)]
pub enum RegionProbe {
    Present { region: String, key_id: String },
    Absent { region: String },
    Failed { region: String, errors: Vec<KmsError> },
}

impl RegionProbe {
    pub fn region(&self) -> &str {
        match self {
            Self::Present { region, .. }
            | Self::Absent { region }
            | Self::Failed { region, .. } => region,
        }
    }
}

/// Regions split into those with keys and those needing provisioning
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub existing: RegionKeys,
    pub missing: Vec<String>,
}

/// Every region's probe, ordered by region
#[derive(Debug, Default)]
pub struct ProbeReport {
    probes: Vec<RegionProbe>,
}

impl ProbeReport {
    pub fn new(mut probes: Vec<RegionProbe>) -> Self {
        probes.sort_by(|a, b| a.region().cmp(b.region()));
        Self { probes }
    }

    pub fn probes(&self) -> &[RegionProbe] {
        &self.probes
    }

    /// Every (region, error) pair, in region order
    pub fn errors(&self) -> impl Iterator<Item = (&str, &KmsError)> {
        self.probes.iter().flat_map(|probe| match probe {
            RegionProbe::Failed { region, errors } => errors
                .iter()
                .map(|e| (region.as_str(), e))
                .collect::<Vec<_>>(),
            _ => Vec::new(),
        })
    }

    pub fn has_errors(&self) -> bool {
        self.probes
            .iter()
            .any(|probe| matches!(probe, RegionProbe::Failed { .. }))
    }

    /// Fold into an outcome, or a single terminal error if any region failed
    pub fn into_outcome(self) -> Result<ProbeOutcome> {
        let mut outcome = ProbeOutcome::default();
        let mut failures = Vec::new();

        for probe in self.probes {
            match probe {
                RegionProbe::Present { region, key_id } => {
                    outcome.existing.insert(region, key_id);
                }
                RegionProbe::Absent { region } => outcome.missing.push(region),
                RegionProbe::Failed { region, errors } => {
                    failures.extend(errors.into_iter().map(|error| RegionFailure {
                        region: region.clone(),
                        error,
                    }));
                }
            }
        }

        if failures.is_empty() {
            Ok(outcome)
        } else {
            Err(KmsError::ProbeFailed { failures })
        }
    }
}

/// True for the DescribeStacks error meaning "no such stack"
pub fn is_stack_missing(error: &KmsError) -> bool {
    match error {
        KmsError::Remote { code, message, .. } => {
            code.as_deref() == Some("ValidationError") && message.contains("does not exist")
        }
        _ => false,
    }
}

/// Probe every region concurrently
pub async fn probe_regions(
    factory: &dyn ClientFactory,
    regions: &[String],
    label: &Label,
) -> ProbeReport {
    let stack_name = label.stack_name();
    let alias_name = label.alias_name();

    let probes = join_all(
        regions
            .iter()
            .map(|region| probe_region(factory, region, &stack_name, &alias_name)),
    )
    .await;

    ProbeReport::new(probes)
}

async fn probe_region(
    factory: &dyn ClientFactory,
    region: &str,
    stack_name: &str,
    alias_name: &str,
) -> RegionProbe {
    let mut errors = Vec::new();

    let stack_exists = match stack_exists(factory, region, stack_name).await {
        Ok(exists) => exists,
        Err(e) => {
            errors.push(e);
            false
        }
    };

    let alias = match alias_state(factory, region, alias_name).await {
        Ok(alias) => Some(alias),
        Err(e) => {
            errors.push(e);
            None
        }
    };

    let mut present = None;
    if let Some(alias) = &alias {
        match classify(stack_exists, alias) {
            RegionState::Present => {
                if let AliasState::Enabled { alias_arn } = alias {
                    present = Some(alias_arn.clone());
                }
            }
            RegionState::Absent => {}
            RegionState::Disabled => errors.push(KmsError::DisabledKey {
                region: region.to_string(),
                alias: alias_name.to_string(),
            }),
            RegionState::Inconsistent => errors.push(KmsError::InconsistentStack {
                region: region.to_string(),
                stack: stack_name.to_string(),
                alias: alias_name.to_string(),
            }),
        }
    }

    debug!(
        "{}: stack_exists={} alias={:?} errors={}",
        region,
        stack_exists,
        alias,
        errors.len()
    );

    let region = region.to_string();
    if !errors.is_empty() {
        RegionProbe::Failed { region, errors }
    } else if let Some(key_id) = present {
        RegionProbe::Present { region, key_id }
    } else {
        RegionProbe::Absent { region }
    }
}

async fn stack_exists(
    factory: &dyn ClientFactory,
    region: &str,
    stack_name: &str,
) -> Result<bool> {
    let stacks = factory.stacks(region).await?;
    match stacks.describe_stack(stack_name).await {
        Ok(_) => Ok(true),
        Err(e) if is_stack_missing(&e) => Ok(false),
        Err(e) => Err(e),
    }
}

async fn alias_state(
    factory: &dyn ClientFactory,
    region: &str,
    alias_name: &str,
) -> Result<AliasState> {
    let keys = factory.keys(region).await?;
    let Some(alias) = keys.find_alias(alias_name).await? else {
        return Ok(AliasState::Missing);
    };

    let key_id = alias.target_key_id.as_deref().ok_or_else(|| {
        KmsError::remote(
            "ListAliases",
            None,
            format!("alias {} has no target key", alias_name),
        )
    })?;

    if keys.key_enabled(key_id).await? {
        Ok(AliasState::Enabled {
            alias_arn: alias.alias_arn,
        })
    } else {
        Ok(AliasState::Disabled)
    }
}
