//! Common test helpers for keysmith-kms integration tests
//!
//! Provides a recording in-memory AWS:
//! - `FakeAws` implements `ClientFactory` over per-region fixtures
//! - `CallLog` records every remote call as (operation, region)
//! - `RecordingObserver` captures provisioning events

use async_trait::async_trait;
use keysmith_kms::{
    AliasEntry, CallerIdentity, ClientFactory, GrantEntry, IdentityService, KeyService,
    KmsError, ProvisionObserver, Result, StackService, StackSpec,
};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const ACCOUNT: &str = "123456789012";
pub const CALLER_ARN: &str = "arn:aws:iam::123456789012:user/ops";

// ─── Call Log ────────────────────────────────────────────────────────────────

/// Records of remote calls for verification.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<(String, String)>>>,
}

impl CallLog {
    fn record(&self, operation: &str, region: &str) {
        self.calls
            .lock()
            .unwrap()
            .push((operation.to_string(), region.to_string()));
    }

    /// Number of calls to `operation` in any region
    #[allow(dead_code)]
    pub fn count(&self, operation: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(op, _)| op == operation)
            .count()
    }

    /// Regions `operation` was called in, sorted
    #[allow(dead_code)]
    pub fn regions_for(&self, operation: &str) -> Vec<String> {
        let mut regions: Vec<String> = self
            .calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(op, _)| op == operation)
            .map(|(_, region)| region.clone())
            .collect();
        regions.sort();
        regions
    }

    #[allow(dead_code)]
    pub fn assert_not_called(&self, operation: &str) {
        let calls = self.calls.lock().unwrap();
        assert!(
            !calls.iter().any(|(op, _)| op == operation),
            "'{}' was called but should not have been. Actual calls: {:?}",
            operation,
            *calls
        );
    }
}

// ─── Region Fixtures ─────────────────────────────────────────────────────────

/// State of one fake region
#[derive(Debug, Clone, Default)]
pub struct RegionFixture {
    pub stack: bool,
    /// (alias name, target key ID)
    pub alias: Option<(String, String)>,
    pub key_enabled: bool,
    pub grants: Vec<GrantEntry>,
    pub fail_describe: Option<String>,
    pub fail_create: Option<String>,
    pub omit_key_output: bool,
    pub created: Vec<StackSpec>,
}

impl RegionFixture {
    /// A region with a working key behind `alias`
    #[allow(dead_code)]
    pub fn provisioned(alias: &str) -> Self {
        Self {
            stack: true,
            alias: Some((alias.to_string(), "key-1".to_string())),
            key_enabled: true,
            ..Default::default()
        }
    }
}

pub fn alias_arn(region: &str, alias: &str) -> String {
    format!("arn:aws:kms:{}:{}:{}", region, ACCOUNT, alias)
}

#[allow(dead_code)]
pub fn key_arn(region: &str) -> String {
    format!("arn:aws:kms:{}:{}:key/new-{}", region, ACCOUNT, region)
}

#[allow(dead_code)]
pub fn grant(name: &str, grant_id: &str) -> GrantEntry {
    GrantEntry {
        name: Some(name.to_string()),
        grant_id: grant_id.to_string(),
        grantee_principal: "arn:aws:iam::123456789012:role/app".to_string(),
        retiring_principal: None,
        encryption_context_subset: None,
        operations: vec!["Decrypt".to_string()],
    }
}

/// A grant without a name, as AWS services create them
#[allow(dead_code)]
pub fn unnamed_grant(grant_id: &str, grantee: &str) -> GrantEntry {
    GrantEntry {
        name: None,
        grantee_principal: grantee.to_string(),
        ..grant("", grant_id)
    }
}

// ─── Fake AWS ────────────────────────────────────────────────────────────────

type Regions = Arc<Mutex<BTreeMap<String, RegionFixture>>>;

/// In-memory `ClientFactory` that records every call
#[derive(Debug, Clone, Default)]
pub struct FakeAws {
    regions: Regions,
    caller_arn: Option<String>,
    pub log: CallLog,
}

impl FakeAws {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_region(self, region: &str, fixture: RegionFixture) -> Self {
        self.regions
            .lock()
            .unwrap()
            .insert(region.to_string(), fixture);
        self
    }

    /// Resolve the caller to `arn` instead of `CALLER_ARN`
    #[allow(dead_code)]
    pub fn with_caller_arn(mut self, arn: &str) -> Self {
        self.caller_arn = Some(arn.to_string());
        self
    }

    /// Snapshot of one region's state
    #[allow(dead_code)]
    pub fn region(&self, region: &str) -> RegionFixture {
        self.regions
            .lock()
            .unwrap()
            .get(region)
            .cloned()
            .unwrap_or_default()
    }

    fn with_fixture<T>(&self, region: &str, f: impl FnOnce(&mut RegionFixture) -> T) -> T {
        let mut regions = self.regions.lock().unwrap();
        f(regions.entry(region.to_string()).or_default())
    }
}

#[async_trait]
impl ClientFactory for FakeAws {
    async fn stacks(&self, region: &str) -> Result<Arc<dyn StackService>> {
        Ok(Arc::new(FakeRegion {
            aws: self.clone(),
            region: region.to_string(),
        }))
    }

    async fn keys(&self, region: &str) -> Result<Arc<dyn KeyService>> {
        Ok(Arc::new(FakeRegion {
            aws: self.clone(),
            region: region.to_string(),
        }))
    }

    async fn identity(&self) -> Result<Arc<dyn IdentityService>> {
        Ok(Arc::new(FakeRegion {
            aws: self.clone(),
            region: "us-east-1".to_string(),
        }))
    }
}

struct FakeRegion {
    aws: FakeAws,
    region: String,
}

#[async_trait]
impl StackService for FakeRegion {
    async fn describe_stack(&self, stack: &str) -> Result<BTreeMap<String, String>> {
        self.aws.log.record("DescribeStacks", &self.region);
        let region = self.region.clone();
        self.aws.with_fixture(&self.region, |fixture| {
            if let Some(code) = &fixture.fail_describe {
                return Err(KmsError::remote("DescribeStacks", Some(code.as_str()), "injected"));
            }
            if !fixture.stack {
                return Err(KmsError::remote(
                    "DescribeStacks",
                    Some("ValidationError"),
                    format!("Stack with id {} does not exist", stack),
                ));
            }
            let mut outputs = BTreeMap::new();
            if !fixture.omit_key_output {
                outputs.insert("KeyArn".to_string(), key_arn(&region));
            }
            Ok(outputs)
        })
    }

    async fn create_stack(&self, spec: &StackSpec) -> Result<String> {
        self.aws.log.record("CreateStack", &self.region);
        self.aws.with_fixture(&self.region, |fixture| {
            if let Some(message) = &fixture.fail_create {
                return Err(KmsError::remote("CreateStack", None, message.clone()));
            }
            fixture.stack = true;
            fixture.created.push(spec.clone());
            Ok(format!("stack/{}", spec.stack_name))
        })
    }

    async fn wait_for_create_complete(&self, _stack_id: &str) -> Result<()> {
        self.aws.log.record("WaitStackCreateComplete", &self.region);
        Ok(())
    }
}

#[async_trait]
impl KeyService for FakeRegion {
    async fn list_aliases(&self) -> Result<Vec<AliasEntry>> {
        self.aws.log.record("ListAliases", &self.region);
        let region = self.region.clone();
        Ok(self.aws.with_fixture(&self.region, |fixture| {
            fixture
                .alias
                .iter()
                .map(|(name, target)| AliasEntry {
                    alias_name: name.clone(),
                    alias_arn: alias_arn(&region, name),
                    target_key_id: Some(target.clone()),
                })
                .collect()
        }))
    }

    async fn key_enabled(&self, _key_id: &str) -> Result<bool> {
        self.aws.log.record("DescribeKey", &self.region);
        Ok(self
            .aws
            .with_fixture(&self.region, |fixture| fixture.key_enabled))
    }

    async fn create_alias(&self, alias_name: &str, target_key_id: &str) -> Result<()> {
        self.aws.log.record("CreateAlias", &self.region);
        self.aws.with_fixture(&self.region, |fixture| {
            fixture.alias = Some((alias_name.to_string(), target_key_id.to_string()));
            fixture.key_enabled = true;
        });
        Ok(())
    }

    async fn list_grants(&self, _key_id: &str) -> Result<Vec<GrantEntry>> {
        self.aws.log.record("ListGrants", &self.region);
        Ok(self
            .aws
            .with_fixture(&self.region, |fixture| fixture.grants.clone()))
    }
}

#[async_trait]
impl IdentityService for FakeRegion {
    async fn caller_identity(&self) -> Result<CallerIdentity> {
        self.aws.log.record("GetCallerIdentity", &self.region);
        Ok(CallerIdentity {
            account: ACCOUNT.to_string(),
            arn: self
                .aws
                .caller_arn
                .clone()
                .unwrap_or_else(|| CALLER_ARN.to_string()),
        })
    }
}

// ─── Recording Observer ──────────────────────────────────────────────────────

/// Captures observer events as short strings
#[allow(dead_code)]
#[derive(Debug, Default)]
pub struct RecordingObserver {
    pub events: Mutex<Vec<String>>,
}

impl RecordingObserver {
    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }

    #[allow(dead_code)]
    pub fn events_starting_with(&self, prefix: &str) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.starts_with(prefix))
            .cloned()
            .collect()
    }
}

impl ProvisionObserver for RecordingObserver {
    fn on_probe_start(&self, regions: &[String], label: &str) {
        self.push(format!("probe {} {}", label, regions.join(",")));
    }

    fn on_probe_error(&self, region: &str, _error: &KmsError) {
        self.push(format!("probe-error {}", region));
    }

    fn on_existing_keys(&self, count: usize) {
        self.push(format!("existing {}", count));
    }

    fn on_provision_start(&self, regions: &[String]) {
        self.push(format!("provision {}", regions.join(",")));
    }

    fn on_unit_started(&self, region: &str) {
        self.push(format!("started {}", region));
    }

    fn on_unit_finished(&self, region: &str, _elapsed: Duration) {
        self.push(format!("finished {}", region));
    }

    fn on_unit_error(&self, region: &str, _error: &KmsError) {
        self.push(format!("unit-error {}", region));
    }
}
