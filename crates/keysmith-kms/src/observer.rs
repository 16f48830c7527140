//! Progress observation for provisioning runs
//!
//! The orchestration never prints. It reports what it is doing to a
//! `ProvisionObserver`; the CLI renders those events on the terminal and tests
//! use the no-op or tracing observers.

use crate::error::KmsError;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Observer for `kms init` progress events.
///
/// Unit events (`on_unit_*`) may arrive concurrently from several regions.
pub trait ProvisionObserver: Send + Sync {
    /// Probing is about to start
    fn on_probe_start(&self, regions: &[String], label: &str);

    /// A region reported an error while probing; every one is reported
    fn on_probe_error(&self, region: &str, error: &KmsError);

    /// Keys already present for the label
    fn on_existing_keys(&self, count: usize);

    /// The invoking identity was resolved
    fn on_caller(&self, _account: &str, _arn: &str) {}

    /// Canonical principal lists that will go into the key policy
    fn on_principals(&self, _administrators: &[String], _users: &[String]) {}

    /// Regions about to be provisioned
    fn on_provision_start(&self, regions: &[String]);

    /// A unit is submitting its stack
    fn on_unit_started(&self, region: &str);

    /// A unit is waiting for its stack to complete
    fn on_unit_waiting(&self, _region: &str, _stack_id: &str) {}

    /// A unit is creating the alias for its new key
    fn on_unit_alias(&self, _region: &str, _alias: &str, _key_arn: &str) {}

    /// A unit finished, successfully or not
    fn on_unit_finished(&self, region: &str, elapsed: Duration);

    /// A unit failed; every failure is reported before the run fails
    fn on_unit_error(&self, region: &str, error: &KmsError);
}

/// An observer that ignores every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpObserver;

impl ProvisionObserver for NoOpObserver {
    fn on_probe_start(&self, _regions: &[String], _label: &str) {}

    fn on_probe_error(&self, _region: &str, _error: &KmsError) {}

    fn on_existing_keys(&self, _count: usize) {}

    fn on_provision_start(&self, _regions: &[String]) {}

    fn on_unit_started(&self, _region: &str) {}

    fn on_unit_finished(&self, _region: &str, _elapsed: Duration) {}

    fn on_unit_error(&self, _region: &str, _error: &KmsError) {}
}

/// An observer that logs with `tracing`
///
/// - probe and provision milestones: INFO
/// - unit progress: DEBUG
/// - errors: WARN
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl ProvisionObserver for TracingObserver {
    fn on_probe_start(&self, regions: &[String], label: &str) {
        info!(label, regions = ?regions, "checking regions");
    }

    fn on_probe_error(&self, region: &str, error: &KmsError) {
        warn!(region, error = %error, "probe failed");
    }

    fn on_existing_keys(&self, count: usize) {
        info!(count, "found pre-existing keys");
    }

    fn on_caller(&self, account: &str, arn: &str) {
        info!(account, arn, "resolved caller identity");
    }

    fn on_provision_start(&self, regions: &[String]) {
        info!(regions = ?regions, "provisioning regions");
    }

    fn on_unit_started(&self, region: &str) {
        debug!(region, "creating stack");
    }

    fn on_unit_waiting(&self, region: &str, stack_id: &str) {
        debug!(region, stack_id, "waiting for stack");
    }

    fn on_unit_finished(&self, region: &str, elapsed: Duration) {
        debug!(region, elapsed = ?elapsed, "unit finished");
    }

    fn on_unit_error(&self, region: &str, error: &KmsError) {
        warn!(region, error = %error, "unit failed");
    }
}
