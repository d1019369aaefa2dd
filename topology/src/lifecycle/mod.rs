// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Create / update / delete flows for OpenStack networks, subnets, ports, routers, router
//! interfaces, floating IPs and security groups.
//!
//! Every flow is a plain sequence of controller calls. Nothing is transactional: a flow which
//! fails half way leaves what it already did in place, and the caller is expected to retry (all
//! flows tolerate their own partial results) or to run the matching teardown.

mod floating;
mod network;
mod router;
mod security;

pub use security::{SecurityGroupDevices, VifChains};

use crate::errors::{CleanupReport, TopologyResult};
use crate::links;
use crate::locator::Locator;
use crate::synth::{realizes, tagged};
use config::TopologyConfig;
use controller::client::ControllerClient;
use controller::model::{ChainId, ResourceKind, RouteSpec, RouterId, Rule, RuleSpec, TenantId};
use std::sync::Arc;
use tracing::debug;

/// Runs the lifecycle flows against one controller.
///
/// Construct it once at process start and share it; it holds no state besides the client and
/// the configuration.
#[derive(Debug)]
pub struct Orchestrator<C> {
    client: Arc<C>,
    config: Arc<TopologyConfig>,
    locator: Locator<C>,
}

impl<C> Clone for Orchestrator<C> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            config: self.config.clone(),
            locator: self.locator.clone(),
        }
    }
}

impl<C: ControllerClient> Orchestrator<C> {
    #[must_use]
    pub fn new(client: Arc<C>, config: Arc<TopologyConfig>) -> Self {
        let locator = Locator::new(client.clone(), config.clone());
        Self {
            client,
            config,
            locator,
        }
    }

    #[must_use]
    pub fn locator(&self) -> &Locator<C> {
        &self.locator
    }

    #[must_use]
    pub fn client(&self) -> &C {
        &self.client
    }

    fn provider_tenant(&self) -> TenantId {
        TenantId::new(self.config.provider.tenant_id.as_str())
    }

    /// Create the route `spec` in `router` unless it is already there.
    async fn ensure_route(&self, router: RouterId, spec: &RouteSpec) -> TopologyResult<()> {
        links::ensure_route(self.client.as_ref(), router, spec).await
    }

    /// Create `spec` in `chain` unless an identical rule is already there.
    async fn ensure_rule(&self, chain: ChainId, spec: &RuleSpec) -> TopologyResult<Rule> {
        let rules = self.client.list_rules(chain).await?;
        if let Some(rule) = rules.into_iter().find(|rule| realizes(rule, spec)) {
            return Ok(rule);
        }
        let rule = self.client.create_rule(chain, spec).await?;
        debug!("Created {} rule {} at position {} of chain {chain}", rule.action, rule.id, rule.position);
        Ok(rule)
    }

    /// Delete the rules of `chain` tagged `key=value`. Returns how many were deleted.
    async fn delete_tagged_rules(
        &self,
        chain: ChainId,
        key: &str,
        value: &str,
        report: &mut CleanupReport,
    ) -> TopologyResult<usize> {
        let rules = match report.tolerate("list rules", self.client.list_rules(chain).await)? {
            Some(rules) => rules,
            None => return Ok(0),
        };
        let mut deleted = 0;
        for rule in tagged(&rules, key, value) {
            if report
                .tolerate("delete tagged rule", self.client.delete_rule(rule.id).await)?
                .is_some()
            {
                deleted += 1;
            }
        }
        if deleted == 0 {
            report.absent("delete tagged rule", ResourceKind::Rule, format!("{key}={value}"));
        }
        Ok(deleted)
    }
}
