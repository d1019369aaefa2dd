// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Security groups, their rules, and the filter chains of the VIFs they protect.
//!
//! Each security group has a chain holding one accept rule per group rule, and a port group
//! holding the ports of its members. A filtered VIF gets its own pair of chains: the inbound one
//! stops spoofing, the outbound one jumps to the chain of each of its groups.

use crate::errors::{CleanupReport, TopologyError, TopologyResult};
use crate::lifecycle::Orchestrator;
use crate::naming::tags::OS_SG_RULE_ID;
use crate::naming::{is_sg_label_of, sg_label, vif_chain_names};
use crate::request::{RuleSource, SecurityGroup, SecurityGroupRule, SecurityGroupRuleId, VifFilterRequest};
use crate::synth::{ResolvedSource, security_group_rule, tagged, vif_egress_rules, vif_ingress_rules};
use controller::client::ControllerClient;
use controller::model::{
    Chain, ChainSpec, NamedSpec, PortGroup, PortId, ResourceKind, Rule, TenantId,
    VifId,
};
use tracing::{debug, info};

/// The chain and port group of a security group.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SecurityGroupDevices {
    pub chain: Chain,
    pub port_group: PortGroup,
}

/// The filter chains of a VIF port.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VifChains {
    /// Traffic from the VM
    pub inbound: Chain,
    /// Traffic to the VM
    pub outbound: Chain,
}

fn label_spec(group: &SecurityGroup) -> NamedSpec {
    NamedSpec::new(group.tenant_id.clone(), sg_label(group.id, &group.name))
}

impl<C: ControllerClient> Orchestrator<C> {
    /// Find or create the chain and the port group of `group`.
    #[tracing::instrument(skip(self))]
    pub async fn create_security_group(
        &self,
        group: &SecurityGroup,
    ) -> TopologyResult<SecurityGroupDevices> {
        let spec = label_spec(group);
        let chain = self.locator.ensure_named::<Chain>(&spec).await?;
        let port_group = self.locator.ensure_named::<PortGroup>(&spec).await?;
        info!("Security group {} uses chain and port group '{}'", group.id, spec.name);
        Ok(SecurityGroupDevices {
            chain: chain.into_resource(),
            port_group: port_group.into_resource(),
        })
    }

    /// Delete every chain and port group which carries the label of `group`, under any name the
    /// group had.
    #[tracing::instrument(skip(self))]
    pub async fn delete_security_group(&self, group: &SecurityGroup) -> TopologyResult<CleanupReport> {
        let client = self.client.as_ref();
        let mut report = CleanupReport::new();
        let label = sg_label(group.id, &group.name);

        let chains = client.list_chains(&group.tenant_id).await?;
        let chains: Vec<_> = chains
            .iter()
            .filter(|c| is_sg_label_of(&c.name, group.id, &group.name))
            .collect();
        if chains.is_empty() {
            report.absent("delete security group chain", ResourceKind::Chain, &label);
        }
        for chain in chains {
            report.tolerate("delete security group chain", client.delete_chain(chain.id).await)?;
        }

        let groups = client.list_port_groups(&group.tenant_id).await?;
        let groups: Vec<_> = groups
            .iter()
            .filter(|g| is_sg_label_of(&g.name, group.id, &group.name))
            .collect();
        if groups.is_empty() {
            report.absent("delete security group port group", ResourceKind::PortGroup, &label);
        }
        for port_group in groups {
            report.tolerate(
                "delete security group port group",
                client.delete_port_group(port_group.id).await,
            )?;
        }
        Ok(report)
    }

    /// Add the accept rule of `rule` to the chain of its group.
    ///
    /// The chain of the group, and the port group of the source group if any, must exist.
    #[tracing::instrument(skip(self))]
    pub async fn create_security_group_rule(&self, rule: &SecurityGroupRule) -> TopologyResult<Rule> {
        let chain = self
            .locator
            .get_named::<Chain>(&label_spec(&rule.parent))
            .await?;
        let source = match &rule.source {
            RuleSource::Cidr(net) => ResolvedSource::Cidr(*net),
            RuleSource::Group(group) => {
                let port_group = self
                    .locator
                    .get_named::<PortGroup>(&label_spec(group))
                    .await?;
                ResolvedSource::PortGroup(port_group.id)
            }
        };
        let spec = security_group_rule(rule, source)?;
        self.ensure_rule(chain.id, &spec).await
    }

    /// The rules of every chain of `tenant` tagged `key=value`.
    pub async fn find_rules_by_tag(
        &self,
        tenant: &TenantId,
        key: &str,
        value: &str,
    ) -> TopologyResult<Vec<Rule>> {
        let mut found = Vec::new();
        for chain in self.client.list_chains(tenant).await? {
            let rules = self.client.list_rules(chain.id).await?;
            found.extend(tagged(&rules, key, value).cloned());
        }
        Ok(found)
    }

    /// Delete the rule created for security group rule `id`, wherever it is. Returns how many
    /// rules were deleted.
    #[tracing::instrument(skip(self))]
    pub async fn delete_security_group_rule(
        &self,
        tenant: &TenantId,
        id: SecurityGroupRuleId,
    ) -> TopologyResult<usize> {
        let rules = self
            .find_rules_by_tag(tenant, OS_SG_RULE_ID, &id.to_string())
            .await?;
        if rules.is_empty() {
            return Err(TopologyError::not_found(
                ResourceKind::Rule,
                format!("{OS_SG_RULE_ID}={id}"),
            ));
        }
        for rule in &rules {
            self.client.delete_rule(rule.id).await?;
            debug!("Deleted rule {} of chain {}", rule.id, rule.chain_id);
        }
        Ok(rules.len())
    }

    /// Create the chains of a VIF and make them the filters of its port.
    ///
    /// The port joins the port group of each of its security groups, whose chains and port
    /// groups must exist. Fails if the VIF already has chains.
    #[tracing::instrument(skip(self))]
    pub async fn prepare_vif_filter(&self, request: &VifFilterRequest) -> TopologyResult<VifChains> {
        let client = self.client.as_ref();
        let names = vif_chain_names(request.vif_id);
        if let Some(existing) = client
            .list_chains(&request.tenant_id)
            .await?
            .into_iter()
            .find(|c| names.contains(&c.name))
        {
            return Err(TopologyError::already_exists(ResourceKind::Chain, existing.name));
        }

        let mut jumps = Vec::with_capacity(request.security_groups.len());
        let mut port_groups = Vec::with_capacity(request.security_groups.len());
        for group in &request.security_groups {
            let spec = label_spec(group);
            jumps.push(self.locator.get_named::<Chain>(&spec).await?.id);
            port_groups.push(self.locator.get_named::<PortGroup>(&spec).await?.id);
        }

        let chains = VifChains {
            inbound: client
                .create_chain(&ChainSpec::new(request.tenant_id.clone(), names.inbound))
                .await?,
            outbound: client
                .create_chain(&ChainSpec::new(request.tenant_id.clone(), names.outbound))
                .await?,
        };
        for rule in vif_ingress_rules(request.mac, request.ip) {
            client.create_rule(chains.inbound.id, &rule).await?;
        }
        let allow_same_net = self.config.security.allow_same_net_traffic;
        for rule in vif_egress_rules(allow_same_net, request.subnet, &jumps) {
            client.create_rule(chains.outbound.id, &rule).await?;
        }

        let mut port = client.get_port(request.port).await?;
        port.inbound_filter_id = Some(chains.inbound.id);
        port.outbound_filter_id = Some(chains.outbound.id);
        port.port_group_ids = port_groups;
        client.update_port(&port).await?;
        info!(
            "VIF {} filtered by {} security group(s) on port {}",
            request.vif_id,
            request.security_groups.len(),
            port.id
        );
        Ok(chains)
    }

    /// Undo [`Orchestrator::prepare_vif_filter`]. The port may already be gone.
    #[tracing::instrument(skip(self))]
    pub async fn unfilter_vif(
        &self,
        tenant: &TenantId,
        vif: VifId,
        port: PortId,
    ) -> TopologyResult<CleanupReport> {
        let client = self.client.as_ref();
        let mut report = CleanupReport::new();
        if let Some(mut stored) = report.tolerate("get VIF port", client.get_port(port).await)? {
            stored.inbound_filter_id = None;
            stored.outbound_filter_id = None;
            stored.port_group_ids.clear();
            report.tolerate("clear VIF port filters", client.update_port(&stored).await)?;
        }

        let names = vif_chain_names(vif);
        let chains = client.list_chains(tenant).await?;
        let chains: Vec<_> = chains.iter().filter(|c| names.contains(&c.name)).collect();
        if chains.is_empty() {
            report.absent("delete VIF chain", ResourceKind::Chain, &names.inbound);
        }
        for chain in chains {
            report.tolerate("delete VIF chain", client.delete_chain(chain.id).await)?;
        }
        Ok(report)
    }
}

