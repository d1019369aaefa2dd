// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! `rekon` implementations for the objects located by name.

use crate::errors::{TopologyError, TopologyResult};
use crate::locator::{Manager, manager_of};
use controller::client::{ClientResult, ControllerClient};
use controller::model::{
    Bridge, BridgeSpec, Chain, ChainSpec, NamedSpec, PortGroup, PortGroupSpec, Router,
    RouterSpec, TenantId,
};
use rekon::{Create, Locate, Remove};
use tracing::{debug, info};

impl<C: ControllerClient> Locate for Manager<C, Router> {
    type Requirement = RouterSpec;
    type Resource = Router;
    type Error = TopologyError;

    async fn locate(&self, spec: &RouterSpec) -> TopologyResult<Vec<Router>> {
        let routers = self.client.list_routers(&spec.tenant_id).await?;
        Ok(routers.into_iter().filter(|r| r.is(spec)).collect())
    }
}

impl<C: ControllerClient> Create for Manager<C, Router> {
    type Requirement = RouterSpec;
    type Outcome = TopologyResult<Router>;

    async fn create(&self, spec: &RouterSpec) -> TopologyResult<Router> {
        let router = self.client.create_router(spec).await?;
        info!("Created router '{}' ({}) for tenant {}", router.name, router.id, router.tenant_id);
        Ok(router)
    }
}

impl<C: ControllerClient> Remove for Manager<C, Router> {
    type Observation = Router;
    type Outcome = ClientResult<()>;

    async fn remove(&self, router: &Router) -> ClientResult<()> {
        self.client.delete_router(router.id).await?;
        info!("Deleted router '{}' ({})", router.name, router.id);
        Ok(())
    }
}

impl<C: ControllerClient> Locate for Manager<C, Bridge> {
    type Requirement = BridgeSpec;
    type Resource = Bridge;
    type Error = TopologyError;

    async fn locate(&self, spec: &BridgeSpec) -> TopologyResult<Vec<Bridge>> {
        let bridges = self.client.list_bridges(&spec.tenant_id).await?;
        Ok(bridges.into_iter().filter(|b| b.is(spec)).collect())
    }
}

impl<C: ControllerClient> Create for Manager<C, Bridge> {
    type Requirement = BridgeSpec;
    type Outcome = TopologyResult<Bridge>;

    async fn create(&self, spec: &BridgeSpec) -> TopologyResult<Bridge> {
        let bridge = self.client.create_bridge(spec).await?;
        info!("Created bridge '{}' ({}) for tenant {}", bridge.name, bridge.id, bridge.tenant_id);
        Ok(bridge)
    }
}

impl<C: ControllerClient> Remove for Manager<C, Bridge> {
    type Observation = Bridge;
    type Outcome = ClientResult<()>;

    async fn remove(&self, bridge: &Bridge) -> ClientResult<()> {
        self.client.delete_bridge(bridge.id).await?;
        info!("Deleted bridge '{}' ({})", bridge.name, bridge.id);
        Ok(())
    }
}

impl<C: ControllerClient> Locate for Manager<C, Chain> {
    type Requirement = ChainSpec;
    type Resource = Chain;
    type Error = TopologyError;

    async fn locate(&self, spec: &ChainSpec) -> TopologyResult<Vec<Chain>> {
        let chains = self.client.list_chains(&spec.tenant_id).await?;
        Ok(chains.into_iter().filter(|c| c.is(spec)).collect())
    }
}

impl<C: ControllerClient> Create for Manager<C, Chain> {
    type Requirement = ChainSpec;
    type Outcome = TopologyResult<Chain>;

    async fn create(&self, spec: &ChainSpec) -> TopologyResult<Chain> {
        let chain = self.client.create_chain(spec).await?;
        debug!("Created chain '{}' ({})", chain.name, chain.id);
        Ok(chain)
    }
}

impl<C: ControllerClient> Remove for Manager<C, Chain> {
    type Observation = Chain;
    type Outcome = ClientResult<()>;

    async fn remove(&self, chain: &Chain) -> ClientResult<()> {
        self.client.delete_chain(chain.id).await?;
        debug!("Deleted chain '{}' ({})", chain.name, chain.id);
        Ok(())
    }
}

impl<C: ControllerClient> Locate for Manager<C, PortGroup> {
    type Requirement = PortGroupSpec;
    type Resource = PortGroup;
    type Error = TopologyError;

    async fn locate(&self, spec: &PortGroupSpec) -> TopologyResult<Vec<PortGroup>> {
        let groups = self.client.list_port_groups(&spec.tenant_id).await?;
        Ok(groups.into_iter().filter(|g| g.name == spec.name).collect())
    }
}

impl<C: ControllerClient> Create for Manager<C, PortGroup> {
    type Requirement = PortGroupSpec;
    type Outcome = TopologyResult<PortGroup>;

    async fn create(&self, spec: &PortGroupSpec) -> TopologyResult<PortGroup> {
        let group = self.client.create_port_group(spec).await?;
        debug!("Created port group '{}' ({})", group.name, group.id);
        Ok(group)
    }
}

impl<C: ControllerClient> Remove for Manager<C, PortGroup> {
    type Observation = PortGroup;
    type Outcome = ClientResult<()>;

    async fn remove(&self, group: &PortGroup) -> ClientResult<()> {
        self.client.delete_port_group(group.id).await
    }
}

/// Marker for the router of a tenant, located by its configured name.
#[derive(Debug)]
pub enum TenantRouter {}

impl<C: ControllerClient> Manager<C, TenantRouter> {
    fn spec(&self, tenant: &TenantId) -> RouterSpec {
        NamedSpec::new(
            tenant.clone(),
            self.config.tenant_router_name(tenant.as_str()),
        )
    }
}

impl<C: ControllerClient> Locate for Manager<C, TenantRouter> {
    type Requirement = TenantId;
    type Resource = Router;
    type Error = TopologyError;

    async fn locate(&self, tenant: &TenantId) -> TopologyResult<Vec<Router>> {
        manager_of::<C, Router>(self).locate(&self.spec(tenant)).await
    }
}

impl<C: ControllerClient> Create for Manager<C, TenantRouter> {
    type Requirement = TenantId;
    type Outcome = TopologyResult<Router>;

    /// Create the bare router. Its uplink is ensured separately, so that a retry can finish it.
    async fn create(&self, tenant: &TenantId) -> TopologyResult<Router> {
        manager_of::<C, Router>(self).create(&self.spec(tenant)).await
    }
}
