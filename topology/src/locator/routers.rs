// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The provider router, tenant routers and router filter chains.

use crate::errors::{CleanupReport, TopologyError, TopologyResult};
use crate::links::{
    LinkEnd, create_link, delete_routes_via, destroy_link, ensure_route, port_with_address,
};
use crate::locator::{Locator, TenantRouter, duplicate_warning};
use crate::naming::{ChainNames, router_chain_names};
use controller::client::ControllerClient;
use controller::model::{
    Chain, NamedSpec, Port, PortDevice, PortSpec, ResourceKind, RouteSpec, Router, RouterId,
    TenantId,
};
use ipnet::Ipv4Net;
use rekon::{Located, Locate, Remove};
use std::net::Ipv4Addr;
use tracing::{debug, info, warn};

const DEFAULT_ROUTE: Ipv4Net = Ipv4Net::new_assert(Ipv4Addr::UNSPECIFIED, 0);

/// The inbound and outbound filter chains of a router.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RouterChains {
    pub inbound: Chain,
    pub outbound: Chain,
}

impl<C: ControllerClient> Locator<C> {
    fn provider_spec(&self, provider_tenant: &TenantId) -> NamedSpec {
        NamedSpec::new(provider_tenant.clone(), self.config.provider.router_name.as_str())
    }

    /// Find the provider router of `provider_tenant`, creating it if needed.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn get_or_create_provider_router(
        &self,
        provider_tenant: &TenantId,
    ) -> TopologyResult<Located<Router>> {
        self.ensure_named::<Router>(&self.provider_spec(provider_tenant))
            .await
    }

    pub async fn find_provider_router(
        &self,
        provider_tenant: &TenantId,
    ) -> TopologyResult<Option<Router>> {
        self.find_named::<Router>(&self.provider_spec(provider_tenant))
            .await
    }

    /// Find the provider router of `provider_tenant`, which must exist.
    pub async fn get_provider_router(&self, provider_tenant: &TenantId) -> TopologyResult<Router> {
        self.get_named::<Router>(&self.provider_spec(provider_tenant))
            .await
    }

    /// Find the router of `tenant`, creating and linking it to the provider router if needed.
    ///
    /// The provider router is looked up in the configured provider tenant. The router, its
    /// uplink and its default route are each searched for before being created, so a run cut
    /// short is completed by the next one.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn get_or_create_tenant_router(
        &self,
        tenant: &TenantId,
    ) -> TopologyResult<Located<Router>> {
        let located = rekon::ensure(&self.manager::<TenantRouter>(), tenant).await?;
        duplicate_warning(&located);
        self.ensure_tenant_uplink(located.resource()).await?;
        Ok(located)
    }

    /// Link `router` to the provider router and route everything up the link.
    async fn ensure_tenant_uplink(&self, router: &Router) -> TopologyResult<Port> {
        let client = self.client.as_ref();
        let uplink = self.config.tenant_router.uplink;
        let provider_tenant = TenantId::new(self.config.provider.tenant_id.as_str());
        let provider = self
            .get_or_create_provider_router(&provider_tenant)
            .await?
            .into_resource();
        let device = PortDevice::Router(router.id);

        let port = match port_with_address(client, device, uplink.tenant_address, uplink.network)
            .await?
        {
            Some(port) => match port.peer_id {
                Some(peer) => {
                    let peer = client.get_port(peer).await?;
                    if peer.router_id() != Some(provider.id) {
                        return Err(TopologyError::OutOfSync(format!(
                            "uplink port {} of router {} is linked to {:?}",
                            port.id, router.id, peer.device
                        )));
                    }
                    port
                }
                None => {
                    warn!("Replacing unlinked uplink port {} of router {}", port.id, router.id);
                    client.delete_port(port.id).await?;
                    self.link_to_provider(router.id, provider.id).await?
                }
            },
            None => self.link_to_provider(router.id, provider.id).await?,
        };
        ensure_route(client, router.id, &RouteSpec::via_port(DEFAULT_ROUTE, port.id)).await?;
        Ok(port)
    }

    async fn link_to_provider(&self, router: RouterId, provider: RouterId) -> TopologyResult<Port> {
        let uplink = self.config.tenant_router.uplink;
        let (port, _) = create_link(
            self.client.as_ref(),
            LinkEnd::new(
                PortDevice::Router(router),
                PortSpec::interior().with_address(uplink.tenant_address, uplink.network),
            ),
            LinkEnd::new(
                PortDevice::Router(provider),
                PortSpec::interior().with_address(uplink.peer_address, uplink.network),
            ),
        )
        .await?;
        info!("Linked tenant router {router} to provider router {provider}");
        Ok(port)
    }

    /// Unlink and delete every router of `tenant` named like a tenant router, with its chains.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn delete_tenant_router(&self, tenant: &TenantId) -> TopologyResult<CleanupReport> {
        let mut report = CleanupReport::new();
        let routers = self.manager::<TenantRouter>().locate(tenant).await?;
        if routers.is_empty() {
            report.absent("delete tenant router", ResourceKind::Router, tenant);
        }
        for router in routers {
            report.merge(self.unlink_router(router.id).await?);
            report.merge(self.delete_router_chains(tenant, router.id).await?);
            report.tolerate(
                "delete tenant router",
                self.manager::<Router>().remove(&router).await,
            )?;
        }
        Ok(report)
    }

    /// Break every link of `router` and delete the routes through it.
    ///
    /// Both ends of a router to router link are deleted. A bridge end is only unlinked: it
    /// belongs to a network port and goes away with it.
    pub async fn unlink_router(&self, router: RouterId) -> TopologyResult<CleanupReport> {
        let client = self.client.as_ref();
        let mut report = CleanupReport::new();
        for port in client.list_router_ports(router).await? {
            let Some(peer) = port.peer_id else {
                continue;
            };
            delete_routes_via(client, router, port.id, &mut report).await?;
            match report.tolerate("get peer port", client.get_port(peer).await)? {
                Some(peer) if peer.bridge_id().is_some() => {
                    report.tolerate("unlink port", client.unlink_port(port.id).await)?;
                    report.tolerate("delete port", client.delete_port(port.id).await)?;
                }
                _ => destroy_link(client, &port, &mut report).await?,
            }
        }
        Ok(report)
    }

    fn router_chain_specs(tenant: &TenantId, router: RouterId) -> (ChainNames, NamedSpec, NamedSpec) {
        let names = router_chain_names(router);
        let inbound = NamedSpec::new(tenant.clone(), names.inbound.as_str());
        let outbound = NamedSpec::new(tenant.clone(), names.outbound.as_str());
        (names, inbound, outbound)
    }

    /// The filter chains of `router`, which must exist.
    pub async fn get_router_chains(
        &self,
        tenant: &TenantId,
        router: RouterId,
    ) -> TopologyResult<RouterChains> {
        let (_, inbound, outbound) = Self::router_chain_specs(tenant, router);
        Ok(RouterChains {
            inbound: self.get_named::<Chain>(&inbound).await?,
            outbound: self.get_named::<Chain>(&outbound).await?,
        })
    }

    /// Find or create the filter chains of `router` and make them its filters.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn create_router_chains(
        &self,
        tenant: &TenantId,
        router: RouterId,
    ) -> TopologyResult<RouterChains> {
        let (_, inbound, outbound) = Self::router_chain_specs(tenant, router);
        let chains = RouterChains {
            inbound: self.ensure_named::<Chain>(&inbound).await?.into_resource(),
            outbound: self.ensure_named::<Chain>(&outbound).await?.into_resource(),
        };
        let mut stored = self.client.get_router(router).await?;
        if stored.inbound_filter_id != Some(chains.inbound.id)
            || stored.outbound_filter_id != Some(chains.outbound.id)
        {
            stored.inbound_filter_id = Some(chains.inbound.id);
            stored.outbound_filter_id = Some(chains.outbound.id);
            self.client.update_router(&stored).await?;
            debug!("Bound chains {} / {} to router {router}", chains.inbound.id, chains.outbound.id);
        }
        Ok(chains)
    }

    /// Delete the filter chains of `router`. The controller clears the router filters.
    pub async fn delete_router_chains(
        &self,
        tenant: &TenantId,
        router: RouterId,
    ) -> TopologyResult<CleanupReport> {
        let mut report = CleanupReport::new();
        let (names, inbound, outbound) = Self::router_chain_specs(tenant, router);
        let manager = self.manager::<Chain>();
        for spec in [inbound, outbound] {
            let chains = manager.locate(&spec).await?;
            if chains.is_empty() {
                report.absent("delete router chain", ResourceKind::Chain, &spec.name);
            }
            for chain in chains {
                report.tolerate("delete router chain", manager.remove(&chain).await)?;
            }
        }
        info!("Deleted chains {} / {} of router {router}", names.inbound, names.outbound);
        Ok(report)
    }
}
