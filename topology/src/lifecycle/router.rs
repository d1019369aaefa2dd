// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Routers, their external gateway and their interfaces.

use crate::errors::{CleanupReport, TopologyError, TopologyResult};
use crate::lifecycle::Orchestrator;
use crate::links::{LinkEnd, create_link, delete_routes_via, destroy_link, port_with_address};
use crate::naming::tags::OS_TENANT_ROUTER_SNAT;
use crate::request::{ExternalGateway, RouterInterface, RouterRequest};
use crate::synth::{gateway_snat_rules, realizes};
use controller::client::ControllerClient;
use controller::model::{
    Port, PortDevice, PortId, PortSpec, ResourceKind, RouteSpec, Router, RouterId, RouterSpec,
    TenantId,
};
use ipnet::Ipv4Net;
use std::net::Ipv4Addr;
use tracing::{info, warn};

const DEFAULT_ROUTE: Ipv4Net = Ipv4Net::new_assert(Ipv4Addr::UNSPECIFIED, 0);

impl<C: ControllerClient> Orchestrator<C> {
    /// Create a router with its filter chains, linked to the metadata router.
    #[tracing::instrument(skip(self))]
    pub async fn create_router(&self, request: &RouterRequest) -> TopologyResult<Router> {
        let router = self
            .client
            .create_router(&RouterSpec::new(request.tenant_id.clone(), request.name.as_str()))
            .await?;
        self.locator
            .create_router_chains(&request.tenant_id, router.id)
            .await?;

        let metadata = self
            .locator
            .ensure_metadata_devices(&self.provider_tenant())
            .await?;
        let link = self.config.metadata.tenant_link;
        let (port, _) = create_link(
            self.client.as_ref(),
            LinkEnd::new(
                PortDevice::Router(router.id),
                PortSpec::interior().with_address(link.tenant_address, link.network),
            ),
            LinkEnd::new(
                PortDevice::Router(metadata.router.resource().id),
                PortSpec::interior().with_address(link.peer_address, link.network),
            ),
        )
        .await?;
        let service = Ipv4Net::from(self.config.metadata.service_address);
        self.client
            .create_route(router.id, &RouteSpec::via_port(service, port.id))
            .await?;
        info!("Created router '{}' ({})", router.name, router.id);
        self.client.get_router(router.id).await.map_err(Into::into)
    }

    /// Delete a router: its links, its chains, then the router.
    ///
    /// Far ends on other routers are deleted; interface ports on bridges are only unlinked.
    #[tracing::instrument(skip(self))]
    pub async fn delete_router(
        &self,
        tenant: &TenantId,
        router: RouterId,
    ) -> TopologyResult<CleanupReport> {
        let mut report = self.locator.unlink_router(router).await?;
        report.merge(self.locator.delete_router_chains(tenant, router).await?);
        report.tolerate("delete router", self.client.delete_router(router).await)?;
        info!("Deleted router {router}");
        Ok(report)
    }

    /// Link `router` to the provider router and masquerade its traffic behind `gateway`.
    ///
    /// Returns the router end of the link.
    #[tracing::instrument(skip(self))]
    pub async fn set_router_gateway(
        &self,
        tenant: &TenantId,
        router: RouterId,
        gateway: &ExternalGateway,
    ) -> TopologyResult<Port> {
        let link = self.config.gateway_link;
        let client = self.client.as_ref();
        let chains = self.locator.get_router_chains(tenant, router).await?;
        let provider = self
            .locator
            .get_or_create_provider_router(&self.provider_tenant())
            .await?
            .into_resource();

        let device = PortDevice::Router(router);
        let (port, peer) =
            match port_with_address(client, device, link.tenant_address, link.network).await? {
                Some(port) => {
                    let Some(peer) = port.peer_id else {
                        return Err(TopologyError::OutOfSync(format!(
                            "gateway port {} of router {router} is not linked",
                            port.id
                        )));
                    };
                    let peer = client.get_port(peer).await?;
                    (port, peer)
                }
                None => {
                    create_link(
                        client,
                        LinkEnd::new(
                            device,
                            PortSpec::interior().with_address(link.tenant_address, link.network),
                        ),
                        LinkEnd::new(
                            PortDevice::Router(provider.id),
                            PortSpec::interior().with_address(link.peer_address, link.network),
                        ),
                    )
                    .await?
                }
            };
        if peer.router_id() != Some(provider.id) {
            return Err(TopologyError::OutOfSync(format!(
                "gateway port {} of router {router} is not linked to the provider router",
                port.id
            )));
        }

        // the SNAT rules of a previous gateway address name it; its route goes with them
        let snat = gateway_snat_rules(router, port.id, gateway.gateway_ip);
        let tag = router.to_string();
        let mut stale_addresses = Vec::new();
        let pairs = [
            (chains.inbound.id, &snat.inbound),
            (chains.outbound.id, &snat.outbound),
        ];
        for (chain, spec) in pairs {
            for rule in client.list_rules(chain).await? {
                if rule.is_tagged(OS_TENANT_ROUTER_SNAT, &tag) && !realizes(&rule, spec) {
                    stale_addresses.extend(rule.nat_targets.iter().map(|t| t.address_from));
                    client.delete_rule(rule.id).await?;
                    info!("Dropped stale SNAT rule {} of router {router}", rule.id);
                }
            }
        }
        for route in client.list_routes(provider.id).await? {
            if route.next_hop_port == Some(peer.id)
                && route.dst.prefix_len() == 32
                && route.dst.addr() != gateway.gateway_ip
                && stale_addresses.contains(&route.dst.addr())
            {
                client.delete_route(route.id).await?;
                info!("Dropped route to {} from the provider router", route.dst);
            }
        }

        self.ensure_route(
            provider.id,
            &RouteSpec::via_port(Ipv4Net::from(gateway.gateway_ip), peer.id),
        )
        .await?;
        self.ensure_route(
            router,
            &RouteSpec::via_port(DEFAULT_ROUTE, port.id).with_gateway(link.peer_address),
        )
        .await?;
        self.ensure_rule(chains.inbound.id, &snat.inbound).await?;
        self.ensure_rule(chains.outbound.id, &snat.outbound).await?;
        info!("Router {router} goes out through {} as {}", port.id, gateway.gateway_ip);
        Ok(port)
    }

    /// Undo [`Orchestrator::set_router_gateway`]. Pieces already gone are reported, not fatal.
    #[tracing::instrument(skip(self))]
    pub async fn clear_router_gateway(
        &self,
        tenant: &TenantId,
        router: RouterId,
    ) -> TopologyResult<CleanupReport> {
        let link = self.config.gateway_link;
        let client = self.client.as_ref();
        let mut report = CleanupReport::new();

        match port_with_address(client, PortDevice::Router(router), link.tenant_address, link.network)
            .await?
        {
            Some(port) => {
                if let Some(peer) = port.peer_id
                    && let Some(peer) = report.tolerate("get gateway peer", client.get_port(peer).await)?
                    && let Some(provider) = peer.router_id()
                {
                    delete_routes_via(client, provider, peer.id, &mut report).await?;
                }
                delete_routes_via(client, router, port.id, &mut report).await?;
                destroy_link(client, &port, &mut report).await?;
            }
            None => report.absent("delete gateway link", ResourceKind::Port, link.tenant_address),
        }

        match self.locator.get_router_chains(tenant, router).await {
            Ok(chains) => {
                let tag = router.to_string();
                for chain in [chains.inbound.id, chains.outbound.id] {
                    self.delete_tagged_rules(chain, OS_TENANT_ROUTER_SNAT, &tag, &mut report)
                        .await?;
                }
            }
            Err(TopologyError::ResourceNotFound { kind, id }) => {
                warn!("No chains to clean up for router {router}");
                report.absent("delete gateway SNAT rules", kind, id);
            }
            Err(e) => return Err(e),
        }
        Ok(report)
    }

    /// Link `router` to the bridge port created for the interface and route the subnet to it.
    ///
    /// Returns the router end of the link.
    #[tracing::instrument(skip(self))]
    pub async fn add_router_interface(&self, interface: &RouterInterface) -> TopologyResult<Port> {
        let client = self.client.as_ref();
        let bridge_port = client.get_port(interface.bridge_port).await?;
        if bridge_port.bridge_id().is_none() || !bridge_port.is_interior() {
            return Err(TopologyError::UnsupportedConfiguration(format!(
                "port {} is not an interior bridge port",
                bridge_port.id
            )));
        }

        let router_port = match bridge_port.peer_id {
            Some(peer) => {
                let peer = client.get_port(peer).await?;
                if peer.router_id() != Some(interface.router) {
                    return Err(TopologyError::OutOfSync(format!(
                        "port {} is already linked to {:?}",
                        bridge_port.id, peer.device
                    )));
                }
                peer
            }
            None => {
                let spec = PortSpec::interior().with_address(interface.gateway_ip, interface.subnet);
                let mut port = client.create_router_port(interface.router, &spec).await?;
                if let Err(e) = client.link_ports(port.id, bridge_port.id).await {
                    warn!("Could not link port {} to port {}: {e}", port.id, bridge_port.id);
                    if let Err(rollback) = client.delete_port(port.id).await {
                        warn!("Could not delete port {}: {rollback}", port.id);
                    }
                    return Err(e.into());
                }
                port.peer_id = Some(bridge_port.id);
                port
            }
        };
        self.ensure_route(
            interface.router,
            &RouteSpec::via_port(interface.subnet, router_port.id),
        )
        .await?;
        info!(
            "Router {} serves {} through port {}",
            interface.router, interface.subnet, router_port.id
        );
        Ok(router_port)
    }

    /// Undo [`Orchestrator::add_router_interface`]: the route, the link and the router port go,
    /// the bridge port stays for its own port deletion, as in [`Orchestrator::delete_router`].
    #[tracing::instrument(skip(self))]
    pub async fn remove_router_interface(
        &self,
        router: RouterId,
        bridge_port: PortId,
    ) -> TopologyResult<CleanupReport> {
        let client = self.client.as_ref();
        let mut report = CleanupReport::new();
        let Some(bridge_port) =
            report.tolerate("get interface port", client.get_port(bridge_port).await)?
        else {
            return Ok(report);
        };
        let Some(peer) = bridge_port.peer_id else {
            report.absent("unlink interface", ResourceKind::Port, bridge_port.id);
            return Ok(report);
        };
        let Some(router_port) = report.tolerate("get router port", client.get_port(peer).await)?
        else {
            return Ok(report);
        };
        if router_port.router_id() != Some(router) {
            return Err(TopologyError::OutOfSync(format!(
                "port {} is linked to {:?}, not to router {router}",
                bridge_port.id, router_port.device
            )));
        }
        delete_routes_via(client, router, router_port.id, &mut report).await?;
        report.tolerate("unlink interface", client.unlink_port(router_port.id).await)?;
        report.tolerate("delete router port", client.delete_port(router_port.id).await)?;
        Ok(report)
    }
}
