// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The metadata router and bridge.
//!
//! ```text
//!  tenant routers ── metadata router ── metadata bridge ── exterior port (metadata service)
//!                    169.254.169.253/16
//! ```

use crate::errors::{CleanupReport, TopologyError, TopologyResult};
use crate::links::{create_port, expect_interior_on, port_with_address};
use crate::locator::{Locator, RouterChains};
use crate::synth::{metadata_nat_rules, realizes};
use controller::client::ControllerClient;
use controller::model::{
    Bridge, ChainId, NamedSpec, Port, PortDevice, PortSpec, ResourceKind, RouteSpec, Router,
    RuleSpec, TenantId,
};
use ipnet::Ipv4Net;
use rekon::{Locate, Located, Remove};
use tracing::{debug, info};

/// What [`Locator::ensure_metadata_devices`] found or created.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetadataDevices {
    pub router: Located<Router>,
    pub bridge: Located<Bridge>,
    pub chains: RouterChains,
    /// The metadata router end of the router-bridge link
    pub router_port: Port,
    /// The metadata bridge end of the router-bridge link
    pub bridge_port: Port,
    /// Where the metadata service plugs in
    pub exterior_port: Port,
}

impl<C: ControllerClient> Locator<C> {
    fn metadata_specs(&self, provider_tenant: &TenantId) -> (NamedSpec, NamedSpec) {
        let metadata = &self.config.metadata;
        (
            NamedSpec::new(provider_tenant.clone(), metadata.router_name.as_str()),
            NamedSpec::new(provider_tenant.clone(), metadata.bridge_name.as_str()),
        )
    }

    async fn ensure_rule(&self, chain: ChainId, spec: &RuleSpec) -> TopologyResult<()> {
        let rules = self.client.list_rules(chain).await?;
        if !rules.iter().any(|rule| realizes(rule, spec)) {
            self.client.create_rule(chain, spec).await?;
            debug!("Created {} rule in chain {chain}", spec.action);
        }
        Ok(())
    }

    /// Find or create the metadata router, the metadata bridge, the link between them and the
    /// exterior port of the bridge.
    ///
    /// Each piece is searched for before being created: after an interrupted run, only the
    /// missing pieces are created.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn ensure_metadata_devices(
        &self,
        provider_tenant: &TenantId,
    ) -> TopologyResult<MetadataDevices> {
        let metadata = &self.config.metadata;
        let client = self.client.as_ref();
        let (router_spec, bridge_spec) = self.metadata_specs(provider_tenant);

        let router = self.ensure_named::<Router>(&router_spec).await?;
        let router_id = router.resource().id;
        let router_device = PortDevice::Router(router_id);

        let router_port = match port_with_address(
            client,
            router_device,
            metadata.port_address,
            metadata.port_network,
        )
        .await?
        {
            Some(port) => {
                expect_interior_on(&port, router_device)?;
                port
            }
            None => {
                let spec =
                    PortSpec::interior().with_address(metadata.port_address, metadata.port_network);
                create_port(client, router_device, &spec).await?
            }
        };

        let service = RouteSpec::via_port(Ipv4Net::from(metadata.service_address), router_port.id);
        if !client
            .list_routes(router_id)
            .await?
            .iter()
            .any(|route| route.is(&service))
        {
            client.create_route(router_id, &service).await?;
        }

        let chains = self.create_router_chains(provider_tenant, router_id).await?;
        let nat = metadata_nat_rules(metadata);
        self.ensure_rule(chains.inbound.id, &nat.inbound).await?;
        self.ensure_rule(chains.outbound.id, &nat.outbound).await?;

        let bridge = self.ensure_named::<Bridge>(&bridge_spec).await?;
        let bridge_device = PortDevice::Bridge(bridge.resource().id);
        let bridge_ports = client.list_bridge_ports(bridge.resource().id).await?;

        let (router_port, bridge_port) = match router_port.peer_id {
            Some(peer) => {
                let peer = client.get_port(peer).await?;
                if peer.device != bridge_device {
                    return Err(TopologyError::OutOfSync(format!(
                        "metadata router port {} is linked to {:?}, not to the metadata bridge",
                        router_port.id, peer.device
                    )));
                }
                (router_port, peer)
            }
            None => {
                // reuse a bridge port left unlinked by an interrupted run
                let mut bridge_port = match bridge_ports
                    .iter()
                    .find(|p| p.is_interior() && !p.is_linked())
                {
                    Some(port) => port.clone(),
                    None => create_port(client, bridge_device, &PortSpec::interior()).await?,
                };
                client.link_ports(router_port.id, bridge_port.id).await?;
                bridge_port.peer_id = Some(router_port.id);
                let mut router_port = router_port;
                router_port.peer_id = Some(bridge_port.id);
                (router_port, bridge_port)
            }
        };

        let exterior_port = match bridge_ports.iter().find(|p| p.is_exterior()) {
            Some(port) => port.clone(),
            None => create_port(client, bridge_device, &PortSpec::exterior()).await?,
        };

        info!(
            "Metadata devices ready: router {router_id}, bridge {}",
            bridge.resource().id
        );
        Ok(MetadataDevices {
            router,
            bridge,
            chains,
            router_port,
            bridge_port,
            exterior_port,
        })
    }

    /// Delete everything [`Locator::ensure_metadata_devices`] creates.
    ///
    /// Links from tenant routers to the metadata router are broken and their ports deleted too.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn remove_metadata_devices(
        &self,
        provider_tenant: &TenantId,
    ) -> TopologyResult<CleanupReport> {
        let mut report = CleanupReport::new();
        let (router_spec, bridge_spec) = self.metadata_specs(provider_tenant);

        let routers = self.manager::<Router>().locate(&router_spec).await?;
        if routers.is_empty() {
            report.absent("delete metadata router", ResourceKind::Router, &router_spec.name);
        }
        for router in routers {
            report.merge(self.unlink_router(router.id).await?);
            report.merge(self.delete_router_chains(provider_tenant, router.id).await?);
            report.tolerate(
                "delete metadata router",
                self.manager::<Router>().remove(&router).await,
            )?;
        }

        let bridges = self.manager::<Bridge>().locate(&bridge_spec).await?;
        if bridges.is_empty() {
            report.absent("delete metadata bridge", ResourceKind::Bridge, &bridge_spec.name);
        }
        for bridge in bridges {
            report.tolerate(
                "delete metadata bridge",
                self.manager::<Bridge>().remove(&bridge).await,
            )?;
        }
        Ok(report)
    }
}
