// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Networks (bridges), subnets (DHCP subnets, optionally routed from the provider router) and
//! ports.

use crate::errors::{CleanupReport, TopologyError, TopologyResult};
use crate::lifecycle::Orchestrator;
use crate::links::{LinkEnd, create_link, delete_routes_via, destroy_link, links_towards};
use crate::request::{DeviceOwner, NetworkRequest, NetworkUpdate, PortRequest, SubnetRequest};
use controller::client::ControllerClient;
use controller::model::{
    Bridge, BridgeId, BridgeSpec, DhcpHost, DhcpSubnet, DhcpSubnetSpec, Port, PortDevice, PortId,
    PortSpec, ResourceKind, RouteSpec, VifId,
};
use ipnet::{IpNet, Ipv4Net};
use mac_address::MacAddress;
use std::net::Ipv4Addr;
use tracing::{info, warn};

impl<C: ControllerClient> Orchestrator<C> {
    /// Create the bridge of a network.
    ///
    /// A network created administratively down is created up, with a warning.
    #[tracing::instrument(skip(self))]
    pub async fn create_network(&self, request: &NetworkRequest) -> TopologyResult<Bridge> {
        if !request.admin_state_up {
            warn!("Ignoring admin_state_up=false for network '{}'", request.name);
        }
        let bridge = self
            .client
            .create_bridge(&BridgeSpec::new(request.tenant_id.clone(), request.name.as_str()))
            .await?;
        info!("Created bridge {} for network '{}'", bridge.id, request.name);
        Ok(bridge)
    }

    /// The bridge of a network, which must exist.
    pub async fn get_network(&self, network: BridgeId) -> TopologyResult<Bridge> {
        Ok(self.client.get_bridge(network).await?)
    }

    /// Rename a network. Networks can not be put administratively down.
    #[tracing::instrument(skip(self))]
    pub async fn update_network(
        &self,
        network: BridgeId,
        update: &NetworkUpdate,
    ) -> TopologyResult<Bridge> {
        if update.admin_state_up == Some(false) {
            return Err(TopologyError::UnsupportedConfiguration(
                "admin_state_up=false networks are not supported".to_string(),
            ));
        }
        let mut bridge = self.client.get_bridge(network).await?;
        if let Some(name) = &update.name
            && *name != bridge.name
        {
            bridge.name.clone_from(name);
            self.client.update_bridge(&bridge).await?;
        }
        Ok(bridge)
    }

    /// Delete the bridge of a network, with its ports and DHCP configuration.
    #[tracing::instrument(skip(self))]
    pub async fn delete_network(&self, network: BridgeId) -> TopologyResult<()> {
        self.client.delete_bridge(network).await?;
        info!("Deleted bridge {network}");
        Ok(())
    }

    /// Add the one subnet a network may have.
    ///
    /// Re-running with the prefix the network already has completes what a previous run left
    /// undone. Any other prefix is refused.
    #[tracing::instrument(skip(self))]
    pub async fn create_subnet(&self, request: &SubnetRequest) -> TopologyResult<DhcpSubnet> {
        let IpNet::V4(cidr) = request.cidr else {
            return Err(TopologyError::UnsupportedConfiguration(format!(
                "IPv6 subnet {} is not supported",
                request.cidr
            )));
        };
        let cidr = cidr.trunc();
        let gateway = request
            .gateway_ip
            .unwrap_or_else(|| cidr.hosts().next().unwrap_or(cidr.network()));
        if !cidr.contains(&gateway) {
            return Err(TopologyError::UnsupportedConfiguration(format!(
                "gateway {gateway} is outside of {cidr}"
            )));
        }

        let existing = self.client.list_dhcp_subnets(request.network).await?;
        let subnet = match existing.into_iter().next() {
            Some(subnet) if subnet.prefix == cidr => subnet,
            Some(subnet) => {
                return Err(TopologyError::UnsupportedConfiguration(format!(
                    "network {} already has subnet {}, only one subnet per network is supported",
                    request.network, subnet.prefix
                )));
            }
            None => {
                self.client
                    .create_dhcp_subnet(request.network, &DhcpSubnetSpec::new(cidr, gateway))
                    .await?
            }
        };

        if request.external {
            self.route_from_provider(request.network, cidr, subnet.default_gateway)
                .await?;
        }
        info!("Subnet {cidr} ready on bridge {}", request.network);
        Ok(subnet)
    }

    /// Link the provider router into `network` and route `cidr` through the link.
    async fn route_from_provider(
        &self,
        network: BridgeId,
        cidr: Ipv4Net,
        gateway: Ipv4Addr,
    ) -> TopologyResult<()> {
        let provider = self
            .locator
            .get_or_create_provider_router(&self.provider_tenant())
            .await?
            .into_resource();
        let provider_device = PortDevice::Router(provider.id);
        let bridge_device = PortDevice::Bridge(network);

        let port = match links_towards(self.client.as_ref(), provider_device, bridge_device)
            .await?
            .into_iter()
            .next()
        {
            Some((port, _)) => port,
            None => {
                let (port, _) = create_link(
                    self.client.as_ref(),
                    LinkEnd::new(
                        provider_device,
                        PortSpec::interior().with_address(gateway, cidr),
                    ),
                    LinkEnd::new(bridge_device, PortSpec::interior()),
                )
                .await?;
                port
            }
        };
        self.ensure_route(provider.id, &RouteSpec::via_port(cidr, port.id))
            .await
    }

    /// Check that the bridge of a network carries the subnet `cidr`.
    pub async fn verify_subnet(&self, network: BridgeId, cidr: Ipv4Net) -> TopologyResult<DhcpSubnet> {
        let subnets = match self.client.list_dhcp_subnets(network).await {
            Ok(subnets) => subnets,
            Err(e) if e.is_not_found() => {
                return Err(TopologyError::OutOfSync(format!("bridge {network} is missing")));
            }
            Err(e) => return Err(e.into()),
        };
        subnets
            .into_iter()
            .find(|s| s.prefix == cidr.trunc())
            .ok_or_else(|| {
                TopologyError::OutOfSync(format!("bridge {network} has no subnet {cidr}"))
            })
    }

    /// Delete the subnet of a network, and its link to the provider router if it is external.
    ///
    /// Routes go before the link, and the link before its ports.
    #[tracing::instrument(skip(self))]
    pub async fn delete_subnet(
        &self,
        network: BridgeId,
        cidr: Ipv4Net,
        external: bool,
    ) -> TopologyResult<CleanupReport> {
        let mut report = CleanupReport::new();
        report.tolerate(
            "delete DHCP subnet",
            self.client.delete_dhcp_subnet(network, cidr.trunc()).await,
        )?;
        if !external {
            return Ok(report);
        }
        let Some(provider) = self
            .locator
            .find_provider_router(&self.provider_tenant())
            .await?
        else {
            report.absent(
                "unlink provider router",
                ResourceKind::Router,
                &self.config.provider.router_name,
            );
            return Ok(report);
        };
        let pairs = links_towards(
            self.client.as_ref(),
            PortDevice::Router(provider.id),
            PortDevice::Bridge(network),
        )
        .await?;
        if pairs.is_empty() {
            report.absent("unlink provider router", ResourceKind::Port, network);
        }
        for (port, _) in pairs {
            delete_routes_via(self.client.as_ref(), provider.id, port.id, &mut report).await?;
            destroy_link(self.client.as_ref(), &port, &mut report).await?;
        }
        Ok(report)
    }

    /// Create the bridge port of an OpenStack port.
    ///
    /// * compute ports get an exterior port and a static DHCP lease in the network subnet
    /// * router interface, router gateway and floating IP ports get an interior port, to be
    ///   linked to a router later
    /// * anything else gets an exterior port without DHCP lease
    ///
    /// If the lease can not be added, the port is deleted again.
    #[tracing::instrument(skip(self))]
    pub async fn create_port(&self, request: &PortRequest) -> TopologyResult<Port> {
        match &request.device_owner {
            DeviceOwner::Compute(_) => self.create_compute_port(request).await,
            owner if owner.is_router_side() => Ok(self
                .client
                .create_bridge_port(request.network, &PortSpec::interior())
                .await?),
            _ => Ok(self
                .client
                .create_bridge_port(request.network, &PortSpec::exterior())
                .await?),
        }
    }

    async fn create_compute_port(&self, request: &PortRequest) -> TopologyResult<Port> {
        let ip = request.fixed_ip.ok_or_else(|| {
            TopologyError::UnsupportedConfiguration("compute port without a fixed IP".to_string())
        })?;
        let subnets = self.client.list_dhcp_subnets(request.network).await?;
        let subnet = subnets
            .iter()
            .find(|s| s.prefix.contains(&ip))
            .or_else(|| subnets.first())
            .ok_or_else(|| TopologyError::not_found(ResourceKind::DhcpSubnet, request.network))?;

        let port = self
            .client
            .create_bridge_port(request.network, &PortSpec::exterior())
            .await?;
        let lease = DhcpHost::new(request.mac, ip);
        if let Err(e) = self
            .client
            .create_dhcp_host(request.network, subnet.prefix, &lease)
            .await
        {
            warn!("Could not add DHCP host {} / {ip}, deleting port {}: {e}", request.mac, port.id);
            if let Err(rollback) = self.client.delete_port(port.id).await {
                warn!("Could not delete port {}: {rollback}", port.id);
            }
            return Err(e.into());
        }
        info!("Created port {} for {} / {ip}", port.id, request.mac);
        Ok(port)
    }

    /// Delete a bridge port and its DHCP lease, the host entry holding both `mac` and `fixed_ip`.
    ///
    /// A port without a fixed IP never had a lease.
    #[tracing::instrument(skip(self))]
    pub async fn delete_port(
        &self,
        network: BridgeId,
        port: PortId,
        mac: MacAddress,
        fixed_ip: Option<Ipv4Addr>,
    ) -> TopologyResult<CleanupReport> {
        let mut report = CleanupReport::new();
        if let Some(ip) = fixed_ip
            && let Some(subnets) =
                report.tolerate("list DHCP subnets", self.client.list_dhcp_subnets(network).await)?
        {
            let mut deleted = 0;
            for subnet in subnets.iter().filter(|s| s.prefix.contains(&ip)) {
                let hosts = self.client.list_dhcp_hosts(network, subnet.prefix).await?;
                for host in hosts.iter().filter(|h| h.mac == mac && h.ip == ip) {
                    if report
                        .tolerate(
                            "delete DHCP host",
                            self.client
                                .delete_dhcp_host(network, subnet.prefix, host.mac)
                                .await,
                        )?
                        .is_some()
                    {
                        deleted += 1;
                    }
                }
            }
            if deleted == 0 {
                report.absent("delete DHCP host", ResourceKind::DhcpHost, format!("{mac} / {ip}"));
            }
        }
        report.tolerate("delete port", self.client.delete_port(port).await)?;
        Ok(report)
    }

    /// Plug `vif` into the exterior port `port`.
    pub async fn attach_vif(&self, port: PortId, vif: VifId) -> TopologyResult<Port> {
        let mut stored = self.client.get_port(port).await?;
        if stored.vif_id != Some(vif) {
            stored.vif_id = Some(vif);
            self.client.update_port(&stored).await?;
            info!("Attached vif {vif} to port {port}");
        }
        Ok(stored)
    }

    pub async fn detach_vif(&self, port: PortId) -> TopologyResult<Port> {
        let mut stored = self.client.get_port(port).await?;
        if stored.vif_id.take().is_some() {
            self.client.update_port(&stored).await?;
            info!("Detached vif from port {port}");
        }
        Ok(stored)
    }
}
