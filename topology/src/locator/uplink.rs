// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! A fake uplink for single host deployments: an exterior port of the provider router bound to a
//! local interface, with a default route through it.

use crate::errors::{CleanupReport, TopologyResult};
use crate::links::{delete_routes_via, port_with_address};
use crate::locator::Locator;
use controller::client::ControllerClient;
use controller::model::{HostId, Port, PortDevice, PortSpec, ResourceKind, RouteSpec, TenantId};
use ipnet::Ipv4Net;
use std::net::Ipv4Addr;
use tracing::info;

pub const FAKE_UPLINK_NETWORK: Ipv4Net = Ipv4Net::new_assert(Ipv4Addr::new(100, 100, 100, 0), 24);
pub const FAKE_UPLINK_ADDRESS: Ipv4Addr = Ipv4Addr::new(100, 100, 100, 1);
pub const FAKE_UPLINK_GATEWAY: Ipv4Addr = Ipv4Addr::new(100, 100, 100, 2);

const DEFAULT_ROUTE: Ipv4Net = Ipv4Net::new_assert(Ipv4Addr::UNSPECIFIED, 0);

impl<C: ControllerClient> Locator<C> {
    /// Give the provider router an uplink through `interface` of `host`.
    ///
    /// The provider router must already exist.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn setup_fake_uplink(
        &self,
        provider_tenant: &TenantId,
        host: HostId,
        interface: &str,
    ) -> TopologyResult<Port> {
        let client = self.client.as_ref();
        let provider = self.get_provider_router(provider_tenant).await?;
        let device = PortDevice::Router(provider.id);

        let port = match port_with_address(client, device, FAKE_UPLINK_ADDRESS, FAKE_UPLINK_NETWORK)
            .await?
        {
            Some(port) => port,
            None => {
                let spec = PortSpec::exterior().with_address(FAKE_UPLINK_ADDRESS, FAKE_UPLINK_NETWORK);
                client.create_router_port(provider.id, &spec).await?
            }
        };

        if !client
            .list_host_interface_ports(host)
            .await?
            .iter()
            .any(|binding| binding.port_id == port.id)
        {
            client.bind_host_interface(host, port.id, interface).await?;
        }

        let route = RouteSpec::via_port(DEFAULT_ROUTE, port.id)
            .with_gateway(FAKE_UPLINK_GATEWAY)
            .with_weight(RouteSpec::DEFAULT_WEIGHT);
        if !client
            .list_routes(provider.id)
            .await?
            .iter()
            .any(|r| r.is(&route))
        {
            client.create_route(provider.id, &route).await?;
        }

        info!("Fake uplink port {} bound to {interface} on host {host}", port.id);
        Ok(port)
    }

    /// Delete the fake uplink port and its default route.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn remove_fake_uplink(&self, provider_tenant: &TenantId) -> TopologyResult<CleanupReport> {
        let client = self.client.as_ref();
        let mut report = CleanupReport::new();
        let provider = self.get_provider_router(provider_tenant).await?;
        let device = PortDevice::Router(provider.id);
        match port_with_address(client, device, FAKE_UPLINK_ADDRESS, FAKE_UPLINK_NETWORK).await? {
            Some(port) => {
                delete_routes_via(client, provider.id, port.id, &mut report).await?;
                report.tolerate("delete uplink port", client.delete_port(port.id).await)?;
            }
            None => report.absent("delete uplink port", ResourceKind::Port, FAKE_UPLINK_ADDRESS),
        }
        Ok(report)
    }
}
