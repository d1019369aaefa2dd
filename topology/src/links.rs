// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Port and link plumbing shared by the locator and the orchestrator.

use crate::errors::{CleanupReport, TopologyError, TopologyResult};
use controller::client::{ClientResult, ControllerClient};
use controller::model::{Port, PortDevice, PortId, PortSpec, ResourceKind, RouteSpec, RouterId};
use ipnet::Ipv4Net;
use tracing::{debug, warn};

pub async fn create_port<C: ControllerClient>(
    client: &C,
    device: PortDevice,
    spec: &PortSpec,
) -> ClientResult<Port> {
    match device {
        PortDevice::Router(router) => client.create_router_port(router, spec).await,
        PortDevice::Bridge(bridge) => client.create_bridge_port(bridge, spec).await,
    }
}

pub async fn list_ports<C: ControllerClient>(client: &C, device: PortDevice) -> ClientResult<Vec<Port>> {
    match device {
        PortDevice::Router(router) => client.list_router_ports(router).await,
        PortDevice::Bridge(bridge) => client.list_bridge_ports(bridge).await,
    }
}

/// One end of a link to be created.
#[derive(Clone, Copy, Debug)]
pub struct LinkEnd {
    pub device: PortDevice,
    pub spec: PortSpec,
}

impl LinkEnd {
    #[must_use]
    pub fn new(device: PortDevice, spec: PortSpec) -> Self {
        Self { device, spec }
    }
}

/// Create an interior port on each side and link them. Returns `(near, far)` as linked.
///
/// On failure the ports created so far are deleted again.
pub async fn create_link<C: ControllerClient>(
    client: &C,
    near: LinkEnd,
    far: LinkEnd,
) -> TopologyResult<(Port, Port)> {
    let mut near_port = create_port(client, near.device, &near.spec).await?;
    let mut far_port = match create_port(client, far.device, &far.spec).await {
        Ok(port) => port,
        Err(e) => {
            warn!("Could not create the far end of a link from {:?}: {e}", near.device);
            roll_back_ports(client, &[near_port.id]).await;
            return Err(e.into());
        }
    };
    if let Err(e) = client.link_ports(near_port.id, far_port.id).await {
        warn!("Could not link port {} to port {}: {e}", near_port.id, far_port.id);
        roll_back_ports(client, &[far_port.id, near_port.id]).await;
        return Err(e.into());
    }
    near_port.peer_id = Some(far_port.id);
    far_port.peer_id = Some(near_port.id);
    debug!(
        "Linked port {} of {:?} to port {} of {:?}",
        near_port.id, near.device, far_port.id, far.device
    );
    Ok((near_port, far_port))
}

async fn roll_back_ports<C: ControllerClient>(client: &C, ports: &[PortId]) {
    for port in ports {
        if let Err(e) = client.delete_port(*port).await {
            warn!("Could not delete port {port}: {e}");
        }
    }
}

/// The linked ports of `device` whose peer sits on `peer_device`, as `(near, far)` pairs.
pub async fn links_towards<C: ControllerClient>(
    client: &C,
    device: PortDevice,
    peer_device: PortDevice,
) -> TopologyResult<Vec<(Port, Port)>> {
    let mut pairs = Vec::new();
    for port in list_ports(client, device).await? {
        let Some(peer_id) = port.peer_id else {
            continue;
        };
        let peer = client.get_port(peer_id).await?;
        if peer.device == peer_device {
            pairs.push((port, peer));
        }
    }
    Ok(pairs)
}

/// The port of `device` holding `address` on `network`, if any.
pub async fn port_with_address<C: ControllerClient>(
    client: &C,
    device: PortDevice,
    address: std::net::Ipv4Addr,
    network: Ipv4Net,
) -> TopologyResult<Option<Port>> {
    Ok(list_ports(client, device)
        .await?
        .into_iter()
        .find(|p| p.has_address(address, network)))
}

/// Create the route `spec` in `router` unless it is already there.
pub async fn ensure_route<C: ControllerClient>(
    client: &C,
    router: RouterId,
    spec: &RouteSpec,
) -> TopologyResult<()> {
    let routes = client.list_routes(router).await?;
    if !routes.iter().any(|r| r.is(spec)) {
        client.create_route(router, spec).await?;
    }
    Ok(())
}

/// Delete every route of `router` which forwards through `port`.
pub async fn delete_routes_via<C: ControllerClient>(
    client: &C,
    router: RouterId,
    port: PortId,
    report: &mut CleanupReport,
) -> TopologyResult<usize> {
    let mut deleted = 0;
    for route in client.list_routes(router).await? {
        if route.next_hop_port == Some(port)
            && report
                .tolerate("delete route", client.delete_route(route.id).await)?
                .is_some()
        {
            deleted += 1;
        }
    }
    Ok(deleted)
}

/// Unlink `port` and delete both of its ends.
///
/// Unlinking comes first: the controller refuses to delete a linked port.
pub async fn destroy_link<C: ControllerClient>(
    client: &C,
    port: &Port,
    report: &mut CleanupReport,
) -> TopologyResult<()> {
    match port.peer_id {
        Some(peer) => {
            report.tolerate("unlink port", client.unlink_port(port.id).await)?;
            report.tolerate("delete peer port", client.delete_port(peer).await)?;
        }
        None => report.absent("unlink port", ResourceKind::Port, port.id),
    }
    report.tolerate("delete port", client.delete_port(port.id).await)?;
    Ok(())
}

/// Fail unless `port` is an interior port of `device`.
pub(crate) fn expect_interior_on(port: &Port, device: PortDevice) -> TopologyResult<()> {
    if port.device != device || !port.is_interior() {
        return Err(TopologyError::OutOfSync(format!(
            "port {} is not an interior port of {device:?}",
            port.id
        )));
    }
    Ok(())
}
