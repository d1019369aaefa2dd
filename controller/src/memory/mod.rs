// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! A controller held entirely in process memory.
//!
//! [`InMemoryController`] enforces the same referential rules as a real controller (links are
//! interior-only, linked ports can not be deleted, deleting a device cascades to what it owns) so
//! that reconciliation logic can be exercised, and its effects compared, without a network.

mod snapshot;

pub use snapshot::{DhcpEntry, TopologySnapshot};

use crate::client::{ClientResult, ControllerClient};
use crate::errors::ClientError;
use crate::model::{
    Bridge, BridgeId, BridgeSpec, Chain, ChainId, ChainSpec, DhcpHost, DhcpSubnet, DhcpSubnetSpec,
    HostId, HostInterfacePort, MultiIndexBridgeMap, MultiIndexChainMap, MultiIndexPortGroupMap,
    MultiIndexPortMap, MultiIndexRouteMap, MultiIndexRouterMap, MultiIndexRuleMap, Port,
    PortDevice, PortGroup, PortGroupId, PortGroupSpec, PortId, PortKind, PortSpec, ResourceKind,
    Route, RouteId, RouteSpec, Router, RouterId, RouterSpec, Rule, RuleAction, RuleId, RuleSpec,
    TenantId,
};
use ipnet::Ipv4Net;
use mac_address::MacAddress;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, trace};

#[derive(Debug, Default)]
struct Tables {
    routers: MultiIndexRouterMap,
    bridges: MultiIndexBridgeMap,
    ports: MultiIndexPortMap,
    routes: MultiIndexRouteMap,
    chains: MultiIndexChainMap,
    rules: MultiIndexRuleMap,
    rule_order: HashMap<ChainId, Vec<RuleId>>,
    port_groups: MultiIndexPortGroupMap,
    dhcp: HashMap<BridgeId, Vec<DhcpEntry>>,
    host_ports: Vec<HostInterfacePort>,
    /// Pending injected failures: the kind, and how many creates of it still succeed first.
    failures: Vec<(ResourceKind, usize)>,
}

/// An in-process [`ControllerClient`].
#[derive(Debug, Default)]
pub struct InMemoryController {
    tables: Mutex<Tables>,
    creates: AtomicUsize,
}

fn sorted_by_id<T: Clone, K: Ord>(items: Vec<&T>, key: impl Fn(&T) -> K) -> Vec<T> {
    let mut items: Vec<T> = items.into_iter().cloned().collect();
    items.sort_by_key(key);
    items
}

impl InMemoryController {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a controller from a previously taken snapshot.
    pub fn from_snapshot(snapshot: TopologySnapshot) -> Result<Self, ClientError> {
        let tables = Tables::restore(snapshot)?;
        Ok(Self {
            tables: Mutex::new(tables),
            creates: AtomicUsize::new(0),
        })
    }

    /// Capture the whole state.
    #[must_use]
    pub fn snapshot(&self) -> TopologySnapshot {
        self.tables.lock().snapshot()
    }

    /// Number of successful create (and bind) calls served so far.
    #[must_use]
    pub fn create_count(&self) -> usize {
        self.creates.load(Ordering::Relaxed)
    }

    /// Make the next create of an object of type `kind` fail with a transport error.
    pub fn fail_next_create(&self, kind: ResourceKind) {
        self.fail_create_after(kind, 0);
    }

    /// Let `successes` creates of an object of type `kind` through, then fail the next one.
    pub fn fail_create_after(&self, kind: ResourceKind, successes: usize) {
        self.tables.lock().failures.push((kind, successes));
    }

    fn read<R>(&self, f: impl FnOnce(&Tables) -> ClientResult<R>) -> ClientResult<R> {
        f(&self.tables.lock())
    }

    fn write<R>(&self, f: impl FnOnce(&mut Tables) -> ClientResult<R>) -> ClientResult<R> {
        f(&mut self.tables.lock())
    }

    fn create<R>(
        &self,
        kind: ResourceKind,
        f: impl FnOnce(&mut Tables) -> ClientResult<R>,
    ) -> ClientResult<R> {
        let mut tables = self.tables.lock();
        if let Some(at) = tables.failures.iter().position(|(k, _)| *k == kind) {
            if tables.failures[at].1 == 0 {
                tables.failures.remove(at);
                return Err(ClientError::Transport(format!(
                    "injected failure while creating a {kind}"
                )));
            }
            tables.failures[at].1 -= 1;
        }
        let created = f(&mut tables)?;
        self.creates.fetch_add(1, Ordering::Relaxed);
        trace!("created {kind}");
        Ok(created)
    }
}

impl Tables {
    /* lookups */

    fn router(&self, id: RouterId) -> ClientResult<&Router> {
        self.routers
            .get_by_id(&id)
            .ok_or_else(|| ClientError::not_found(ResourceKind::Router, id))
    }

    fn bridge(&self, id: BridgeId) -> ClientResult<&Bridge> {
        self.bridges
            .get_by_id(&id)
            .ok_or_else(|| ClientError::not_found(ResourceKind::Bridge, id))
    }

    fn port(&self, id: PortId) -> ClientResult<&Port> {
        self.ports
            .get_by_id(&id)
            .ok_or_else(|| ClientError::not_found(ResourceKind::Port, id))
    }

    fn chain(&self, id: ChainId) -> ClientResult<&Chain> {
        self.chains
            .get_by_id(&id)
            .ok_or_else(|| ClientError::not_found(ResourceKind::Chain, id))
    }

    fn port_group(&self, id: PortGroupId) -> ClientResult<&PortGroup> {
        self.port_groups
            .get_by_id(&id)
            .ok_or_else(|| ClientError::not_found(ResourceKind::PortGroup, id))
    }

    fn check_filters(&self, filters: [Option<ChainId>; 2]) -> ClientResult<()> {
        for chain in filters.into_iter().flatten() {
            self.chain(chain)?;
        }
        Ok(())
    }

    fn dhcp_entry(&self, bridge: BridgeId, prefix: Ipv4Net) -> ClientResult<&DhcpEntry> {
        self.dhcp
            .get(&bridge)
            .and_then(|entries| entries.iter().find(|e| e.subnet.prefix == prefix))
            .ok_or_else(|| ClientError::not_found(ResourceKind::DhcpSubnet, prefix))
    }

    fn dhcp_entry_mut(&mut self, bridge: BridgeId, prefix: Ipv4Net) -> ClientResult<&mut DhcpEntry> {
        self.dhcp
            .get_mut(&bridge)
            .and_then(|entries| entries.iter_mut().find(|e| e.subnet.prefix == prefix))
            .ok_or_else(|| ClientError::not_found(ResourceKind::DhcpSubnet, prefix))
    }

    /* stores */

    fn put_router(&mut self, router: Router) -> ClientResult<()> {
        let id = router.id;
        self.routers.remove_by_id(&id);
        self.routers
            .try_insert(router)
            .map(|_| ())
            .map_err(|_| ClientError::rejected(ResourceKind::Router, id, "duplicate id"))
    }

    fn put_port(&mut self, port: Port) -> ClientResult<()> {
        let id = port.id;
        self.ports.remove_by_id(&id);
        self.ports
            .try_insert(port)
            .map(|_| ())
            .map_err(|_| ClientError::rejected(ResourceKind::Port, id, "duplicate id"))
    }

    /* routers */

    fn create_router(&mut self, spec: &RouterSpec) -> ClientResult<Router> {
        let router = Router {
            id: RouterId::new(),
            tenant_id: spec.tenant_id.clone(),
            name: spec.name.clone(),
            inbound_filter_id: None,
            outbound_filter_id: None,
        };
        self.put_router(router.clone())?;
        debug!("created router {} '{}' for tenant {}", router.id, router.name, router.tenant_id);
        Ok(router)
    }

    fn update_router(&mut self, router: &Router) -> ClientResult<()> {
        self.router(router.id)?;
        self.check_filters([router.inbound_filter_id, router.outbound_filter_id])?;
        self.put_router(router.clone())
    }

    fn has_linked_port(&self, device: PortDevice) -> bool {
        self.ports
            .get_by_device(&device)
            .iter()
            .any(|port| port.is_linked())
    }

    fn drop_device_ports(&mut self, device: PortDevice) {
        for port in self.ports.remove_by_device(&device) {
            self.host_ports.retain(|binding| binding.port_id != port.id);
        }
    }

    fn delete_router(&mut self, id: RouterId) -> ClientResult<()> {
        self.router(id)?;
        if self.has_linked_port(PortDevice::Router(id)) {
            return Err(ClientError::rejected(
                ResourceKind::Router,
                id,
                "router still has linked ports",
            ));
        }
        self.routes.remove_by_router_id(&id);
        self.drop_device_ports(PortDevice::Router(id));
        self.routers.remove_by_id(&id);
        debug!("deleted router {id}");
        Ok(())
    }

    /* bridges */

    fn create_bridge(&mut self, spec: &BridgeSpec) -> ClientResult<Bridge> {
        let bridge = Bridge {
            id: BridgeId::new(),
            tenant_id: spec.tenant_id.clone(),
            name: spec.name.clone(),
        };
        self.bridges
            .try_insert(bridge.clone())
            .map_err(|_| ClientError::rejected(ResourceKind::Bridge, bridge.id, "duplicate id"))?;
        debug!("created bridge {} '{}'", bridge.id, bridge.name);
        Ok(bridge)
    }

    fn update_bridge(&mut self, bridge: &Bridge) -> ClientResult<()> {
        self.bridge(bridge.id)?;
        self.bridges.remove_by_id(&bridge.id);
        self.bridges
            .try_insert(bridge.clone())
            .map(|_| ())
            .map_err(|_| ClientError::rejected(ResourceKind::Bridge, bridge.id, "duplicate id"))
    }

    fn delete_bridge(&mut self, id: BridgeId) -> ClientResult<()> {
        self.bridge(id)?;
        if self.has_linked_port(PortDevice::Bridge(id)) {
            return Err(ClientError::rejected(
                ResourceKind::Bridge,
                id,
                "bridge still has linked ports",
            ));
        }
        self.drop_device_ports(PortDevice::Bridge(id));
        self.dhcp.remove(&id);
        self.bridges.remove_by_id(&id);
        debug!("deleted bridge {id}");
        Ok(())
    }

    /* ports */

    fn create_port(&mut self, device: PortDevice, spec: &PortSpec) -> ClientResult<Port> {
        match device {
            PortDevice::Router(router) => {
                self.router(router)?;
            }
            PortDevice::Bridge(bridge) => {
                self.bridge(bridge)?;
            }
        }
        let port = Port {
            id: PortId::new(),
            device,
            kind: spec.kind,
            address: spec.address,
            peer_id: None,
            vif_id: None,
            inbound_filter_id: None,
            outbound_filter_id: None,
            port_group_ids: Vec::new(),
        };
        self.put_port(port.clone())?;
        Ok(port)
    }

    fn list_ports(&self, device: PortDevice) -> Vec<Port> {
        sorted_by_id(self.ports.get_by_device(&device), |p| p.id)
    }

    fn update_port(&mut self, port: &Port) -> ClientResult<()> {
        let stored = self.port(port.id)?.clone();
        if port.vif_id.is_some() && stored.kind != PortKind::Exterior {
            return Err(ClientError::rejected(
                ResourceKind::Port,
                port.id,
                "only exterior ports can be bound to a vif",
            ));
        }
        self.check_filters([port.inbound_filter_id, port.outbound_filter_id])?;
        for group in &port.port_group_ids {
            self.port_group(*group)?;
        }
        let updated = Port {
            id: stored.id,
            device: stored.device,
            kind: stored.kind,
            address: stored.address,
            peer_id: stored.peer_id,
            vif_id: port.vif_id,
            inbound_filter_id: port.inbound_filter_id,
            outbound_filter_id: port.outbound_filter_id,
            port_group_ids: port.port_group_ids.clone(),
        };
        self.put_port(updated)
    }

    fn delete_port(&mut self, id: PortId) -> ClientResult<()> {
        if self.port(id)?.is_linked() {
            return Err(ClientError::rejected(
                ResourceKind::Port,
                id,
                "port is still linked",
            ));
        }
        let dangling: Vec<RouteId> = self
            .routes
            .iter()
            .filter(|(_, route)| route.next_hop_port == Some(id))
            .map(|(_, route)| route.id)
            .collect();
        for route in dangling {
            self.routes.remove_by_id(&route);
        }
        self.host_ports.retain(|binding| binding.port_id != id);
        self.ports.remove_by_id(&id);
        Ok(())
    }

    fn link_ports(&mut self, a: PortId, b: PortId) -> ClientResult<()> {
        if a == b {
            return Err(ClientError::rejected(
                ResourceKind::Port,
                a,
                "a port can not be linked to itself",
            ));
        }
        let mut first = self.port(a)?.clone();
        let mut second = self.port(b)?.clone();
        for port in [&first, &second] {
            if !port.is_interior() {
                return Err(ClientError::rejected(
                    ResourceKind::Port,
                    port.id,
                    "only interior ports can be linked",
                ));
            }
            if port.is_linked() {
                return Err(ClientError::rejected(
                    ResourceKind::Port,
                    port.id,
                    "port is already linked",
                ));
            }
        }
        first.peer_id = Some(b);
        second.peer_id = Some(a);
        self.put_port(first)?;
        self.put_port(second)?;
        debug!("linked ports {a} and {b}");
        Ok(())
    }

    fn unlink_port(&mut self, id: PortId) -> ClientResult<()> {
        let mut port = self.port(id)?.clone();
        let Some(peer) = port.peer_id.take() else {
            return Ok(());
        };
        self.put_port(port)?;
        if let Some(mut peer) = self.ports.get_by_id(&peer).cloned() {
            peer.peer_id = None;
            self.put_port(peer)?;
        }
        debug!("unlinked port {id}");
        Ok(())
    }

    /* routes */

    fn create_route(&mut self, router: RouterId, spec: &RouteSpec) -> ClientResult<Route> {
        self.router(router)?;
        if let Some(next_hop) = spec.next_hop_port
            && self.port(next_hop)?.router_id() != Some(router)
        {
            return Err(ClientError::rejected(
                ResourceKind::Route,
                spec.dst,
                "next hop port does not belong to the router",
            ));
        }
        let route = Route {
            id: RouteId::new(),
            router_id: router,
            kind: spec.kind,
            src: spec.src,
            dst: spec.dst,
            next_hop_port: spec.next_hop_port,
            next_hop_gateway: spec.next_hop_gateway,
            weight: spec.weight,
        };
        self.routes
            .try_insert(route.clone())
            .map_err(|_| ClientError::rejected(ResourceKind::Route, route.id, "duplicate id"))?;
        Ok(route)
    }

    fn delete_route(&mut self, id: RouteId) -> ClientResult<()> {
        self.routes
            .remove_by_id(&id)
            .map(|_| ())
            .ok_or_else(|| ClientError::not_found(ResourceKind::Route, id))
    }

    /* chains */

    fn create_chain(&mut self, spec: &ChainSpec) -> ClientResult<Chain> {
        let chain = Chain {
            id: ChainId::new(),
            tenant_id: spec.tenant_id.clone(),
            name: spec.name.clone(),
        };
        self.chains
            .try_insert(chain.clone())
            .map_err(|_| ClientError::rejected(ResourceKind::Chain, chain.id, "duplicate id"))?;
        self.rule_order.insert(chain.id, Vec::new());
        debug!("created chain {} '{}'", chain.id, chain.name);
        Ok(chain)
    }

    fn delete_chain(&mut self, id: ChainId) -> ClientResult<()> {
        self.chain(id)?;
        self.rules.remove_by_chain_id(&id);
        self.rule_order.remove(&id);
        self.chains.remove_by_id(&id);

        let clear = |slot: &mut Option<ChainId>| {
            if *slot == Some(id) {
                *slot = None;
            }
        };
        let routers: Vec<Router> = self
            .routers
            .iter()
            .map(|(_, r)| r)
            .filter(|r| r.inbound_filter_id == Some(id) || r.outbound_filter_id == Some(id))
            .cloned()
            .collect();
        for mut router in routers {
            clear(&mut router.inbound_filter_id);
            clear(&mut router.outbound_filter_id);
            self.put_router(router)?;
        }
        let ports: Vec<Port> = self
            .ports
            .iter()
            .map(|(_, p)| p)
            .filter(|p| p.inbound_filter_id == Some(id) || p.outbound_filter_id == Some(id))
            .cloned()
            .collect();
        for mut port in ports {
            clear(&mut port.inbound_filter_id);
            clear(&mut port.outbound_filter_id);
            self.put_port(port)?;
        }
        debug!("deleted chain {id}");
        Ok(())
    }

    /* rules */

    fn create_rule(&mut self, chain: ChainId, spec: &RuleSpec) -> ClientResult<Rule> {
        self.chain(chain)?;
        if spec.action == RuleAction::Jump {
            let target = spec.jump_chain_id.ok_or_else(|| {
                ClientError::rejected(ResourceKind::Rule, chain, "jump rule without a target")
            })?;
            self.chain(target)?;
        }
        if let Some(group) = spec.matches.port_group {
            self.port_group(group)?;
        }
        let len = self.rule_order.get(&chain).map_or(0, Vec::len);
        let index = match spec.position {
            None => len,
            Some(position) => {
                let index = usize::try_from(position).unwrap_or(usize::MAX);
                if index == 0 || index > len + 1 {
                    return Err(ClientError::rejected(
                        ResourceKind::Rule,
                        chain,
                        format!("position {position} is out of range 1..={}", len + 1),
                    ));
                }
                index - 1
            }
        };
        let rule = Rule {
            id: RuleId::new(),
            chain_id: chain,
            position: u32::try_from(index + 1).unwrap_or(u32::MAX),
            action: spec.action,
            jump_chain_id: spec.jump_chain_id,
            flow_action: spec.flow_action,
            nat_targets: spec.nat_targets.clone(),
            matches: spec.matches.clone(),
            properties: spec.properties.clone(),
        };
        self.rules
            .try_insert(rule.clone())
            .map_err(|_| ClientError::rejected(ResourceKind::Rule, rule.id, "duplicate id"))?;
        self.rule_order.entry(chain).or_default().insert(index, rule.id);
        Ok(rule)
    }

    fn list_rules(&self, chain: ChainId) -> ClientResult<Vec<Rule>> {
        self.chain(chain)?;
        let order = self.rule_order.get(&chain).map_or(&[][..], Vec::as_slice);
        Ok(order
            .iter()
            .filter_map(|id| self.rules.get_by_id(id))
            .zip(1u32..)
            .map(|(rule, position)| Rule {
                position,
                ..rule.clone()
            })
            .collect())
    }

    fn delete_rule(&mut self, id: RuleId) -> ClientResult<()> {
        let rule = self
            .rules
            .remove_by_id(&id)
            .ok_or_else(|| ClientError::not_found(ResourceKind::Rule, id))?;
        if let Some(order) = self.rule_order.get_mut(&rule.chain_id) {
            order.retain(|r| *r != id);
        }
        Ok(())
    }

    /* port groups */

    fn create_port_group(&mut self, spec: &PortGroupSpec) -> ClientResult<PortGroup> {
        let group = PortGroup {
            id: PortGroupId::new(),
            tenant_id: spec.tenant_id.clone(),
            name: spec.name.clone(),
        };
        self.port_groups
            .try_insert(group.clone())
            .map_err(|_| ClientError::rejected(ResourceKind::PortGroup, group.id, "duplicate id"))?;
        Ok(group)
    }

    fn delete_port_group(&mut self, id: PortGroupId) -> ClientResult<()> {
        self.port_group(id)?;
        self.port_groups.remove_by_id(&id);
        let members: Vec<Port> = self
            .ports
            .iter()
            .map(|(_, p)| p)
            .filter(|p| p.port_group_ids.contains(&id))
            .cloned()
            .collect();
        for mut port in members {
            port.port_group_ids.retain(|g| *g != id);
            self.put_port(port)?;
        }
        Ok(())
    }

    /* dhcp */

    fn create_dhcp_subnet(
        &mut self,
        bridge: BridgeId,
        spec: &DhcpSubnetSpec,
    ) -> ClientResult<DhcpSubnet> {
        self.bridge(bridge)?;
        let entries = self.dhcp.entry(bridge).or_default();
        if entries.iter().any(|e| e.subnet.prefix == spec.prefix) {
            return Err(ClientError::rejected(
                ResourceKind::DhcpSubnet,
                spec.prefix,
                "subnet already exists on the bridge",
            ));
        }
        let subnet = DhcpSubnet {
            bridge_id: bridge,
            prefix: spec.prefix,
            default_gateway: spec.default_gateway,
        };
        entries.push(DhcpEntry {
            subnet: subnet.clone(),
            hosts: Vec::new(),
        });
        Ok(subnet)
    }

    fn delete_dhcp_subnet(&mut self, bridge: BridgeId, prefix: Ipv4Net) -> ClientResult<()> {
        self.dhcp_entry_mut(bridge, prefix)?;
        if let Some(entries) = self.dhcp.get_mut(&bridge) {
            entries.retain(|e| e.subnet.prefix != prefix);
            if entries.is_empty() {
                self.dhcp.remove(&bridge);
            }
        }
        Ok(())
    }

    fn create_dhcp_host(
        &mut self,
        bridge: BridgeId,
        prefix: Ipv4Net,
        host: &DhcpHost,
    ) -> ClientResult<DhcpHost> {
        let entry = self.dhcp_entry_mut(bridge, prefix)?;
        if !entry.subnet.prefix.contains(&host.ip) {
            return Err(ClientError::rejected(
                ResourceKind::DhcpHost,
                host.mac,
                format!("{} is outside of {}", host.ip, entry.subnet.prefix),
            ));
        }
        if entry.hosts.iter().any(|h| h.mac == host.mac) {
            return Err(ClientError::rejected(
                ResourceKind::DhcpHost,
                host.mac,
                "mac already assigned in subnet",
            ));
        }
        entry.hosts.push(host.clone());
        Ok(host.clone())
    }

    fn delete_dhcp_host(
        &mut self,
        bridge: BridgeId,
        prefix: Ipv4Net,
        mac: MacAddress,
    ) -> ClientResult<()> {
        let entry = self.dhcp_entry_mut(bridge, prefix)?;
        let before = entry.hosts.len();
        entry.hosts.retain(|h| h.mac != mac);
        if entry.hosts.len() == before {
            return Err(ClientError::not_found(ResourceKind::DhcpHost, mac));
        }
        Ok(())
    }

    /* hosts */

    fn bind_host_interface(
        &mut self,
        host: HostId,
        port: PortId,
        interface: &str,
    ) -> ClientResult<HostInterfacePort> {
        if !self.port(port)?.is_exterior() {
            return Err(ClientError::rejected(
                ResourceKind::Port,
                port,
                "only exterior ports can be bound to a host interface",
            ));
        }
        if self.host_ports.iter().any(|b| b.port_id == port) {
            return Err(ClientError::rejected(
                ResourceKind::Port,
                port,
                "port is already bound",
            ));
        }
        let binding = HostInterfacePort {
            host_id: host,
            port_id: port,
            interface_name: interface.to_string(),
        };
        self.host_ports.push(binding.clone());
        Ok(binding)
    }

    /* snapshots */

    fn snapshot(&self) -> TopologySnapshot {
        let mut rules = Vec::with_capacity(self.rules.len());
        let mut chains: Vec<&ChainId> = self.rule_order.keys().collect();
        chains.sort();
        for chain in chains {
            if let Ok(listed) = self.list_rules(*chain) {
                rules.extend(listed);
            }
        }
        let mut dhcp: Vec<DhcpEntry> = self.dhcp.values().flatten().cloned().collect();
        dhcp.sort_by_key(|e| (e.subnet.bridge_id, e.subnet.prefix));
        let mut host_interface_ports = self.host_ports.clone();
        host_interface_ports.sort();

        TopologySnapshot {
            routers: sorted_by_id(self.routers.iter().map(|(_, r)| r).collect(), |r| r.id),
            bridges: sorted_by_id(self.bridges.iter().map(|(_, b)| b).collect(), |b| b.id),
            ports: sorted_by_id(self.ports.iter().map(|(_, p)| p).collect(), |p| p.id),
            routes: sorted_by_id(self.routes.iter().map(|(_, r)| r).collect(), |r| r.id),
            chains: sorted_by_id(self.chains.iter().map(|(_, c)| c).collect(), |c| c.id),
            rules,
            port_groups: sorted_by_id(self.port_groups.iter().map(|(_, g)| g).collect(), |g| {
                g.id
            }),
            dhcp,
            host_interface_ports,
        }
    }

    fn restore(snapshot: TopologySnapshot) -> ClientResult<Self> {
        let mut tables = Tables::default();
        let duplicate = |kind: ResourceKind, id: String| ClientError::rejected(kind, id, "duplicate id");
        for router in snapshot.routers {
            let id = router.id.to_string();
            tables
                .routers
                .try_insert(router)
                .map_err(|_| duplicate(ResourceKind::Router, id))?;
        }
        for bridge in snapshot.bridges {
            let id = bridge.id.to_string();
            tables
                .bridges
                .try_insert(bridge)
                .map_err(|_| duplicate(ResourceKind::Bridge, id))?;
        }
        for port in snapshot.ports {
            let id = port.id.to_string();
            tables
                .ports
                .try_insert(port)
                .map_err(|_| duplicate(ResourceKind::Port, id))?;
        }
        for route in snapshot.routes {
            let id = route.id.to_string();
            tables
                .routes
                .try_insert(route)
                .map_err(|_| duplicate(ResourceKind::Route, id))?;
        }
        for chain in snapshot.chains {
            let id = chain.id;
            tables
                .chains
                .try_insert(chain)
                .map_err(|_| duplicate(ResourceKind::Chain, id.to_string()))?;
            tables.rule_order.insert(id, Vec::new());
        }
        let mut rules = snapshot.rules;
        rules.sort_by_key(|r| (r.chain_id, r.position));
        for rule in rules {
            let (id, chain) = (rule.id, rule.chain_id);
            tables.chain(chain)?;
            tables
                .rules
                .try_insert(rule)
                .map_err(|_| duplicate(ResourceKind::Rule, id.to_string()))?;
            tables.rule_order.entry(chain).or_default().push(id);
        }
        for group in snapshot.port_groups {
            let id = group.id.to_string();
            tables
                .port_groups
                .try_insert(group)
                .map_err(|_| duplicate(ResourceKind::PortGroup, id))?;
        }
        for entry in snapshot.dhcp {
            tables.dhcp.entry(entry.subnet.bridge_id).or_default().push(entry);
        }
        tables.host_ports = snapshot.host_interface_ports;
        Ok(tables)
    }
}

impl ControllerClient for InMemoryController {
    async fn create_router(&self, spec: &RouterSpec) -> ClientResult<Router> {
        self.create(ResourceKind::Router, |t| t.create_router(spec))
    }

    async fn get_router(&self, id: RouterId) -> ClientResult<Router> {
        self.read(|t| t.router(id).cloned())
    }

    async fn list_routers(&self, tenant: &TenantId) -> ClientResult<Vec<Router>> {
        self.read(|t| Ok(sorted_by_id(t.routers.get_by_tenant_id(tenant), |r| r.id)))
    }

    async fn update_router(&self, router: &Router) -> ClientResult<()> {
        self.write(|t| t.update_router(router))
    }

    async fn delete_router(&self, id: RouterId) -> ClientResult<()> {
        self.write(|t| t.delete_router(id))
    }

    async fn create_bridge(&self, spec: &BridgeSpec) -> ClientResult<Bridge> {
        self.create(ResourceKind::Bridge, |t| t.create_bridge(spec))
    }

    async fn get_bridge(&self, id: BridgeId) -> ClientResult<Bridge> {
        self.read(|t| t.bridge(id).cloned())
    }

    async fn list_bridges(&self, tenant: &TenantId) -> ClientResult<Vec<Bridge>> {
        self.read(|t| Ok(sorted_by_id(t.bridges.get_by_tenant_id(tenant), |b| b.id)))
    }

    async fn update_bridge(&self, bridge: &Bridge) -> ClientResult<()> {
        self.write(|t| t.update_bridge(bridge))
    }

    async fn delete_bridge(&self, id: BridgeId) -> ClientResult<()> {
        self.write(|t| t.delete_bridge(id))
    }

    async fn create_router_port(&self, router: RouterId, spec: &PortSpec) -> ClientResult<Port> {
        self.create(ResourceKind::Port, |t| {
            t.create_port(PortDevice::Router(router), spec)
        })
    }

    async fn create_bridge_port(&self, bridge: BridgeId, spec: &PortSpec) -> ClientResult<Port> {
        self.create(ResourceKind::Port, |t| {
            t.create_port(PortDevice::Bridge(bridge), spec)
        })
    }

    async fn get_port(&self, id: PortId) -> ClientResult<Port> {
        self.read(|t| t.port(id).cloned())
    }

    async fn list_router_ports(&self, router: RouterId) -> ClientResult<Vec<Port>> {
        self.read(|t| {
            t.router(router)?;
            Ok(t.list_ports(PortDevice::Router(router)))
        })
    }

    async fn list_bridge_ports(&self, bridge: BridgeId) -> ClientResult<Vec<Port>> {
        self.read(|t| {
            t.bridge(bridge)?;
            Ok(t.list_ports(PortDevice::Bridge(bridge)))
        })
    }

    async fn update_port(&self, port: &Port) -> ClientResult<()> {
        self.write(|t| t.update_port(port))
    }

    async fn delete_port(&self, id: PortId) -> ClientResult<()> {
        self.write(|t| t.delete_port(id))
    }

    async fn link_ports(&self, a: PortId, b: PortId) -> ClientResult<()> {
        self.write(|t| t.link_ports(a, b))
    }

    async fn unlink_port(&self, port: PortId) -> ClientResult<()> {
        self.write(|t| t.unlink_port(port))
    }

    async fn create_route(&self, router: RouterId, spec: &RouteSpec) -> ClientResult<Route> {
        self.create(ResourceKind::Route, |t| t.create_route(router, spec))
    }

    async fn list_routes(&self, router: RouterId) -> ClientResult<Vec<Route>> {
        self.read(|t| {
            t.router(router)?;
            Ok(sorted_by_id(t.routes.get_by_router_id(&router), |r| r.id))
        })
    }

    async fn delete_route(&self, id: RouteId) -> ClientResult<()> {
        self.write(|t| t.delete_route(id))
    }

    async fn create_chain(&self, spec: &ChainSpec) -> ClientResult<Chain> {
        self.create(ResourceKind::Chain, |t| t.create_chain(spec))
    }

    async fn get_chain(&self, id: ChainId) -> ClientResult<Chain> {
        self.read(|t| t.chain(id).cloned())
    }

    async fn list_chains(&self, tenant: &TenantId) -> ClientResult<Vec<Chain>> {
        self.read(|t| Ok(sorted_by_id(t.chains.get_by_tenant_id(tenant), |c| c.id)))
    }

    async fn delete_chain(&self, id: ChainId) -> ClientResult<()> {
        self.write(|t| t.delete_chain(id))
    }

    async fn create_rule(&self, chain: ChainId, spec: &RuleSpec) -> ClientResult<Rule> {
        self.create(ResourceKind::Rule, |t| t.create_rule(chain, spec))
    }

    async fn list_rules(&self, chain: ChainId) -> ClientResult<Vec<Rule>> {
        self.read(|t| t.list_rules(chain))
    }

    async fn delete_rule(&self, id: RuleId) -> ClientResult<()> {
        self.write(|t| t.delete_rule(id))
    }

    async fn create_port_group(&self, spec: &PortGroupSpec) -> ClientResult<PortGroup> {
        self.create(ResourceKind::PortGroup, |t| t.create_port_group(spec))
    }

    async fn list_port_groups(&self, tenant: &TenantId) -> ClientResult<Vec<PortGroup>> {
        self.read(|t| Ok(sorted_by_id(t.port_groups.get_by_tenant_id(tenant), |g| g.id)))
    }

    async fn delete_port_group(&self, id: PortGroupId) -> ClientResult<()> {
        self.write(|t| t.delete_port_group(id))
    }

    async fn create_dhcp_subnet(
        &self,
        bridge: BridgeId,
        spec: &DhcpSubnetSpec,
    ) -> ClientResult<DhcpSubnet> {
        self.create(ResourceKind::DhcpSubnet, |t| {
            t.create_dhcp_subnet(bridge, spec)
        })
    }

    async fn list_dhcp_subnets(&self, bridge: BridgeId) -> ClientResult<Vec<DhcpSubnet>> {
        self.read(|t| {
            t.bridge(bridge)?;
            Ok(t.dhcp
                .get(&bridge)
                .map(|entries| entries.iter().map(|e| e.subnet.clone()).collect())
                .unwrap_or_default())
        })
    }

    async fn delete_dhcp_subnet(&self, bridge: BridgeId, prefix: Ipv4Net) -> ClientResult<()> {
        self.write(|t| t.delete_dhcp_subnet(bridge, prefix))
    }

    async fn create_dhcp_host(
        &self,
        bridge: BridgeId,
        prefix: Ipv4Net,
        host: &DhcpHost,
    ) -> ClientResult<DhcpHost> {
        self.create(ResourceKind::DhcpHost, |t| {
            t.create_dhcp_host(bridge, prefix, host)
        })
    }

    async fn list_dhcp_hosts(&self, bridge: BridgeId, prefix: Ipv4Net) -> ClientResult<Vec<DhcpHost>> {
        self.read(|t| t.dhcp_entry(bridge, prefix).map(|e| e.hosts.clone()))
    }

    async fn delete_dhcp_host(
        &self,
        bridge: BridgeId,
        prefix: Ipv4Net,
        mac: MacAddress,
    ) -> ClientResult<()> {
        self.write(|t| t.delete_dhcp_host(bridge, prefix, mac))
    }

    async fn bind_host_interface(
        &self,
        host: HostId,
        port: PortId,
        interface: &str,
    ) -> ClientResult<HostInterfacePort> {
        self.create(ResourceKind::Host, |t| {
            t.bind_host_interface(host, port, interface)
        })
    }

    async fn list_host_interface_ports(&self, host: HostId) -> ClientResult<Vec<HostInterfacePort>> {
        self.read(|t| {
            let mut bound: Vec<HostInterfacePort> = t
                .host_ports
                .iter()
                .filter(|b| b.host_id == host)
                .cloned()
                .collect();
            bound.sort();
            Ok(bound)
        })
    }
}
