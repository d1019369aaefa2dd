// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! A serializable, order-independent image of a whole controller.

use crate::model::{
    Bridge, Chain, DhcpHost, DhcpSubnet, HostInterfacePort, Port, PortGroup, Route, Router, Rule,
};
use serde::{Deserialize, Serialize};

/// A DHCP subnet together with its static host assignments.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct DhcpEntry {
    pub subnet: DhcpSubnet,
    pub hosts: Vec<DhcpHost>,
}

/// Every object held by a controller.
///
/// Objects are sorted by id (rules by chain, then position) so that two snapshots of the same
/// state compare equal regardless of the order in which the objects were created.
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TopologySnapshot {
    pub routers: Vec<Router>,
    pub bridges: Vec<Bridge>,
    pub ports: Vec<Port>,
    pub routes: Vec<Route>,
    pub chains: Vec<Chain>,
    pub rules: Vec<Rule>,
    pub port_groups: Vec<PortGroup>,
    pub dhcp: Vec<DhcpEntry>,
    pub host_interface_ports: Vec<HostInterfacePort>,
}

impl TopologySnapshot {
    /// Total number of objects, counting DHCP hosts.
    #[must_use]
    pub fn object_count(&self) -> usize {
        self.routers.len()
            + self.bridges.len()
            + self.ports.len()
            + self.routes.len()
            + self.chains.len()
            + self.rules.len()
            + self.port_groups.len()
            + self.dhcp.iter().map(|e| 1 + e.hosts.len()).sum::<usize>()
            + self.host_interface_ports.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.object_count() == 0
    }
}
