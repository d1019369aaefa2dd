// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use crate::model::{BridgeId, ChainId, PortGroupId, PortId, RouterId, VifId};
use ipnet::Ipv4Net;
use multi_index_map::MultiIndexMap;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

/// The device a port belongs to.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Deserialize, Serialize)]
pub enum PortDevice {
    Router(RouterId),
    Bridge(BridgeId),
}

impl PortDevice {
    #[must_use]
    pub fn router_id(&self) -> Option<RouterId> {
        match self {
            PortDevice::Router(id) => Some(*id),
            PortDevice::Bridge(_) => None,
        }
    }

    #[must_use]
    pub fn bridge_id(&self) -> Option<BridgeId> {
        match self {
            PortDevice::Bridge(id) => Some(*id),
            PortDevice::Router(_) => None,
        }
    }
}

/// Interior ports link two devices; exterior ports face a VM or a physical interface.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Deserialize, Serialize)]
pub enum PortKind {
    Interior,
    Exterior,
}

/// The L3 address of a router port together with the network it sits on.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Deserialize, Serialize)]
pub struct PortAddress {
    pub address: Ipv4Addr,
    pub network: Ipv4Net,
}

impl PortAddress {
    /// The address `address` on the network of `network` (host bits of `network` are dropped).
    #[must_use]
    pub fn new(address: Ipv4Addr, network: Ipv4Net) -> Self {
        Self {
            address,
            network: network.trunc(),
        }
    }
}

#[derive(Clone, Debug, Eq, MultiIndexMap, PartialEq, Deserialize, Serialize)]
#[multi_index_derive(Debug, Clone, Default)]
pub struct Port {
    #[multi_index(hashed_unique)]
    pub id: PortId,
    #[multi_index(hashed_non_unique)]
    pub device: PortDevice,
    pub kind: PortKind,
    pub address: Option<PortAddress>,
    pub peer_id: Option<PortId>,
    pub vif_id: Option<VifId>,
    pub inbound_filter_id: Option<ChainId>,
    pub outbound_filter_id: Option<ChainId>,
    pub port_group_ids: Vec<PortGroupId>,
}

impl Port {
    #[must_use]
    pub fn is_interior(&self) -> bool {
        self.kind == PortKind::Interior
    }

    #[must_use]
    pub fn is_exterior(&self) -> bool {
        self.kind == PortKind::Exterior
    }

    #[must_use]
    pub fn is_linked(&self) -> bool {
        self.peer_id.is_some()
    }

    #[must_use]
    pub fn router_id(&self) -> Option<RouterId> {
        self.device.router_id()
    }

    #[must_use]
    pub fn bridge_id(&self) -> Option<BridgeId> {
        self.device.bridge_id()
    }

    /// The port address, if any.
    #[must_use]
    pub fn ip(&self) -> Option<Ipv4Addr> {
        self.address.map(|a| a.address)
    }

    /// True if this port carries `address` on `network`.
    #[must_use]
    pub fn has_address(&self, address: Ipv4Addr, network: Ipv4Net) -> bool {
        self.address == Some(PortAddress::new(address, network))
    }
}

/// What is needed to create a port on a router or a bridge.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct PortSpec {
    pub kind: PortKind,
    pub address: Option<PortAddress>,
}

impl PortSpec {
    #[must_use]
    pub fn interior() -> Self {
        Self {
            kind: PortKind::Interior,
            address: None,
        }
    }

    #[must_use]
    pub fn exterior() -> Self {
        Self {
            kind: PortKind::Exterior,
            address: None,
        }
    }

    #[must_use]
    pub fn with_address(mut self, address: Ipv4Addr, network: Ipv4Net) -> Self {
        self.address = Some(PortAddress::new(address, network));
        self
    }
}
