// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use crate::model::BridgeId;
use ipnet::Ipv4Net;
use mac_address::MacAddress;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

/// DHCP service for one prefix on a bridge. Keyed by `(bridge_id, prefix)`.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct DhcpSubnet {
    pub bridge_id: BridgeId,
    pub prefix: Ipv4Net,
    pub default_gateway: Ipv4Addr,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct DhcpSubnetSpec {
    pub prefix: Ipv4Net,
    pub default_gateway: Ipv4Addr,
}

impl DhcpSubnetSpec {
    #[must_use]
    pub fn new(prefix: Ipv4Net, default_gateway: Ipv4Addr) -> Self {
        Self {
            prefix: prefix.trunc(),
            default_gateway,
        }
    }
}

/// A static MAC to IP assignment within a DHCP subnet. Keyed by `mac`.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct DhcpHost {
    pub mac: MacAddress,
    pub ip: Ipv4Addr,
    pub name: Option<String>,
}

impl DhcpHost {
    #[must_use]
    pub fn new(mac: MacAddress, ip: Ipv4Addr) -> Self {
        Self { mac, ip, name: None }
    }

    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}
