// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use crate::model::{PortId, RouteId, RouterId};
use ipnet::Ipv4Net;
use multi_index_map::MultiIndexMap;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Deserialize, Serialize)]
pub enum RouteKind {
    /// Forward through `next_hop_port`.
    Normal,
    /// Drop and answer with ICMP unreachable.
    Reject,
    /// Drop silently.
    BlackHole,
}

/// A route of a virtual router.
#[derive(Clone, Debug, Eq, MultiIndexMap, PartialEq, Deserialize, Serialize)]
#[multi_index_derive(Debug, Clone, Default)]
pub struct Route {
    #[multi_index(hashed_unique)]
    pub id: RouteId,
    #[multi_index(hashed_non_unique)]
    pub router_id: RouterId,
    pub kind: RouteKind,
    pub src: Ipv4Net,
    pub dst: Ipv4Net,
    pub next_hop_port: Option<PortId>,
    pub next_hop_gateway: Option<Ipv4Addr>,
    pub weight: u32,
}

/// What is needed to add a route to a router.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct RouteSpec {
    pub kind: RouteKind,
    pub src: Ipv4Net,
    pub dst: Ipv4Net,
    pub next_hop_port: Option<PortId>,
    pub next_hop_gateway: Option<Ipv4Addr>,
    pub weight: u32,
}

const ANY: Ipv4Net = Ipv4Net::new_assert(Ipv4Addr::UNSPECIFIED, 0);

impl RouteSpec {
    pub const DEFAULT_WEIGHT: u32 = 100;

    /// Route traffic from anywhere to `dst` through `port`.
    #[must_use]
    pub fn via_port(dst: Ipv4Net, port: PortId) -> Self {
        Self {
            kind: RouteKind::Normal,
            src: ANY,
            dst: dst.trunc(),
            next_hop_port: Some(port),
            next_hop_gateway: None,
            weight: Self::DEFAULT_WEIGHT,
        }
    }

    #[must_use]
    pub fn reject(dst: Ipv4Net) -> Self {
        Self {
            kind: RouteKind::Reject,
            src: ANY,
            dst: dst.trunc(),
            next_hop_port: None,
            next_hop_gateway: None,
            weight: Self::DEFAULT_WEIGHT,
        }
    }

    #[must_use]
    pub fn with_gateway(mut self, gateway: Ipv4Addr) -> Self {
        self.next_hop_gateway = Some(gateway);
        self
    }

    #[must_use]
    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }
}

impl Route {
    /// True if this route sends traffic for exactly `dst` out of `port`.
    #[must_use]
    pub fn forwards(&self, dst: Ipv4Net, port: PortId) -> bool {
        self.kind == RouteKind::Normal && self.dst == dst.trunc() && self.next_hop_port == Some(port)
    }

    /// True if this route was created from `spec`.
    #[must_use]
    pub fn is(&self, spec: &RouteSpec) -> bool {
        self.kind == spec.kind
            && self.src == spec.src
            && self.dst == spec.dst
            && self.next_hop_port == spec.next_hop_port
            && self.next_hop_gateway == spec.next_hop_gateway
            && self.weight == spec.weight
    }
}
