// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Filtering and NAT rules.

use crate::model::{ChainId, PortGroupId, PortId, RuleId};
use ipnet::Ipv4Net;
use mac_address::MacAddress;
use multi_index_map::MultiIndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use strum::Display;

/// Free-form key/value tags stored on a rule.
///
/// Tags are how rules created on behalf of a foreign object (a security group rule, a floating
/// IP) are found again when that object is deleted.
pub type Properties = BTreeMap<String, String>;

pub const ETHERTYPE_IPV4: u16 = 0x0800;
pub const ETHERTYPE_ARP: u16 = 0x0806;

#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq, Deserialize, Serialize)]
#[strum(serialize_all = "snake_case")]
pub enum RuleAction {
    Accept,
    Drop,
    Reject,
    Jump,
    Dnat,
    Snat,
    RevDnat,
    RevSnat,
}

/// What a NAT rule does with the flow once the translation is applied.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq, Deserialize, Serialize)]
#[strum(serialize_all = "snake_case")]
pub enum FlowAction {
    Accept,
    Continue,
    Return,
}

/// Inclusive range of L4 ports (or ICMP type/code).
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Deserialize, Serialize)]
pub struct PortRange {
    pub start: u16,
    pub end: u16,
}

impl PortRange {
    #[must_use]
    pub fn new(start: u16, end: u16) -> Self {
        Self { start, end }
    }

    #[must_use]
    pub fn single(value: u16) -> Self {
        Self::new(value, value)
    }
}

/// A NAT translation target.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Deserialize, Serialize)]
pub struct NatTarget {
    pub address_from: Ipv4Addr,
    pub address_to: Ipv4Addr,
    pub port_from: u16,
    pub port_to: u16,
}

impl NatTarget {
    /// Translate to exactly `address`, leaving L4 ports untouched.
    #[must_use]
    pub fn address(address: Ipv4Addr) -> Self {
        Self {
            address_from: address,
            address_to: address,
            port_from: 0,
            port_to: 0,
        }
    }

    #[must_use]
    pub fn with_ports(mut self, from: u16, to: u16) -> Self {
        self.port_from = from;
        self.port_to = to;
        self
    }
}

/// The match conditions of a rule. Unset fields match anything.
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
pub struct RuleMatch {
    pub match_forward_flow: bool,
    pub match_return_flow: bool,
    pub port_group: Option<PortGroupId>,
    pub dl_type: Option<u16>,
    pub inv_dl_type: bool,
    pub dl_src: Option<MacAddress>,
    pub inv_dl_src: bool,
    pub nw_proto: Option<u8>,
    pub inv_nw_proto: bool,
    pub nw_src: Option<Ipv4Net>,
    pub inv_nw_src: bool,
    pub nw_dst: Option<Ipv4Net>,
    pub inv_nw_dst: bool,
    pub tp_src: Option<PortRange>,
    pub tp_dst: Option<PortRange>,
    pub in_ports: Vec<PortId>,
    pub out_ports: Vec<PortId>,
}

impl RuleMatch {
    #[must_use]
    pub fn any() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn forward_flow(mut self) -> Self {
        self.match_forward_flow = true;
        self
    }

    #[must_use]
    pub fn return_flow(mut self) -> Self {
        self.match_return_flow = true;
        self
    }

    #[must_use]
    pub fn with_port_group(mut self, group: PortGroupId) -> Self {
        self.port_group = Some(group);
        self
    }

    #[must_use]
    pub fn with_dl_type(mut self, ethertype: u16, inverted: bool) -> Self {
        self.dl_type = Some(ethertype);
        self.inv_dl_type = inverted;
        self
    }

    #[must_use]
    pub fn with_dl_src(mut self, mac: MacAddress, inverted: bool) -> Self {
        self.dl_src = Some(mac);
        self.inv_dl_src = inverted;
        self
    }

    #[must_use]
    pub fn with_nw_proto(mut self, proto: u8) -> Self {
        self.nw_proto = Some(proto);
        self
    }

    #[must_use]
    pub fn with_nw_src(mut self, net: Ipv4Net, inverted: bool) -> Self {
        self.nw_src = Some(net);
        self.inv_nw_src = inverted;
        self
    }

    #[must_use]
    pub fn with_nw_dst(mut self, net: Ipv4Net, inverted: bool) -> Self {
        self.nw_dst = Some(net);
        self.inv_nw_dst = inverted;
        self
    }

    #[must_use]
    pub fn with_tp_src(mut self, range: PortRange) -> Self {
        self.tp_src = Some(range);
        self
    }

    #[must_use]
    pub fn with_tp_dst(mut self, range: PortRange) -> Self {
        self.tp_dst = Some(range);
        self
    }

    #[must_use]
    pub fn with_in_ports(mut self, ports: Vec<PortId>) -> Self {
        self.in_ports = ports;
        self
    }

    #[must_use]
    pub fn with_out_ports(mut self, ports: Vec<PortId>) -> Self {
        self.out_ports = ports;
        self
    }
}

/// A rule as stored in a chain.
#[derive(Clone, Debug, Eq, MultiIndexMap, PartialEq, Deserialize, Serialize)]
#[multi_index_derive(Debug, Clone, Default)]
pub struct Rule {
    #[multi_index(hashed_unique)]
    pub id: RuleId,
    #[multi_index(hashed_non_unique)]
    pub chain_id: ChainId,
    /// 1-based position within the chain at the time the rule was read.
    pub position: u32,
    pub action: RuleAction,
    pub jump_chain_id: Option<ChainId>,
    pub flow_action: Option<FlowAction>,
    pub nat_targets: Vec<NatTarget>,
    pub matches: RuleMatch,
    pub properties: Properties,
}

impl Rule {
    /// True if the rule carries the tag `key=value`.
    #[must_use]
    pub fn is_tagged(&self, key: &str, value: &str) -> bool {
        self.properties.get(key).is_some_and(|v| v == value)
    }
}

/// What is needed to add a rule to a chain.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct RuleSpec {
    /// 1-based insertion position. `None` appends.
    pub position: Option<u32>,
    pub action: RuleAction,
    pub jump_chain_id: Option<ChainId>,
    pub flow_action: Option<FlowAction>,
    pub nat_targets: Vec<NatTarget>,
    pub matches: RuleMatch,
    pub properties: Properties,
}

impl RuleSpec {
    #[must_use]
    pub fn new(action: RuleAction, matches: RuleMatch) -> Self {
        Self {
            position: None,
            action,
            jump_chain_id: None,
            flow_action: None,
            nat_targets: Vec::new(),
            matches,
            properties: Properties::new(),
        }
    }

    #[must_use]
    pub fn accept(matches: RuleMatch) -> Self {
        Self::new(RuleAction::Accept, matches)
    }

    #[must_use]
    pub fn jump(target: ChainId, matches: RuleMatch) -> Self {
        let mut spec = Self::new(RuleAction::Jump, matches);
        spec.jump_chain_id = Some(target);
        spec
    }

    #[must_use]
    pub fn nat(
        action: RuleAction,
        flow: FlowAction,
        targets: Vec<NatTarget>,
        matches: RuleMatch,
    ) -> Self {
        let mut spec = Self::new(action, matches);
        spec.flow_action = Some(flow);
        spec.nat_targets = targets;
        spec
    }

    #[must_use]
    pub fn with_position(mut self, position: u32) -> Self {
        self.position = Some(position);
        self
    }

    #[must_use]
    pub fn tagged(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}
