// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Per-VIF filter chains.

use controller::model::{
    ChainId, ETHERTYPE_ARP, ETHERTYPE_IPV4, RuleAction, RuleMatch, RuleSpec,
};
use ipnet::Ipv4Net;
use mac_address::MacAddress;
use std::net::Ipv4Addr;

fn host_net(ip: Ipv4Addr) -> Ipv4Net {
    Ipv4Net::from(ip)
}

/// Rules for traffic coming from the VM: anti-spoofing first, then established flows.
#[must_use]
pub fn vif_ingress_rules(mac: MacAddress, ip: Ipv4Addr) -> Vec<RuleSpec> {
    vec![
        RuleSpec::new(RuleAction::Drop, RuleMatch::any().with_dl_src(mac, true)).with_position(1),
        RuleSpec::new(
            RuleAction::Drop,
            RuleMatch::any()
                .with_dl_type(ETHERTYPE_IPV4, false)
                .with_nw_src(host_net(ip), true),
        )
        .with_position(2),
        RuleSpec::accept(RuleMatch::any().forward_flow()).with_position(3),
    ]
}

/// Rules for traffic going to the VM.
///
/// In order: same subnet traffic (if allowed), one jump per security group chain, return
/// traffic of established flows, and finally a drop of everything but ARP.
#[must_use]
pub fn vif_egress_rules(
    allow_same_net_traffic: bool,
    subnet: Ipv4Net,
    security_group_chains: &[ChainId],
) -> Vec<RuleSpec> {
    let mut rules = Vec::with_capacity(security_group_chains.len() + 3);
    if allow_same_net_traffic {
        rules.push(RuleSpec::accept(
            RuleMatch::any().with_nw_src(subnet.trunc(), false),
        ));
    }
    rules.extend(
        security_group_chains
            .iter()
            .map(|chain| RuleSpec::jump(*chain, RuleMatch::any())),
    );
    rules.push(RuleSpec::accept(RuleMatch::any().return_flow()));
    rules.push(RuleSpec::new(
        RuleAction::Drop,
        RuleMatch::any().with_dl_type(ETHERTYPE_ARP, true),
    ));
    rules
        .into_iter()
        .zip(1u32..)
        .map(|(rule, position)| rule.with_position(position))
        .collect()
}
