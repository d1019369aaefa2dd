// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! NAT rules of tenant routers and of the metadata router.

use crate::naming::tags::{OS_FLOATING_IP_ID, OS_METADATA_NAT, OS_TENANT_ROUTER_SNAT};
use crate::request::{FloatingIp, Protocol};
use config::MetadataConfig;
use controller::model::{
    FlowAction, NatTarget, PortId, PortRange, RouterId, RuleAction, RuleMatch, RuleSpec,
};
use ipnet::Ipv4Net;
use std::net::Ipv4Addr;

/// A pair of rules: one for the inbound chain of a device, one for its outbound chain.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NatPair {
    pub inbound: RuleSpec,
    pub outbound: RuleSpec,
}

/// DNAT of the floating IP to the fixed IP, and SNAT of the fixed IP to the floating IP.
///
/// Both go first in their chains so that they win over the masquerade of the router gateway.
#[must_use]
pub fn floating_ip_rules(fip: &FloatingIp) -> NatPair {
    let tag = fip.id.to_string();
    NatPair {
        inbound: RuleSpec::nat(
            RuleAction::Dnat,
            FlowAction::Accept,
            vec![NatTarget::address(fip.fixed_ip)],
            RuleMatch::any().with_nw_dst(Ipv4Net::from(fip.floating_ip), false),
        )
        .with_position(1)
        .tagged(OS_FLOATING_IP_ID, tag.clone()),
        outbound: RuleSpec::nat(
            RuleAction::Snat,
            FlowAction::Accept,
            vec![NatTarget::address(fip.floating_ip)],
            RuleMatch::any().with_nw_src(Ipv4Net::from(fip.fixed_ip), false),
        )
        .with_position(1)
        .tagged(OS_FLOATING_IP_ID, tag),
    }
}

/// Masquerade everything leaving through the gateway port behind `gateway_ip`, and undo it for
/// the replies.
#[must_use]
pub fn gateway_snat_rules(router: RouterId, gateway_port: PortId, gateway_ip: Ipv4Addr) -> NatPair {
    let tag = router.to_string();
    NatPair {
        inbound: RuleSpec::nat(
            RuleAction::RevSnat,
            FlowAction::Accept,
            Vec::new(),
            RuleMatch::any()
                .with_in_ports(vec![gateway_port])
                .with_nw_dst(Ipv4Net::from(gateway_ip), false),
        )
        .tagged(OS_TENANT_ROUTER_SNAT, tag.clone()),
        outbound: RuleSpec::nat(
            RuleAction::Snat,
            FlowAction::Accept,
            vec![NatTarget::address(gateway_ip).with_ports(1, u16::MAX)],
            RuleMatch::any().with_out_ports(vec![gateway_port]),
        )
        .tagged(OS_TENANT_ROUTER_SNAT, tag),
    }
}

/// Redirect requests to the metadata address onto the port the service really listens on.
#[must_use]
pub fn metadata_nat_rules(config: &MetadataConfig) -> NatPair {
    let service = Ipv4Net::from(config.service_address);
    let tcp = Protocol::Tcp.number();
    NatPair {
        inbound: RuleSpec::nat(
            RuleAction::Dnat,
            FlowAction::Accept,
            vec![NatTarget::address(config.service_address)
                .with_ports(config.service_port, config.service_port)],
            RuleMatch::any()
                .with_nw_proto(tcp)
                .with_nw_dst(service, false)
                .with_tp_dst(PortRange::single(config.listen_port)),
        )
        .tagged(OS_METADATA_NAT, "dnat"),
        outbound: RuleSpec::nat(
            RuleAction::RevDnat,
            FlowAction::Accept,
            Vec::new(),
            RuleMatch::any()
                .with_nw_proto(tcp)
                .with_nw_src(service, false)
                .with_tp_src(PortRange::single(config.service_port)),
        )
        .tagged(OS_METADATA_NAT, "rev_dnat"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::FloatingIpId;

    #[test]
    fn floating_ip_pair_is_tagged_and_first() {
        let fip = FloatingIp {
            id: FloatingIpId(9),
            tenant_id: "t1".into(),
            router: RouterId::new(),
            floating_ip: Ipv4Addr::new(203, 0, 113, 5),
            fixed_ip: Ipv4Addr::new(10, 0, 0, 7),
        };
        let pair = floating_ip_rules(&fip);
        assert_eq!(pair.inbound.action, RuleAction::Dnat);
        assert_eq!(pair.inbound.matches.nw_dst, Some("203.0.113.5/32".parse().unwrap()));
        assert_eq!(pair.inbound.nat_targets[0].address_from, fip.fixed_ip);
        assert_eq!(pair.outbound.action, RuleAction::Snat);
        assert_eq!(pair.outbound.matches.nw_src, Some("10.0.0.7/32".parse().unwrap()));
        for rule in [&pair.inbound, &pair.outbound] {
            assert_eq!(rule.position, Some(1));
            assert_eq!(rule.flow_action, Some(FlowAction::Accept));
            assert_eq!(rule.properties.get(OS_FLOATING_IP_ID).map(String::as_str), Some("9"));
        }
    }

    #[test]
    fn gateway_pair_is_appended() {
        let router = RouterId::new();
        let port = PortId::new();
        let pair = gateway_snat_rules(router, port, Ipv4Addr::new(198, 51, 100, 2));
        assert_eq!(pair.outbound.position, None);
        assert_eq!(pair.outbound.matches.out_ports, vec![port]);
        assert_eq!(pair.inbound.action, RuleAction::RevSnat);
        assert!(pair.inbound.properties.contains_key(OS_TENANT_ROUTER_SNAT));
        assert!(!pair.inbound.properties.contains_key(OS_FLOATING_IP_ID));
    }

    #[test]
    fn metadata_requests_are_redirected() {
        let config = MetadataConfig::default();
        let pair = metadata_nat_rules(&config);
        assert_eq!(pair.inbound.matches.tp_dst, Some(PortRange::single(80)));
        assert_eq!(pair.inbound.nat_targets[0].port_from, 8775);
        assert_eq!(pair.outbound.matches.tp_src, Some(PortRange::single(8775)));
    }
}
