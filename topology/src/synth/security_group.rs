// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use crate::errors::{TopologyError, TopologyResult};
use crate::naming::tags::OS_SG_RULE_ID;
use crate::request::{Protocol, SecurityGroupRule};
use controller::model::{PortGroupId, PortRange, RuleMatch, RuleSpec};
use ipnet::Ipv4Net;

/// OpenStack's "any" for ports, ICMP types and ICMP codes.
const WILDCARD: i32 = -1;

/// The traffic source of a security group rule, once group references are resolved.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ResolvedSource {
    Cidr(Ipv4Net),
    PortGroup(PortGroupId),
}

fn bounded(value: i32, max: u16, what: &str) -> TopologyResult<Option<u16>> {
    if value == WILDCARD {
        return Ok(None);
    }
    u16::try_from(value)
        .ok()
        .filter(|v| *v <= max)
        .map(Some)
        .ok_or_else(|| {
            TopologyError::UnsupportedConfiguration(format!("{what} {value} is out of range"))
        })
}

/// The accept rule which implements `rule` in the chain of its security group.
///
/// The rule is tagged with the id of `rule` so that it can be deleted along with it.
pub fn security_group_rule(
    rule: &SecurityGroupRule,
    source: ResolvedSource,
) -> TopologyResult<RuleSpec> {
    let mut matches = RuleMatch::any().with_nw_proto(rule.protocol.number());
    matches = match source {
        ResolvedSource::Cidr(net) => matches.with_nw_src(net.trunc(), false),
        ResolvedSource::PortGroup(group) => matches.with_port_group(group),
    };
    match rule.protocol {
        Protocol::Icmp => {
            if let Some(icmp_type) = bounded(rule.from_port, u16::from(u8::MAX), "ICMP type")? {
                matches = matches.with_tp_src(PortRange::single(icmp_type));
            }
            if let Some(icmp_code) = bounded(rule.to_port, u16::from(u8::MAX), "ICMP code")? {
                matches = matches.with_tp_dst(PortRange::single(icmp_code));
            }
        }
        Protocol::Tcp | Protocol::Udp => {
            let from = bounded(rule.from_port, u16::MAX, "port")?;
            let to = bounded(rule.to_port, u16::MAX, "port")?;
            match (from, to) {
                (None, None) => {}
                (Some(from), Some(to)) if from <= to => {
                    matches = matches.with_tp_dst(PortRange::new(from, to));
                }
                _ => {
                    return Err(TopologyError::UnsupportedConfiguration(format!(
                        "bad port range {}..{}",
                        rule.from_port, rule.to_port
                    )));
                }
            }
        }
    }
    Ok(RuleSpec::accept(matches).tagged(OS_SG_RULE_ID, rule.id.to_string()))
}
