// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The OpenStack side of the mapping: the objects requests are made about.
//!
//! These carry only what the topology engine needs; persisting them is the caller's business.

use controller::model::{BridgeId, PortId, RouterId, TenantId, VifId};
use ipnet::{IpNet, Ipv4Net};
use mac_address::MacAddress;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::net::Ipv4Addr;
use strum::Display as StrumDisplay;

macro_rules! os_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Deserialize, Serialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

os_id!(
    /// Id of an OpenStack security group.
    SecurityGroupId
);
os_id!(SecurityGroupRuleId);
os_id!(FloatingIpId);

#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct SecurityGroup {
    pub id: SecurityGroupId,
    pub tenant_id: TenantId,
    pub name: String,
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, StrumDisplay, Deserialize, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
    Icmp,
}

impl Protocol {
    /// The IP protocol number.
    #[must_use]
    pub const fn number(self) -> u8 {
        match self {
            Protocol::Tcp => 6,
            Protocol::Udp => 17,
            Protocol::Icmp => 1,
        }
    }
}

/// Where the traffic a security group rule admits may come from.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub enum RuleSource {
    Cidr(Ipv4Net),
    /// Any member of that group.
    Group(SecurityGroup),
}

/// A security group rule.
///
/// For ICMP, `from_port` is the ICMP type and `to_port` the ICMP code. `-1` stands for any.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct SecurityGroupRule {
    pub id: SecurityGroupRuleId,
    pub parent: SecurityGroup,
    pub protocol: Protocol,
    pub from_port: i32,
    pub to_port: i32,
    pub source: RuleSource,
}

#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct NetworkRequest {
    pub tenant_id: TenantId,
    pub name: String,
    pub admin_state_up: bool,
}

impl NetworkRequest {
    #[must_use]
    pub fn new(tenant_id: impl Into<TenantId>, name: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            name: name.into(),
            admin_state_up: true,
        }
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
pub struct NetworkUpdate {
    pub name: Option<String>,
    pub admin_state_up: Option<bool>,
}

#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct SubnetRequest {
    pub network: BridgeId,
    pub cidr: IpNet,
    /// Defaults to the first host address of `cidr`.
    pub gateway_ip: Option<Ipv4Addr>,
    /// Routed from the provider router.
    pub external: bool,
}

/// What a port is for, from the OpenStack `device_owner` field.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub enum DeviceOwner {
    Compute(String),
    RouterInterface,
    RouterGateway,
    FloatingIp,
    Dhcp,
    Other(String),
}

impl DeviceOwner {
    #[must_use]
    pub fn parse(owner: &str) -> Self {
        match owner {
            "network:router_interface" => DeviceOwner::RouterInterface,
            "network:router_gateway" => DeviceOwner::RouterGateway,
            "network:floatingip" => DeviceOwner::FloatingIp,
            "network:dhcp" => DeviceOwner::Dhcp,
            _ => match owner.strip_prefix("compute:") {
                Some(zone) => DeviceOwner::Compute(zone.to_string()),
                None => DeviceOwner::Other(owner.to_string()),
            },
        }
    }

    /// Ports only used to hold an address on a router link.
    #[must_use]
    pub fn is_router_side(&self) -> bool {
        matches!(
            self,
            DeviceOwner::RouterInterface | DeviceOwner::RouterGateway | DeviceOwner::FloatingIp
        )
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct PortRequest {
    pub network: BridgeId,
    pub tenant_id: TenantId,
    pub mac: MacAddress,
    pub fixed_ip: Option<Ipv4Addr>,
    pub device_owner: DeviceOwner,
}

#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct RouterRequest {
    pub tenant_id: TenantId,
    pub name: String,
}

impl RouterRequest {
    #[must_use]
    pub fn new(tenant_id: impl Into<TenantId>, name: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            name: name.into(),
        }
    }
}

/// The external gateway of a tenant router.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct ExternalGateway {
    /// The fixed IP of the router's gateway port on the external network
    pub gateway_ip: Ipv4Addr,
}

/// Attach a subnet to a router through the bridge port created for the interface.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct RouterInterface {
    pub router: RouterId,
    pub bridge_port: PortId,
    pub subnet: Ipv4Net,
    /// The router address on `subnet`
    pub gateway_ip: Ipv4Addr,
}

#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct FloatingIp {
    pub id: FloatingIpId,
    pub tenant_id: TenantId,
    pub router: RouterId,
    pub floating_ip: Ipv4Addr,
    pub fixed_ip: Ipv4Addr,
}

/// Filter the traffic of a VIF according to the security groups of its instance.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct VifFilterRequest {
    pub tenant_id: TenantId,
    pub vif_id: VifId,
    pub port: PortId,
    pub mac: MacAddress,
    pub ip: Ipv4Addr,
    pub subnet: Ipv4Net,
    pub security_groups: Vec<SecurityGroup>,
}
