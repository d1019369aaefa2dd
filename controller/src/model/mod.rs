// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Controller-side objects.

mod device;
mod dhcp;
mod host;
mod id;
mod port;
mod route;
mod rule;

pub use device::*;
pub use dhcp::*;
pub use host::*;
pub use id::Id;
pub use port::*;
pub use route::*;
pub use rule::*;

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use strum::Display as StrumDisplay;

pub type RouterId = Id<Router>;
pub type BridgeId = Id<Bridge>;
pub type PortId = Id<Port>;
pub type RouteId = Id<Route>;
pub type ChainId = Id<Chain>;
pub type RuleId = Id<Rule>;
pub type PortGroupId = Id<PortGroup>;
pub type HostId = Id<Host>;
pub type VifId = Id<Vif>;

/// Marker for a physical host running a MidoNet agent.
pub enum Host {}

/// Marker for a virtual machine interface plugged into an exterior port.
pub enum Vif {}

/// The tenant (OpenStack project) owning a controller object.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Deserialize, Serialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TenantId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for TenantId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for TenantId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for TenantId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The kinds of object a controller holds.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, StrumDisplay, Deserialize, Serialize)]
pub enum ResourceKind {
    #[strum(serialize = "router")]
    Router,
    #[strum(serialize = "bridge")]
    Bridge,
    #[strum(serialize = "port")]
    Port,
    #[strum(serialize = "route")]
    Route,
    #[strum(serialize = "chain")]
    Chain,
    #[strum(serialize = "rule")]
    Rule,
    #[strum(serialize = "port group")]
    PortGroup,
    #[strum(serialize = "DHCP subnet")]
    DhcpSubnet,
    #[strum(serialize = "DHCP host")]
    DhcpHost,
    #[strum(serialize = "host")]
    Host,
}
