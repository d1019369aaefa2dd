// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Deterministic names for chains and port groups.
//!
//! Chains and port groups are found again by name only, so two different owners must never be
//! given the same name:
//!
//! * security groups: `os_sg_{id}_{name}`, or `os_sg_default` for the group named `default`
//! * VIF chains: `os_sg_vif_{vif}_in` / `os_sg_vif_{vif}_out`
//! * router chains: `OS_IN_{router}` / `OS_OUT_{router}`
//!
//! Security group ids are numeric, so a group label can never start with `os_sg_vif_`.

use crate::request::SecurityGroupId;
use controller::model::{RouterId, VifId};

pub const SG_LABEL_PREFIX: &str = "os_sg_";
pub const DEFAULT_SG_NAME: &str = "default";
pub const DEFAULT_SG_LABEL: &str = "os_sg_default";

/// Keys of the rule properties used to find rules created on behalf of an OpenStack object.
pub mod tags {
    pub const OS_SG_RULE_ID: &str = "os_sg_rule_id";
    pub const OS_FLOATING_IP_ID: &str = "os_floating_ip_id";
    pub const OS_TENANT_ROUTER_SNAT: &str = "os_tenant_router_snat";
    pub const OS_METADATA_NAT: &str = "os_metadata_nat";
}

/// The inbound / outbound filter chain names of a device.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct ChainNames {
    pub inbound: String,
    pub outbound: String,
}

impl ChainNames {
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.inbound == name || self.outbound == name
    }
}

/// Name of the chain (and port group) of a security group.
#[must_use]
pub fn sg_label(id: SecurityGroupId, name: &str) -> String {
    if name == DEFAULT_SG_NAME {
        DEFAULT_SG_LABEL.to_string()
    } else {
        format!("{SG_LABEL_PREFIX}{id}_{name}")
    }
}

/// Prefix shared by every label the group `id` ever had, whatever its name was at the time.
#[must_use]
pub fn sg_label_prefix(id: SecurityGroupId) -> String {
    format!("{SG_LABEL_PREFIX}{id}_")
}

/// True if `label` names the chain or port group of security group `id` / `name`.
#[must_use]
pub fn is_sg_label_of(label: &str, id: SecurityGroupId, name: &str) -> bool {
    label == sg_label(id, name) || label.starts_with(&sg_label_prefix(id))
}

#[must_use]
pub fn vif_chain_names(vif: VifId) -> ChainNames {
    ChainNames {
        inbound: format!("{SG_LABEL_PREFIX}vif_{vif}_in"),
        outbound: format!("{SG_LABEL_PREFIX}vif_{vif}_out"),
    }
}

#[must_use]
pub fn router_chain_names(router: RouterId) -> ChainNames {
    ChainNames {
        inbound: format!("OS_IN_{router}"),
        outbound: format!("OS_OUT_{router}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use uuid::Uuid;

    #[test]
    fn default_group_uses_sentinel() {
        assert_eq!(sg_label(SecurityGroupId(7), "default"), "os_sg_default");
        assert_eq!(sg_label(SecurityGroupId(7), "web"), "os_sg_7_web");
        assert!(is_sg_label_of("os_sg_7_old_name", SecurityGroupId(7), "web"));
        assert!(!is_sg_label_of("os_sg_70_web", SecurityGroupId(7), "web"));
    }

    #[test]
    fn names_are_deterministic() {
        let vif = VifId::new();
        assert_eq!(vif_chain_names(vif), vif_chain_names(vif));
        let router = RouterId::new();
        assert_eq!(router_chain_names(router).inbound, format!("OS_IN_{router}"));
        assert!(router_chain_names(router).contains(&format!("OS_OUT_{router}")));
    }

    #[test]
    fn default_group_never_names_a_router_chain() {
        let router = RouterId::from_uuid(Uuid::from_u128(1));
        let names = router_chain_names(router);
        assert!(!names.contains(&sg_label(SecurityGroupId(1), "default")));
        assert!(!names.contains(&sg_label(SecurityGroupId(1), "x")));
    }

    /// Security groups, VIFs and routers built from arbitrary ids never share a name.
    #[test]
    fn names_never_collide() {
        bolero::check!()
            .with_type()
            .for_each(|(sg_a, sg_b, name, raw): &(u64, u64, String, u128)| {
                let vif = VifId::from_uuid(Uuid::from_u128(*raw));
                let router = RouterId::from_uuid(Uuid::from_u128(*raw));
                let vif_names = vif_chain_names(vif);
                let router_names = router_chain_names(router);

                let mut seen = HashSet::new();
                for label in [
                    sg_label(SecurityGroupId(*sg_a), name),
                    vif_names.inbound,
                    vif_names.outbound,
                    router_names.inbound,
                    router_names.outbound,
                ] {
                    assert!(seen.insert(label));
                }
                if sg_a != sg_b && name != DEFAULT_SG_NAME {
                    assert_ne!(
                        sg_label(SecurityGroupId(*sg_a), name),
                        sg_label(SecurityGroupId(*sg_b), name)
                    );
                }
            });
    }
}
