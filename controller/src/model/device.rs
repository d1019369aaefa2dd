// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Routers, bridges, chains and port groups.
//!
//! These are the tenant-scoped objects which are located by `(tenant, name)`.

use crate::model::{BridgeId, ChainId, PortGroupId, RouterId, TenantId};
use multi_index_map::MultiIndexMap;
use serde::{Deserialize, Serialize};

/// A virtual L3 router.
#[derive(Clone, Debug, Eq, MultiIndexMap, PartialEq, Deserialize, Serialize)]
#[multi_index_derive(Debug, Clone, Default)]
pub struct Router {
    #[multi_index(hashed_unique)]
    pub id: RouterId,
    #[multi_index(hashed_non_unique)]
    pub tenant_id: TenantId,
    pub name: String,
    pub inbound_filter_id: Option<ChainId>,
    pub outbound_filter_id: Option<ChainId>,
}

/// A virtual L2 bridge, the controller-side image of a tenant network.
#[derive(Clone, Debug, Eq, MultiIndexMap, PartialEq, Deserialize, Serialize)]
#[multi_index_derive(Debug, Clone, Default)]
pub struct Bridge {
    #[multi_index(hashed_unique)]
    pub id: BridgeId,
    #[multi_index(hashed_non_unique)]
    pub tenant_id: TenantId,
    pub name: String,
}

/// An ordered list of rules, named uniquely within a tenant by convention only.
#[derive(Clone, Debug, Eq, MultiIndexMap, PartialEq, Deserialize, Serialize)]
#[multi_index_derive(Debug, Clone, Default)]
pub struct Chain {
    #[multi_index(hashed_unique)]
    pub id: ChainId,
    #[multi_index(hashed_non_unique)]
    pub tenant_id: TenantId,
    pub name: String,
}

/// A named set of ports which rules can match on.
#[derive(Clone, Debug, Eq, MultiIndexMap, PartialEq, Deserialize, Serialize)]
#[multi_index_derive(Debug, Clone, Default)]
pub struct PortGroup {
    #[multi_index(hashed_unique)]
    pub id: PortGroupId,
    #[multi_index(hashed_non_unique)]
    pub tenant_id: TenantId,
    pub name: String,
}

/// What is needed to create any of the tenant-scoped named objects.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Deserialize, Serialize)]
pub struct NamedSpec {
    pub tenant_id: TenantId,
    pub name: String,
}

impl NamedSpec {
    #[must_use]
    pub fn new(tenant_id: impl Into<TenantId>, name: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            name: name.into(),
        }
    }
}

pub type RouterSpec = NamedSpec;
pub type BridgeSpec = NamedSpec;
pub type ChainSpec = NamedSpec;
pub type PortGroupSpec = NamedSpec;

impl Router {
    /// True if `self` is the object `spec` would create.
    #[must_use]
    pub fn is(&self, spec: &RouterSpec) -> bool {
        self.tenant_id == spec.tenant_id && self.name == spec.name
    }
}

impl Bridge {
    #[must_use]
    pub fn is(&self, spec: &BridgeSpec) -> bool {
        self.tenant_id == spec.tenant_id && self.name == spec.name
    }
}

impl Chain {
    #[must_use]
    pub fn is(&self, spec: &ChainSpec) -> bool {
        self.tenant_id == spec.tenant_id && self.name == spec.name
    }
}
