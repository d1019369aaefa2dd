// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use crate::model::{HostId, PortId};
use serde::{Deserialize, Serialize};

/// The binding of an exterior port to a named interface on a physical host.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Deserialize, Serialize)]
pub struct HostInterfacePort {
    pub host_id: HostId,
    pub port_id: PortId,
    pub interface_name: String,
}
