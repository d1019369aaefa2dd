// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use config::ConfigError;
use thiserror::Error;
use topology::TopologyError;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Topology(#[from] TopologyError),
    #[error("State file {0}: {1}")]
    State(String, String),
    #[error("No usable host_uuid in {0}: {1}")]
    HostUuid(String, String),
}
