// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The controller state carried between runs, and the host identity file.

use crate::errors::CliError;
use controller::model::HostId;
use controller::{InMemoryController, TopologySnapshot};
use std::path::Path;
use tracing::{debug, info};

const HOST_UUID_KEY: &str = "host_uuid=";

/// Load the controller saved at `path`. A missing file is an empty controller.
pub fn load_state(path: &Path) -> Result<InMemoryController, CliError> {
    let shown = || path.display().to_string();
    if !path.exists() {
        info!("No state at {}, starting from an empty controller", path.display());
        return Ok(InMemoryController::new());
    }
    let yaml = std::fs::read_to_string(path).map_err(|e| CliError::State(shown(), e.to_string()))?;
    let snapshot: TopologySnapshot =
        serde_yaml_ng::from_str(&yaml).map_err(|e| CliError::State(shown(), e.to_string()))?;
    debug!("Loaded {} objects from {}", snapshot.object_count(), path.display());
    InMemoryController::from_snapshot(snapshot).map_err(|e| CliError::State(shown(), e.to_string()))
}

pub fn save_state(path: &Path, controller: &InMemoryController) -> Result<(), CliError> {
    let shown = || path.display().to_string();
    let snapshot = controller.snapshot();
    let yaml = serde_yaml_ng::to_string(&snapshot).map_err(|e| CliError::State(shown(), e.to_string()))?;
    std::fs::write(path, yaml).map_err(|e| CliError::State(shown(), e.to_string()))?;
    debug!("Saved {} objects to {}", snapshot.object_count(), path.display());
    Ok(())
}

/// The host id of a `host_uuid.properties` file, as written by the MidoNet agent.
pub fn parse_host_uuid(source: &str, properties: &str) -> Result<HostId, CliError> {
    let value = properties
        .lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix(HOST_UUID_KEY))
        .ok_or_else(|| CliError::HostUuid(source.to_string(), format!("no {HOST_UUID_KEY} line")))?;
    value
        .trim()
        .parse::<HostId>()
        .map_err(|e| CliError::HostUuid(source.to_string(), e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROPERTIES: &str = "#Mon Jan 06 10:12:01 UTC 2025\nhost_uuid=5d1f1b46-52c7-4b4b-9b0b-9bd1e7c3a001\n";

    #[test]
    fn host_uuid_is_read_from_its_line() {
        let host = parse_host_uuid("props", PROPERTIES).unwrap();
        assert_eq!(host.to_string(), "5d1f1b46-52c7-4b4b-9b0b-9bd1e7c3a001");
    }

    #[test]
    fn host_uuid_line_is_required() {
        let err = parse_host_uuid("props", "#empty\n").unwrap_err();
        assert!(matches!(err, CliError::HostUuid(..)));
        let err = parse_host_uuid("props", "host_uuid=not-a-uuid\n").unwrap_err();
        assert!(matches!(err, CliError::HostUuid(..)));
    }
}
