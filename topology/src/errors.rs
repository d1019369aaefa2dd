// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Errors of the topology engine, and the report of best-effort cleanups.

use controller::ClientError;
use controller::model::ResourceKind;
use std::fmt::Display;
use thiserror::Error;
use tracing::warn;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TopologyError {
    /// An object which must exist is missing from the controller.
    #[error("{kind} {id} not found")]
    ResourceNotFound { kind: ResourceKind, id: String },
    /// An object which must not exist yet is already there.
    #[error("{kind} '{name}' already exists")]
    AlreadyExists { kind: ResourceKind, name: String },
    #[error("Unsupported configuration: {0}")]
    UnsupportedConfiguration(String),
    /// The controller does not hold what the caller's own state says it should.
    #[error("Controller and local state are out of sync: {0}")]
    OutOfSync(String),
    #[error("{kind} {id} rejected by the controller: {reason}")]
    Rejected {
        kind: ResourceKind,
        id: String,
        reason: String,
    },
    #[error("Failure talking to the controller: {0}")]
    RemoteTransportFailure(String),
}

impl TopologyError {
    pub fn not_found(kind: ResourceKind, id: impl Display) -> Self {
        TopologyError::ResourceNotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn already_exists(kind: ResourceKind, name: impl Display) -> Self {
        TopologyError::AlreadyExists {
            kind,
            name: name.to_string(),
        }
    }
}

impl From<ClientError> for TopologyError {
    fn from(value: ClientError) -> Self {
        match value {
            ClientError::NotFound { kind, id } => TopologyError::ResourceNotFound { kind, id },
            ClientError::Rejected { kind, id, reason } => {
                TopologyError::Rejected { kind, id, reason }
            }
            ClientError::Transport(e) => TopologyError::RemoteTransportFailure(e),
        }
    }
}

pub type TopologyResult<T> = Result<T, TopologyError>;

/// A cleanup step which found nothing to clean up.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BestEffortCleanupFailure {
    pub step: &'static str,
    pub kind: ResourceKind,
    pub id: String,
}

/// Outcome of a teardown sequence that tolerates already-removed objects.
///
/// Teardowns may be re-run after a partial attempt, so an object which is already gone is
/// recorded here and the sequence carries on. Any other failure aborts the sequence.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[must_use]
pub struct CleanupReport {
    pub skipped: Vec<BestEffortCleanupFailure>,
}

impl CleanupReport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Absorb the result of one cleanup call.
    ///
    /// # Errors
    /// Every error other than [`ClientError::NotFound`] is returned as is.
    pub fn tolerate<T>(
        &mut self,
        step: &'static str,
        result: Result<T, ClientError>,
    ) -> TopologyResult<Option<T>> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(ClientError::NotFound { kind, id }) => {
                warn!("Cleanup step '{step}': {kind} {id} is already gone");
                self.skipped.push(BestEffortCleanupFailure { step, kind, id });
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Record that a step found nothing to act on, without having called the controller.
    pub fn absent(&mut self, step: &'static str, kind: ResourceKind, id: impl Display) {
        let id = id.to_string();
        warn!("Cleanup step '{step}': no {kind} {id} to remove");
        self.skipped.push(BestEffortCleanupFailure { step, kind, id });
    }

    pub fn merge(&mut self, other: CleanupReport) {
        self.skipped.extend(other.skipped);
    }

    /// True if every step found something to remove.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// More than one object answers to a name that should be unique.
///
/// Two racing find-or-create calls may both create. The oldest match in listing order is kept;
/// the others are reported and left alone.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DuplicateResourceWarning {
    pub kind: ResourceKind,
    pub name: String,
    pub kept: String,
    pub duplicates: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    fn client_errors_map_onto_topology_errors() {
        let e: TopologyError = ClientError::not_found(ResourceKind::Port, "p1").into();
        assert_eq!(e, TopologyError::not_found(ResourceKind::Port, "p1"));
        let e: TopologyError = ClientError::Transport("timeout".to_string()).into();
        assert!(matches!(e, TopologyError::RemoteTransportFailure(_)));
    }

    #[test]
    #[traced_test]
    fn only_not_found_is_tolerated() {
        let mut report = CleanupReport::new();
        let gone: Result<(), _> = Err(ClientError::not_found(ResourceKind::Rule, "r1"));
        assert_eq!(report.tolerate("delete rule", gone), Ok(None));
        assert!(logs_contain("already gone"));
        assert!(!report.is_clean());

        let refused: Result<(), _> = Err(ClientError::rejected(ResourceKind::Port, "p", "linked"));
        assert!(matches!(
            report.tolerate("delete port", refused),
            Err(TopologyError::Rejected { .. })
        ));
        assert_eq!(report.tolerate("delete route", Ok(3)), Ok(Some(3)));
        assert_eq!(report.skipped.len(), 1);
    }
}
