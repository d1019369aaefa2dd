// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Failures reported by a controller client.

use crate::model::ResourceKind;
use std::fmt::Display;
use thiserror::Error;

/// The reasons a controller call may fail.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ClientError {
    /// The referenced object does not exist (the HTTP 404 equivalent).
    #[error("{kind} {id} not found")]
    NotFound { kind: ResourceKind, id: String },
    /// The controller refused the operation, e.g. deleting a port which is still linked.
    #[error("{kind} {id} rejected by the controller: {reason}")]
    Rejected {
        kind: ResourceKind,
        id: String,
        reason: String,
    },
    /// Network or authentication failure while talking to the controller.
    #[error("controller transport failure: {0}")]
    Transport(String),
}

impl ClientError {
    pub fn not_found(kind: ResourceKind, id: impl Display) -> Self {
        ClientError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn rejected(kind: ResourceKind, id: impl Display, reason: impl Into<String>) -> Self {
        ClientError::Rejected {
            kind,
            id: id.to_string(),
            reason: reason.into(),
        }
    }

    /// True if this error only says that the referenced object is already gone.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound { .. })
    }
}
