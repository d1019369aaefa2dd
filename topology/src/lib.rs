// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Map OpenStack networks, subnets, ports, routers, security groups and floating IPs onto a
//! MidoNet virtual topology.
//!
//! The controller owns every object; this crate only computes which controller calls to make,
//! in which order, and how to undo them.
//! Everything is find-or-create: any operation may be re-run after a crash part way through.

#![deny(
    unsafe_code,
    clippy::all,
    clippy::pedantic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic
)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]

pub mod errors;
pub mod lifecycle;
pub mod links;
pub mod locator;
pub mod naming;
pub mod request;
pub mod synth;

pub use errors::{
    BestEffortCleanupFailure, CleanupReport, DuplicateResourceWarning, TopologyError,
    TopologyResult,
}; // re-export
pub use lifecycle::{Orchestrator, SecurityGroupDevices, VifChains}; // re-export
pub use locator::Locator; // re-export
