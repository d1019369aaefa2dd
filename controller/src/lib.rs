// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The virtual topology held by a MidoNet controller, and the client interface used to drive it.
//!
//! Every object described here (routers, bridges, ports, routes, chains, rules, port groups and
//! DHCP entries) is owned by the controller.
//! Callers only ever hold identifiers and snapshots of remote state.

#![deny(
    unsafe_code,
    clippy::all,
    clippy::pedantic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic
)]
#![allow(missing_docs)] // multi-index-map generates undocumented structures
#![allow(clippy::unsafe_derive_deserialize)] // generated code uses unsafe
#![allow(clippy::missing_errors_doc)]

pub mod client;
pub mod errors;
pub mod memory;
pub mod model;

pub use client::ControllerClient;
pub use errors::ClientError;
pub use memory::{InMemoryController, TopologySnapshot};
