// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Configuration of the topology engine: device names, link addressing and security knobs.
//! A [`TopologyConfig`] is read once at process start (from YAML, or built with
//! [`TopologyConfigBuilder`]) and then shared, read-only, by everything that needs it.

#![deny(
    unsafe_code,
    clippy::all,
    clippy::pedantic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic
)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]

pub mod errors;
pub mod topology;

pub use errors::{ConfigError, ConfigResult}; // re-export
pub use topology::{
    ControllerConfig, LinkConfig, MetadataConfig, ProviderConfig, SecurityConfig,
    TenantRouterConfig, TopologyConfig, TopologyConfigBuilder,
}; // re-export
