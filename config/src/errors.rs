// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Type for configuration / validation failures

use ipnet::Ipv4Net;
use std::net::Ipv4Addr;
use thiserror::Error;

/// The reasons why we may reject a configuration
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Could not read config file {0}: {1}")]
    Unreadable(String, String),
    #[error("Malformed config: {0}")]
    Malformed(String),
    #[error("Address {address} of the {link} link is outside of {network}")]
    AddressOutsideLink {
        link: &'static str,
        address: Ipv4Addr,
        network: Ipv4Net,
    },
    #[error("Both ends of the {0} link use address {1}")]
    SameLinkAddress(&'static str, Ipv4Addr),
    #[error("Tenant router name format '{0}' does not contain '{{tenant_id}}'")]
    BadNameFormat(String),
    #[error("Missing mandatory parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Metadata port address {0} is outside of {1}")]
    BadMetadataAddress(Ipv4Addr, Ipv4Net),
}

/// Result-like type for configurations
pub type ConfigResult = Result<(), ConfigError>;
