// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The topology configuration object and its sections.

use crate::errors::{ConfigError, ConfigResult};
use derive_builder::Builder;
use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::Path;
use tracing::debug;

/// Placeholder substituted with the tenant id in [`TenantRouterConfig::name_format`].
pub const TENANT_ID_PLACEHOLDER: &str = "{tenant_id}";

const fn addr(a: u8, b: u8, c: u8, d: u8) -> Ipv4Addr {
    Ipv4Addr::new(a, b, c, d)
}

const fn net(a: u8, b: u8, c: u8, d: u8, len: u8) -> Ipv4Net {
    Ipv4Net::new_assert(Ipv4Addr::new(a, b, c, d), len)
}

/// A point-to-point link between a tenant router and some other device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct LinkConfig {
    /// The link network
    pub network: Ipv4Net,
    /// Address of the port on the tenant router side
    pub tenant_address: Ipv4Addr,
    /// Address of the port on the other side
    pub peer_address: Ipv4Addr,
}

impl LinkConfig {
    #[must_use]
    pub const fn new(network: Ipv4Net, tenant_address: Ipv4Addr, peer_address: Ipv4Addr) -> Self {
        Self {
            network,
            tenant_address,
            peer_address,
        }
    }

    /// Check that both ends are distinct addresses of the link network.
    pub fn validate(&self, link: &'static str) -> ConfigResult {
        for address in [self.tenant_address, self.peer_address] {
            if !self.network.contains(&address) {
                return Err(ConfigError::AddressOutsideLink {
                    link,
                    address,
                    network: self.network,
                });
            }
        }
        if self.tenant_address == self.peer_address {
            return Err(ConfigError::SameLinkAddress(link, self.tenant_address));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Tenant owning the provider and metadata devices
    pub tenant_id: String,
    pub router_name: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            tenant_id: "mido_provider".to_string(),
            router_name: "MidonetProviderRouter".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TenantRouterConfig {
    /// Name of the router of a tenant, with `{tenant_id}` standing for the tenant id
    pub name_format: String,
    /// The link to the provider router (peer side is the provider router)
    pub uplink: LinkConfig,
}

impl Default for TenantRouterConfig {
    fn default() -> Self {
        Self {
            name_format: format!("os_project_router_{TENANT_ID_PLACEHOLDER}"),
            uplink: LinkConfig::new(net(10, 0, 0, 0, 30), addr(10, 0, 0, 1), addr(10, 0, 0, 2)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct MetadataConfig {
    pub router_name: String,
    pub bridge_name: String,
    /// Address of the metadata router port facing the metadata bridge
    pub port_address: Ipv4Addr,
    pub port_network: Ipv4Net,
    /// The address VMs send metadata requests to
    pub service_address: Ipv4Addr,
    pub listen_port: u16,
    /// The port the metadata service really listens on
    pub service_port: u16,
    /// The link from a tenant router to the metadata router (peer side is the metadata router)
    pub tenant_link: LinkConfig,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            router_name: "MidonetMetadataRouter".to_string(),
            bridge_name: "MidonetMetadataBridge".to_string(),
            port_address: addr(169, 254, 169, 253),
            port_network: net(169, 254, 0, 0, 16),
            service_address: addr(169, 254, 169, 254),
            listen_port: 80,
            service_port: 8775,
            tenant_link: LinkConfig::new(
                net(169, 254, 169, 248, 30),
                addr(169, 254, 169, 249),
                addr(169, 254, 169, 250),
            ),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Let VMs of the same subnet talk to each other regardless of their security groups
    pub allow_same_net_traffic: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            allow_same_net_traffic: true,
        }
    }
}

/// Credentials for the controller API. Carried for the external client only.
#[derive(Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub uri: String,
    pub username: String,
    pub password: String,
    pub tenant: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            uri: "http://localhost:8080/midonet-api".to_string(),
            username: String::new(),
            password: String::new(),
            tenant: String::new(),
        }
    }
}

impl std::fmt::Debug for ControllerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerConfig")
            .field("uri", &self.uri)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("tenant", &self.tenant)
            .finish()
    }
}

/// Everything the topology engine needs to know besides the requests themselves.
#[derive(Builder, Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[builder(default)]
#[serde(default)]
pub struct TopologyConfig {
    pub provider: ProviderConfig,
    pub tenant_router: TenantRouterConfig,
    /// The link set up by an external gateway (peer side is the provider router)
    pub gateway_link: LinkConfig,
    pub metadata: MetadataConfig,
    pub security: SecurityConfig,
    pub controller: ControllerConfig,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            tenant_router: TenantRouterConfig::default(),
            gateway_link: LinkConfig::new(
                net(169, 254, 255, 0, 30),
                addr(169, 254, 255, 2),
                addr(169, 254, 255, 1),
            ),
            metadata: MetadataConfig::default(),
            security: SecurityConfig::default(),
            controller: ControllerConfig::default(),
        }
    }
}

impl TopologyConfig {
    /// Parse a YAML document. Missing keys take their default value.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        serde_yaml_ng::from_str(yaml).map_err(|e| ConfigError::Malformed(e.to_string()))
    }

    /// Read, parse and validate the config file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Unreadable(path.display().to_string(), e.to_string()))?;
        let config = Self::from_yaml(&yaml)?;
        config.validate()?;
        debug!("Loaded topology config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult {
        if self.provider.tenant_id.is_empty() {
            return Err(ConfigError::MissingParameter("provider.tenant_id"));
        }
        if self.provider.router_name.is_empty() {
            return Err(ConfigError::MissingParameter("provider.router_name"));
        }
        if !self.tenant_router.name_format.contains(TENANT_ID_PLACEHOLDER) {
            return Err(ConfigError::BadNameFormat(
                self.tenant_router.name_format.clone(),
            ));
        }
        self.tenant_router.uplink.validate("tenant uplink")?;
        self.gateway_link.validate("external gateway")?;
        self.metadata.tenant_link.validate("metadata")?;
        if !self.metadata.port_network.contains(&self.metadata.port_address) {
            return Err(ConfigError::BadMetadataAddress(
                self.metadata.port_address,
                self.metadata.port_network,
            ));
        }
        Ok(())
    }

    /// The name of the router of tenant `tenant_id`.
    #[must_use]
    pub fn tenant_router_name(&self, tenant_id: &str) -> String {
        self.tenant_router
            .name_format
            .replace(TENANT_ID_PLACEHOLDER, tenant_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;

    #[test]
    fn defaults_are_valid() {
        let config = TopologyConfig::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.tenant_router_name("t1"), "os_project_router_t1");
        assert_eq!(config.gateway_link.peer_address, addr(169, 254, 255, 1));
        assert!(config.security.allow_same_net_traffic);
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let yaml = r"
provider:
  tenant_id: admin
security:
  allow_same_net_traffic: false
metadata:
  service_port: 9000
";
        let config = TopologyConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.provider.tenant_id, "admin");
        assert_eq!(config.provider.router_name, "MidonetProviderRouter");
        assert!(!config.security.allow_same_net_traffic);
        assert_eq!(config.metadata.service_port, 9000);
        assert_eq!(config.metadata.listen_port, 80);
        assert_eq!(config.tenant_router, TenantRouterConfig::default());
    }

    #[test]
    fn malformed_yaml_is_reported() {
        let err = TopologyConfig::from_yaml("provider: [1, 2").unwrap_err();
        assert!(matches!(err, ConfigError::Malformed(_)));
    }

    #[test]
    fn link_addresses_are_checked() {
        let mut config = TopologyConfig::default();
        config.gateway_link.tenant_address = addr(10, 9, 9, 9);
        assert_eq!(
            config.validate(),
            Err(ConfigError::AddressOutsideLink {
                link: "external gateway",
                address: addr(10, 9, 9, 9),
                network: net(169, 254, 255, 0, 30),
            })
        );

        let mut config = TopologyConfig::default();
        config.tenant_router.uplink.peer_address = config.tenant_router.uplink.tenant_address;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::SameLinkAddress("tenant uplink", _))
        ));
    }

    #[test]
    fn name_format_needs_placeholder() {
        let mut config = TopologyConfig::default();
        config.tenant_router.name_format = "os_project_router".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::BadNameFormat(_))
        ));
    }

    #[test]
    fn builder_overrides_sections() {
        let config = TopologyConfigBuilder::default()
            .security(SecurityConfig {
                allow_same_net_traffic: false,
            })
            .build()
            .unwrap();
        assert!(!config.security.allow_same_net_traffic);
        assert_eq!(config.provider, ProviderConfig::default());
    }

    #[test]
    fn password_is_not_logged() {
        let mut controller = ControllerConfig::default();
        controller.password = "s3cret".to_string();
        assert!(!format!("{controller:?}").contains("s3cret"));
    }

    #[test]
    #[traced_test]
    fn load_reads_and_validates() {
        let path = std::env::temp_dir().join(format!("midonet-config-{}.yml", std::process::id()));
        std::fs::write(&path, "provider:\n  router_name: Edge\n").unwrap();
        let config = TopologyConfig::load(&path).unwrap();
        assert_eq!(config.provider.router_name, "Edge");
        assert!(logs_contain("Loaded topology config"));
        std::fs::remove_file(&path).unwrap();

        let err = TopologyConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Unreadable(..)));
    }

    #[test]
    fn tenant_router_names_are_distinct() {
        let config = TopologyConfig::default();
        bolero::check!()
            .with_type()
            .for_each(|(a, b): &(String, String)| {
                if a != b {
                    assert_ne!(config.tenant_router_name(a), config.tenant_router_name(b));
                }
            });
    }
}
