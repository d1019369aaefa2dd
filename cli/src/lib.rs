// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Provider-side setup of a MidoNet deployment: the provider router, the metadata devices and
//! the fake uplink used in test deployments.

#![deny(clippy::all, clippy::pedantic, clippy::unwrap_used, clippy::expect_used)]
#![allow(clippy::missing_errors_doc)]

pub mod args;
pub mod errors;
pub mod state;

use args::{CmdArgs, Command};
use config::TopologyConfig;
use controller::ControllerClient;
use controller::model::TenantId;
use errors::CliError;
use std::path::Path;
use std::sync::Arc;
use topology::Locator;
use tracing::info;

/// Ordered `key=value` pairs printed by the command.
pub type Output = Vec<(&'static str, String)>;

/// The topology configuration for `args`: the configuration file (or defaults) with the
/// command line values on top.
pub fn build_config(args: &CmdArgs) -> Result<TopologyConfig, CliError> {
    let mut config = match &args.config {
        Some(path) => TopologyConfig::load(path)?,
        None => TopologyConfig::default(),
    };
    if let Some(uri) = &args.uri {
        config.controller.uri.clone_from(uri);
    }
    config.controller.username.clone_from(&args.username);
    config.controller.password.clone_from(&args.password);
    config.provider.tenant_id.clone_from(&args.provider_tenant_id);
    config.validate()?;
    Ok(config)
}

/// Run `command` against `client`.
pub async fn execute<C: ControllerClient>(
    client: Arc<C>,
    config: Arc<TopologyConfig>,
    command: &Command,
) -> Result<Output, CliError> {
    let provider_tenant = TenantId::new(config.provider.tenant_id.as_str());
    let locator = Locator::new(client, config);
    match command {
        Command::ProviderDevices => {
            let provider = locator.get_or_create_provider_router(&provider_tenant).await?;
            let metadata = locator.ensure_metadata_devices(&provider_tenant).await?;
            info!(
                "Provider router {} and metadata router {} are in place",
                provider.resource().id,
                metadata.router.resource().id
            );
            Ok(vec![
                ("provider_router_id", provider.resource().id.to_string()),
                ("metadata_router_id", metadata.router.resource().id.to_string()),
                ("metadata_bridge_id", metadata.bridge.resource().id.to_string()),
                ("metadata_port_id", metadata.exterior_port.id.to_string()),
            ])
        }
        Command::FakeUplink {
            host_uuid_file,
            interface,
        } => {
            let host = read_host_uuid(host_uuid_file)?;
            let port = locator
                .setup_fake_uplink(&provider_tenant, host, interface)
                .await?;
            Ok(vec![("uplink_port_id", port.id.to_string())])
        }
    }
}

fn read_host_uuid(path: &Path) -> Result<controller::model::HostId, CliError> {
    let shown = path.display().to_string();
    let properties =
        std::fs::read_to_string(path).map_err(|e| CliError::HostUuid(shown.clone(), e.to_string()))?;
    state::parse_host_uuid(&shown, &properties)
}

/// Run the command of `args`, loading and saving the controller state when a state file is
/// given.
pub async fn run(args: &CmdArgs) -> Result<Output, CliError> {
    let config = Arc::new(build_config(args)?);
    let client = Arc::new(match &args.state {
        Some(path) => state::load_state(path)?,
        None => controller::InMemoryController::new(),
    });
    let output = execute(client.clone(), config, &args.command).await?;
    if let Some(path) = &args.state {
        state::save_state(path, &client)?;
    }
    Ok(output)
}
