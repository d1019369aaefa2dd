// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

pub use clap::Parser;
use clap::Subcommand;
use std::path::PathBuf;

pub const DEFAULT_HOST_UUID_FILE: &str = "/etc/midolman/host_uuid.properties";
pub const DEFAULT_UPLINK_INTERFACE: &str = "midonet";

#[derive(Debug, Parser)]
#[command(name = "midonet-setup")]
#[command(version)]
#[command(about = "Set up the provider devices of a MidoNet deployment", long_about = None)]
pub struct CmdArgs {
    #[arg(short = 'u', long = "uri", value_name = "MIDONET_URI")]
    pub uri: Option<String>,
    #[arg(
        long,
        value_name = "FILE",
        help = "YAML snapshot of the controller, read before and written back after the command"
    )]
    pub state: Option<PathBuf>,
    #[arg(long, value_name = "FILE", help = "YAML topology configuration")]
    pub config: Option<PathBuf>,
    #[arg(
        long,
        value_name = "LEVEL",
        default_value = "info",
        help = "Log filter, used when RUST_LOG is not set"
    )]
    pub log_level: String,

    /// MidoNet admin username
    pub username: String,
    /// MidoNet admin password
    pub password: String,
    /// Tenant owning the provider devices
    pub provider_tenant_id: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Find or create the provider router and the metadata devices
    ProviderDevices,
    /// Bind an exterior port of the provider router to a local interface
    FakeUplink {
        #[arg(long, value_name = "FILE", default_value = DEFAULT_HOST_UUID_FILE)]
        host_uuid_file: PathBuf,
        #[arg(long, value_name = "NAME", default_value = DEFAULT_UPLINK_INTERFACE)]
        interface: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn args_are_consistent() {
        CmdArgs::command().debug_assert();
    }

    #[test]
    fn positionals_come_before_the_subcommand() {
        let args = CmdArgs::try_parse_from([
            "midonet-setup",
            "-u",
            "http://mido:8080/midonet-api",
            "admin",
            "secret",
            "provider",
            "fake-uplink",
            "--interface",
            "veth0",
        ])
        .unwrap();
        assert_eq!(args.uri.as_deref(), Some("http://mido:8080/midonet-api"));
        assert_eq!(args.username, "admin");
        assert_eq!(args.provider_tenant_id, "provider");
        match args.command {
            Command::FakeUplink {
                host_uuid_file,
                interface,
            } => {
                assert_eq!(host_uuid_file, PathBuf::from(DEFAULT_HOST_UUID_FILE));
                assert_eq!(interface, "veth0");
            }
            Command::ProviderDevices => panic!("wrong subcommand"),
        }
    }
}
