// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use midonet_cli::args::{CmdArgs, Parser};
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_file(true)
        .with_level(true)
        .with_line_number(true)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = CmdArgs::parse();
    init_logging(&args.log_level);
    match midonet_cli::run(&args).await {
        Ok(output) => {
            for (key, value) in output {
                println!("{key}={value}");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
