//! stow - resumable copy/sync client for local disks and S3-compatible storage

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod backend;
mod commands;
mod exit_code;
mod output;

/// Environment variable holding a tracing filter, e.g. `STOW_LOG=stow_core=debug`
const LOG_ENV: &str = "STOW_LOG";

#[tokio::main]
async fn main() {
    let cli = commands::Cli::parse();
    init_tracing(cli.global.debug);

    let code = commands::execute(cli).await;
    std::process::exit(code.as_i32());
}

fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
