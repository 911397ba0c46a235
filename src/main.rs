use std::path::PathBuf;

use clap::Parser;

use simplerpc::{run, RunOptions, DEFAULT_PORT};

/// Bridges editor activity to Discord Rich Presence.
#[derive(Parser)]
#[command(name = "simplerpc", version, about)]
struct Args {
    /// Port for the local control API (0 picks an ephemeral port).
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Override the settings file location.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let _log_guard = simplerpc::logging::init();

    if let Err(err) = run(RunOptions {
        port: args.port,
        config_path: args.config,
    })
    .await
    {
        tracing::error!("{}", err);
        std::process::exit(1);
    }
}
