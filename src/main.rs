//! kplane - unified CLI entrypoint.
//!
//! Usage:
//!   kplane start --config config/kplane.toml
//!   kplane start --shard-name shard-1 --bind 127.0.0.1:6444
//!   kplane config validate --config config/kplane.toml
//!   kplane config generate --shard root

use anyhow::Result;
use clap::Parser;
use kplane::cli::commands::{run_config, run_start};
use kplane::cli::{Cli, Commands};
use std::path::PathBuf;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.map(PathBuf::from);

    match cli.command {
        Commands::Start(args) => run_start(config_path.as_deref(), cli.log_level, args).await,
        Commands::Config(args) => run_config(config_path.as_deref(), args),
    }
}
