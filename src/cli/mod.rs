//! Command-line interface.
//!
//! Unified CLI for running and configuring a kplane shard.

pub mod commands;

use clap::{Parser, Subcommand};

/// kplane - multi-tenant control-plane shard.
#[derive(Parser, Debug)]
#[command(name = "kplane")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path.
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start a shard.
    Start(commands::StartArgs),
    /// Configuration operations.
    Config(commands::ConfigArgs),
}
