//! Start command implementation.

use crate::core::config::{Config, ConfigOverrides};
use crate::core::runtime::Runtime;
use anyhow::{Context, Result};
use clap::Args;
use std::path::{Path, PathBuf};

/// Start a shard.
#[derive(Args, Debug, Default)]
pub struct StartArgs {
    /// Shard name; `root` runs the root shard.
    #[arg(long)]
    pub shard_name: Option<String>,

    /// Listen address (host:port).
    #[arg(long)]
    pub bind: Option<String>,

    /// Write the admin kubeconfig here (root shard only).
    #[arg(long)]
    pub kubeconfig: Option<PathBuf>,
}

/// Initialize tracing subscriber if the telemetry feature is enabled.
///
/// `RUST_LOG` wins over the configured level.
#[cfg(feature = "telemetry")]
fn init_tracing(level: &str) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // A subscriber may already be installed when embedded.
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .try_init();
}

#[cfg(not(feature = "telemetry"))]
fn init_tracing(_level: &str) {}

/// Load the config file, or fall back to a root shard with defaults.
pub(crate) fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Ok(Config::for_shard(crate::control::shard::ShardTopology::ROOT_SHARD_NAME)),
    }
}

/// Run the start command.
pub async fn run_start(
    config_path: Option<&Path>,
    log_level: Option<String>,
    args: StartArgs,
) -> Result<()> {
    let mut config = load_config(config_path)?;
    config.apply_overrides(&ConfigOverrides {
        log_level,
        bind: args.bind,
        shard_name: args.shard_name,
        kubeconfig_path: args.kubeconfig,
    });
    config.validate().context("invalid configuration after overrides")?;

    init_tracing(&config.telemetry.log_level);

    Runtime::new(config)?.run().await
}
