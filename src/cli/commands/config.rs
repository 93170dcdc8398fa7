//! Config command implementation.

use super::start::load_config;
use crate::core::config::Config;
use anyhow::Result;
use clap::{Args, Subcommand};
use std::path::{Path, PathBuf};

/// Configuration operations.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Validate the configuration file.
    Validate,
    /// Print the effective configuration with defaults filled in.
    Show {
        /// Output format (toml, json).
        #[arg(long, default_value = "toml")]
        format: String,
    },
    /// Generate a configuration template.
    Generate {
        /// Shard name for the template.
        #[arg(long, default_value = "root")]
        shard: String,
        /// Output file path.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Run the config command.
pub fn run_config(config_path: Option<&Path>, args: ConfigArgs) -> Result<()> {
    match args.command {
        ConfigCommand::Validate => validate_config(config_path),
        ConfigCommand::Show { format } => show_config(config_path, &format),
        ConfigCommand::Generate { shard, output } => generate_config(&shard, output.as_deref()),
    }
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let Some(path) = path else {
        anyhow::bail!("no config file given (use --config)");
    };
    let config = load_config(Some(path))?;
    println!("✓ Configuration is valid");
    println!("  shard:       {} ({})", config.shard.name, config.topology().role());
    println!("  bind:        {}", config.shard.bind);
    println!("  controllers: {}", describe_controllers(&config));
    Ok(())
}

fn describe_controllers(config: &Config) -> String {
    if config.controllers.enable_all {
        "all".to_string()
    } else if config.controllers.enabled.is_empty() {
        "always-on only".to_string()
    } else {
        config.controllers.enabled.join(", ")
    }
}

fn show_config(path: Option<&Path>, format: &str) -> Result<()> {
    let config = load_config(path)?;
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&config)?),
        "toml" => println!("{}", config.to_toml()?),
        other => anyhow::bail!("unknown format {:?} (expected toml or json)", other),
    }
    Ok(())
}

fn generate_template(shard: &str) -> Result<String> {
    let config = Config::for_shard(shard);
    config.validate()?;
    Ok(format!("# kplane configuration for shard {:?}\n\n{}", shard, config.to_toml()?))
}

fn generate_config(shard: &str, output: Option<&Path>) -> Result<()> {
    let template = generate_template(shard)?;
    match output {
        Some(path) => {
            std::fs::write(path, &template)?;
            println!("Generated config template: {}", path.display());
        }
        None => println!("{}", template),
    }
    Ok(())
}
