//! Configuration parsing and validation.
//!
//! kplane configuration is loaded from TOML files with CLI overrides.
//! Every section except `[shard]` may be omitted.

use crate::control::activation::{EnabledControllerSet, ENABLEABLE_CONTROLLERS};
use crate::control::bootstrap::{BootstrapSettings, FailurePolicy, HomeWorkspaceOptions, ServingInfo};
use crate::control::cluster::LogicalCluster;
use crate::control::features::FeatureGates;
use crate::control::shard::ShardTopology;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level kplane configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Identity and addresses of this shard.
    pub shard: ShardConfig,

    /// Controller enablement.
    #[serde(default)]
    pub controllers: ControllersConfig,

    /// Feature gates.
    #[serde(default)]
    pub features: FeaturesConfig,

    /// Home workspace scaffolding.
    #[serde(default)]
    pub home_workspaces: HomeWorkspacesConfig,

    /// In-process virtual workspaces.
    #[serde(default)]
    pub virtual_workspaces: VirtualWorkspacesConfig,

    /// Bootstrap polling and failure handling.
    #[serde(default)]
    pub bootstrap: BootstrapConfig,

    /// Administrative credential output.
    #[serde(default)]
    pub admin: AdminConfig,

    /// Telemetry and observability configuration.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Shard identity and addresses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShardConfig {
    /// Shard name; `"root"` selects the root role.
    pub name: String,

    /// Address clients use to reach this shard (host:port).
    #[serde(default = "default_external_address")]
    pub external_address: String,

    /// Serving certificate, read fresh whenever a client config is built.
    #[serde(default)]
    pub serving_cert_path: Option<PathBuf>,

    /// HTTP bind address.
    #[serde(default = "default_bind")]
    pub bind: String,
}

/// Controller enablement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllersConfig {
    /// Start every enableable controller.
    #[serde(default)]
    pub enable_all: bool,

    /// Controllers to start when `enable_all` is false.
    #[serde(default)]
    pub enabled: Vec<String>,

    /// Resync interval of reconciling controllers in milliseconds.
    #[serde(default = "default_resync_ms")]
    pub resync_ms: u64,
}

impl Default for ControllersConfig {
    fn default() -> Self {
        Self {
            enable_all: false,
            enabled: Vec::new(),
            resync_ms: default_resync_ms(),
        }
    }
}

/// Feature gates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeaturesConfig {
    #[serde(default)]
    pub gates: Vec<String>,
}

/// Home workspace scaffolding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HomeWorkspacesConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Logical cluster under which home workspaces live.
    #[serde(default = "default_home_root_prefix")]
    pub root_prefix: String,

    /// Groups allowed to create home workspaces.
    #[serde(default = "default_home_creator_groups")]
    pub creator_groups: Vec<String>,
}

impl Default for HomeWorkspacesConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            root_prefix: default_home_root_prefix(),
            creator_groups: default_home_creator_groups(),
        }
    }
}

/// In-process virtual workspaces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VirtualWorkspacesConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Redirect target for `/services/` when disabled.
    #[serde(default)]
    pub external_url: String,
}

impl Default for VirtualWorkspacesConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            external_url: String::new(),
        }
    }
}

/// Bootstrap polling and failure handling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapConfig {
    #[serde(default = "default_readiness_poll_ms")]
    pub readiness_poll_ms: u64,

    #[serde(default = "default_identity_poll_ms")]
    pub identity_poll_ms: u64,

    #[serde(default = "default_cache_sync_poll_ms")]
    pub cache_sync_poll_ms: u64,

    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            readiness_poll_ms: default_readiness_poll_ms(),
            identity_poll_ms: default_identity_poll_ms(),
            cache_sync_poll_ms: default_cache_sync_poll_ms(),
            failure_policy: FailurePolicy::default(),
        }
    }
}

/// Administrative credential output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdminConfig {
    /// Where the root shard writes the admin client configuration.
    #[serde(default)]
    pub kubeconfig_path: Option<PathBuf>,
}

/// Telemetry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_external_address() -> String {
    "localhost:6443".to_string()
}

fn default_bind() -> String {
    "127.0.0.1:6443".to_string()
}

fn default_resync_ms() -> u64 {
    30_000
}

fn default_home_root_prefix() -> String {
    "root:users".to_string()
}

fn default_home_creator_groups() -> Vec<String> {
    vec!["system:authenticated".to_string()]
}

fn default_true() -> bool {
    true
}

fn default_readiness_poll_ms() -> u64 {
    100
}

fn default_identity_poll_ms() -> u64 {
    500
}

fn default_cache_sync_poll_ms() -> u64 {
    100
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Minimal configuration for a named shard.
    pub fn for_shard(name: impl Into<String>) -> Self {
        Self {
            shard: ShardConfig {
                name: name.into(),
                external_address: default_external_address(),
                serving_cert_path: None,
                bind: default_bind(),
            },
            controllers: ControllersConfig::default(),
            features: FeaturesConfig::default(),
            home_workspaces: HomeWorkspacesConfig::default(),
            virtual_workspaces: VirtualWorkspacesConfig::default(),
            bootstrap: BootstrapConfig::default(),
            admin: AdminConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        Self::from_toml(&content)
    }

    /// Load configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).with_context(|| "failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    /// Render the configuration as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to serialize config")
    }

    /// Apply CLI overrides to the configuration.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(ref log_level) = overrides.log_level {
            self.telemetry.log_level = log_level.clone();
        }
        if let Some(ref bind) = overrides.bind {
            self.shard.bind = bind.clone();
        }
        if let Some(ref shard_name) = overrides.shard_name {
            self.shard.name = shard_name.clone();
        }
        if let Some(ref path) = overrides.kubeconfig_path {
            self.admin.kubeconfig_path = Some(path.clone());
        }
    }

    /// Validate configuration consistency.
    pub fn validate(&self) -> Result<()> {
        self.validate_shard()?;
        self.validate_controllers()?;
        self.validate_features()?;
        self.validate_home_workspaces()?;
        self.validate_bootstrap()?;
        self.validate_telemetry()?;
        Ok(())
    }

    fn validate_shard(&self) -> Result<()> {
        if self.shard.name.trim().is_empty() {
            anyhow::bail!("shard.name must not be empty");
        }
        self.bind_addr()?;
        Ok(())
    }

    fn validate_controllers(&self) -> Result<()> {
        let unknown = self.enabled_controllers().unknown();
        if !unknown.is_empty() {
            anyhow::bail!(
                "controllers.enabled contains unknown controllers {:?}; known: {:?}",
                unknown,
                ENABLEABLE_CONTROLLERS
            );
        }
        if self.controllers.resync_ms == 0 {
            anyhow::bail!("controllers.resync_ms must be > 0");
        }
        Ok(())
    }

    fn validate_features(&self) -> Result<()> {
        FeatureGates::parse(&self.features.gates)
            .map_err(|error| anyhow::anyhow!("features.gates: {}", error))?;
        Ok(())
    }

    fn validate_home_workspaces(&self) -> Result<()> {
        if !self.home_workspaces.enabled {
            return Ok(());
        }
        let prefix = &self.home_workspaces.root_prefix;
        if prefix.is_empty() {
            anyhow::bail!("home_workspaces.root_prefix required when home workspaces are enabled");
        }
        let cluster = LogicalCluster::new(prefix.as_str());
        let absolute = prefix == LogicalCluster::ROOT
            || prefix.starts_with(&format!("{}:", LogicalCluster::ROOT));
        if !absolute || !cluster.is_valid() {
            anyhow::bail!(
                "home_workspaces.root_prefix must be an absolute logical cluster below root, got: {}",
                prefix
            );
        }
        Ok(())
    }

    fn validate_bootstrap(&self) -> Result<()> {
        for (name, value) in [
            ("readiness_poll_ms", self.bootstrap.readiness_poll_ms),
            ("identity_poll_ms", self.bootstrap.identity_poll_ms),
            ("cache_sync_poll_ms", self.bootstrap.cache_sync_poll_ms),
        ] {
            if value == 0 {
                anyhow::bail!("bootstrap.{} must be > 0", name);
            }
        }
        Ok(())
    }

    fn validate_telemetry(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.telemetry.log_level.as_str()) {
            anyhow::bail!(
                "telemetry.log_level must be one of {:?}, got: {}",
                valid_levels,
                self.telemetry.log_level
            );
        }
        Ok(())
    }

    /// Parsed bind address.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.shard
            .bind
            .parse()
            .with_context(|| format!("invalid shard.bind address: {}", self.shard.bind))
    }

    /// Shard topology derived from the shard name.
    pub fn topology(&self) -> ShardTopology {
        ShardTopology::from_name(self.shard.name.clone())
    }

    pub fn enabled_controllers(&self) -> EnabledControllerSet {
        EnabledControllerSet::new(self.controllers.enable_all, self.controllers.enabled.iter().cloned())
    }

    /// Parsed feature gates.
    pub fn feature_gates(&self) -> Result<FeatureGates> {
        FeatureGates::parse(&self.features.gates)
            .map_err(|error| anyhow::anyhow!("features.gates: {}", error))
    }

    pub fn bootstrap_settings(&self) -> BootstrapSettings {
        BootstrapSettings {
            readiness_poll: Duration::from_millis(self.bootstrap.readiness_poll_ms),
            identity_poll: Duration::from_millis(self.bootstrap.identity_poll_ms),
            cache_sync_poll: Duration::from_millis(self.bootstrap.cache_sync_poll_ms),
            failure_policy: self.bootstrap.failure_policy,
        }
    }

    pub fn serving_info(&self) -> ServingInfo {
        ServingInfo {
            external_address: self.shard.external_address.clone(),
            cert_path: self.shard.serving_cert_path.clone(),
        }
    }

    /// Home workspace inputs; an empty prefix when disabled.
    pub fn home_workspace_options(&self) -> HomeWorkspaceOptions {
        if !self.home_workspaces.enabled {
            return HomeWorkspaceOptions::default();
        }
        HomeWorkspaceOptions {
            root_prefix: self.home_workspaces.root_prefix.clone(),
            creator_groups: self.home_workspaces.creator_groups.clone(),
        }
    }
}

/// CLI override options that can be applied to configuration.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Override log level.
    pub log_level: Option<String>,
    /// Override bind address.
    pub bind: Option<String>,
    /// Override shard name.
    pub shard_name: Option<String>,
    /// Override admin kubeconfig output path.
    pub kubeconfig_path: Option<PathBuf>,
}
