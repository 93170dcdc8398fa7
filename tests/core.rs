//! Core infrastructure tests.

mod common;

use common::{create_minimal_config, write_config};
use kplane::control::bootstrap::FailurePolicy;
use kplane::control::shard::ShardRole;
use kplane::core::config::{Config, ConfigOverrides};
use kplane::core::runtime::Runtime;
use std::path::PathBuf;
use std::time::Duration;

// ============================================================================
// Config tests
// ============================================================================

#[test]
fn parse_minimal_config() {
    let file = create_minimal_config("root");
    let config = Config::from_file(file.path()).unwrap();

    assert_eq!(config.shard.name, "root");
    assert_eq!(config.shard.bind, "127.0.0.1:6443");
    assert_eq!(config.shard.external_address, "localhost:6443");
    assert_eq!(config.controllers.resync_ms, 30_000);
    assert!(!config.controllers.enable_all);
    assert!(!config.home_workspaces.enabled);
    assert!(config.virtual_workspaces.enabled);
    assert_eq!(config.bootstrap.failure_policy, FailurePolicy::Halt);
    assert_eq!(config.telemetry.log_level, "info");
    assert_eq!(config.topology().role(), ShardRole::Root);
}

#[test]
fn parse_full_config() {
    let file = write_config(
        r#"
[shard]
name = "shard-1"
external_address = "shard-1.example:6443"
bind = "0.0.0.0:7443"

[controllers]
enabled = ["quota", "apibinding"]
resync_ms = 1000

[features]
gates = ["location-api"]

[home_workspaces]
enabled = true
root_prefix = "root:home"
creator_groups = ["team-a"]

[virtual_workspaces]
enabled = false
external_url = "https://vw.example"

[bootstrap]
identity_poll_ms = 250
failure_policy = "retry"

[admin]
kubeconfig_path = "/tmp/admin.kubeconfig"

[telemetry]
log_level = "debug"
"#,
    );
    let config = Config::from_file(file.path()).unwrap();

    assert_eq!(config.topology().role(), ShardRole::Other);
    assert!(config.enabled_controllers().contains("quota"));
    assert!(!config.enabled_controllers().contains("cluster"));
    assert_eq!(config.bind_addr().unwrap().port(), 7443);

    let settings = config.bootstrap_settings();
    assert_eq!(settings.identity_poll, Duration::from_millis(250));
    assert_eq!(settings.readiness_poll, Duration::from_millis(100));
    assert_eq!(settings.failure_policy, FailurePolicy::Retry);

    let home = config.home_workspace_options();
    assert_eq!(home.root_prefix, "root:home");
    assert_eq!(home.creator_groups, vec!["team-a".to_string()]);

    assert_eq!(
        config.admin.kubeconfig_path,
        Some(PathBuf::from("/tmp/admin.kubeconfig"))
    );
    assert_eq!(config.serving_info().external_address, "shard-1.example:6443");
}

#[test]
fn missing_shard_section_is_rejected() {
    let result = Config::from_toml("[telemetry]\nlog_level = \"info\"\n");
    assert!(result.is_err());
}

#[test]
fn validate_empty_shard_name() {
    let err = Config::from_toml("[shard]\nname = \"\"\n").unwrap_err();
    assert!(err.to_string().contains("shard.name"));
}

#[test]
fn validate_unknown_controller() {
    let err = Config::from_toml(
        r#"
[shard]
name = "root"

[controllers]
enabled = ["quota", "no-such-controller"]
"#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("no-such-controller"));
}

#[test]
fn validate_unknown_feature_gate() {
    let err = Config::from_toml(
        r#"
[shard]
name = "root"

[features]
gates = ["Teleportation"]
"#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("features.gates"));
}

#[test]
fn validate_home_prefix_must_be_under_root() {
    let err = Config::from_toml(
        r#"
[shard]
name = "root"

[home_workspaces]
enabled = true
root_prefix = "users"
"#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("root_prefix"));

    // Disabled home workspaces ignore the prefix.
    let config = Config::from_toml(
        r#"
[shard]
name = "root"

[home_workspaces]
root_prefix = "users"
"#,
    )
    .unwrap();
    assert!(config.home_workspace_options().root_prefix.is_empty());
}

#[test]
fn validate_zero_polls_and_bad_log_level() {
    let zero_poll = Config::from_toml(
        r#"
[shard]
name = "root"

[bootstrap]
identity_poll_ms = 0
"#,
    );
    assert!(zero_poll.unwrap_err().to_string().contains("identity_poll_ms"));

    let bad_level = Config::from_toml(
        r#"
[shard]
name = "root"

[telemetry]
log_level = "loud"
"#,
    );
    assert!(bad_level.unwrap_err().to_string().contains("log_level"));
}

#[test]
fn validate_bad_bind_address() {
    let err = Config::from_toml("[shard]\nname = \"root\"\nbind = \"not-an-address\"\n").unwrap_err();
    assert!(err.to_string().contains("shard.bind"));
}

#[test]
fn overrides_take_precedence() {
    let mut config = Config::for_shard("root");
    config.apply_overrides(&ConfigOverrides {
        log_level: Some("warn".to_string()),
        bind: Some("127.0.0.1:9443".to_string()),
        shard_name: Some("shard-2".to_string()),
        kubeconfig_path: Some(PathBuf::from("/tmp/kc")),
    });
    config.validate().unwrap();

    assert_eq!(config.telemetry.log_level, "warn");
    assert_eq!(config.bind_addr().unwrap().port(), 9443);
    assert_eq!(config.topology().role(), ShardRole::Other);
    assert_eq!(config.admin.kubeconfig_path, Some(PathBuf::from("/tmp/kc")));
}

#[test]
fn config_round_trips_through_toml() {
    let mut config = Config::for_shard("shard-3");
    config.controllers.enable_all = true;
    let parsed = Config::from_toml(&config.to_toml().unwrap()).unwrap();
    assert_eq!(parsed.shard.name, "shard-3");
    assert!(parsed.controllers.enable_all);
}

// ============================================================================
// Runtime construction tests
// ============================================================================

#[test]
fn runtime_registers_bootstrap_hook_and_probes() {
    let runtime = Runtime::new(Config::for_shard("root")).unwrap();

    let hooks = runtime.hooks().statuses();
    assert_eq!(hooks.len(), 1);
    assert!(hooks.contains_key(kplane::core::runtime::BOOTSTRAP_HOOK));

    let patterns = runtime.mux().patterns();
    for path in ["/healthz", "/readyz", "/metrics"] {
        assert!(patterns.iter().any(|p| p == path), "missing {}", path);
    }
    assert!(!runtime.ready().is_ready());
    assert!(runtime.phase_log().events().is_empty());
}

#[test]
fn runtime_rejects_invalid_config() {
    let mut config = Config::for_shard("root");
    config.controllers.resync_ms = 0;
    assert!(Runtime::new(config).is_err());
}
