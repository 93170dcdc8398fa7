//! Controller activation gate.
//!
//! Decides which controller groups to install, in a fixed order, from the
//! shard role, the configured enabled-set, feature gates and options. The
//! first construction failure aborts activation.

use crate::control::features::{FeatureGate, FeatureGates};
use crate::control::shard::ShardTopology;
use crate::core::error::{PlaneError, PlaneResult};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Controller groups selectable through the enabled-set.
pub const ENABLEABLE_CONTROLLERS: &[&str] = &[
    "cluster",
    "workspace-scheduler",
    "resource-scheduler",
    "apibinding",
    "apiexport",
    "scheduling",
    "quota",
];

/// Either every controller group or an explicit named subset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnabledControllerSet {
    All,
    Only(BTreeSet<String>),
}

impl EnabledControllerSet {
    /// Build the set from the `enable_all` flag and an explicit list.
    pub fn new<I, S>(enable_all: bool, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if enable_all {
            Self::All
        } else {
            Self::Only(names.into_iter().map(Into::into).collect())
        }
    }

    /// Check whether a named group is enabled.
    pub fn contains(&self, name: &str) -> bool {
        match self {
            Self::All => true,
            Self::Only(names) => names.contains(name),
        }
    }

    /// Names not in [`ENABLEABLE_CONTROLLERS`].
    pub fn unknown(&self) -> Vec<String> {
        match self {
            Self::All => Vec::new(),
            Self::Only(names) => names
                .iter()
                .filter(|name| !ENABLEABLE_CONTROLLERS.contains(&name.as_str()))
                .cloned()
                .collect(),
        }
    }
}

/// A controller group that can be constructed and started.
pub trait ControllerGroup<C>: Send + Sync {
    fn name(&self) -> &'static str;

    /// Construct the group and spawn its workers.
    fn install(&self, ctx: &C) -> PlaneResult<()>;
}

/// When a group is installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationRule {
    /// Unconditionally.
    Always,
    /// When its name is in the enabled-set.
    Enabled,
    /// When its name is enabled and the feature gate is on.
    EnabledWithFeature(FeatureGate),
    /// When a startup option is set; fixed at construction.
    Option(bool),
    /// Only on the shard owning the root tenant.
    RootOnly,
}

/// Inputs evaluated once per activation.
#[derive(Debug, Clone)]
pub struct ActivationInputs {
    pub topology: ShardTopology,
    pub enabled: EnabledControllerSet,
    pub features: FeatureGates,
}

impl ActivationRule {
    fn should_start(&self, name: &str, inputs: &ActivationInputs) -> bool {
        match self {
            Self::Always => true,
            Self::Enabled => inputs.enabled.contains(name),
            Self::EnabledWithFeature(gate) => {
                inputs.features.is_enabled(*gate) && inputs.enabled.contains(name)
            }
            Self::Option(enabled) => *enabled,
            Self::RootOnly => inputs.topology.issues_admin_credentials(),
        }
    }
}

/// Ordered list of controller groups with their activation rules.
pub struct ControllerActivationGate<C> {
    groups: Vec<(ActivationRule, Arc<dyn ControllerGroup<C>>)>,
}

impl<C> Default for ControllerActivationGate<C> {
    fn default() -> Self {
        Self { groups: Vec::new() }
    }
}

impl<C> ControllerActivationGate<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a group; groups are installed in registration order.
    pub fn register(&mut self, rule: ActivationRule, group: Arc<dyn ControllerGroup<C>>) {
        self.groups.push((rule, group));
    }

    /// Builder form of [`register`](Self::register).
    pub fn with(mut self, rule: ActivationRule, group: Arc<dyn ControllerGroup<C>>) -> Self {
        self.register(rule, group);
        self
    }

    /// Registered group names in order.
    pub fn names(&self) -> Vec<&'static str> {
        self.groups.iter().map(|(_, group)| group.name()).collect()
    }

    /// Names of the groups that would be installed for these inputs.
    pub fn plan(&self, inputs: &ActivationInputs) -> Vec<&'static str> {
        self.groups
            .iter()
            .filter(|(rule, group)| rule.should_start(group.name(), inputs))
            .map(|(_, group)| group.name())
            .collect()
    }

    /// Install every selected group in order, aborting on the first
    /// construction error. Returns the names of the installed groups.
    pub fn activate(&self, inputs: &ActivationInputs, ctx: &C) -> PlaneResult<Vec<&'static str>> {
        if let EnabledControllerSet::Only(names) = &inputs.enabled {
            if !names.is_empty() {
                tracing::info!(controllers = ?names, "starting controllers individually");
            }
        }

        let mut installed = Vec::new();
        for (rule, group) in &self.groups {
            let name = group.name();
            if !rule.should_start(name, inputs) {
                tracing::debug!(controller = name, "controller group not enabled");
                continue;
            }
            group.install(ctx).map_err(|error| match error {
                PlaneError::ControllerInstall { .. } => error,
                other => PlaneError::controller_install(name, other),
            })?;
            tracing::info!(controller = name, "controller group installed");
            installed.push(name);
        }
        Ok(installed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::shard::ShardRole;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    #[derive(Default)]
    struct InstallLog {
        calls: Mutex<HashMap<&'static str, u32>>,
    }

    struct FakeGroup {
        name: &'static str,
        fail: bool,
    }

    impl ControllerGroup<InstallLog> for FakeGroup {
        fn name(&self) -> &'static str {
            self.name
        }

        fn install(&self, log: &InstallLog) -> PlaneResult<()> {
            *log.calls.lock().entry(self.name).or_default() += 1;
            if self.fail {
                return Err(PlaneError::internal("bad configuration"));
            }
            Ok(())
        }
    }

    fn group(name: &'static str) -> Arc<dyn ControllerGroup<InstallLog>> {
        Arc::new(FakeGroup { name, fail: false })
    }

    fn gate() -> ControllerActivationGate<InstallLog> {
        ControllerActivationGate::new()
            .with(ActivationRule::Always, group("namespace"))
            .with(ActivationRule::Enabled, group("cluster"))
            .with(ActivationRule::Enabled, group("apibinding"))
            .with(
                ActivationRule::EnabledWithFeature(FeatureGate::LocationApi),
                group("scheduling"),
            )
            .with(ActivationRule::Enabled, group("quota"))
            .with(ActivationRule::Option(false), group("virtual-workspaces"))
            .with(ActivationRule::RootOnly, group("admin-credentials"))
    }

    fn inputs(role: ShardRole, enabled: EnabledControllerSet) -> ActivationInputs {
        ActivationInputs {
            topology: ShardTopology::new("shard", role),
            enabled,
            features: FeatureGates::new(),
        }
    }

    #[test]
    fn explicit_set_installs_only_named_groups() {
        let log = InstallLog::default();
        let installed = gate()
            .activate(
                &inputs(ShardRole::Other, EnabledControllerSet::new(false, ["quota"])),
                &log,
            )
            .unwrap();
        assert_eq!(installed, vec!["namespace", "quota"]);
        let calls = log.calls.lock();
        assert_eq!(calls.get("quota"), Some(&1));
        assert!(calls.get("cluster").is_none());
        assert!(calls.get("apibinding").is_none());
    }

    #[test]
    fn enable_all_installs_every_group_once() {
        let log = InstallLog::default();
        let mut all = inputs(
            ShardRole::Root,
            EnabledControllerSet::new(true, ["quota", "bogus"]),
        );
        all.features.enable(FeatureGate::LocationApi);
        let installed = gate().activate(&all, &log).unwrap();

        assert_eq!(
            installed,
            vec!["namespace", "cluster", "apibinding", "scheduling", "quota", "admin-credentials"]
        );
        assert!(log.calls.lock().values().all(|count| *count == 1));
    }

    #[test]
    fn feature_gate_is_required_in_addition_to_enablement() {
        let all = inputs(ShardRole::Other, EnabledControllerSet::All);
        assert!(!gate().plan(&all).contains(&"scheduling"));

        let mut gated = inputs(
            ShardRole::Other,
            EnabledControllerSet::new(false, ["quota"]),
        );
        gated.features.enable(FeatureGate::LocationApi);
        assert!(!gate().plan(&gated).contains(&"scheduling"));
    }

    #[test]
    fn root_only_groups_follow_topology() {
        let root = inputs(ShardRole::Root, EnabledControllerSet::All);
        let other = inputs(ShardRole::Other, EnabledControllerSet::All);
        assert!(gate().plan(&root).contains(&"admin-credentials"));
        assert!(!gate().plan(&other).contains(&"admin-credentials"));
    }

    #[test]
    fn construction_failure_aborts_activation() {
        let log = InstallLog::default();
        let gate = ControllerActivationGate::new()
            .with(ActivationRule::Always, group("namespace"))
            .with(
                ActivationRule::Always,
                Arc::new(FakeGroup {
                    name: "broken",
                    fail: true,
                }),
            )
            .with(ActivationRule::Always, group("quota"));

        let err = gate
            .activate(&inputs(ShardRole::Other, EnabledControllerSet::All), &log)
            .unwrap_err();
        assert!(matches!(err, PlaneError::ControllerInstall { ref group, .. } if group == "broken"));
        assert!(log.calls.lock().get("quota").is_none());
    }

    #[test]
    fn unknown_names_are_reported() {
        let set = EnabledControllerSet::new(false, ["quota", "bogus"]);
        assert_eq!(set.unknown(), vec!["bogus".to_string()]);
        assert!(EnabledControllerSet::All.unknown().is_empty());
    }
}
