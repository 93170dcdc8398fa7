//! Controller groups and their activation order.
//!
//! - [`runner`] - Shared reconcile loop and group adapters
//! - [`namespace`] - Default namespace per tenant
//! - [`rootca`] - Root CA config map and default service account per namespace
//! - [`quota`] - Quota usage accounting
//! - [`services`] - Virtual workspace views or the `/services/` redirect
//! - [`admin`] - Administrative credentials (root shard)
//!
//! [`activation_gate`] registers every group with its activation rule in
//! install order. Workers spawned by an installed group do nothing until
//! the ready gate fires.

pub mod admin;
pub mod namespace;
pub mod quota;
pub mod rootca;
pub mod runner;
pub mod services;

use crate::control::activation::{ActivationRule, ControllerActivationGate, ControllerGroup};
use crate::control::bootstrap::ServingInfo;
use crate::control::features::FeatureGate;
use crate::control::gate::ReadyGate;
use crate::control::resources::{config_maps, namespaces, service_accounts, workspaces};
use crate::control::shard::ShardTopology;
use crate::core::error::PlaneResult;
use crate::net::mux::PreHandlerMux;
use crate::store::ObjectStore;
use runner::{PassiveGroup, ReconcilingGroup, Watch};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Startup options consumed by controller groups.
#[derive(Debug, Clone)]
pub struct ControllerOptions {
    pub resync_interval: Duration,
    pub home_workspaces: bool,
    pub virtual_workspaces: bool,
    /// Redirect target for `/services/` when virtual workspaces are off.
    pub virtual_workspaces_url: String,
    pub serving: ServingInfo,
    pub admin_kubeconfig: Option<PathBuf>,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            resync_interval: Duration::from_secs(30),
            home_workspaces: false,
            virtual_workspaces: true,
            virtual_workspaces_url: String::new(),
            serving: ServingInfo::default(),
            admin_kubeconfig: None,
        }
    }
}

/// Everything a controller group needs to install itself.
#[derive(Clone)]
pub struct ControllerContext {
    pub store: Arc<ObjectStore>,
    pub ready: ReadyGate,
    pub token: CancellationToken,
    pub tasks: TaskTracker,
    pub mux: Arc<PreHandlerMux>,
    pub topology: ShardTopology,
    pub options: ControllerOptions,
}

/// Publishes the serving CA read at install time.
struct RootCaGroup;

impl ControllerGroup<ControllerContext> for RootCaGroup {
    fn name(&self) -> &'static str {
        "root-ca-configmap"
    }

    fn install(&self, ctx: &ControllerContext) -> PlaneResult<()> {
        let ca_data = match &ctx.options.serving.cert_path {
            Some(path) => std::fs::read_to_string(path).unwrap_or_else(|error| {
                tracing::warn!(path = %path.display(), error = %error, "failed to read serving certificate");
                String::new()
            }),
            None => String::new(),
        };
        runner::spawn_worker(
            ctx,
            self.name(),
            Watch::Resources(vec![namespaces(), config_maps()]),
            Arc::new(rootca::RootCaReconciler::new(ca_data)),
        );
        Ok(())
    }
}

/// Group for the default namespace, which needs the shard role.
struct NamespaceGroup;

impl ControllerGroup<ControllerContext> for NamespaceGroup {
    fn name(&self) -> &'static str {
        "namespace"
    }

    fn install(&self, ctx: &ControllerContext) -> PlaneResult<()> {
        runner::spawn_worker(
            ctx,
            self.name(),
            Watch::Resources(vec![workspaces(), namespaces()]),
            Arc::new(namespace::NamespaceReconciler::new(ctx.topology.owns_root_tenant())),
        );
        Ok(())
    }
}

fn passive(name: &'static str) -> Arc<PassiveGroup> {
    Arc::new(PassiveGroup::new(name))
}

/// Every controller group in install order.
pub fn activation_gate(options: &ControllerOptions) -> ControllerActivationGate<ControllerContext> {
    ControllerActivationGate::new()
        .with(ActivationRule::Always, Arc::new(NamespaceGroup))
        .with(ActivationRule::Always, passive("clusterrole-aggregation"))
        .with(
            ActivationRule::Always,
            Arc::new(ReconcilingGroup::new(
                "serviceaccount",
                Watch::Resources(vec![namespaces(), service_accounts()]),
                Arc::new(rootca::ServiceAccountReconciler),
            )),
        )
        .with(ActivationRule::Always, passive("serviceaccount-token"))
        .with(ActivationRule::Always, Arc::new(RootCaGroup))
        .with(ActivationRule::Enabled, passive("cluster"))
        .with(ActivationRule::Enabled, passive("workspace-scheduler"))
        .with(ActivationRule::Option(options.home_workspaces), passive("home-workspaces"))
        .with(ActivationRule::Enabled, passive("resource-scheduler"))
        .with(ActivationRule::Enabled, passive("apibinding"))
        .with(ActivationRule::Enabled, passive("apiexport"))
        .with(
            ActivationRule::EnabledWithFeature(FeatureGate::LocationApi),
            passive("scheduling"),
        )
        .with(
            ActivationRule::Enabled,
            Arc::new(ReconcilingGroup::new("quota", Watch::All, Arc::new(quota::QuotaReconciler))),
        )
        .with(
            ActivationRule::Option(options.virtual_workspaces),
            Arc::new(services::VirtualWorkspacesGroup),
        )
        .with(
            ActivationRule::Option(!options.virtual_workspaces),
            Arc::new(services::ServicesRedirectGroup),
        )
        .with(ActivationRule::RootOnly, Arc::new(admin::AdminCredentialsGroup))
}
