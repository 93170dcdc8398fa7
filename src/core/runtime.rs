//! Main runtime orchestration.
//!
//! The runtime wires the server together:
//! - Construction: store → handler chain → mux and probes → informers →
//!   bootstrap orchestrator registered as a post-start hook
//! - Start: controller activation → listener → post-start hooks
//! - Shutdown: cancel the server token → drain tasks

use crate::api::{BuiltinApi, ExtensionApi};
use crate::control::activation::ActivationInputs;
use crate::control::bootstrap::{
    BootstrapDeps, BootstrapOrchestrator, BootstrapOutcome, PhaseLog,
};
use crate::control::cache::{Informer, InformerFactory, StoreInformer};
use crate::control::gate::ReadyGate;
use crate::control::hooks::{HookContext, PostStartHooks};
use crate::control::identity::IdentityResolver;
use crate::control::resources;
use crate::controllers::{activation_gate, ControllerContext, ControllerOptions};
use crate::core::config::Config;
use crate::net::handler::{ComposedHandler, Handler, HandlerChainComposer};
use crate::net::mux::{MuxedHandler, PreHandlerMux};
use crate::net::server::{HttpListener, HttpListenerConfig};
use crate::ops::health::HealthEndpoints;
use crate::ops::observability::PlaneMetrics;
use crate::store::quota::resource_quotas;
use crate::store::ObjectStore;
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Name of the post-start hook running the bootstrap sequence.
pub const BOOTSTRAP_HOOK: &str = "bootstrap";

/// How long shutdown waits for in-flight tasks.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// kplane runtime holding all component handles.
pub struct Runtime {
    config: Arc<Config>,
    store: Arc<ObjectStore>,
    metrics: Arc<PlaneMetrics>,
    ready: ReadyGate,
    hooks: Arc<PostStartHooks>,
    mux: Arc<PreHandlerMux>,
    chain: ComposedHandler,
    phase_log: Arc<PhaseLog>,
    token: CancellationToken,
    tasks: TaskTracker,
}

impl Runtime {
    /// Build every component. Fails if the handler chain cannot be
    /// assembled or a probe route cannot be mounted.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config);
        let store = Arc::new(ObjectStore::new());
        let metrics = Arc::new(PlaneMetrics::new());
        let ready = ReadyGate::new();
        let hooks = Arc::new(PostStartHooks::new());
        let token = CancellationToken::new();

        let chain = HandlerChainComposer::new()
            .delegate("extensions", Arc::new(ExtensionApi::new(store.clone())))
            .fallback("builtin", Arc::new(BuiltinApi::new(store.clone())))
            .with_metrics(metrics.clone())
            .compose()
            .context("failed to assemble handler chain")?;

        let mux = Arc::new(PreHandlerMux::new());
        HealthEndpoints::new(ready.clone(), hooks.clone(), metrics.clone())
            .register(&mux)
            .context("failed to mount probe endpoints")?;

        let infrastructure = Arc::new(InformerFactory::new("infrastructure", store.clone()));
        for gr in [
            resources::cluster_roles(),
            resources::cluster_role_bindings(),
            resources::custom_resource_definitions(),
            resources::logical_clusters(),
            resources::shards(),
        ] {
            infrastructure.for_resource(&gr);
        }

        let exports = StoreInformer::new(store.clone(), resources::api_exports());
        let bindings = StoreInformer::new(store.clone(), resources::api_bindings());
        let resolver = Arc::new(IdentityResolver::new(Arc::new(exports.clone())));

        let surface = Arc::new(InformerFactory::new("surface", store.clone()));
        for gr in [
            resources::workspaces(),
            resources::workspace_types(),
            resources::namespaces(),
            resources::api_resource_schemas(),
            resource_quotas(),
        ] {
            surface.for_resource(&gr);
        }

        let orchestrator = Arc::new(BootstrapOrchestrator::new(BootstrapDeps {
            topology: config.topology(),
            settings: config.bootstrap_settings(),
            bootstrapper: Arc::new(crate::install::StoreBootstrapper::new(store.clone())),
            infrastructure,
            dependent: vec![
                Arc::new(exports) as Arc<dyn Informer>,
                Arc::new(bindings) as Arc<dyn Informer>,
            ],
            surface,
            resolver,
            ready: ready.clone(),
            serving: config.serving_info(),
            home: config.home_workspace_options(),
            metrics: metrics.clone(),
        }));
        let phase_log = orchestrator.log();

        hooks
            .add(BOOTSTRAP_HOOK, move |ctx: HookContext| async move {
                match orchestrator.run(&ctx.token).await? {
                    BootstrapOutcome::Ready => tracing::info!("bootstrap finished"),
                    BootstrapOutcome::Cancelled { phase } => {
                        tracing::info!(phase = %phase, "bootstrap cancelled")
                    }
                    BootstrapOutcome::Halted { phase, error } => tracing::error!(
                        phase = %phase,
                        error = %error,
                        "bootstrap halted, shard will not become ready"
                    ),
                }
                anyhow::Ok(())
            })
            .context("failed to register bootstrap hook")?;

        tracing::info!(
            shard = %config.shard.name,
            role = %config.topology().role(),
            "runtime constructed"
        );

        Ok(Self {
            config,
            store,
            metrics,
            ready,
            hooks,
            mux,
            chain,
            phase_log,
            token,
            tasks: TaskTracker::new(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> Arc<ObjectStore> {
        self.store.clone()
    }

    pub fn metrics(&self) -> Arc<PlaneMetrics> {
        self.metrics.clone()
    }

    pub fn ready(&self) -> ReadyGate {
        self.ready.clone()
    }

    pub fn hooks(&self) -> Arc<PostStartHooks> {
        self.hooks.clone()
    }

    pub fn mux(&self) -> Arc<PreHandlerMux> {
        self.mux.clone()
    }

    /// The composed API chain, without the pre-handler mux.
    pub fn chain(&self) -> ComposedHandler {
        self.chain.clone()
    }

    pub fn phase_log(&self) -> Arc<PhaseLog> {
        self.phase_log.clone()
    }

    fn controller_options(&self) -> ControllerOptions {
        ControllerOptions {
            resync_interval: Duration::from_millis(self.config.controllers.resync_ms),
            home_workspaces: self.config.home_workspaces.enabled,
            virtual_workspaces: self.config.virtual_workspaces.enabled,
            virtual_workspaces_url: self.config.virtual_workspaces.external_url.clone(),
            serving: self.config.serving_info(),
            admin_kubeconfig: self.config.admin.kubeconfig_path.clone(),
        }
    }

    /// Install the selected controller groups. Their workers stay idle
    /// until the ready gate fires.
    fn activate_controllers(&self) -> Result<()> {
        let options = self.controller_options();
        let inputs = ActivationInputs {
            topology: self.config.topology(),
            enabled: self.config.enabled_controllers(),
            features: self.config.feature_gates()?,
        };
        let ctx = ControllerContext {
            store: self.store.clone(),
            ready: self.ready.clone(),
            token: self.token.clone(),
            tasks: self.tasks.clone(),
            mux: self.mux.clone(),
            topology: inputs.topology.clone(),
            options: options.clone(),
        };
        let installed = activation_gate(&options)
            .activate(&inputs, &ctx)
            .context("failed to start controllers")?;
        for _ in &installed {
            self.metrics.record_controller_installed();
        }
        tracing::info!(controllers = ?installed, "controllers installed");
        Ok(())
    }

    /// Install controllers, bind the listener and run post-start hooks.
    pub async fn start(self) -> Result<ServerHandle> {
        if let Err(error) = self.activate_controllers() {
            self.token.cancel();
            return Err(error);
        }

        let listener = HttpListener::bind(HttpListenerConfig {
            bind_addr: self.config.bind_addr()?,
            nodelay: true,
            ..Default::default()
        })
        .await?;
        let local_addr = listener.local_addr();

        let handler: Arc<dyn Handler> = Arc::new(MuxedHandler::new(
            self.mux.clone(),
            Arc::new(self.chain.clone()),
        ));
        self.tasks
            .spawn(listener.serve(handler, self.token.clone(), self.tasks.clone()));

        let hooks = self.hooks.clone();
        let token = self.token.clone();
        let supervisor = tokio::spawn(async move {
            if let Err(error) = hooks.run_all(&token).await {
                tracing::error!(error = %format!("{:#}", error), "post-start hook failed, shutting down");
                token.cancel();
                return Err(error);
            }
            token.cancelled().await;
            Ok(())
        });

        tracing::info!(addr = %local_addr, shard = %self.config.shard.name, "server started");
        Ok(ServerHandle {
            local_addr,
            runtime: self,
            supervisor: Some(supervisor),
        })
    }

    /// Run until interrupted or a post-start hook fails.
    pub async fn run(self) -> Result<()> {
        let mut handle = self.start().await?;
        let result = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::warn!("shutdown signal received (SIGINT)");
                Ok(())
            }
            result = handle.wait() => result,
        };
        handle.stop().await?;
        result
    }
}

/// A running server.
pub struct ServerHandle {
    local_addr: SocketAddr,
    runtime: Runtime,
    supervisor: Option<JoinHandle<Result<()>>>,
}

impl ServerHandle {
    /// Address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// Token cancelled on shutdown.
    pub fn token(&self) -> CancellationToken {
        self.runtime.token.clone()
    }

    /// Wait until the server shuts down or a post-start hook fails.
    pub async fn wait(&mut self) -> Result<()> {
        match self.supervisor.take() {
            Some(supervisor) => supervisor.await.context("supervisor task panicked")?,
            None => Ok(()),
        }
    }

    /// Cancel every task and wait for them to drain.
    pub async fn stop(mut self) -> Result<()> {
        tracing::info!("shutdown requested");
        self.runtime.token.cancel();
        self.runtime.tasks.close();
        if tokio::time::timeout(SHUTDOWN_TIMEOUT, self.runtime.tasks.wait())
            .await
            .is_err()
        {
            tracing::warn!(
                timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
                "tasks did not drain before shutdown timeout"
            );
        }
        let result = self.wait().await;
        tracing::info!("runtime stopped");
        result
    }
}
