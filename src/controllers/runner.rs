//! Reconcile loop shared by the active controllers.
//!
//! A worker waits for the ready gate, reconciles once, then reconciles
//! again whenever a matching watch event arrives or the resync interval
//! elapses, until its token is cancelled.

use super::ControllerContext;
use crate::control::activation::ControllerGroup;
use crate::control::cluster::GroupResource;
use crate::core::error::PlaneResult;
use crate::store::{ObjectStore, WatchEvent};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

/// Events that trigger a reconcile.
#[derive(Debug, Clone)]
pub enum Watch {
    /// Any change in the store.
    All,
    /// Changes to these group-resources only.
    Resources(Vec<GroupResource>),
}

impl Watch {
    fn matches(&self, event: &WatchEvent) -> bool {
        match self {
            Self::All => true,
            Self::Resources(resources) => {
                let object = event.object();
                resources
                    .iter()
                    .any(|gr| gr.group == object.group && gr.resource == object.resource)
            }
        }
    }
}

/// Level-triggered reconciliation over the whole store.
pub trait Reconciler: Send + Sync {
    /// Converge the store; returns the number of objects written.
    fn reconcile(&self, store: &ObjectStore) -> PlaneResult<usize>;
}

/// Spawn a worker for `reconciler` on the context's task tracker.
pub fn spawn_worker(
    ctx: &ControllerContext,
    name: &'static str,
    watch: Watch,
    reconciler: Arc<dyn Reconciler>,
) {
    let store = ctx.store.clone();
    let ready = ctx.ready.clone();
    let token = ctx.token.child_token();
    let resync = ctx.options.resync_interval;

    ctx.tasks.spawn(async move {
        if !ready.wait_or_cancel(&token).await {
            return;
        }
        let mut events = store.subscribe();
        tracing::info!(controller = name, "controller started");

        loop {
            match reconciler.reconcile(&store) {
                Ok(0) => {}
                Ok(changed) => tracing::debug!(controller = name, changed, "reconciled"),
                Err(error) => tracing::warn!(controller = name, error = %error, "reconcile failed"),
            }

            let tick = tokio::time::sleep(resync);
            tokio::pin!(tick);
            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        tracing::info!(controller = name, "controller stopped");
                        return;
                    }
                    _ = &mut tick => break,
                    event = events.recv() => match event {
                        Ok(event) if watch.matches(&event) => break,
                        Ok(_) => continue,
                        Err(RecvError::Lagged(_)) => break,
                        Err(RecvError::Closed) => return,
                    },
                }
            }
        }
    });
}

/// Group running one reconciler.
pub struct ReconcilingGroup {
    name: &'static str,
    watch: Watch,
    reconciler: Arc<dyn Reconciler>,
}

impl ReconcilingGroup {
    pub fn new(name: &'static str, watch: Watch, reconciler: Arc<dyn Reconciler>) -> Self {
        Self {
            name,
            watch,
            reconciler,
        }
    }
}

impl ControllerGroup<ControllerContext> for ReconcilingGroup {
    fn name(&self) -> &'static str {
        self.name
    }

    fn install(&self, ctx: &ControllerContext) -> PlaneResult<()> {
        spawn_worker(ctx, self.name, self.watch.clone(), self.reconciler.clone());
        Ok(())
    }
}

/// Group whose reconciliation lives outside this process.
pub struct PassiveGroup {
    name: &'static str,
}

impl PassiveGroup {
    pub fn new(name: &'static str) -> Self {
        Self { name }
    }
}

impl ControllerGroup<ControllerContext> for PassiveGroup {
    fn name(&self) -> &'static str {
        self.name
    }

    fn install(&self, _ctx: &ControllerContext) -> PlaneResult<()> {
        tracing::debug!(controller = self.name, "registered passive controller");
        Ok(())
    }
}
