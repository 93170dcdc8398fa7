//! Post-start hooks.
//!
//! Hooks are registered by name before the server starts and run
//! concurrently once the listener is bound. A hook returning an error is
//! fatal to the process.

use crate::core::error::{PlaneError, PlaneResult};
use anyhow::Context;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Boxed hook future.
pub type HookFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

type HookFn = Box<dyn FnOnce(HookContext) -> HookFuture + Send>;

/// Context handed to a running hook.
#[derive(Debug, Clone)]
pub struct HookContext {
    pub name: String,
    /// Child of the server token; cancelled on shutdown.
    pub token: CancellationToken,
}

/// Lifecycle of one hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookStatus {
    Pending,
    Running,
    Completed,
    Failed(String),
}

impl fmt::Display for HookStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str("pending"),
            Self::Running => f.write_str("running"),
            Self::Completed => f.write_str("ok"),
            Self::Failed(error) => write!(f, "failed: {}", error),
        }
    }
}

/// Named post-start hook registry.
#[derive(Default)]
pub struct PostStartHooks {
    pending: Mutex<Vec<(String, HookFn)>>,
    statuses: Arc<RwLock<BTreeMap<String, HookStatus>>>,
    started: AtomicBool,
}

impl PostStartHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hook. Names must be unique, and registration closes once
    /// the hooks have been started.
    pub fn add<F, Fut>(&self, name: impl Into<String>, hook: F) -> PlaneResult<()>
    where
        F: FnOnce(HookContext) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let name = name.into();
        if self.started.load(Ordering::Acquire) {
            return Err(PlaneError::internal(format!(
                "post-start hook {:?} registered after start",
                name
            )));
        }
        let mut statuses = self.statuses.write();
        if statuses.contains_key(&name) {
            return Err(PlaneError::DuplicateHook { name });
        }
        statuses.insert(name.clone(), HookStatus::Pending);
        self.pending
            .lock()
            .push((name, Box::new(move |ctx| Box::pin(hook(ctx)))));
        Ok(())
    }

    /// Current status of every registered hook.
    pub fn statuses(&self) -> BTreeMap<String, HookStatus> {
        self.statuses.read().clone()
    }

    /// Whether every registered hook has completed successfully.
    pub fn all_completed(&self) -> bool {
        self.statuses
            .read()
            .values()
            .all(|status| *status == HookStatus::Completed)
    }

    /// Run every registered hook concurrently and wait for all of them.
    ///
    /// Returns the first hook error; remaining hooks keep running until
    /// the caller cancels the token.
    pub async fn run_all(&self, token: &CancellationToken) -> anyhow::Result<()> {
        self.started.store(true, Ordering::Release);
        let hooks = std::mem::take(&mut *self.pending.lock());

        let mut tasks = JoinSet::new();
        for (name, hook) in hooks {
            self.set_status(&name, HookStatus::Running);
            let ctx = HookContext {
                name: name.clone(),
                token: token.child_token(),
            };
            tracing::debug!(hook = %name, "starting post-start hook");
            tasks.spawn(async move { (name, hook(ctx).await) });
        }

        while let Some(joined) = tasks.join_next().await {
            let (name, result) = joined.context("post-start hook panicked")?;
            match result {
                Ok(()) => {
                    tracing::info!(hook = %name, "post-start hook completed");
                    self.set_status(&name, HookStatus::Completed);
                }
                Err(error) => {
                    tracing::error!(hook = %name, error = %error, "post-start hook failed");
                    self.set_status(&name, HookStatus::Failed(error.to_string()));
                    tasks.detach_all();
                    return Err(error.context(format!("post-start hook {} failed", name)));
                }
            }
        }
        Ok(())
    }

    fn set_status(&self, name: &str, status: HookStatus) {
        self.statuses.write().insert(name.to_string(), status);
    }
}
