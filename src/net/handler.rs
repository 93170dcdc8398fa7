//! Handler chain composition.
//!
//! [`HandlerChainComposer`] merges independently built delegates into one
//! entry point. For each request the delegates are asked, in registration
//! order, whether they own the addressed group; the first owner serves
//! the request and everything unclaimed falls through to the fallback.
//! Ownership is evaluated per request, so a group registered at runtime
//! changes routing immediately.

use super::response;
use super::target::RequestTarget;
use crate::core::error::{PlaneError, PlaneResult};
use crate::ops::observability::PlaneMetrics;
use bytes::Bytes;
use http::{Request, Response};
use std::collections::BTreeSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Boxed response future.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Response<Bytes>> + Send>>;

/// A request handler.
///
/// Handlers that need the parsed [`RequestTarget`] read it from the
/// request extensions; the composed chain inserts it before dispatch.
pub trait Handler: Send + Sync {
    fn handle(&self, request: Request<Bytes>) -> HandlerFuture;
}

/// Introspection of resource-group ownership.
pub trait GroupOwner: Send + Sync {
    /// Whether this delegate serves the group addressed by `target`.
    fn owns_group(&self, target: &RequestTarget) -> bool;
}

/// A handler that can claim resource groups.
pub trait Delegate: Handler + GroupOwner {}

impl<T: Handler + GroupOwner> Delegate for T {}

impl<F> Handler for F
where
    F: Fn(Request<Bytes>) -> HandlerFuture + Send + Sync,
{
    fn handle(&self, request: Request<Bytes>) -> HandlerFuture {
        self(request)
    }
}

/// Builder for a [`ComposedHandler`].
#[derive(Default)]
pub struct HandlerChainComposer {
    delegates: Vec<(String, Arc<dyn Delegate>)>,
    fallback: Option<(String, Arc<dyn Handler>)>,
    metrics: Option<Arc<PlaneMetrics>>,
}

impl HandlerChainComposer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a delegate consulted before those added after it.
    pub fn delegate(mut self, name: impl Into<String>, delegate: Arc<dyn Delegate>) -> Self {
        self.delegates.push((name.into(), delegate));
        self
    }

    /// Set the handler serving everything no delegate claims.
    pub fn fallback(mut self, name: impl Into<String>, handler: Arc<dyn Handler>) -> Self {
        self.fallback = Some((name.into(), handler));
        self
    }

    /// Count routed requests per delegate.
    pub fn with_metrics(mut self, metrics: Arc<PlaneMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Assemble the chain. Fails without a fallback or on duplicate names.
    pub fn compose(self) -> PlaneResult<ComposedHandler> {
        let (fallback_name, fallback) = self.fallback.ok_or_else(|| PlaneError::ChainAssembly {
            message: "no fallback handler configured".to_string(),
        })?;

        let mut names = BTreeSet::new();
        names.insert(fallback_name.clone());
        for (name, _) in &self.delegates {
            if !names.insert(name.clone()) {
                return Err(PlaneError::ChainAssembly {
                    message: format!("duplicate delegate name {:?}", name),
                });
            }
        }

        tracing::debug!(
            delegates = ?self.delegates.iter().map(|(name, _)| name.as_str()).collect::<Vec<_>>(),
            fallback = %fallback_name,
            "handler chain composed"
        );

        Ok(ComposedHandler {
            inner: Arc::new(ChainInner {
                delegates: self.delegates,
                fallback_name,
                fallback,
                metrics: self.metrics,
            }),
        })
    }
}

struct ChainInner {
    delegates: Vec<(String, Arc<dyn Delegate>)>,
    fallback_name: String,
    fallback: Arc<dyn Handler>,
    metrics: Option<Arc<PlaneMetrics>>,
}

/// The composed request entry point.
#[derive(Clone)]
pub struct ComposedHandler {
    inner: Arc<ChainInner>,
}

impl ComposedHandler {
    /// Name of the delegate that currently owns `target`.
    pub fn owner_of(&self, target: &RequestTarget) -> &str {
        match self.select(target) {
            Some((name, _)) => name,
            None => &self.inner.fallback_name,
        }
    }

    fn select(&self, target: &RequestTarget) -> Option<(&str, &Arc<dyn Delegate>)> {
        if !target.is_resource_request() {
            return None;
        }
        self.inner
            .delegates
            .iter()
            .find(|(_, delegate)| delegate.owns_group(target))
            .map(|(name, delegate)| (name.as_str(), delegate))
    }
}

impl Handler for ComposedHandler {
    fn handle(&self, mut request: Request<Bytes>) -> HandlerFuture {
        let target = match RequestTarget::parse(request.uri().path()) {
            Ok(target) => target,
            Err(error) => {
                let response = response::error(&error);
                return Box::pin(async move { response });
            }
        };

        let selected = self.select(&target);
        let name = selected
            .map(|(name, _)| name)
            .unwrap_or(self.inner.fallback_name.as_str());
        tracing::trace!(target = %target, delegate = name, "routing request");
        if let Some(metrics) = &self.inner.metrics {
            metrics.record_routed(name);
        }
        request.extensions_mut().insert(target);
        match selected {
            Some((_, delegate)) => delegate.handle(request),
            None => self.inner.fallback.handle(request),
        }
    }
}
