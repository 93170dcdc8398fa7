//! Pre-handler path mux.
//!
//! Routes registered here are consulted before the composed chain. A
//! pattern ending in `/` matches every path below it; any other pattern
//! matches exactly. The longest matching pattern wins.

use super::handler::{Handler, HandlerFuture};
use crate::core::error::{PlaneError, PlaneResult};
use bytes::Bytes;
use http::Request;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Path-pattern routes evaluated ahead of the handler chain.
#[derive(Default)]
pub struct PreHandlerMux {
    routes: RwLock<BTreeMap<String, Arc<dyn Handler>>>,
}

impl PreHandlerMux {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler. Registering a pattern twice is an error.
    pub fn handle(&self, pattern: impl Into<String>, handler: Arc<dyn Handler>) -> PlaneResult<()> {
        let pattern = pattern.into();
        if !pattern.starts_with('/') {
            return Err(PlaneError::invalid(format!(
                "mux pattern {:?} must start with '/'",
                pattern
            )));
        }
        let mut routes = self.routes.write();
        if routes.contains_key(&pattern) {
            return Err(PlaneError::invalid(format!(
                "mux pattern {:?} already registered",
                pattern
            )));
        }
        tracing::debug!(pattern = %pattern, "registered pre-handler route");
        routes.insert(pattern, handler);
        Ok(())
    }

    /// Handler for a path, if any pattern matches.
    pub fn lookup(&self, path: &str) -> Option<Arc<dyn Handler>> {
        self.routes
            .read()
            .iter()
            .filter(|(pattern, _)| {
                if pattern.ends_with('/') {
                    path.starts_with(pattern.as_str())
                } else {
                    path == pattern.as_str()
                }
            })
            .max_by_key(|(pattern, _)| pattern.len())
            .map(|(_, handler)| handler.clone())
    }

    /// Registered patterns.
    pub fn patterns(&self) -> Vec<String> {
        self.routes.read().keys().cloned().collect()
    }
}

/// Mux in front of a downstream handler.
#[derive(Clone)]
pub struct MuxedHandler {
    mux: Arc<PreHandlerMux>,
    next: Arc<dyn Handler>,
}

impl MuxedHandler {
    pub fn new(mux: Arc<PreHandlerMux>, next: Arc<dyn Handler>) -> Self {
        Self { mux, next }
    }
}

impl Handler for MuxedHandler {
    fn handle(&self, request: Request<Bytes>) -> HandlerFuture {
        match self.mux.lookup(request.uri().path()) {
            Some(handler) => handler.handle(request),
            None => self.next.handle(request),
        }
    }
}
