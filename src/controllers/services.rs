//! `/services/` routes.
//!
//! With virtual workspaces enabled the in-process views are mounted on
//! the pre-handler mux. Otherwise the prefix redirects to the external
//! virtual workspace server.

use super::ControllerContext;
use crate::api::rest::render;
use crate::control::activation::ControllerGroup;
use crate::control::cluster::LogicalCluster;
use crate::control::resources::workspaces;
use crate::core::error::{PlaneError, PlaneResult};
use crate::net::handler::{Handler, HandlerFuture};
use crate::net::response;
use crate::store::ObjectStore;
use bytes::Bytes;
use http::{Method, Request, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;

/// Mux prefix owned by this module.
pub const SERVICES_PREFIX: &str = "/services/";

/// Read-only per-tenant views served under `/services/{view}/clusters/{cluster}`.
pub struct VirtualWorkspaces {
    store: Arc<ObjectStore>,
}

impl VirtualWorkspaces {
    pub fn new(store: Arc<ObjectStore>) -> Self {
        Self { store }
    }

    fn serve(&self, method: &Method, path: &str) -> PlaneResult<Value> {
        if *method != Method::GET {
            return Err(PlaneError::MethodNotAllowed {
                method: method.to_string(),
            });
        }
        let rest = path.strip_prefix(SERVICES_PREFIX).unwrap_or(path);
        let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
        match segments.as_slice() {
            ["workspaces", "clusters", cluster, ..] => {
                let cluster = LogicalCluster::new(*cluster);
                if !cluster.is_valid() {
                    return Err(PlaneError::invalid(format!("invalid logical cluster {:?}", cluster.as_str())));
                }
                let items: Vec<Value> = self
                    .store
                    .list(&cluster, &workspaces(), None)
                    .iter()
                    .map(|ws| render(ws, "tenancy.kplane.io/v1alpha1"))
                    .collect();
                Ok(json!({ "kind": "WorkspaceList", "items": items }))
            }
            [view, ..] => Err(PlaneError::not_found("virtual workspace", *view)),
            [] => Ok(json!({ "kind": "VirtualWorkspaceList", "items": ["workspaces"] })),
        }
    }
}

impl Handler for VirtualWorkspaces {
    fn handle(&self, request: Request<Bytes>) -> HandlerFuture {
        let response = match self.serve(request.method(), request.uri().path()) {
            Ok(body) => response::json(StatusCode::OK, &body),
            Err(error) => response::error(&error),
        };
        Box::pin(async move { response })
    }
}

/// Redirects `/services/...` to an external server, keeping path and query.
pub struct ServicesRedirect {
    base: String,
}

impl ServicesRedirect {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn location(&self, request: &Request<Bytes>) -> String {
        match request.uri().path_and_query() {
            Some(pq) => format!("{}{}", self.base, pq.as_str()),
            None => format!("{}{}", self.base, request.uri().path()),
        }
    }
}

impl Handler for ServicesRedirect {
    fn handle(&self, request: Request<Bytes>) -> HandlerFuture {
        let response = response::redirect(&self.location(&request));
        Box::pin(async move { response })
    }
}

/// Mounts the in-process virtual workspaces.
pub struct VirtualWorkspacesGroup;

impl ControllerGroup<ControllerContext> for VirtualWorkspacesGroup {
    fn name(&self) -> &'static str {
        "virtual-workspaces"
    }

    fn install(&self, ctx: &ControllerContext) -> PlaneResult<()> {
        ctx.mux
            .handle(SERVICES_PREFIX, Arc::new(VirtualWorkspaces::new(ctx.store.clone())))
    }
}

/// Mounts the redirect used when virtual workspaces run elsewhere.
pub struct ServicesRedirectGroup;

impl ControllerGroup<ControllerContext> for ServicesRedirectGroup {
    fn name(&self) -> &'static str {
        "services-redirect"
    }

    fn install(&self, ctx: &ControllerContext) -> PlaneResult<()> {
        let url = &ctx.options.virtual_workspaces_url;
        if url.is_empty() {
            return Err(PlaneError::invalid("virtual_workspaces.external_url is empty"));
        }
        tracing::info!(url = %url, "redirecting /services/ to external virtual workspaces");
        ctx.mux
            .handle(SERVICES_PREFIX, Arc::new(ServicesRedirect::new(url.clone())))
    }
}
