//! Built-in API groups.
//!
//! Serves the core group (`v1`) and `rbac.authorization.k8s.io/v1` from a
//! static resource table. This is the fallback of the handler chain, so it
//! also answers discovery roots and unknown paths.

use super::rest::{self, Scope};
use crate::control::resources::RBAC_GROUP;
use crate::core::error::PlaneError;
use crate::net::handler::{Handler, HandlerFuture};
use crate::net::response;
use crate::net::target::RequestTarget;
use crate::store::ObjectStore;
use bytes::Bytes;
use http::{Request, StatusCode};
use serde_json::json;
use std::sync::Arc;

/// Statically registered built-in resources: (group, version, resource, scope).
const BUILTIN_RESOURCES: &[(&str, &str, &str, Scope)] = &[
    ("", "v1", "namespaces", Scope::Cluster),
    ("", "v1", "configmaps", Scope::Namespaced),
    ("", "v1", "secrets", Scope::Namespaced),
    ("", "v1", "serviceaccounts", Scope::Namespaced),
    ("", "v1", "resourcequotas", Scope::Namespaced),
    ("", "v1", "services", Scope::Namespaced),
    (RBAC_GROUP, "v1", "clusterroles", Scope::Cluster),
    (RBAC_GROUP, "v1", "clusterrolebindings", Scope::Cluster),
    (RBAC_GROUP, "v1", "roles", Scope::Namespaced),
    (RBAC_GROUP, "v1", "rolebindings", Scope::Namespaced),
];

/// Handler for the built-in groups.
#[derive(Clone)]
pub struct BuiltinApi {
    store: Arc<ObjectStore>,
}

impl BuiltinApi {
    pub fn new(store: Arc<ObjectStore>) -> Self {
        Self { store }
    }

    fn scope_of(target: &RequestTarget) -> Option<Scope> {
        let gv = target.group_version.as_ref()?;
        let resource = target.resource.as_deref()?;
        BUILTIN_RESOURCES
            .iter()
            .find(|(group, version, name, _)| {
                *group == gv.group && *version == gv.version && *name == resource
            })
            .map(|(_, _, _, scope)| *scope)
    }

    fn discovery(target: &RequestTarget) -> Option<serde_json::Value> {
        match target.path.trim_end_matches('/') {
            "/api" => Some(json!({ "kind": "APIVersions", "versions": ["v1"] })),
            "/apis" => Some(json!({
                "kind": "APIGroupList",
                "groups": [{
                    "name": RBAC_GROUP,
                    "versions": [{ "groupVersion": format!("{}/v1", RBAC_GROUP), "version": "v1" }],
                }],
            })),
            _ => None,
        }
    }
}

/// Whether `group` is served from the built-in table. Schema definitions
/// may not claim these groups.
pub fn is_builtin_group(group: &str) -> bool {
    BUILTIN_RESOURCES.iter().any(|(builtin, _, _, _)| *builtin == group)
}

impl Handler for BuiltinApi {
    fn handle(&self, request: Request<Bytes>) -> HandlerFuture {
        let store = self.store.clone();
        Box::pin(async move {
            let Some(target) = request.extensions().get::<RequestTarget>().cloned() else {
                return response::error(&PlaneError::internal("request target missing"));
            };

            if !target.is_resource_request() {
                return match Self::discovery(&target) {
                    Some(body) => response::json(StatusCode::OK, &body),
                    None => response::error(&PlaneError::not_found("path", target.path.clone())),
                };
            }

            let Some(scope) = Self::scope_of(&target) else {
                let what = target
                    .group_resource()
                    .map(|gr| gr.to_string())
                    .unwrap_or_else(|| target.path.clone());
                return response::error(&PlaneError::not_found("resource", what));
            };

            rest::serve(&store, &target, request.method(), request.body(), scope)
                .unwrap_or_else(|error| response::error(&error))
        })
    }
}
