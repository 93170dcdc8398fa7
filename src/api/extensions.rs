//! Schema-extension API.
//!
//! Serves `customresourcedefinitions` and every group those definitions
//! introduce. A definition applies to the logical cluster it is stored in;
//! definitions stored in `system:system-crds` apply to every cluster.
//! Ownership is looked up on each request so newly created definitions
//! are routable immediately.

use super::builtin::is_builtin_group;
use super::rest::{self, Scope};
use crate::control::cluster::LogicalCluster;
use crate::control::resources::{custom_resource_definitions, APIEXTENSIONS_GROUP};
use crate::core::error::{PlaneError, PlaneResult};
use crate::net::handler::{GroupOwner, Handler, HandlerFuture};
use crate::net::response;
use crate::net::target::RequestTarget;
use crate::store::{Object, ObjectStore};
use bytes::Bytes;
use http::{Method, Request};
use serde::Deserialize;
use std::sync::Arc;

/// The subset of a definition's spec the API needs.
#[derive(Debug, Clone, Deserialize)]
pub struct DefinitionSpec {
    pub group: String,
    pub names: DefinitionNames,
    #[serde(default = "default_scope")]
    pub scope: String,
    #[serde(default)]
    pub versions: Vec<DefinitionVersion>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DefinitionNames {
    pub plural: String,
    #[serde(default)]
    pub kind: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DefinitionVersion {
    pub name: String,
    #[serde(default = "default_served")]
    pub served: bool,
}

fn default_scope() -> String {
    "Namespaced".to_string()
}

fn default_served() -> bool {
    true
}

impl DefinitionSpec {
    /// Parse the spec of a stored definition.
    pub fn from_object(object: &Object) -> PlaneResult<Self> {
        serde_json::from_value(object.spec.clone()).map_err(|e| {
            PlaneError::invalid(format!("invalid definition {}: {}", object.name, e))
        })
    }

    /// Whether `version` is served.
    pub fn serves(&self, version: &str) -> bool {
        self.versions.iter().any(|v| v.served && v.name == version)
    }

    pub fn scope(&self) -> Scope {
        if self.scope.eq_ignore_ascii_case("cluster") {
            Scope::Cluster
        } else {
            Scope::Namespaced
        }
    }

    /// Name a definition of this spec must carry.
    pub fn expected_name(&self) -> String {
        format!("{}.{}", self.names.plural, self.group)
    }
}

/// Handler for definitions and the resources they define.
#[derive(Clone)]
pub struct ExtensionApi {
    store: Arc<ObjectStore>,
}

impl ExtensionApi {
    pub fn new(store: Arc<ObjectStore>) -> Self {
        Self { store }
    }

    /// Definitions visible from `cluster`, local ones first.
    fn definitions(&self, cluster: &LogicalCluster) -> Vec<DefinitionSpec> {
        let gr = custom_resource_definitions();
        let mut objects = self.store.list(cluster, &gr, None);
        if *cluster != LogicalCluster::system_crds() {
            objects.extend(self.store.list(&LogicalCluster::system_crds(), &gr, None));
        }
        objects
            .iter()
            .filter_map(|object| match DefinitionSpec::from_object(object) {
                Ok(spec) => Some(spec),
                Err(error) => {
                    tracing::debug!(error = %error, "skipping unreadable definition");
                    None
                }
            })
            .collect()
    }

    /// Definition serving `target`'s group and version.
    fn definition_for(&self, target: &RequestTarget) -> Option<DefinitionSpec> {
        let gv = target.group_version.as_ref()?;
        if is_reserved_group(&gv.group) {
            return None;
        }
        let resource = target.resource.as_deref();
        self.definitions(&target.cluster).into_iter().find(|def| {
            def.group == gv.group
                && def.serves(&gv.version)
                && resource.map_or(true, |r| r == def.names.plural)
        })
    }

    fn serve(&self, target: &RequestTarget, method: &Method, body: &Bytes) -> PlaneResult<http::Response<Bytes>> {
        if target.group() == Some(APIEXTENSIONS_GROUP) {
            if target.resource.as_deref() != Some("customresourcedefinitions") {
                return Err(PlaneError::not_found("resource", target.path.clone()));
            }
            if matches!(*method, Method::POST | Method::PUT) {
                validate_definition(target, body)?;
            }
            return rest::serve(&self.store, target, method, body, Scope::Cluster);
        }

        let definition = self
            .definition_for(target)
            .ok_or_else(|| PlaneError::not_found("resource", target.path.clone()))?;
        rest::serve(&self.store, target, method, body, definition.scope())
    }
}

/// Groups a definition may not claim: the core group, undotted names,
/// built-in groups and the definition group itself.
fn is_reserved_group(group: &str) -> bool {
    !group.contains('.') || is_builtin_group(group) || group == APIEXTENSIONS_GROUP
}

/// Reject definitions whose spec is unreadable, whose group is reserved,
/// or whose name does not match `{plural}.{group}`.
fn validate_definition(target: &RequestTarget, body: &Bytes) -> PlaneResult<()> {
    let value: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| PlaneError::invalid(format!("invalid JSON body: {}", e)))?;
    let spec: DefinitionSpec = serde_json::from_value(value.get("spec").cloned().unwrap_or_default())
        .map_err(|e| PlaneError::invalid(format!("invalid definition spec: {}", e)))?;
    if is_reserved_group(&spec.group) {
        return Err(PlaneError::invalid(format!(
            "definition group {:?} is reserved",
            spec.group
        )));
    }
    let name = value
        .pointer("/metadata/name")
        .and_then(serde_json::Value::as_str)
        .or(target.name.as_deref())
        .unwrap_or_default();
    if name != spec.expected_name() {
        return Err(PlaneError::invalid(format!(
            "definition name {:?} must be {:?}",
            name,
            spec.expected_name()
        )));
    }
    if spec.versions.is_empty() {
        return Err(PlaneError::invalid("definition must declare at least one version"));
    }
    Ok(())
}

impl GroupOwner for ExtensionApi {
    fn owns_group(&self, target: &RequestTarget) -> bool {
        match target.group() {
            Some(APIEXTENSIONS_GROUP) => true,
            Some(_) => self.definition_for(target).is_some(),
            None => false,
        }
    }
}

impl Handler for ExtensionApi {
    fn handle(&self, request: Request<Bytes>) -> HandlerFuture {
        let api = self.clone();
        Box::pin(async move {
            let Some(target) = request.extensions().get::<RequestTarget>().cloned() else {
                return response::error(&PlaneError::internal("request target missing"));
            };
            api.serve(&target, request.method(), request.body())
                .unwrap_or_else(|error| response::error(&error))
        })
    }
}
