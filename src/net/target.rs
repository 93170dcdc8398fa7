//! Request targeting.
//!
//! Paths take one of these forms:
//!
//! ```text
//! /clusters/{cluster}/api/{version}/[namespaces/{ns}/]{resource}[/{name}[/{sub}]]
//! /clusters/{cluster}/apis/{group}/{version}/[namespaces/{ns}/]{resource}[/{name}[/{sub}]]
//! ```
//!
//! Without the `/clusters/{cluster}` prefix the root cluster is addressed.
//! Anything else is a non-resource path.

use crate::control::cluster::{GroupResource, GroupVersion, LogicalCluster};
use crate::core::error::{PlaneError, PlaneResult};
use std::fmt;

/// Subresources of a namespace object that look like namespaced paths.
const NAMESPACE_SUBRESOURCES: &[&str] = &["status", "finalize"];

/// Parsed destination of an API request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTarget {
    pub cluster: LogicalCluster,
    /// Group/version, `None` for non-resource and discovery-root paths.
    pub group_version: Option<GroupVersion>,
    pub namespace: Option<String>,
    pub resource: Option<String>,
    pub name: Option<String>,
    pub subresource: Option<String>,
    /// Path with the cluster prefix removed.
    pub path: String,
}

impl RequestTarget {
    /// Parse a request path.
    pub fn parse(path: &str) -> PlaneResult<Self> {
        let (cluster, rest) = match path.strip_prefix("/clusters/") {
            Some(tail) => {
                let (cluster, rest) = tail.split_once('/').unwrap_or((tail, ""));
                let cluster = LogicalCluster::new(cluster);
                if !cluster.is_valid() {
                    return Err(PlaneError::invalid(format!(
                        "invalid logical cluster name {:?}",
                        cluster.as_str()
                    )));
                }
                (cluster, format!("/{}", rest))
            }
            None => (LogicalCluster::root(), path.to_string()),
        };

        let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
        let mut target = Self {
            cluster,
            group_version: None,
            namespace: None,
            resource: None,
            name: None,
            subresource: None,
            path: rest.clone(),
        };

        let remaining = match segments.as_slice() {
            ["api", version, remaining @ ..] => {
                target.group_version = Some(GroupVersion::core(*version));
                remaining
            }
            ["apis", group, version, remaining @ ..] => {
                target.group_version = Some(GroupVersion::new(*group, *version));
                remaining
            }
            _ => return Ok(target),
        };

        let remaining = match remaining {
            ["namespaces", namespace, tail @ ..]
                if !tail.is_empty() && !NAMESPACE_SUBRESOURCES.contains(&tail[0]) =>
            {
                target.namespace = Some(namespace.to_string());
                tail
            }
            other => other,
        };
        match remaining {
            [] => {}
            [resource] => target.resource = Some(resource.to_string()),
            [resource, name] => {
                target.resource = Some(resource.to_string());
                target.name = Some(name.to_string());
            }
            [resource, name, subresource] => {
                target.resource = Some(resource.to_string());
                target.name = Some(name.to_string());
                target.subresource = Some(subresource.to_string());
            }
            _ => return Err(PlaneError::invalid(format!("unrecognized path {:?}", path))),
        }
        Ok(target)
    }

    /// Whether the path addresses a resource API.
    pub fn is_resource_request(&self) -> bool {
        self.group_version.is_some()
    }

    /// API group, if this is a resource request.
    pub fn group(&self) -> Option<&str> {
        self.group_version.as_ref().map(|gv| gv.group.as_str())
    }

    /// Addressed group-resource.
    pub fn group_resource(&self) -> Option<GroupResource> {
        match (&self.group_version, &self.resource) {
            (Some(gv), Some(resource)) => Some(GroupResource::new(gv.group.clone(), resource.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for RequestTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.cluster, self.path)
    }
}
