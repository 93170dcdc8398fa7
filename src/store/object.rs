//! Stored object model and watch events.

use crate::control::cluster::{GroupResource, LogicalCluster};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Fully qualified object key. Every key is scoped by exactly one
/// logical cluster.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectKey {
    pub cluster: LogicalCluster,
    pub resource: GroupResource,
    pub namespace: Option<String>,
    pub name: String,
}

impl ObjectKey {
    pub fn new(
        cluster: LogicalCluster,
        resource: GroupResource,
        namespace: Option<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            cluster,
            resource,
            namespace,
            name: name.into(),
        }
    }

    /// Key of a cluster-scoped object.
    pub fn cluster_scoped(
        cluster: LogicalCluster,
        resource: GroupResource,
        name: impl Into<String>,
    ) -> Self {
        Self::new(cluster, resource, None, name)
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}|{}/{}/{}", self.cluster, self.resource, ns, self.name),
            None => write!(f, "{}|{}/{}", self.cluster, self.resource, self.name),
        }
    }
}

/// A stored resource object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Object {
    pub cluster: LogicalCluster,
    pub group: String,
    pub resource: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub name: String,
    #[serde(default)]
    pub spec: Value,
    #[serde(default)]
    pub status: Value,
    /// Store-global revision of the last write; 0 until stored.
    #[serde(default)]
    pub resource_version: u64,
}

impl Object {
    /// Create a cluster-scoped object with a null spec.
    pub fn new(cluster: LogicalCluster, resource: &GroupResource, name: impl Into<String>) -> Self {
        Self {
            cluster,
            group: resource.group.clone(),
            resource: resource.resource.clone(),
            namespace: None,
            name: name.into(),
            spec: Value::Null,
            status: Value::Null,
            resource_version: 0,
        }
    }

    /// Place the object in a namespace.
    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Set the spec.
    pub fn with_spec(mut self, spec: Value) -> Self {
        self.spec = spec;
        self
    }

    /// Set the status.
    pub fn with_status(mut self, status: Value) -> Self {
        self.status = status;
        self
    }

    /// Group-resource of this object.
    pub fn group_resource(&self) -> GroupResource {
        GroupResource::new(self.group.clone(), self.resource.clone())
    }

    /// Key of this object.
    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(
            self.cluster.clone(),
            self.group_resource(),
            self.namespace.clone(),
            self.name.clone(),
        )
    }

    /// Read a string field from the spec.
    pub fn spec_str(&self, field: &str) -> Option<&str> {
        self.spec.get(field).and_then(Value::as_str)
    }

    /// Read a string field from the status.
    pub fn status_str(&self, field: &str) -> Option<&str> {
        self.status.get(field).and_then(Value::as_str)
    }
}

/// Change notification emitted by the store.
#[derive(Debug, Clone)]
pub enum WatchEvent {
    Added(Object),
    Modified(Object),
    Deleted(Object),
}

impl WatchEvent {
    /// The object the event refers to.
    pub fn object(&self) -> &Object {
        match self {
            Self::Added(obj) | Self::Modified(obj) | Self::Deleted(obj) => obj,
        }
    }
}
