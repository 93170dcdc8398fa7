//! Tenant and resource-group identifiers.
//!
//! [`LogicalCluster`] partitions every object; [`GroupVersion`] and
//! [`GroupResource`] name the API surface a request addresses. These are
//! plain lookup keys with no owning component.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator between path segments of a logical cluster name.
const CLUSTER_SEPARATOR: char = ':';

/// An opaque, path-like tenant identifier (e.g. `root:org:team`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogicalCluster(String);

impl LogicalCluster {
    /// The root tenant, present only on the root shard.
    pub const ROOT: &'static str = "root";
    /// Holds the baseline access policy.
    pub const SYSTEM_ADMIN: &'static str = "system:admin";
    /// Holds this shard's bookkeeping objects; exists on every shard.
    pub const SYSTEM_SHARD: &'static str = "system:shard";
    /// Holds system schema definitions served to every tenant.
    pub const SYSTEM_CRDS: &'static str = "system:system-crds";

    /// Create a logical cluster from its name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The root logical cluster.
    pub fn root() -> Self {
        Self::new(Self::ROOT)
    }

    /// The system schema logical cluster.
    pub fn system_crds() -> Self {
        Self::new(Self::SYSTEM_CRDS)
    }

    /// The system admin logical cluster.
    pub fn system_admin() -> Self {
        Self::new(Self::SYSTEM_ADMIN)
    }

    /// The shard bookkeeping logical cluster.
    pub fn system_shard() -> Self {
        Self::new(Self::SYSTEM_SHARD)
    }

    /// Cluster name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check whether the name is well-formed: non-empty segments of
    /// lowercase alphanumerics and dashes.
    pub fn is_valid(&self) -> bool {
        !self.0.is_empty()
            && self.0.split(CLUSTER_SEPARATOR).all(|segment| {
                !segment.is_empty()
                    && segment
                        .chars()
                        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
            })
    }

    /// Last path segment (`root:users` -> `users`).
    pub fn base(&self) -> &str {
        self.0
            .rsplit_once(CLUSTER_SEPARATOR)
            .map(|(_, base)| base)
            .unwrap_or(&self.0)
    }

    /// Parent cluster, if any (`root:users` -> `root`).
    pub fn parent(&self) -> Option<LogicalCluster> {
        self.0
            .rsplit_once(CLUSTER_SEPARATOR)
            .map(|(parent, _)| LogicalCluster::new(parent))
    }

    /// Child cluster with the given base name.
    pub fn join(&self, child: &str) -> LogicalCluster {
        LogicalCluster(format!("{}{}{}", self.0, CLUSTER_SEPARATOR, child))
    }

    /// Check whether this cluster is one of the `system:` clusters.
    pub fn is_system(&self) -> bool {
        self.0.starts_with("system:")
    }
}

impl fmt::Display for LogicalCluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LogicalCluster {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// API group and version; the core group is the empty string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupVersion {
    pub group: String,
    pub version: String,
}

impl GroupVersion {
    pub fn new(group: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
        }
    }

    /// The core (legacy, unnamed) group at the given version.
    pub fn core(version: impl Into<String>) -> Self {
        Self::new("", version)
    }

    /// Whether this is the core group.
    pub fn is_core(&self) -> bool {
        self.group.is_empty()
    }
}

impl fmt::Display for GroupVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            f.write_str(&self.version)
        } else {
            write!(f, "{}/{}", self.group, self.version)
        }
    }
}

/// API group and plural resource name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupResource {
    pub group: String,
    pub resource: String,
}

impl GroupResource {
    pub fn new(group: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            resource: resource.into(),
        }
    }

    /// A resource in the core group.
    pub fn core(resource: impl Into<String>) -> Self {
        Self::new("", resource)
    }
}

impl fmt::Display for GroupResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            f.write_str(&self.resource)
        } else {
            write!(f, "{}.{}", self.resource, self.group)
        }
    }
}
