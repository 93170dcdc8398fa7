//! Shard topology.
//!
//! The root shard alone owns the root tenant and its two bootstrap
//! phases, the singleton policy bootstrap and the generated admin
//! credentials. Every other shard runs the common phases only.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Role of this process within the shard fleet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShardRole {
    /// The root shard.
    Root,
    /// Any other shard.
    Other,
}

impl fmt::Display for ShardRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root => write!(f, "root"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Name and role of this shard, fixed for the process lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardTopology {
    name: String,
    role: ShardRole,
}

impl ShardTopology {
    /// Shard name that selects the root role.
    pub const ROOT_SHARD_NAME: &'static str = "root";

    /// Derive the topology from the configured shard name.
    pub fn from_name(name: impl Into<String>) -> Self {
        let name = name.into();
        let role = if name == Self::ROOT_SHARD_NAME {
            ShardRole::Root
        } else {
            ShardRole::Other
        };
        Self { name, role }
    }

    /// Build a topology with an explicit role.
    pub fn new(name: impl Into<String>, role: ShardRole) -> Self {
        Self {
            name: name.into(),
            role,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> ShardRole {
        self.role
    }

    /// Whether root-only bootstrap phases and installs run on this shard.
    pub fn owns_root_tenant(&self) -> bool {
        match self.role {
            ShardRole::Root => true,
            ShardRole::Other => false,
        }
    }

    /// Whether this shard issues the administrative credential set.
    pub fn issues_admin_credentials(&self) -> bool {
        match self.role {
            ShardRole::Root => true,
            ShardRole::Other => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_from_name() {
        let root = ShardTopology::from_name("root");
        assert_eq!(root.role(), ShardRole::Root);
        assert!(root.owns_root_tenant());
        assert!(root.issues_admin_credentials());

        let beta = ShardTopology::from_name("beta");
        assert_eq!(beta.role(), ShardRole::Other);
        assert!(!beta.owns_root_tenant());
        assert_eq!(beta.name(), "beta");
    }
}
