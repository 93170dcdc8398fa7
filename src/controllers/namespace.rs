//! Default namespace per tenant.

use super::runner::Reconciler;
use crate::control::cluster::LogicalCluster;
use crate::control::resources::{namespaces, workspaces};
use crate::core::error::{PlaneError, PlaneResult};
use crate::store::{Object, ObjectKey, ObjectStore};
use serde_json::json;
use std::collections::BTreeSet;

/// Namespace every tenant carries.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Ensures a `default` namespace in every workspace-backed tenant.
pub struct NamespaceReconciler {
    include_root: bool,
}

impl NamespaceReconciler {
    /// `include_root` adds the root tenant, which has no workspace object.
    pub fn new(include_root: bool) -> Self {
        Self { include_root }
    }

    /// Tenants backed by a workspace object.
    pub fn tenants(&self, store: &ObjectStore) -> BTreeSet<LogicalCluster> {
        let mut tenants: BTreeSet<LogicalCluster> = store
            .list_all(&workspaces())
            .iter()
            .filter(|ws| !ws.cluster.is_system())
            .map(|ws| ws.cluster.join(&ws.name))
            .collect();
        if self.include_root {
            tenants.insert(LogicalCluster::root());
        }
        tenants
    }
}

impl Reconciler for NamespaceReconciler {
    fn reconcile(&self, store: &ObjectStore) -> PlaneResult<usize> {
        let mut created = 0;
        for tenant in self.tenants(store) {
            let key = ObjectKey::cluster_scoped(tenant.clone(), namespaces(), DEFAULT_NAMESPACE);
            if store.contains(&key) {
                continue;
            }
            let namespace = Object::new(tenant.clone(), &namespaces(), DEFAULT_NAMESPACE)
                .with_spec(json!({}))
                .with_status(json!({ "phase": "Active" }));
            match store.create(namespace) {
                Ok(_) => {
                    tracing::debug!(cluster = %tenant, "created default namespace");
                    created += 1;
                }
                // Created concurrently through the API.
                Err(PlaneError::AlreadyExists { .. }) => {}
                Err(error) => return Err(error),
            }
        }
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_default_namespace_per_workspace() {
        let store = ObjectStore::new();
        store
            .create(Object::new(LogicalCluster::root(), &workspaces(), "org").with_spec(json!({})))
            .unwrap();
        let reconciler = NamespaceReconciler::new(true);
        assert_eq!(reconciler.reconcile(&store).unwrap(), 2);
        assert!(store.contains(&ObjectKey::cluster_scoped(
            "root:org".into(),
            namespaces(),
            DEFAULT_NAMESPACE
        )));
        assert_eq!(reconciler.reconcile(&store).unwrap(), 0);
    }

    #[test]
    fn non_root_shard_skips_root() {
        let store = ObjectStore::new();
        let reconciler = NamespaceReconciler::new(false);
        assert!(reconciler.tenants(&store).is_empty());
        assert_eq!(reconciler.reconcile(&store).unwrap(), 0);
    }
}
