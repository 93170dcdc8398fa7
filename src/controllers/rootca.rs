//! Per-namespace objects: the root CA config map and the default
//! service account.

use super::runner::Reconciler;
use crate::control::resources::{config_maps, namespaces, service_accounts};
use crate::core::error::PlaneResult;
use crate::store::{EnsureOutcome, Object, ObjectKey, ObjectStore};
use serde_json::json;

/// Name of the config map publishing the serving CA.
pub const ROOT_CA_CONFIGMAP: &str = "kube-root-ca.crt";
/// Name of the service account every namespace carries.
pub const DEFAULT_SERVICE_ACCOUNT: &str = "default";

/// Publishes the serving CA into every namespace of every tenant.
pub struct RootCaReconciler {
    ca_data: String,
}

impl RootCaReconciler {
    pub fn new(ca_data: impl Into<String>) -> Self {
        Self {
            ca_data: ca_data.into(),
        }
    }
}

impl Reconciler for RootCaReconciler {
    fn reconcile(&self, store: &ObjectStore) -> PlaneResult<usize> {
        let mut changed = 0;
        for namespace in store.list_all(&namespaces()) {
            let configmap = Object::new(namespace.cluster.clone(), &config_maps(), ROOT_CA_CONFIGMAP)
                .in_namespace(namespace.name.clone())
                .with_spec(json!({ "data": { "ca.crt": self.ca_data } }));
            if store.ensure(configmap)? != EnsureOutcome::Unchanged {
                changed += 1;
            }
        }
        Ok(changed)
    }
}

/// Creates the default service account in every namespace.
pub struct ServiceAccountReconciler;

impl Reconciler for ServiceAccountReconciler {
    fn reconcile(&self, store: &ObjectStore) -> PlaneResult<usize> {
        let mut created = 0;
        for namespace in store.list_all(&namespaces()) {
            let key = ObjectKey::new(
                namespace.cluster.clone(),
                service_accounts(),
                Some(namespace.name.clone()),
                DEFAULT_SERVICE_ACCOUNT,
            );
            if store.contains(&key) {
                continue;
            }
            let account = Object::new(namespace.cluster.clone(), &service_accounts(), DEFAULT_SERVICE_ACCOUNT)
                .in_namespace(namespace.name.clone())
                .with_spec(json!({}));
            if store.ensure(account)? == EnsureOutcome::Created {
                created += 1;
            }
        }
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::cluster::LogicalCluster;

    fn namespace(cluster: &str, name: &str) -> Object {
        Object::new(LogicalCluster::new(cluster), &namespaces(), name).with_spec(json!({}))
    }

    #[test]
    fn publishes_ca_into_each_namespace() {
        let store = ObjectStore::new();
        store.create(namespace("root:a", "default")).unwrap();
        store.create(namespace("root:b", "team")).unwrap();

        let reconciler = RootCaReconciler::new("PEM");
        assert_eq!(reconciler.reconcile(&store).unwrap(), 2);
        assert_eq!(reconciler.reconcile(&store).unwrap(), 0);

        let key = ObjectKey::new("root:b".into(), config_maps(), Some("team".into()), ROOT_CA_CONFIGMAP);
        assert_eq!(store.get(&key).unwrap().spec["data"]["ca.crt"], "PEM");

        // A rotated CA is rewritten.
        assert_eq!(RootCaReconciler::new("NEW").reconcile(&store).unwrap(), 2);
    }

    #[test]
    fn default_service_account_is_created_once() {
        let store = ObjectStore::new();
        store.create(namespace("root:a", "default")).unwrap();
        assert_eq!(ServiceAccountReconciler.reconcile(&store).unwrap(), 1);
        assert_eq!(ServiceAccountReconciler.reconcile(&store).unwrap(), 0);
    }
}
