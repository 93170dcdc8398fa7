//! Baseline access policy.

use super::InstallReport;
use crate::control::cluster::LogicalCluster;
use crate::control::resources::{cluster_role_bindings, cluster_roles, RBAC_GROUP};
use crate::core::error::PlaneResult;
use crate::store::{Object, ObjectStore};
use serde_json::json;

/// Role granting every verb on every resource.
pub const ADMIN_ROLE: &str = "system:kplane:admin";
/// Role letting authenticated users reach the workspaces they belong to.
pub const WORKSPACE_ACCESS_ROLE: &str = "system:kplane:workspace-access";
/// Group bound to [`ADMIN_ROLE`].
pub const ADMIN_GROUP: &str = "system:kplane:admin";

/// Cluster roles and bindings installed in `system:admin`.
pub struct BaselinePolicy;

impl BaselinePolicy {
    pub fn ensure(store: &ObjectStore) -> PlaneResult<InstallReport> {
        let cluster = LogicalCluster::system_admin();
        let mut report = InstallReport::default();

        report.ensure(
            store,
            Object::new(cluster.clone(), &cluster_roles(), ADMIN_ROLE).with_spec(json!({
                "rules": [{ "apiGroups": ["*"], "resources": ["*"], "verbs": ["*"] }],
            })),
        )?;
        report.ensure(
            store,
            Object::new(cluster.clone(), &cluster_roles(), WORKSPACE_ACCESS_ROLE).with_spec(json!({
                "rules": [{
                    "apiGroups": ["tenancy.kplane.io"],
                    "resources": ["workspaces/content"],
                    "verbs": ["access"],
                }],
            })),
        )?;

        for (role, group) in [
            (ADMIN_ROLE, ADMIN_GROUP),
            (WORKSPACE_ACCESS_ROLE, "system:authenticated"),
        ] {
            report.ensure(
                store,
                Object::new(cluster.clone(), &cluster_role_bindings(), role).with_spec(json!({
                    "roleRef": { "apiGroup": RBAC_GROUP, "kind": "ClusterRole", "name": role },
                    "subjects": [{ "apiGroup": RBAC_GROUP, "kind": "Group", "name": group }],
                })),
            )?;
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn installs_into_system_admin_only() {
        let store = ObjectStore::new();
        let report = BaselinePolicy::ensure(&store).unwrap();
        assert_eq!(report.created, 4);

        let roles = store.list(&LogicalCluster::system_admin(), &cluster_roles(), None);
        assert_eq!(roles.len(), 2);
        assert!(store
            .list(&LogicalCluster::root(), &cluster_roles(), None)
            .is_empty());

        let again = BaselinePolicy::ensure(&store).unwrap();
        assert_eq!(again.changed(), 0);
        assert_eq!(again.unchanged, 4);
    }
}
