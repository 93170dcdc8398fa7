//! System schema definitions.
//!
//! Definitions stored in `system:system-crds` are served to every tenant
//! by the extension API.

use super::InstallReport;
use crate::control::cluster::LogicalCluster;
use crate::control::resources::{custom_resource_definitions, APIS_GROUP, CORE_KPLANE_GROUP, TENANCY_GROUP};
use crate::core::error::PlaneResult;
use crate::store::{Object, ObjectStore};
use serde_json::json;

/// (group, plural, kind) of every system schema. All are cluster-scoped.
const SYSTEM_SCHEMAS: &[(&str, &str, &str)] = &[
    (APIS_GROUP, "apiexports", "APIExport"),
    (APIS_GROUP, "apibindings", "APIBinding"),
    (APIS_GROUP, "apiresourceschemas", "APIResourceSchema"),
    (TENANCY_GROUP, "workspaces", "Workspace"),
    (TENANCY_GROUP, "workspacetypes", "WorkspaceType"),
    (CORE_KPLANE_GROUP, "shards", "Shard"),
    (CORE_KPLANE_GROUP, "logicalclusters", "LogicalCluster"),
];

/// Installs the definitions of the platform's own API groups.
pub struct SystemSchemas;

impl SystemSchemas {
    pub fn bootstrap(store: &ObjectStore) -> PlaneResult<InstallReport> {
        let cluster = LogicalCluster::system_crds();
        let mut report = InstallReport::default();
        for (group, plural, kind) in SYSTEM_SCHEMAS {
            let definition = Object::new(
                cluster.clone(),
                &custom_resource_definitions(),
                format!("{}.{}", plural, group),
            )
            .with_spec(json!({
                "group": group,
                "names": { "plural": plural, "kind": kind },
                "scope": "Cluster",
                "versions": [{ "name": "v1alpha1", "served": true, "storage": true }],
            }));
            report.ensure(store, definition)?;
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::extensions::DefinitionSpec;

    #[test]
    fn definitions_are_well_formed() {
        let store = ObjectStore::new();
        SystemSchemas::bootstrap(&store).unwrap();
        let definitions = store.list(&LogicalCluster::system_crds(), &custom_resource_definitions(), None);
        assert_eq!(definitions.len(), SYSTEM_SCHEMAS.len());
        for object in &definitions {
            let spec = DefinitionSpec::from_object(object).unwrap();
            assert_eq!(object.name, spec.expected_name());
            assert!(spec.serves("v1alpha1"));
        }
    }
}
