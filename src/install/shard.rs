//! Shard bookkeeping workspace.

use super::InstallReport;
use crate::control::cluster::LogicalCluster;
use crate::control::resources::{logical_clusters, shards};
use crate::control::shard::ShardTopology;
use crate::core::error::PlaneResult;
use crate::store::{Object, ObjectStore};
use serde_json::json;

/// Name of the logical cluster marker object every tenant carries.
pub const CLUSTER_MARKER: &str = "cluster";

/// Installs this shard's own objects into `system:shard`.
pub struct ShardWorkspace;

impl ShardWorkspace {
    pub fn bootstrap(store: &ObjectStore, shard: &ShardTopology) -> PlaneResult<InstallReport> {
        let cluster = LogicalCluster::system_shard();
        let mut report = InstallReport::default();
        report.ensure(
            store,
            Object::new(cluster.clone(), &logical_clusters(), CLUSTER_MARKER)
                .with_spec(json!({ "owner": shard.name() })),
        )?;
        report.ensure(
            store,
            Object::new(cluster, &shards(), shard.name())
                .with_spec(json!({ "role": shard.role().to_string() })),
        )?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::shard::ShardRole;
    use crate::store::ObjectKey;

    #[test]
    fn records_shard_role() {
        let store = ObjectStore::new();
        ShardWorkspace::bootstrap(&store, &ShardTopology::new("shard-1", ShardRole::Other)).unwrap();
        let shard = store
            .get(&ObjectKey::cluster_scoped(LogicalCluster::system_shard(), shards(), "shard-1"))
            .unwrap();
        assert_eq!(shard.spec_str("role"), Some("other"));
    }
}
