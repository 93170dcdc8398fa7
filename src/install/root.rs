//! Root tenant installs.
//!
//! Phase 0 runs before identities are resolved and creates the exports
//! whose identities every shard waits for. Phase 1 runs after the shard
//! is ready and records how to reach it.

use super::InstallReport;
use crate::control::bootstrap::RootPhase1Input;
use crate::control::cluster::LogicalCluster;
use crate::control::identity::{DECLARED_EXPORTS, IDENTITY_FIELD};
use crate::control::resources::{
    api_exports, api_resource_schemas, cluster_role_bindings, cluster_roles, shards, workspace_types,
    workspaces, RBAC_GROUP,
};
use crate::core::error::PlaneResult;
use crate::store::{Object, ObjectKey, ObjectStore};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::RngCore;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

/// Workspace types available in the root tenant.
const WORKSPACE_TYPES: &[&str] = &["root", "organization", "team", "universal", "home", "homeroot"];

/// Role allowing members of the creator groups to create home workspaces.
pub const HOME_CREATOR_ROLE: &str = "system:kplane:tenancy:home-workspace-creator";

/// Generate a fresh export identity: hex SHA-256 of 32 random bytes.
pub fn generate_identity() -> String {
    let mut seed = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut seed);
    hex::encode(Sha256::digest(seed))
}

/// First root install: exports and their resource schemas.
pub struct RootPhase0;

impl RootPhase0 {
    pub fn bootstrap(store: &ObjectStore) -> PlaneResult<InstallReport> {
        let root = LogicalCluster::root();
        let mut report = InstallReport::default();

        for export in DECLARED_EXPORTS {
            let schema = format!("v1alpha1.{}", export);
            report.ensure(
                store,
                Object::new(root.clone(), &api_resource_schemas(), schema.clone())
                    .with_spec(json!({ "group": export })),
            )?;
            report.ensure(
                store,
                Object::new(root.clone(), &api_exports(), *export)
                    .with_spec(json!({ "latestResourceSchemas": [schema] })),
            )?;
            ensure_identity(store, &ObjectKey::cluster_scoped(root.clone(), api_exports(), *export))?;
        }
        Ok(report)
    }
}

/// Assign an identity to an export that has none. An existing identity
/// is never replaced.
fn ensure_identity(store: &ObjectStore, key: &ObjectKey) -> PlaneResult<()> {
    let export = store.get(key)?;
    if export.status_str(IDENTITY_FIELD).is_some() {
        return Ok(());
    }
    let mut status = match export.status {
        Value::Object(fields) => fields,
        _ => Default::default(),
    };
    status.insert(IDENTITY_FIELD.to_string(), json!(generate_identity()));
    store.update_status(key, Value::Object(status))?;
    tracing::info!(export = %key.name, "generated export identity");
    Ok(())
}

/// Second root install: workspace types, the shard record and home
/// workspace scaffolding.
pub struct RootPhase1;

impl RootPhase1 {
    pub fn bootstrap(store: &ObjectStore, input: &RootPhase1Input) -> PlaneResult<InstallReport> {
        let root = LogicalCluster::root();
        let mut report = InstallReport::default();

        for name in WORKSPACE_TYPES {
            report.ensure(
                store,
                Object::new(root.clone(), &workspace_types(), *name).with_spec(json!({})),
            )?;
        }

        let client = &input.client_config;
        report.ensure(
            store,
            Object::new(root.clone(), &shards(), input.shard_name.clone()).with_spec(json!({
                "baseURL": client.server,
                "externalURL": client.server,
                "caData": BASE64.encode(&client.certificate_authority_data),
            })),
        )?;

        if input.home_root_prefix.is_empty() {
            return Ok(report);
        }

        report.ensure(
            store,
            Object::new(root.clone(), &cluster_roles(), HOME_CREATOR_ROLE).with_spec(json!({
                "rules": [{
                    "apiGroups": ["tenancy.kplane.io"],
                    "resources": ["workspaces"],
                    "resourceNames": ["~"],
                    "verbs": ["create", "get"],
                }],
            })),
        )?;
        if !input.home_creator_groups.is_empty() {
            let subjects: Vec<Value> = input
                .home_creator_groups
                .iter()
                .map(|group| json!({ "apiGroup": RBAC_GROUP, "kind": "Group", "name": group }))
                .collect();
            report.ensure(
                store,
                Object::new(root.clone(), &cluster_role_bindings(), HOME_CREATOR_ROLE).with_spec(json!({
                    "roleRef": { "apiGroup": RBAC_GROUP, "kind": "ClusterRole", "name": HOME_CREATOR_ROLE },
                    "subjects": subjects,
                })),
            )?;
        }

        // One workspace per prefix segment below root.
        let mut parent = root;
        for segment in input
            .home_root_prefix
            .split(':')
            .skip_while(|segment| *segment == LogicalCluster::ROOT)
        {
            report.ensure(
                store,
                Object::new(parent.clone(), &workspaces(), segment)
                    .with_spec(json!({ "type": "homeroot" })),
            )?;
            parent = parent.join(segment);
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::bootstrap::ClientConfig;

    fn input(prefix: &str, groups: &[&str]) -> RootPhase1Input {
        RootPhase1Input {
            shard_name: "root".to_string(),
            client_config: ClientConfig {
                server: "https://10.0.0.1:6443".to_string(),
                certificate_authority_data: b"PEM".to_vec(),
            },
            home_root_prefix: prefix.to_string(),
            home_creator_groups: groups.iter().map(|g| g.to_string()).collect(),
        }
    }

    #[test]
    fn identities_are_generated_once() {
        let store = ObjectStore::new();
        RootPhase0::bootstrap(&store).unwrap();
        let key = ObjectKey::cluster_scoped(LogicalCluster::root(), api_exports(), DECLARED_EXPORTS[0]);
        let first = store.get(&key).unwrap();
        let identity = first.status_str(IDENTITY_FIELD).unwrap().to_string();
        assert_eq!(identity.len(), 64);

        RootPhase0::bootstrap(&store).unwrap();
        let second = store.get(&key).unwrap();
        assert_eq!(second.status_str(IDENTITY_FIELD), Some(identity.as_str()));
    }

    #[test]
    fn generated_identities_differ() {
        assert_ne!(generate_identity(), generate_identity());
    }

    #[test]
    fn shard_record_carries_client_config() {
        let store = ObjectStore::new();
        RootPhase1::bootstrap(&store, &input("root:users", &["system:authenticated"])).unwrap();
        let shard = store
            .get(&ObjectKey::cluster_scoped(LogicalCluster::root(), shards(), "root"))
            .unwrap();
        assert_eq!(shard.spec_str("baseURL"), Some("https://10.0.0.1:6443"));
        assert_eq!(shard.spec_str("caData"), Some(BASE64.encode(b"PEM").as_str()));

        let home = store
            .get(&ObjectKey::cluster_scoped(LogicalCluster::root(), workspaces(), "users"))
            .unwrap();
        assert_eq!(home.spec_str("type"), Some("homeroot"));
        assert!(store.contains(&ObjectKey::cluster_scoped(
            LogicalCluster::root(),
            cluster_role_bindings(),
            HOME_CREATOR_ROLE
        )));
    }

    #[test]
    fn empty_prefix_skips_home_scaffolding() {
        let store = ObjectStore::new();
        RootPhase1::bootstrap(&store, &input("", &["system:authenticated"])).unwrap();
        assert!(store
            .list(&LogicalCluster::root(), &workspaces(), None)
            .is_empty());
        assert!(!store.contains(&ObjectKey::cluster_scoped(
            LogicalCluster::root(),
            cluster_roles(),
            HOME_CREATOR_ROLE
        )));
    }
}
