//! Administrative credentials for the root shard.
//!
//! Generates an admin token and a shard-admin token and writes a client
//! configuration with contexts for the root tenant, the shard base URL
//! and the shard-admin identity. Only the hash of the shard-admin token
//! is kept in the store.

use super::ControllerContext;
use crate::control::activation::ControllerGroup;
use crate::control::cluster::LogicalCluster;
use crate::control::resources::secrets;
use crate::core::error::{PlaneError, PlaneResult};
use crate::store::{Object, ObjectStore};
use rand::RngCore;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

/// Secret in `system:admin` holding the shard-admin token hash.
pub const SHARD_ADMIN_SECRET: &str = "shard-admin-token-hash";

/// A freshly generated credential set.
#[derive(Debug, Clone)]
pub struct AdminCredentials {
    pub admin_token: String,
    pub shard_admin_token: String,
    pub shard_admin_token_hash: String,
}

impl AdminCredentials {
    pub fn generate() -> Self {
        let admin_token = random_token();
        let shard_admin_token = random_token();
        let shard_admin_token_hash = hex::encode(Sha256::digest(shard_admin_token.as_bytes()));
        Self {
            admin_token,
            shard_admin_token,
            shard_admin_token_hash,
        }
    }

    /// Client configuration for `external_address`.
    pub fn kubeconfig(&self, external_address: &str) -> Value {
        let base = format!("https://{}", external_address);
        json!({
            "apiVersion": "v1",
            "kind": "Config",
            "clusters": [
                { "name": "root", "cluster": { "server": format!("{}/clusters/root", base) } },
                { "name": "base", "cluster": { "server": base } },
            ],
            "users": [
                { "name": "kplane-admin", "user": { "token": self.admin_token } },
                { "name": "shard-admin", "user": { "token": self.shard_admin_token } },
            ],
            "contexts": [
                { "name": "root", "context": { "cluster": "root", "user": "kplane-admin" } },
                { "name": "base", "context": { "cluster": "base", "user": "kplane-admin" } },
                { "name": "system:admin", "context": { "cluster": "base", "user": "shard-admin" } },
            ],
            "current-context": "root",
            "extensions": { "shardAdminTokenHash": self.shard_admin_token_hash },
        })
    }
}

fn random_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Permission bits of the written client configuration. It carries bearer
/// tokens, so only the owner may read it.
#[cfg(unix)]
const KUBECONFIG_MODE: u32 = 0o600;

/// Write `config` as pretty JSON, creating parent directories. On unix the
/// file is owner-only, including when it already existed.
pub fn write_kubeconfig(path: &Path, config: &Value) -> PlaneResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| PlaneError::internal(format!("create {}: {}", parent.display(), e)))?;
    }
    let body = serde_json::to_vec_pretty(config)
        .map_err(|e| PlaneError::internal(format!("encode kubeconfig: {}", e)))?;
    let write_error = |e: std::io::Error| PlaneError::internal(format!("write {}: {}", path.display(), e));

    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
        options.mode(KUBECONFIG_MODE);
        let file = options.open(path).map_err(write_error)?;
        file.set_permissions(std::fs::Permissions::from_mode(KUBECONFIG_MODE))
            .map_err(write_error)?;
        write_all(file, &body).map_err(write_error)
    }
    #[cfg(not(unix))]
    {
        let file = options.open(path).map_err(write_error)?;
        write_all(file, &body).map_err(write_error)
    }
}

fn write_all(mut file: std::fs::File, body: &[u8]) -> std::io::Result<()> {
    file.write_all(body)?;
    file.sync_all()
}

fn record_hash(store: &ObjectStore, credentials: &AdminCredentials) -> PlaneResult<()> {
    store.ensure(
        Object::new(LogicalCluster::system_admin(), &secrets(), SHARD_ADMIN_SECRET)
            .in_namespace("default")
            .with_spec(json!({ "data": { "tokenHash": credentials.shard_admin_token_hash } })),
    )?;
    Ok(())
}

/// Issues the credential set once at activation.
pub struct AdminCredentialsGroup;

impl ControllerGroup<ControllerContext> for AdminCredentialsGroup {
    fn name(&self) -> &'static str {
        "admin-credentials"
    }

    fn install(&self, ctx: &ControllerContext) -> PlaneResult<()> {
        let credentials = AdminCredentials::generate();
        record_hash(&ctx.store, &credentials)?;
        match &ctx.options.admin_kubeconfig {
            Some(path) => {
                let config = credentials.kubeconfig(&ctx.options.serving.external_address);
                write_kubeconfig(path, &config)?;
                tracing::info!(path = %path.display(), "wrote admin kubeconfig");
            }
            None => tracing::info!("no admin kubeconfig path configured, credentials not written"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ObjectKey;

    #[test]
    fn hash_matches_shard_admin_token() {
        let credentials = AdminCredentials::generate();
        assert_eq!(credentials.admin_token.len(), 64);
        assert_ne!(credentials.admin_token, credentials.shard_admin_token);
        assert_eq!(
            credentials.shard_admin_token_hash,
            hex::encode(Sha256::digest(credentials.shard_admin_token.as_bytes()))
        );
    }

    #[test]
    fn kubeconfig_is_written_and_hash_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("admin.kubeconfig");
        let credentials = AdminCredentials::generate();
        write_kubeconfig(&path, &credentials.kubeconfig("127.0.0.1:6443")).unwrap();

        let written: Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(written["current-context"], "root");
        assert_eq!(
            written["clusters"][0]["cluster"]["server"],
            "https://127.0.0.1:6443/clusters/root"
        );
        assert_eq!(written["users"][1]["user"]["token"], credentials.shard_admin_token);

        let store = ObjectStore::new();
        record_hash(&store, &credentials).unwrap();
        let secret = store
            .get(&ObjectKey::new(
                LogicalCluster::system_admin(),
                secrets(),
                Some("default".to_string()),
                SHARD_ADMIN_SECRET,
            ))
            .unwrap();
        assert_eq!(secret.spec["data"]["tokenHash"], credentials.shard_admin_token_hash);
    }

    #[cfg(unix)]
    #[test]
    fn kubeconfig_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("admin.kubeconfig");
        let credentials = AdminCredentials::generate();
        write_kubeconfig(&path, &credentials.kubeconfig("127.0.0.1:6443")).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);

        // A pre-existing world-readable file is tightened on rewrite.
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();
        write_kubeconfig(&path, &credentials.kubeconfig("127.0.0.1:6443")).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
