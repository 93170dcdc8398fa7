//! Idempotent bootstrap installers.
//!
//! Each installer converges a fixed set of objects in the store and can
//! be re-run any number of times:
//!
//! - [`policy`] - Baseline access policy in `system:admin`
//! - [`schemas`] - System schema definitions in `system:system-crds`
//! - [`shard`] - This shard's bookkeeping objects in `system:shard`
//! - [`root`] - The two root tenant phases
//!
//! [`StoreBootstrapper`] drives them on behalf of the bootstrap
//! orchestrator.

pub mod policy;
pub mod root;
pub mod schemas;
pub mod shard;

pub use policy::BaselinePolicy;
pub use root::{RootPhase0, RootPhase1};
pub use schemas::SystemSchemas;
pub use shard::ShardWorkspace;

use crate::control::bootstrap::{Bootstrapper, RootPhase1Input};
use crate::control::shard::ShardTopology;
use crate::core::error::PlaneResult;
use crate::store::{EnsureOutcome, Object, ObjectStore};
use std::sync::Arc;

/// Counts of objects touched by one installer run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct InstallReport {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
}

impl InstallReport {
    /// Ensure `object` and record the outcome.
    pub fn ensure(&mut self, store: &ObjectStore, object: Object) -> PlaneResult<()> {
        match store.ensure(object)? {
            EnsureOutcome::Created => self.created += 1,
            EnsureOutcome::Updated => self.updated += 1,
            EnsureOutcome::Unchanged => self.unchanged += 1,
        }
        Ok(())
    }

    /// Number of writes performed.
    pub fn changed(&self) -> usize {
        self.created + self.updated
    }

    fn log(&self, installer: &'static str) {
        tracing::debug!(
            installer,
            created = self.created,
            updated = self.updated,
            unchanged = self.unchanged,
            "installer converged"
        );
    }
}

/// [`Bootstrapper`] writing directly to the local object store.
pub struct StoreBootstrapper {
    store: Arc<ObjectStore>,
}

impl StoreBootstrapper {
    pub fn new(store: Arc<ObjectStore>) -> Self {
        Self { store }
    }
}

impl Bootstrapper for StoreBootstrapper {
    fn ensure_baseline_policy(&self) -> PlaneResult<()> {
        BaselinePolicy::ensure(&self.store)?.log("baseline-policy");
        Ok(())
    }

    fn bootstrap_system_schemas(&self) -> PlaneResult<()> {
        SystemSchemas::bootstrap(&self.store)?.log("system-schemas");
        Ok(())
    }

    fn bootstrap_shard_workspace(&self, shard: &ShardTopology) -> PlaneResult<()> {
        ShardWorkspace::bootstrap(&self.store, shard)?.log("shard-workspace");
        Ok(())
    }

    fn bootstrap_root_phase0(&self) -> PlaneResult<()> {
        RootPhase0::bootstrap(&self.store)?.log("root-phase0");
        Ok(())
    }

    fn bootstrap_root_phase1(&self, input: &RootPhase1Input) -> PlaneResult<()> {
        RootPhase1::bootstrap(&self.store, input)?.log("root-phase1");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::bootstrap::ClientConfig;

    #[test]
    fn every_installer_is_idempotent() {
        let store = Arc::new(ObjectStore::new());
        let bootstrapper = StoreBootstrapper::new(store.clone());
        let shard = ShardTopology::from_name("root");
        let input = RootPhase1Input {
            shard_name: "root".to_string(),
            client_config: ClientConfig {
                server: "https://localhost:6443".to_string(),
                certificate_authority_data: b"ca".to_vec(),
            },
            home_root_prefix: "root:users".to_string(),
            home_creator_groups: vec!["system:authenticated".to_string()],
        };

        let run = || {
            bootstrapper.ensure_baseline_policy().unwrap();
            bootstrapper.bootstrap_system_schemas().unwrap();
            bootstrapper.bootstrap_shard_workspace(&shard).unwrap();
            bootstrapper.bootstrap_root_phase0().unwrap();
            bootstrapper.bootstrap_root_phase1(&input).unwrap();
        };

        run();
        let objects = store.len();
        let revision = store.revision();
        run();
        assert_eq!(store.len(), objects);
        assert_eq!(store.revision(), revision);
    }
}
