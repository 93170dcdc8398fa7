//! Export identity resolution.
//!
//! Each declared export carries a stable identity hash in its status,
//! generated once when the root tenant is bootstrapped. Resolution reads
//! the exports cache and fails with
//! [`PlaneError::IdentityNotYetAvailable`] until every declared export
//! exists and has an identity. Callers retry on a fixed interval.

use crate::control::cache::StoreInformer;
use crate::control::cluster::LogicalCluster;
use crate::core::error::{PlaneError, PlaneResult};
use crate::store::Object;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Exports whose identities every shard must know before becoming ready.
pub const DECLARED_EXPORTS: &[&str] = &[
    "tenancy.kplane.io",
    "scheduling.kplane.io",
    "workload.kplane.io",
];

/// Status field carrying the identity hash of an export.
pub const IDENTITY_FIELD: &str = "identityHash";

/// Read access to export declarations in the root tenant.
pub trait ExportSource: Send + Sync {
    fn export(&self, name: &str) -> Option<Object>;
}

impl ExportSource for StoreInformer {
    fn export(&self, name: &str) -> Option<Object> {
        self.get(&LogicalCluster::root(), None, name)
    }
}

/// A resolved export identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportIdentity {
    pub export: String,
    pub identity: String,
}

/// Resolves and caches identities for a fixed set of exports.
pub struct IdentityResolver {
    exports: Vec<String>,
    source: Arc<dyn ExportSource>,
    resolved: RwLock<BTreeMap<String, String>>,
}

impl IdentityResolver {
    /// Resolver over [`DECLARED_EXPORTS`].
    pub fn new(source: Arc<dyn ExportSource>) -> Self {
        Self::with_exports(source, DECLARED_EXPORTS.iter().copied())
    }

    /// Resolver over an explicit export list.
    pub fn with_exports<I, S>(source: Arc<dyn ExportSource>, exports: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            exports: exports.into_iter().map(Into::into).collect(),
            source,
            resolved: RwLock::new(BTreeMap::new()),
        }
    }

    /// Attempt to resolve every declared export not resolved yet.
    ///
    /// Safe to call repeatedly. Already-resolved identities are never
    /// re-read, so a later status change cannot alter them.
    pub fn resolve(&self) -> PlaneResult<()> {
        for export in &self.exports {
            if self.resolved.read().contains_key(export) {
                continue;
            }
            let identity = self
                .source
                .export(export)
                .and_then(|obj| obj.status_str(IDENTITY_FIELD).map(str::to_string))
                .filter(|identity| !identity.is_empty())
                .ok_or_else(|| PlaneError::IdentityNotYetAvailable {
                    export: export.clone(),
                })?;
            self.resolved.write().insert(export.clone(), identity);
        }
        Ok(())
    }

    /// Whether every declared export has been resolved.
    pub fn is_resolved(&self) -> bool {
        let resolved = self.resolved.read();
        self.exports.iter().all(|export| resolved.contains_key(export))
    }

    /// Cached identity of one export.
    pub fn identity(&self, export: &str) -> Option<String> {
        self.resolved.read().get(export).cloned()
    }

    /// Every cached identity, in export-name order.
    pub fn identities(&self) -> Vec<ExportIdentity> {
        self.resolved
            .read()
            .iter()
            .map(|(export, identity)| ExportIdentity {
                export: export.clone(),
                identity: identity.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::resources::api_exports;
    use serde_json::json;

    #[derive(Default)]
    struct MapSource {
        exports: RwLock<BTreeMap<String, Object>>,
    }

    impl MapSource {
        fn put(&self, name: &str, identity: Option<&str>) {
            let mut obj = Object::new(LogicalCluster::root(), &api_exports(), name);
            if let Some(identity) = identity {
                obj = obj.with_status(json!({ IDENTITY_FIELD: identity }));
            }
            self.exports.write().insert(name.to_string(), obj);
        }
    }

    impl ExportSource for MapSource {
        fn export(&self, name: &str) -> Option<Object> {
            self.exports.read().get(name).cloned()
        }
    }

    #[test]
    fn missing_export_is_not_yet_available() {
        let source = Arc::new(MapSource::default());
        let resolver = IdentityResolver::with_exports(source.clone(), ["a", "b"]);
        source.put("a", Some("hash-a"));

        let err = resolver.resolve().unwrap_err();
        assert!(err.is_retriable());
        assert!(matches!(err, PlaneError::IdentityNotYetAvailable { ref export } if export == "b"));
        assert_eq!(resolver.identity("a").as_deref(), Some("hash-a"));
        assert!(!resolver.is_resolved());
    }

    #[test]
    fn export_without_identity_is_not_yet_available() {
        let source = Arc::new(MapSource::default());
        let resolver = IdentityResolver::with_exports(source.clone(), ["a"]);
        source.put("a", None);
        assert!(resolver.resolve().is_err());

        source.put("a", Some("hash-a"));
        resolver.resolve().unwrap();
        assert!(resolver.is_resolved());
    }

    #[test]
    fn resolved_identities_are_cached() {
        let source = Arc::new(MapSource::default());
        let resolver = IdentityResolver::with_exports(source.clone(), ["a"]);
        source.put("a", Some("first"));
        resolver.resolve().unwrap();

        source.put("a", Some("second"));
        resolver.resolve().unwrap();
        assert_eq!(
            resolver.identities(),
            vec![ExportIdentity {
                export: "a".into(),
                identity: "first".into()
            }]
        );
    }

    #[test]
    fn declared_exports_are_default() {
        let resolver = IdentityResolver::new(Arc::new(MapSource::default()));
        assert!(resolver.resolve().is_err());
        assert_eq!(resolver.exports.len(), DECLARED_EXPORTS.len());
    }
}
