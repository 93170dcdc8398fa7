//! Watch-based local caches and the cache-sync barrier.
//!
//! An [`Informer`] mirrors one slice of the object store and reports
//! `has_synced` once it has observed a complete initial snapshot. A
//! [`CacheSyncBarrier`] turns a set of informers into a single readiness
//! predicate. Bootstrap uses two distinct barriers because the second
//! informer set does not exist yet when the first one is awaited.
//!
//! Informers are append-only snapshots refreshed by their own background
//! task, so concurrent readers never coordinate with the writer beyond
//! the cache lock.

use crate::control::cluster::{GroupResource, LogicalCluster};
use crate::store::{Object, ObjectKey, ObjectStore, WatchEvent};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use super::wait::sleep_or_cancel;

/// A watch-backed local cache.
pub trait Informer: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> String;

    /// Whether the cache has observed a complete initial snapshot.
    fn has_synced(&self) -> bool;

    /// Start the background watcher. Idempotent: only the first call
    /// spawns a task. The watcher runs until `token` is cancelled.
    fn start(&self, token: CancellationToken);
}

struct InformerState {
    resource: GroupResource,
    store: Arc<ObjectStore>,
    cache: RwLock<HashMap<ObjectKey, Object>>,
    synced: AtomicBool,
    started: AtomicBool,
}

impl InformerState {
    fn replace(&self, snapshot: Vec<Object>) {
        let mut cache = self.cache.write();
        cache.clear();
        for object in snapshot {
            cache.insert(object.key(), object);
        }
    }

    fn apply(&self, event: WatchEvent) {
        if event.object().group_resource() != self.resource {
            return;
        }
        let mut cache = self.cache.write();
        match event {
            WatchEvent::Added(obj) | WatchEvent::Modified(obj) => {
                cache.insert(obj.key(), obj);
            }
            WatchEvent::Deleted(obj) => {
                cache.remove(&obj.key());
            }
        }
    }
}

/// Informer mirroring one group-resource of the object store across all
/// logical clusters.
#[derive(Clone)]
pub struct StoreInformer {
    state: Arc<InformerState>,
}

impl StoreInformer {
    /// Create an informer; nothing is watched until [`Informer::start`].
    pub fn new(store: Arc<ObjectStore>, resource: GroupResource) -> Self {
        Self {
            state: Arc::new(InformerState {
                resource,
                store,
                cache: RwLock::new(HashMap::new()),
                synced: AtomicBool::new(false),
                started: AtomicBool::new(false),
            }),
        }
    }

    /// Watched group-resource.
    pub fn resource(&self) -> &GroupResource {
        &self.state.resource
    }

    /// Look up a cached object.
    pub fn get(
        &self,
        cluster: &LogicalCluster,
        namespace: Option<&str>,
        name: &str,
    ) -> Option<Object> {
        let key = ObjectKey::new(
            cluster.clone(),
            self.state.resource.clone(),
            namespace.map(str::to_string),
            name,
        );
        self.state.cache.read().get(&key).cloned()
    }

    /// Cached objects of one logical cluster.
    pub fn list(&self, cluster: &LogicalCluster) -> Vec<Object> {
        self.state
            .cache
            .read()
            .values()
            .filter(|obj| &obj.cluster == cluster)
            .cloned()
            .collect()
    }

    /// Every cached object.
    pub fn list_all(&self) -> Vec<Object> {
        self.state.cache.read().values().cloned().collect()
    }

    async fn run(state: Arc<InformerState>, token: CancellationToken) {
        loop {
            let (snapshot, mut events) = state.store.list_and_watch(&state.resource);
            state.replace(snapshot);
            if !state.synced.swap(true, Ordering::AcqRel) {
                tracing::debug!(resource = %state.resource, "informer synced");
            }

            loop {
                tokio::select! {
                    _ = token.cancelled() => return,
                    event = events.recv() => match event {
                        Ok(event) => state.apply(event),
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!(
                                resource = %state.resource,
                                skipped,
                                "informer fell behind, relisting"
                            );
                            break;
                        }
                        Err(RecvError::Closed) => return,
                    },
                }
            }
        }
    }
}

impl Informer for StoreInformer {
    fn name(&self) -> String {
        self.state.resource.to_string()
    }

    fn has_synced(&self) -> bool {
        self.state.synced.load(Ordering::Acquire)
    }

    fn start(&self, token: CancellationToken) {
        if self.state.started.swap(true, Ordering::AcqRel) {
            return;
        }
        let state = self.state.clone();
        tokio::spawn(Self::run(state, token));
    }
}

/// A named set of informers started and awaited together.
pub struct InformerFactory {
    name: String,
    store: Arc<ObjectStore>,
    informers: RwLock<BTreeMap<String, Arc<dyn Informer>>>,
    store_informers: RwLock<HashMap<GroupResource, StoreInformer>>,
}

impl InformerFactory {
    /// Create an empty factory over the given store.
    pub fn new(name: impl Into<String>, store: Arc<ObjectStore>) -> Self {
        Self {
            name: name.into(),
            store,
            informers: RwLock::new(BTreeMap::new()),
            store_informers: RwLock::new(HashMap::new()),
        }
    }

    /// Factory name used in logs.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get or register the store-backed informer for a group-resource.
    pub fn for_resource(&self, resource: &GroupResource) -> StoreInformer {
        if let Some(informer) = self.store_informers.read().get(resource) {
            return informer.clone();
        }
        let mut store_informers = self.store_informers.write();
        let informer = store_informers
            .entry(resource.clone())
            .or_insert_with(|| StoreInformer::new(self.store.clone(), resource.clone()))
            .clone();
        self.informers
            .write()
            .insert(informer.name(), Arc::new(informer.clone()));
        informer
    }

    /// Register an arbitrary informer under its name.
    pub fn insert(&self, informer: Arc<dyn Informer>) {
        self.informers.write().insert(informer.name(), informer);
    }

    /// Registered informers.
    pub fn informers(&self) -> Vec<Arc<dyn Informer>> {
        self.informers.read().values().cloned().collect()
    }

    /// Start every registered informer that is not running yet.
    pub fn start(&self, token: &CancellationToken) {
        for informer in self.informers() {
            informer.start(token.child_token());
        }
    }

    /// Barrier over every currently registered informer.
    pub fn barrier(&self, poll_interval: Duration) -> CacheSyncBarrier {
        let mut barrier = CacheSyncBarrier::new(self.name.clone(), poll_interval);
        for informer in self.informers() {
            barrier.add_source(informer);
        }
        barrier
    }

    /// Block until every registered informer has synced or the token is
    /// cancelled. Returns `false` on cancellation.
    pub async fn wait_for_cache_sync(
        &self,
        token: &CancellationToken,
        poll_interval: Duration,
    ) -> bool {
        self.barrier(poll_interval).wait_until_synced(token).await
    }
}

/// Readiness predicate over a fixed set of informers.
pub struct CacheSyncBarrier {
    name: String,
    sources: Vec<Arc<dyn Informer>>,
    poll_interval: Duration,
}

impl CacheSyncBarrier {
    /// Create an empty barrier.
    pub fn new(name: impl Into<String>, poll_interval: Duration) -> Self {
        Self {
            name: name.into(),
            sources: Vec::new(),
            poll_interval,
        }
    }

    /// Register a cache to wait on.
    pub fn add_source(&mut self, informer: Arc<dyn Informer>) {
        self.sources.push(informer);
    }

    /// Number of registered caches.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Whether no caches are registered.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Whether every registered cache has synced.
    pub fn is_synced(&self) -> bool {
        self.sources.iter().all(|source| source.has_synced())
    }

    /// Names of caches that have not synced yet.
    pub fn pending(&self) -> Vec<String> {
        self.sources
            .iter()
            .filter(|source| !source.has_synced())
            .map(|source| source.name())
            .collect()
    }

    /// Block until every registered cache has synced.
    ///
    /// Returns `false` as soon as the token is cancelled; this is a
    /// shutdown path, not an error.
    pub async fn wait_until_synced(&self, token: &CancellationToken) -> bool {
        loop {
            if token.is_cancelled() {
                return false;
            }
            if self.is_synced() {
                tracing::debug!(barrier = %self.name, caches = self.sources.len(), "caches synced");
                return true;
            }
            if !sleep_or_cancel(token, self.poll_interval).await {
                tracing::debug!(
                    barrier = %self.name,
                    pending = ?self.pending(),
                    "cache sync wait cancelled"
                );
                return false;
            }
        }
    }
}
