//! In-memory, tenant-partitioned object store.
//!
//! Writers hold the write lock while publishing the watch event, so a
//! snapshot taken by [`ObjectStore::list_and_watch`] never misses or
//! duplicates an event.

use super::object::{Object, ObjectKey, WatchEvent};
use crate::control::cluster::{GroupResource, LogicalCluster};
use crate::core::error::{PlaneError, PlaneResult};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;

/// Watch channel capacity; lagging watchers re-list.
const WATCH_CAPACITY: usize = 1024;

/// Result of an idempotent [`ObjectStore::ensure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureOutcome {
    /// The object did not exist and was created.
    Created,
    /// The object existed with a different spec and was updated.
    Updated,
    /// The object already matched; nothing was written.
    Unchanged,
}

/// Object store keyed by logical cluster, group-resource, namespace and name.
pub struct ObjectStore {
    objects: RwLock<BTreeMap<ObjectKey, Object>>,
    revision: AtomicU64,
    events: broadcast::Sender<WatchEvent>,
}

impl ObjectStore {
    /// Create an empty store.
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(WATCH_CAPACITY);
        Self {
            objects: RwLock::new(BTreeMap::new()),
            revision: AtomicU64::new(0),
            events,
        }
    }

    /// Latest revision written.
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::Acquire)
    }

    fn next_revision(&self) -> u64 {
        self.revision.fetch_add(1, Ordering::AcqRel) + 1
    }

    fn publish(&self, event: WatchEvent) {
        // No receivers is fine: nobody is watching yet.
        let _ = self.events.send(event);
    }

    /// Create an object; fails if it already exists.
    pub fn create(&self, mut object: Object) -> PlaneResult<Object> {
        let key = object.key();
        let mut objects = self.objects.write();
        if objects.contains_key(&key) {
            return Err(PlaneError::already_exists(
                key.resource.to_string(),
                key.name,
            ));
        }
        object.resource_version = self.next_revision();
        objects.insert(key, object.clone());
        self.publish(WatchEvent::Added(object.clone()));
        Ok(object)
    }

    /// Create the object, or converge an existing one to the given spec.
    ///
    /// Status of an existing object is preserved. Calling this twice with
    /// the same input yields `Unchanged` and writes nothing.
    pub fn ensure(&self, mut object: Object) -> PlaneResult<EnsureOutcome> {
        let key = object.key();
        let mut objects = self.objects.write();
        match objects.get_mut(&key) {
            Some(existing) if existing.spec == object.spec => Ok(EnsureOutcome::Unchanged),
            Some(existing) => {
                existing.spec = object.spec;
                existing.resource_version = self.next_revision();
                let updated = existing.clone();
                self.publish(WatchEvent::Modified(updated));
                Ok(EnsureOutcome::Updated)
            }
            None => {
                object.resource_version = self.next_revision();
                objects.insert(key, object.clone());
                self.publish(WatchEvent::Added(object));
                Ok(EnsureOutcome::Created)
            }
        }
    }

    /// Get an object by key.
    pub fn get(&self, key: &ObjectKey) -> PlaneResult<Object> {
        self.objects
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| PlaneError::not_found(key.resource.to_string(), key.name.clone()))
    }

    /// Check whether an object exists.
    pub fn contains(&self, key: &ObjectKey) -> bool {
        self.objects.read().contains_key(key)
    }

    /// Replace the spec of an existing object.
    pub fn update(&self, object: Object) -> PlaneResult<Object> {
        let key = object.key();
        let mut objects = self.objects.write();
        let existing = objects
            .get_mut(&key)
            .ok_or_else(|| PlaneError::not_found(key.resource.to_string(), key.name.clone()))?;
        existing.spec = object.spec;
        existing.resource_version = self.next_revision();
        let updated = existing.clone();
        self.publish(WatchEvent::Modified(updated.clone()));
        Ok(updated)
    }

    /// Replace the status of an existing object. No-op when unchanged.
    pub fn update_status(&self, key: &ObjectKey, status: Value) -> PlaneResult<Object> {
        let mut objects = self.objects.write();
        let existing = objects
            .get_mut(key)
            .ok_or_else(|| PlaneError::not_found(key.resource.to_string(), key.name.clone()))?;
        if existing.status == status {
            return Ok(existing.clone());
        }
        existing.status = status;
        existing.resource_version = self.next_revision();
        let updated = existing.clone();
        self.publish(WatchEvent::Modified(updated.clone()));
        Ok(updated)
    }

    /// Delete an object, returning its last state.
    pub fn delete(&self, key: &ObjectKey) -> PlaneResult<Object> {
        let mut objects = self.objects.write();
        let removed = objects
            .remove(key)
            .ok_or_else(|| PlaneError::not_found(key.resource.to_string(), key.name.clone()))?;
        self.next_revision();
        self.publish(WatchEvent::Deleted(removed.clone()));
        Ok(removed)
    }

    /// List objects of a group-resource within one logical cluster,
    /// optionally restricted to a namespace.
    pub fn list(
        &self,
        cluster: &LogicalCluster,
        resource: &GroupResource,
        namespace: Option<&str>,
    ) -> Vec<Object> {
        self.objects
            .read()
            .iter()
            .filter(|(key, _)| {
                &key.cluster == cluster
                    && &key.resource == resource
                    && namespace.map_or(true, |ns| key.namespace.as_deref() == Some(ns))
            })
            .map(|(_, obj)| obj.clone())
            .collect()
    }

    /// List objects of a group-resource across every logical cluster.
    ///
    /// This is the privileged cross-tenant read used by informers and
    /// controllers.
    pub fn list_all(&self, resource: &GroupResource) -> Vec<Object> {
        self.objects
            .read()
            .iter()
            .filter(|(key, _)| &key.resource == resource)
            .map(|(_, obj)| obj.clone())
            .collect()
    }

    /// Logical clusters that hold at least one object.
    pub fn clusters(&self) -> Vec<LogicalCluster> {
        let mut clusters: Vec<LogicalCluster> = self
            .objects
            .read()
            .keys()
            .map(|key| key.cluster.clone())
            .collect();
        clusters.dedup();
        clusters
    }

    /// Subscribe to every subsequent change.
    pub fn subscribe(&self) -> broadcast::Receiver<WatchEvent> {
        self.events.subscribe()
    }

    /// Atomically snapshot a group-resource across all clusters and
    /// subscribe to subsequent changes.
    pub fn list_and_watch(
        &self,
        resource: &GroupResource,
    ) -> (Vec<Object>, broadcast::Receiver<WatchEvent>) {
        let objects = self.objects.read();
        let receiver = self.events.subscribe();
        let snapshot = objects
            .iter()
            .filter(|(key, _)| &key.resource == resource)
            .map(|(_, obj)| obj.clone())
            .collect();
        (snapshot, receiver)
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }
}

impl Default for ObjectStore {
    fn default() -> Self {
        Self::new()
    }
}
