//! Per-tenant object-count quota accounting.
//!
//! Usage is always computed from objects scoped to one logical cluster
//! and namespace; objects in other tenants never contribute.

use super::memory::ObjectStore;
use super::object::Object;
use crate::control::cluster::{GroupResource, LogicalCluster};
use crate::core::error::{PlaneError, PlaneResult};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// Group-resource of quota objects.
pub fn resource_quotas() -> GroupResource {
    GroupResource::core("resourcequotas")
}

/// Quota key counting objects of a group-resource (`count/configmaps`,
/// `count/widgets.example.io`).
pub fn count_key(resource: &GroupResource) -> String {
    format!("count/{}", resource)
}

/// Number of objects of `resource` in the given tenant and namespace.
pub fn usage(
    store: &ObjectStore,
    cluster: &LogicalCluster,
    namespace: Option<&str>,
    resource: &GroupResource,
) -> u64 {
    store.list(cluster, resource, namespace).len() as u64
}

fn parse_limit(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Hard limits declared by a quota object, keyed by quota key.
pub fn hard_limits(quota: &Object) -> BTreeMap<String, u64> {
    quota
        .spec
        .get("hard")
        .and_then(Value::as_object)
        .map(|hard| {
            hard.iter()
                .filter_map(|(key, value)| parse_limit(value).map(|limit| (key.clone(), limit)))
                .collect()
        })
        .unwrap_or_default()
}

fn resource_for_key(key: &str) -> Option<GroupResource> {
    let counted = key.strip_prefix("count/")?;
    Some(match counted.split_once('.') {
        Some((resource, group)) => GroupResource::new(group, resource),
        None => GroupResource::core(counted),
    })
}

/// Compute the status (`hard` and `used`) of a quota object.
pub fn quota_status(store: &ObjectStore, quota: &Object) -> Value {
    let limits = hard_limits(quota);
    let mut hard = Map::new();
    let mut used = Map::new();
    for (key, limit) in &limits {
        hard.insert(key.clone(), json!(limit));
        if let Some(resource) = resource_for_key(key) {
            let count = usage(
                store,
                &quota.cluster,
                quota.namespace.as_deref(),
                &resource,
            );
            used.insert(key.clone(), json!(count));
        }
    }
    json!({ "hard": hard, "used": used })
}

/// Reject creation of `object` if it would exceed a quota in its tenant
/// and namespace.
pub fn admit_create(store: &ObjectStore, object: &Object) -> PlaneResult<()> {
    let Some(namespace) = object.namespace.as_deref() else {
        return Ok(());
    };
    let resource = object.group_resource();
    let key = count_key(&resource);

    for quota in store.list(&object.cluster, &resource_quotas(), Some(namespace)) {
        let Some(limit) = hard_limits(&quota).get(&key).copied() else {
            continue;
        };
        let used = usage(store, &object.cluster, Some(namespace), &resource);
        if used >= limit {
            return Err(PlaneError::forbidden(format!(
                "exceeded quota: {}, requested: {}=1, used: {}={}, limited: {}={}",
                quota.name, key, key, used, key, limit
            )));
        }
    }
    Ok(())
}
