//! Generic resource endpoint over the object store.
//!
//! Every operation is scoped to the logical cluster of the request
//! target. Creation goes through quota admission.

use crate::control::cluster::GroupResource;
use crate::core::error::{PlaneError, PlaneResult};
use crate::net::response;
use crate::net::target::RequestTarget;
use crate::store::quota;
use crate::store::{Object, ObjectKey, ObjectStore};
use bytes::Bytes;
use http::{Method, Response, StatusCode};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_json::{json, Map, Value};

/// Length of the random suffix appended to `generateName`.
const GENERATED_SUFFIX_LEN: usize = 5;

/// Top-level body fields that are not part of the stored spec.
const ENVELOPE_FIELDS: &[&str] = &["apiVersion", "kind", "metadata", "status"];

/// Whether a resource lives inside namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Cluster,
    Namespaced,
}

/// Render a stored object in API form.
pub fn render(object: &Object, api_version: &str) -> Value {
    let mut metadata = Map::new();
    metadata.insert("name".into(), json!(object.name));
    if let Some(ns) = &object.namespace {
        metadata.insert("namespace".into(), json!(ns));
    }
    metadata.insert("clusterName".into(), json!(object.cluster));
    metadata.insert(
        "resourceVersion".into(),
        json!(object.resource_version.to_string()),
    );
    json!({
        "apiVersion": api_version,
        "metadata": metadata,
        "spec": object.spec,
        "status": object.status,
    })
}

fn generate_name(prefix: &str) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_SUFFIX_LEN)
        .map(|c| (c as char).to_ascii_lowercase())
        .collect();
    format!("{}{}", prefix, suffix)
}

/// Decode a request body into an object for `target`.
fn decode(target: &RequestTarget, resource: &GroupResource, body: &Bytes) -> PlaneResult<Object> {
    let value: Value = if body.is_empty() {
        json!({})
    } else {
        serde_json::from_slice(body)
            .map_err(|e| PlaneError::invalid(format!("invalid JSON body: {}", e)))?
    };
    let Value::Object(fields) = value else {
        return Err(PlaneError::invalid("request body must be a JSON object"));
    };

    let metadata = fields.get("metadata");
    let name = metadata
        .and_then(|m| m.get("name"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| {
            metadata
                .and_then(|m| m.get("generateName"))
                .and_then(Value::as_str)
                .map(generate_name)
        })
        .or_else(|| target.name.clone())
        .ok_or_else(|| PlaneError::invalid("metadata.name or metadata.generateName is required"))?;

    if let Some(path_name) = &target.name {
        if path_name != &name {
            return Err(PlaneError::invalid(format!(
                "name {:?} does not match path name {:?}",
                name, path_name
            )));
        }
    }

    let spec = match fields.get("spec") {
        Some(spec) => spec.clone(),
        None => Value::Object(
            fields
                .iter()
                .filter(|(key, _)| !ENVELOPE_FIELDS.contains(&key.as_str()))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        ),
    };
    let status = fields.get("status").cloned().unwrap_or(Value::Null);

    let mut object = Object::new(target.cluster.clone(), resource, name)
        .with_spec(spec)
        .with_status(status);
    if let Some(ns) = &target.namespace {
        object = object.in_namespace(ns.clone());
    }
    Ok(object)
}

/// Serve one resource request.
pub fn serve(
    store: &ObjectStore,
    target: &RequestTarget,
    method: &Method,
    body: &Bytes,
    scope: Scope,
) -> PlaneResult<Response<Bytes>> {
    let resource = target
        .group_resource()
        .ok_or_else(|| PlaneError::not_found("resource", target.path.clone()))?;
    let api_version = target
        .group_version
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_default();

    if scope == Scope::Cluster && target.namespace.is_some() {
        return Err(PlaneError::not_found(
            resource.to_string(),
            format!("namespaced path for cluster-scoped resource {}", resource),
        ));
    }

    let key = |name: &str| {
        ObjectKey::new(
            target.cluster.clone(),
            resource.clone(),
            target.namespace.clone(),
            name,
        )
    };

    match (method.clone(), target.name.as_deref(), target.subresource.as_deref()) {
        (Method::GET, None, None) => {
            let items: Vec<Value> = store
                .list(&target.cluster, &resource, target.namespace.as_deref())
                .iter()
                .map(|obj| render(obj, &api_version))
                .collect();
            Ok(response::json(
                StatusCode::OK,
                &json!({
                    "apiVersion": api_version,
                    "kind": "List",
                    "metadata": { "resourceVersion": store.revision().to_string() },
                    "items": items,
                }),
            ))
        }
        (Method::GET, Some(name), None | Some("status")) => {
            let object = store.get(&key(name))?;
            Ok(response::json(StatusCode::OK, &render(&object, &api_version)))
        }
        (Method::POST, None, None) => {
            if scope == Scope::Namespaced && target.namespace.is_none() {
                return Err(PlaneError::invalid(format!(
                    "{} must be created inside a namespace",
                    resource
                )));
            }
            let object = decode(target, &resource, body)?;
            quota::admit_create(store, &object)?;
            let created = store.create(object)?;
            tracing::debug!(key = %created.key(), "object created");
            Ok(response::json(StatusCode::CREATED, &render(&created, &api_version)))
        }
        (Method::PUT, Some(_), None) => {
            let object = decode(target, &resource, body)?;
            let updated = store.update(object)?;
            Ok(response::json(StatusCode::OK, &render(&updated, &api_version)))
        }
        (Method::PUT, Some(name), Some("status")) => {
            let object = decode(target, &resource, body)?;
            let updated = store.update_status(&key(name), object.status)?;
            Ok(response::json(StatusCode::OK, &render(&updated, &api_version)))
        }
        (Method::DELETE, Some(name), None) => {
            let deleted = store.delete(&key(name))?;
            Ok(response::json(StatusCode::OK, &render(&deleted, &api_version)))
        }
        (method, _, _) => Err(PlaneError::MethodNotAllowed {
            method: method.to_string(),
        }),
    }
}
