//! Well-known group-resources referenced by bootstrap and controllers.

use crate::control::cluster::GroupResource;

/// API group of exports, bindings and their schemas.
pub const APIS_GROUP: &str = "apis.kplane.io";
/// API group of workspaces and workspace types.
pub const TENANCY_GROUP: &str = "tenancy.kplane.io";
/// API group of shard records.
pub const CORE_KPLANE_GROUP: &str = "core.kplane.io";
/// API group of schema extension definitions.
pub const APIEXTENSIONS_GROUP: &str = "apiextensions.k8s.io";
/// API group of access-control policy objects.
pub const RBAC_GROUP: &str = "rbac.authorization.k8s.io";

pub fn api_exports() -> GroupResource {
    GroupResource::new(APIS_GROUP, "apiexports")
}

pub fn api_bindings() -> GroupResource {
    GroupResource::new(APIS_GROUP, "apibindings")
}

pub fn api_resource_schemas() -> GroupResource {
    GroupResource::new(APIS_GROUP, "apiresourceschemas")
}

pub fn custom_resource_definitions() -> GroupResource {
    GroupResource::new(APIEXTENSIONS_GROUP, "customresourcedefinitions")
}

pub fn workspaces() -> GroupResource {
    GroupResource::new(TENANCY_GROUP, "workspaces")
}

pub fn workspace_types() -> GroupResource {
    GroupResource::new(TENANCY_GROUP, "workspacetypes")
}

pub fn shards() -> GroupResource {
    GroupResource::new(CORE_KPLANE_GROUP, "shards")
}

pub fn logical_clusters() -> GroupResource {
    GroupResource::new(CORE_KPLANE_GROUP, "logicalclusters")
}

pub fn cluster_roles() -> GroupResource {
    GroupResource::new(RBAC_GROUP, "clusterroles")
}

pub fn cluster_role_bindings() -> GroupResource {
    GroupResource::new(RBAC_GROUP, "clusterrolebindings")
}

pub fn namespaces() -> GroupResource {
    GroupResource::core("namespaces")
}

pub fn config_maps() -> GroupResource {
    GroupResource::core("configmaps")
}

pub fn service_accounts() -> GroupResource {
    GroupResource::core("serviceaccounts")
}

pub fn secrets() -> GroupResource {
    GroupResource::core("secrets")
}
