//! API surfaces served behind the handler chain.
//!
//! - [`rest`] - Generic cluster-scoped CRUD over the object store
//! - [`builtin`] - Core and access-control groups (chain fallback)
//! - [`extensions`] - Schema-extension definitions and the groups they add

pub mod builtin;
pub mod extensions;
pub mod rest;

pub use builtin::BuiltinApi;
pub use extensions::ExtensionApi;
