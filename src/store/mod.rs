//! Resource storage backing the API surface.
//!
//! - [`object`] - Stored object model, keys and watch events
//! - [`memory`] - Tenant-partitioned in-memory object store
//! - [`quota`] - Per-tenant object-count quota accounting

pub mod memory;
pub mod object;
pub mod quota;

pub use memory::{EnsureOutcome, ObjectStore};
pub use object::{Object, ObjectKey, WatchEvent};
