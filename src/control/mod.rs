//! Control-plane composition and startup.
//!
//! - [`cluster`] - Logical cluster and resource group identifiers
//! - [`shard`] - Root vs. other shard topology
//! - [`features`] - Feature gates
//! - [`resources`] - Well-known group-resources
//! - [`wait`] - Cancellation-aware polling
//! - [`gate`] - One-shot readiness gate
//! - [`cache`] - Informers and cache-sync barriers
//! - [`identity`] - Export identity resolution
//! - [`bootstrap`] - Ordered bootstrap phases
//! - [`hooks`] - Post-start hooks
//! - [`activation`] - Controller activation gate
//!
//! # Startup
//!
//! The bootstrap orchestrator runs as a post-start hook once the listener
//! is bound. It fires the ready gate after the second cache sync.
//! Controller groups are installed before the listener starts, but their
//! workers stay idle until the gate fires.

pub mod activation;
pub mod bootstrap;
pub mod cache;
pub mod cluster;
pub mod features;
pub mod gate;
pub mod hooks;
pub mod identity;
pub mod resources;
pub mod shard;
pub mod wait;
