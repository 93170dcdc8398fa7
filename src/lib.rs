//! kplane - multi-tenant control-plane shard.
//!
//! A kplane process serves one shard of a tenant-partitioned API server.
//! The shard named `root` additionally owns the root tenant and issues
//! administrative credentials. Startup is split between the listener,
//! which comes up immediately, and an ordered bootstrap sequence that runs
//! as a post-start hook and gates readiness.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │            HTTP listener  →  pre-handler mux                 │
//! │   /healthz /readyz /metrics /services/...                    │
//! └──────────────────────────────────────────────────────────────┘
//!                               │
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     Handler chain                            │
//! │        extension API (delegate)  →  built-in API (fallback)  │
//! └──────────────────────────────────────────────────────────────┘
//!                               │
//! ┌──────────────────────────────────────────────────────────────┐
//! │              Tenant-partitioned object store                 │
//! └──────────────────────────────────────────────────────────────┘
//!         ▲                                        ▲
//! ┌────────────────────────┐        ┌──────────────────────────────┐
//! │ Bootstrap orchestrator │  ───►  │ Controllers (gated on ready) │
//! │ installers + informers │        │                              │
//! └────────────────────────┘        └──────────────────────────────┘
//! ```
//!
//! # Module Organization
//!
//! ## Core
//! - [`core::config`] - Configuration parsing and validation
//! - [`core::runtime`] - Main runtime orchestration
//! - [`core::error`] - Error types and HTTP status mapping
//!
//! ## Control Plane
//! - [`control::bootstrap`] - Eleven-phase bootstrap orchestrator
//! - [`control::cache`] - Informers and cache-sync barriers
//! - [`control::identity`] - Export identity resolution
//! - [`control::activation`] - Controller activation gate
//! - [`control::shard`] - Shard topology
//!
//! ## Storage and API
//! - [`store`] - In-memory object store and quota accounting
//! - [`api`] - Built-in and extension REST handlers
//! - [`install`] - Idempotent bootstrap installers
//! - [`controllers`] - Controller groups
//!
//! ## Networking
//! - [`net::handler`] - Handler chain composition
//! - [`net::mux`] - Pre-handler mux
//! - [`net::server`] - HTTP listener
//!
//! ## Operations
//! - [`ops::observability`] - Metrics registry
//! - [`ops::health`] - Probe endpoints
//!
//! # Key Invariants
//!
//! - Bootstrap phases start in a fixed order; phase `n` never starts
//!   before phase `n - 1` finished.
//! - The ready gate fires exactly once, after the second cache sync.
//! - The handler chain has exactly one fallback, placed last.
//! - Root-only phases and controllers never run on other shards.

// Core infrastructure
pub mod core;

// Control plane composition
pub mod control;

// Storage
pub mod store;

// API handlers
pub mod api;

// Bootstrap installers
pub mod install;

// Controllers
pub mod controllers;

// Networking
pub mod net;

// Operations and observability
pub mod ops;

// CLI
pub mod cli;

// Re-exports for convenience
pub use self::core::{config, error, runtime};
pub use control::{activation, bootstrap, cache, identity};
pub use ops::observability;
