//! Core runtime infrastructure.
//!
//! This module contains the essential components for running a shard:
//! - [`config`] - Configuration parsing and validation
//! - [`runtime`] - Main runtime orchestration
//! - [`error`] - Error types and HTTP status mapping

pub mod config;
pub mod error;
pub mod runtime;
