//! Operations and observability.
//!
//! This module handles operational concerns:
//! - [`observability`] - Metrics registry and probe status types
//! - [`health`] - `/healthz`, `/readyz` and `/metrics` endpoints

pub mod health;
pub mod observability;
