//! Probe and metrics endpoints mounted on the pre-handler mux.

use super::observability::{HealthStatus, PlaneMetrics, ReadinessStatus};
use crate::control::gate::ReadyGate;
use crate::control::hooks::PostStartHooks;
use crate::core::error::PlaneResult;
use crate::net::handler::{Handler, HandlerFuture};
use crate::net::mux::PreHandlerMux;
use crate::net::response;
use bytes::Bytes;
use http::{Request, StatusCode};
use std::sync::Arc;

pub const HEALTHZ_PATH: &str = "/healthz";
pub const READYZ_PATH: &str = "/readyz";
pub const METRICS_PATH: &str = "/metrics";

/// Shared state read by the probes.
#[derive(Clone)]
pub struct HealthEndpoints {
    ready: ReadyGate,
    hooks: Arc<PostStartHooks>,
    metrics: Arc<PlaneMetrics>,
}

impl HealthEndpoints {
    pub fn new(ready: ReadyGate, hooks: Arc<PostStartHooks>, metrics: Arc<PlaneMetrics>) -> Self {
        Self {
            ready,
            hooks,
            metrics,
        }
    }

    /// Ready once the gate fired and every post-start hook completed.
    pub fn readiness(&self) -> ReadinessStatus {
        let synced = self.ready.is_ready();
        ReadinessStatus {
            ready: synced && self.hooks.all_completed(),
            synced,
            hooks: self
                .hooks
                .statuses()
                .into_iter()
                .map(|(name, status)| (name, status.to_string()))
                .collect(),
        }
    }

    /// Mount `/healthz`, `/readyz` and `/metrics`.
    pub fn register(&self, mux: &PreHandlerMux) -> PlaneResult<()> {
        mux.handle(
            HEALTHZ_PATH,
            Arc::new(|_request: Request<Bytes>| -> HandlerFuture {
                Box::pin(async { response::json(StatusCode::OK, &HealthStatus::healthy()) })
            }),
        )?;
        mux.handle(READYZ_PATH, Arc::new(ReadyzHandler(self.clone())))?;
        mux.handle(METRICS_PATH, Arc::new(MetricsHandler(self.metrics.clone())))?;
        Ok(())
    }
}

struct ReadyzHandler(HealthEndpoints);

impl Handler for ReadyzHandler {
    fn handle(&self, _request: Request<Bytes>) -> HandlerFuture {
        let status = self.0.readiness();
        let code = if status.ready {
            StatusCode::OK
        } else {
            StatusCode::SERVICE_UNAVAILABLE
        };
        let response = response::json(code, &status);
        Box::pin(async move { response })
    }
}

struct MetricsHandler(Arc<PlaneMetrics>);

impl Handler for MetricsHandler {
    fn handle(&self, _request: Request<Bytes>) -> HandlerFuture {
        let response = response::text(StatusCode::OK, self.0.export());
        Box::pin(async move { response })
    }
}
