//! Metrics and probe status.
//!
//! Metric names:
//! - kplane_bootstrap_phase_{completed,failed,cancelled}_total{phase}
//! - kplane_bootstrap_retries_total{phase}
//! - kplane_requests_routed_total{delegate}
//! - kplane_controllers_installed_total

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Metric names.
pub mod metrics {
    /// Bootstrap phases that completed successfully.
    pub const PHASE_COMPLETED_TOTAL: &str = "kplane_bootstrap_phase_completed_total";
    /// Bootstrap phases that failed for a reason other than cancellation.
    pub const PHASE_FAILED_TOTAL: &str = "kplane_bootstrap_phase_failed_total";
    /// Bootstrap phases aborted by cancellation.
    pub const PHASE_CANCELLED_TOTAL: &str = "kplane_bootstrap_phase_cancelled_total";
    /// Retries of transient bootstrap failures.
    pub const RETRIES_TOTAL: &str = "kplane_bootstrap_retries_total";
    /// Requests dispatched by the handler chain, per delegate.
    pub const REQUESTS_ROUTED_TOTAL: &str = "kplane_requests_routed_total";
    /// Controller groups installed.
    pub const CONTROLLERS_INSTALLED_TOTAL: &str = "kplane_controllers_installed_total";
}

type Labels = Vec<(String, String)>;

fn labels(pairs: &[(&str, &str)]) -> Labels {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn render_labels(labels: &Labels) -> String {
    if labels.is_empty() {
        return String::new();
    }
    let inner: Vec<String> = labels
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, v.replace('"', "\\\"")))
        .collect();
    format!("{{{}}}", inner.join(","))
}

/// Counter and gauge registry with label support.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    counters: RwLock<BTreeMap<String, BTreeMap<Labels, AtomicU64>>>,
    gauges: RwLock<BTreeMap<String, BTreeMap<Labels, AtomicU64>>>,
}

impl MetricsRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment an unlabelled counter.
    pub fn counter_inc(&self, name: &str) {
        self.counter_add_with(name, &[], 1);
    }

    /// Increment a labelled counter.
    pub fn counter_inc_with(&self, name: &str, pairs: &[(&str, &str)]) {
        self.counter_add_with(name, pairs, 1);
    }

    /// Add to a labelled counter.
    pub fn counter_add_with(&self, name: &str, pairs: &[(&str, &str)], value: u64) {
        let key = labels(pairs);
        {
            let counters = self.counters.read();
            if let Some(counter) = counters.get(name).and_then(|series| series.get(&key)) {
                counter.fetch_add(value, Ordering::Relaxed);
                return;
            }
        }
        self.counters
            .write()
            .entry(name.to_string())
            .or_default()
            .entry(key)
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(value, Ordering::Relaxed);
    }

    /// Value of an unlabelled counter.
    pub fn counter_get(&self, name: &str) -> u64 {
        self.counter_get_with(name, &[])
    }

    /// Value of a labelled counter.
    pub fn counter_get_with(&self, name: &str, pairs: &[(&str, &str)]) -> u64 {
        self.counters
            .read()
            .get(name)
            .and_then(|series| series.get(&labels(pairs)))
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Set a gauge.
    pub fn gauge_set(&self, name: &str, value: u64) {
        {
            let gauges = self.gauges.read();
            if let Some(gauge) = gauges.get(name).and_then(|series| series.get(&Vec::new())) {
                gauge.store(value, Ordering::Relaxed);
                return;
            }
        }
        self.gauges
            .write()
            .entry(name.to_string())
            .or_default()
            .entry(Vec::new())
            .or_insert_with(|| AtomicU64::new(0))
            .store(value, Ordering::Relaxed);
    }

    /// Value of a gauge.
    pub fn gauge_get(&self, name: &str) -> u64 {
        self.gauges
            .read()
            .get(name)
            .and_then(|series| series.get(&Vec::new()))
            .map(|g| g.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Export metrics in Prometheus text format.
    pub fn export_prometheus(&self) -> String {
        let mut output = String::new();
        for (kind, family) in [("counter", &self.counters), ("gauge", &self.gauges)] {
            for (name, series) in family.read().iter() {
                output.push_str(&format!("# TYPE {} {}\n", name, kind));
                for (labels, value) in series {
                    output.push_str(&format!(
                        "{}{} {}\n",
                        name,
                        render_labels(labels),
                        value.load(Ordering::Relaxed)
                    ));
                }
            }
        }
        output
    }
}

/// Domain metrics recorded by bootstrap, routing and activation.
#[derive(Debug, Default)]
pub struct PlaneMetrics {
    registry: MetricsRegistry,
}

impl PlaneMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Underlying registry.
    pub fn registry(&self) -> &MetricsRegistry {
        &self.registry
    }

    pub fn record_phase_completed(&self, phase: &str) {
        self.registry
            .counter_inc_with(metrics::PHASE_COMPLETED_TOTAL, &[("phase", phase)]);
    }

    pub fn record_phase_failed(&self, phase: &str) {
        self.registry
            .counter_inc_with(metrics::PHASE_FAILED_TOTAL, &[("phase", phase)]);
    }

    pub fn record_phase_cancelled(&self, phase: &str) {
        self.registry
            .counter_inc_with(metrics::PHASE_CANCELLED_TOTAL, &[("phase", phase)]);
    }

    pub fn record_retry(&self, phase: &str) {
        self.registry
            .counter_inc_with(metrics::RETRIES_TOTAL, &[("phase", phase)]);
    }

    pub fn record_routed(&self, delegate: &str) {
        self.registry
            .counter_inc_with(metrics::REQUESTS_ROUTED_TOTAL, &[("delegate", delegate)]);
    }

    pub fn record_controller_installed(&self) {
        self.registry.counter_inc(metrics::CONTROLLERS_INSTALLED_TOTAL);
    }

    pub fn phase_completed(&self, phase: &str) -> u64 {
        self.registry
            .counter_get_with(metrics::PHASE_COMPLETED_TOTAL, &[("phase", phase)])
    }

    pub fn phase_failed(&self, phase: &str) -> u64 {
        self.registry
            .counter_get_with(metrics::PHASE_FAILED_TOTAL, &[("phase", phase)])
    }

    pub fn phase_cancelled(&self, phase: &str) -> u64 {
        self.registry
            .counter_get_with(metrics::PHASE_CANCELLED_TOTAL, &[("phase", phase)])
    }

    pub fn retries(&self, phase: &str) -> u64 {
        self.registry
            .counter_get_with(metrics::RETRIES_TOTAL, &[("phase", phase)])
    }

    pub fn routed(&self, delegate: &str) -> u64 {
        self.registry
            .counter_get_with(metrics::REQUESTS_ROUTED_TOTAL, &[("delegate", delegate)])
    }

    pub fn controllers_installed(&self) -> u64 {
        self.registry.counter_get(metrics::CONTROLLERS_INSTALLED_TOTAL)
    }

    /// Export all metrics.
    pub fn export(&self) -> String {
        self.registry.export_prometheus()
    }
}

/// Health check result for `/healthz`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub healthy: bool,
    pub message: String,
}

impl HealthStatus {
    pub fn healthy() -> Self {
        Self {
            healthy: true,
            message: "ok".to_string(),
        }
    }
}

/// Readiness result for `/readyz`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessStatus {
    /// Overall ready state.
    pub ready: bool,
    /// Whether the bootstrap ready gate has fired.
    pub synced: bool,
    /// Post-start hook name to status.
    pub hooks: BTreeMap<String, String>,
}
