//! Ordered bootstrap sequence.
//!
//! [`BootstrapOrchestrator::run`] executes the eleven phases of
//! [`BootstrapPhase`] strictly in sequence. Phases marked root-only are
//! skipped unless the shard owns the root tenant. Cancellation of the
//! governing token aborts the run at the next suspension point without
//! reporting success or failure; only a baseline policy install error is
//! returned to the caller.
//!
//! Tolerant phases (system schemas, shard workspace, both root phases)
//! follow the configured [`FailurePolicy`]. Under `Halt` a genuine failure
//! is logged at error level and the run stops without becoming ready.
//! Under `Retry` the phase is retried on the identity poll interval.
//! Either way, cancellation is logged and counted separately from failure.

use crate::control::cache::{Informer, InformerFactory};
use crate::control::gate::ReadyGate;
use crate::control::identity::IdentityResolver;
use crate::control::shard::ShardTopology;
use crate::control::wait::{poll_immediate_infinite, poll_infinite, sleep_or_cancel};
use crate::core::error::{PlaneError, PlaneResult};
use crate::ops::observability::PlaneMetrics;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Bootstrap phases in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BootstrapPhase {
    PolicyInstall,
    InfrastructureCacheSync,
    SystemSchemaBootstrap,
    ShardWorkspaceBootstrap,
    StartDependentWatchers,
    PollForMinimalReadiness,
    RootPhase0,
    IdentityResolution,
    SecondCacheSync,
    MarkReady,
    RootPhase1,
}

impl BootstrapPhase {
    /// Every phase, in execution order.
    pub const ALL: [BootstrapPhase; 11] = [
        Self::PolicyInstall,
        Self::InfrastructureCacheSync,
        Self::SystemSchemaBootstrap,
        Self::ShardWorkspaceBootstrap,
        Self::StartDependentWatchers,
        Self::PollForMinimalReadiness,
        Self::RootPhase0,
        Self::IdentityResolution,
        Self::SecondCacheSync,
        Self::MarkReady,
        Self::RootPhase1,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::PolicyInstall => "PolicyInstall",
            Self::InfrastructureCacheSync => "InfrastructureCacheSync",
            Self::SystemSchemaBootstrap => "SystemSchemaBootstrap",
            Self::ShardWorkspaceBootstrap => "ShardWorkspaceBootstrap",
            Self::StartDependentWatchers => "StartDependentWatchers",
            Self::PollForMinimalReadiness => "PollForMinimalReadiness",
            Self::RootPhase0 => "RootPhase0",
            Self::IdentityResolution => "IdentityResolution",
            Self::SecondCacheSync => "SecondCacheSync",
            Self::MarkReady => "MarkReady",
            Self::RootPhase1 => "RootPhase1",
        }
    }

    /// Whether the phase only runs on the root shard.
    pub fn root_only(&self) -> bool {
        matches!(self, Self::RootPhase0 | Self::RootPhase1)
    }
}

impl fmt::Display for BootstrapPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Handling of genuine failures in tolerant phases.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Log the failure and stop the run; the process stays up but never
    /// becomes ready.
    #[default]
    Halt,
    /// Retry the phase until it succeeds or the run is cancelled.
    Retry,
}

/// Client configuration pointing at this shard's external address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub server: String,
    pub certificate_authority_data: Vec<u8>,
}

/// Inputs of the second root tenant install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootPhase1Input {
    pub shard_name: String,
    pub client_config: ClientConfig,
    pub home_root_prefix: String,
    pub home_creator_groups: Vec<String>,
}

/// Idempotent installers driven by the orchestrator.
///
/// Every operation converges to the same end state no matter how many
/// times it is called.
pub trait Bootstrapper: Send + Sync {
    fn ensure_baseline_policy(&self) -> PlaneResult<()>;
    fn bootstrap_system_schemas(&self) -> PlaneResult<()>;
    fn bootstrap_shard_workspace(&self, shard: &ShardTopology) -> PlaneResult<()>;
    fn bootstrap_root_phase0(&self) -> PlaneResult<()>;
    fn bootstrap_root_phase1(&self, input: &RootPhase1Input) -> PlaneResult<()>;
}

/// Where this shard is reachable and which certificate it serves.
#[derive(Debug, Clone, Default)]
pub struct ServingInfo {
    pub external_address: String,
    pub cert_path: Option<PathBuf>,
}

impl ServingInfo {
    /// Synthesize a client configuration, reading the serving certificate
    /// from disk on every call.
    pub async fn client_config(&self) -> ClientConfig {
        let certificate_authority_data = match &self.cert_path {
            Some(path) => match tokio::fs::read(path).await {
                Ok(data) => data,
                Err(error) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %error,
                        "failed to read serving certificate"
                    );
                    Vec::new()
                }
            },
            None => Vec::new(),
        };
        ClientConfig {
            server: format!("https://{}", self.external_address),
            certificate_authority_data,
        }
    }
}

/// Poll intervals and failure handling.
#[derive(Debug, Clone)]
pub struct BootstrapSettings {
    pub readiness_poll: Duration,
    pub identity_poll: Duration,
    pub cache_sync_poll: Duration,
    pub failure_policy: FailurePolicy,
}

impl Default for BootstrapSettings {
    fn default() -> Self {
        Self {
            readiness_poll: Duration::from_millis(100),
            identity_poll: Duration::from_millis(500),
            cache_sync_poll: Duration::from_millis(100),
            failure_policy: FailurePolicy::Halt,
        }
    }
}

/// Home workspace inputs of the second root install.
#[derive(Debug, Clone, Default)]
pub struct HomeWorkspaceOptions {
    pub root_prefix: String,
    pub creator_groups: Vec<String>,
}

/// How a run ended without a fatal error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// All phases completed and the ready gate fired.
    Ready,
    /// The token was cancelled while this phase was in progress.
    Cancelled { phase: BootstrapPhase },
    /// A tolerant phase failed under the halt policy.
    Halted { phase: BootstrapPhase, error: String },
}

/// Kind of a recorded phase transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseEventKind {
    Started,
    Completed,
    Skipped,
    Failed,
    Cancelled,
}

/// A recorded phase transition with a monotonic sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseEvent {
    pub seq: u64,
    pub phase: BootstrapPhase,
    pub kind: PhaseEventKind,
}

/// Ordered record of phase transitions.
#[derive(Debug, Default)]
pub struct PhaseLog {
    seq: AtomicU64,
    events: Mutex<Vec<PhaseEvent>>,
}

impl PhaseLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, phase: BootstrapPhase, kind: PhaseEventKind) {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        self.events.lock().push(PhaseEvent { seq, phase, kind });
    }

    pub fn events(&self) -> Vec<PhaseEvent> {
        self.events.lock().clone()
    }

    /// Sequence number of the first matching transition.
    pub fn position(&self, phase: BootstrapPhase, kind: PhaseEventKind) -> Option<u64> {
        self.events
            .lock()
            .iter()
            .find(|event| event.phase == phase && event.kind == kind)
            .map(|event| event.seq)
    }

    /// Phases that started, in order.
    pub fn started(&self) -> Vec<BootstrapPhase> {
        self.events
            .lock()
            .iter()
            .filter(|event| event.kind == PhaseEventKind::Started)
            .map(|event| event.phase)
            .collect()
    }
}

/// Collaborators of one orchestrator.
pub struct BootstrapDeps {
    pub topology: ShardTopology,
    pub settings: BootstrapSettings,
    pub bootstrapper: Arc<dyn Bootstrapper>,
    /// Informers awaited by the first cache-sync barrier.
    pub infrastructure: Arc<InformerFactory>,
    /// Watchers needed before identity resolution (exports and bindings).
    pub dependent: Vec<Arc<dyn Informer>>,
    /// Informers awaited by the second cache-sync barrier.
    pub surface: Arc<InformerFactory>,
    pub resolver: Arc<IdentityResolver>,
    pub ready: ReadyGate,
    pub serving: ServingInfo,
    pub home: HomeWorkspaceOptions,
    pub metrics: Arc<PlaneMetrics>,
}

enum Step {
    Continue,
    Skip,
    Stop(BootstrapOutcome),
}

/// Runs the bootstrap phases once.
pub struct BootstrapOrchestrator {
    deps: BootstrapDeps,
    log: Arc<PhaseLog>,
}

impl BootstrapOrchestrator {
    pub fn new(deps: BootstrapDeps) -> Self {
        Self {
            deps,
            log: Arc::new(PhaseLog::new()),
        }
    }

    /// Phase transition log of this orchestrator.
    pub fn log(&self) -> Arc<PhaseLog> {
        self.log.clone()
    }

    /// Ready gate fired by [`BootstrapPhase::MarkReady`].
    pub fn ready(&self) -> &ReadyGate {
        &self.deps.ready
    }

    fn start_phase(&self, phase: BootstrapPhase) {
        tracing::info!(phase = %phase, "bootstrap phase started");
        self.log.record(phase, PhaseEventKind::Started);
    }

    fn complete_phase(&self, phase: BootstrapPhase) {
        tracing::info!(phase = %phase, "bootstrap phase completed");
        self.log.record(phase, PhaseEventKind::Completed);
        self.deps.metrics.record_phase_completed(phase.name());
    }

    fn cancel_phase(&self, phase: BootstrapPhase) -> BootstrapOutcome {
        tracing::info!(phase = %phase, "bootstrap cancelled");
        self.log.record(phase, PhaseEventKind::Cancelled);
        self.deps.metrics.record_phase_cancelled(phase.name());
        BootstrapOutcome::Cancelled { phase }
    }

    fn fail_phase(&self, phase: BootstrapPhase, error: &PlaneError) {
        tracing::error!(phase = %phase, error = %error, "bootstrap phase failed");
        self.log.record(phase, PhaseEventKind::Failed);
        self.deps.metrics.record_phase_failed(phase.name());
    }

    /// Check cancellation before entering a phase, then mark it started.
    fn enter(&self, phase: BootstrapPhase, token: &CancellationToken) -> Step {
        if token.is_cancelled() {
            return Step::Stop(self.cancel_phase(phase));
        }
        if phase.root_only() && !self.deps.topology.owns_root_tenant() {
            tracing::debug!(
                phase = %phase,
                shard = %self.deps.topology.name(),
                "skipping root-only phase"
            );
            self.log.record(phase, PhaseEventKind::Skipped);
            return Step::Skip;
        }
        self.start_phase(phase);
        Step::Continue
    }

    /// Run a tolerant install under the configured failure policy.
    async fn tolerant<F>(
        &self,
        phase: BootstrapPhase,
        token: &CancellationToken,
        mut install: F,
    ) -> Step
    where
        F: FnMut() -> PlaneResult<()>,
    {
        loop {
            match install() {
                Ok(()) => {
                    self.complete_phase(phase);
                    return Step::Continue;
                }
                Err(_) if token.is_cancelled() => return Step::Stop(self.cancel_phase(phase)),
                Err(error) => match self.deps.settings.failure_policy {
                    FailurePolicy::Halt => {
                        self.fail_phase(phase, &error);
                        return Step::Stop(BootstrapOutcome::Halted {
                            phase,
                            error: error.to_string(),
                        });
                    }
                    FailurePolicy::Retry => {
                        tracing::warn!(phase = %phase, error = %error, "bootstrap phase failed, retrying");
                        self.deps.metrics.record_retry(phase.name());
                        if !sleep_or_cancel(token, self.deps.settings.identity_poll).await {
                            return Step::Stop(self.cancel_phase(phase));
                        }
                    }
                },
            }
        }
    }

    /// Execute every phase in order.
    ///
    /// Returns `Err` only when the baseline policy install fails.
    pub async fn run(&self, token: &CancellationToken) -> PlaneResult<BootstrapOutcome> {
        let deps = &self.deps;
        let settings = &deps.settings;

        let phase = BootstrapPhase::PolicyInstall;
        if let Step::Stop(outcome) = self.enter(phase, token) {
            return Ok(outcome);
        }
        if let Err(error) = deps.bootstrapper.ensure_baseline_policy() {
            self.fail_phase(phase, &error);
            return Err(PlaneError::phase_failed(phase.name(), error));
        }
        self.complete_phase(phase);

        let phase = BootstrapPhase::InfrastructureCacheSync;
        if let Step::Stop(outcome) = self.enter(phase, token) {
            return Ok(outcome);
        }
        deps.infrastructure.start(token);
        if !deps
            .infrastructure
            .wait_for_cache_sync(token, settings.cache_sync_poll)
            .await
        {
            return Ok(self.cancel_phase(phase));
        }
        self.complete_phase(phase);

        let phase = BootstrapPhase::SystemSchemaBootstrap;
        if let Step::Stop(outcome) = self.enter(phase, token) {
            return Ok(outcome);
        }
        if let Step::Stop(outcome) = self
            .tolerant(phase, token, || deps.bootstrapper.bootstrap_system_schemas())
            .await
        {
            return Ok(outcome);
        }

        let phase = BootstrapPhase::ShardWorkspaceBootstrap;
        if let Step::Stop(outcome) = self.enter(phase, token) {
            return Ok(outcome);
        }
        if let Step::Stop(outcome) = self
            .tolerant(phase, token, || {
                deps.bootstrapper.bootstrap_shard_workspace(&deps.topology)
            })
            .await
        {
            return Ok(outcome);
        }

        let phase = BootstrapPhase::StartDependentWatchers;
        if let Step::Stop(outcome) = self.enter(phase, token) {
            return Ok(outcome);
        }
        for watcher in &deps.dependent {
            watcher.start(token.child_token());
        }
        self.complete_phase(phase);

        let phase = BootstrapPhase::PollForMinimalReadiness;
        if let Step::Stop(outcome) = self.enter(phase, token) {
            return Ok(outcome);
        }
        let synced = poll_infinite(token, settings.readiness_poll, || {
            deps.dependent.iter().all(|watcher| watcher.has_synced())
        })
        .await;
        if !synced.is_satisfied() {
            return Ok(self.cancel_phase(phase));
        }
        self.complete_phase(phase);

        let phase = BootstrapPhase::RootPhase0;
        match self.enter(phase, token) {
            Step::Skip => {}
            Step::Stop(outcome) => return Ok(outcome),
            Step::Continue => {
                if let Step::Stop(outcome) = self
                    .tolerant(phase, token, || deps.bootstrapper.bootstrap_root_phase0())
                    .await
                {
                    return Ok(outcome);
                }
            }
        }

        let phase = BootstrapPhase::IdentityResolution;
        if let Step::Stop(outcome) = self.enter(phase, token) {
            return Ok(outcome);
        }
        let resolved = poll_immediate_infinite(token, settings.identity_poll, || {
            match deps.resolver.resolve() {
                Ok(()) => true,
                Err(error) => {
                    tracing::debug!(error = %error, "export identities not yet resolved");
                    deps.metrics.record_retry(phase.name());
                    false
                }
            }
        })
        .await;
        if !resolved.is_satisfied() {
            return Ok(self.cancel_phase(phase));
        }
        self.complete_phase(phase);

        let phase = BootstrapPhase::SecondCacheSync;
        if let Step::Stop(outcome) = self.enter(phase, token) {
            return Ok(outcome);
        }
        deps.surface.start(token);
        if !deps
            .surface
            .wait_for_cache_sync(token, settings.cache_sync_poll)
            .await
        {
            return Ok(self.cancel_phase(phase));
        }
        self.complete_phase(phase);

        let phase = BootstrapPhase::MarkReady;
        if let Step::Stop(outcome) = self.enter(phase, token) {
            return Ok(outcome);
        }
        if !deps.ready.fire() {
            tracing::warn!("ready gate already fired");
        }
        self.complete_phase(phase);

        let phase = BootstrapPhase::RootPhase1;
        match self.enter(phase, token) {
            Step::Skip => {}
            Step::Stop(outcome) => return Ok(outcome),
            Step::Continue => {
                let input = RootPhase1Input {
                    shard_name: deps.topology.name().to_string(),
                    client_config: deps.serving.client_config().await,
                    home_root_prefix: deps.home.root_prefix.clone(),
                    home_creator_groups: deps.home.creator_groups.clone(),
                };
                if let Step::Stop(outcome) = self
                    .tolerant(phase, token, || deps.bootstrapper.bootstrap_root_phase1(&input))
                    .await
                {
                    return Ok(outcome);
                }
            }
        }

        tracing::info!(shard = %deps.topology.name(), "bootstrap finished");
        Ok(BootstrapOutcome::Ready)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::cluster::LogicalCluster;
    use crate::control::identity::{DECLARED_EXPORTS, IDENTITY_FIELD};
    use crate::control::resources::{api_bindings, api_exports, namespaces};
    use crate::control::shard::ShardRole;
    use crate::store::{Object, ObjectStore};
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicBool;
    use std::time::Instant;

    struct FakeBootstrapper {
        store: Arc<ObjectStore>,
        failures: Mutex<HashMap<BootstrapPhase, u32>>,
        phase1_inputs: Mutex<Vec<RootPhase1Input>>,
    }

    impl FakeBootstrapper {
        fn new(store: Arc<ObjectStore>) -> Arc<Self> {
            Arc::new(Self {
                store,
                failures: Mutex::new(HashMap::new()),
                phase1_inputs: Mutex::new(Vec::new()),
            })
        }

        fn fail(&self, phase: BootstrapPhase, times: u32) {
            self.failures.lock().insert(phase, times);
        }

        fn check(&self, phase: BootstrapPhase) -> PlaneResult<()> {
            let mut failures = self.failures.lock();
            match failures.get_mut(&phase) {
                Some(remaining) if *remaining > 0 => {
                    *remaining -= 1;
                    Err(PlaneError::internal(format!("injected failure in {}", phase)))
                }
                _ => Ok(()),
            }
        }
    }

    fn seed_exports(store: &ObjectStore) {
        for export in DECLARED_EXPORTS {
            store
                .ensure(
                    Object::new(LogicalCluster::root(), &api_exports(), *export)
                        .with_status(json!({ IDENTITY_FIELD: format!("id-{}", export) })),
                )
                .unwrap();
        }
    }

    impl Bootstrapper for FakeBootstrapper {
        fn ensure_baseline_policy(&self) -> PlaneResult<()> {
            self.check(BootstrapPhase::PolicyInstall)
        }
        fn bootstrap_system_schemas(&self) -> PlaneResult<()> {
            self.check(BootstrapPhase::SystemSchemaBootstrap)
        }
        fn bootstrap_shard_workspace(&self, _shard: &ShardTopology) -> PlaneResult<()> {
            self.check(BootstrapPhase::ShardWorkspaceBootstrap)
        }
        fn bootstrap_root_phase0(&self) -> PlaneResult<()> {
            self.check(BootstrapPhase::RootPhase0)?;
            seed_exports(&self.store);
            Ok(())
        }
        fn bootstrap_root_phase1(&self, input: &RootPhase1Input) -> PlaneResult<()> {
            self.check(BootstrapPhase::RootPhase1)?;
            self.phase1_inputs.lock().push(input.clone());
            Ok(())
        }
    }

    /// Informer that never syncs unless told to.
    struct StuckInformer {
        synced: AtomicBool,
    }

    impl Informer for StuckInformer {
        fn name(&self) -> String {
            "stuck".to_string()
        }
        fn has_synced(&self) -> bool {
            self.synced.load(Ordering::SeqCst)
        }
        fn start(&self, _token: CancellationToken) {}
    }

    struct Harness {
        store: Arc<ObjectStore>,
        bootstrapper: Arc<FakeBootstrapper>,
        metrics: Arc<PlaneMetrics>,
        orchestrator: BootstrapOrchestrator,
    }

    fn harness(role: ShardRole, policy: FailurePolicy, stuck: bool) -> Harness {
        let store = Arc::new(ObjectStore::new());
        let bootstrapper = FakeBootstrapper::new(store.clone());
        let metrics = Arc::new(PlaneMetrics::new());

        let infrastructure = Arc::new(InformerFactory::new("infrastructure", store.clone()));
        infrastructure.for_resource(&namespaces());
        if stuck {
            infrastructure.insert(Arc::new(StuckInformer {
                synced: AtomicBool::new(false),
            }));
        }
        let surface = Arc::new(InformerFactory::new("surface", store.clone()));
        let exports = surface.for_resource(&api_exports());
        let bindings = surface.for_resource(&api_bindings());
        let resolver = Arc::new(IdentityResolver::new(Arc::new(exports.clone())));

        let name = match role {
            ShardRole::Root => "root",
            ShardRole::Other => "shard-1",
        };
        let orchestrator = BootstrapOrchestrator::new(BootstrapDeps {
            topology: ShardTopology::new(name, role),
            settings: BootstrapSettings {
                readiness_poll: Duration::from_millis(5),
                identity_poll: Duration::from_millis(5),
                cache_sync_poll: Duration::from_millis(5),
                failure_policy: policy,
            },
            bootstrapper: bootstrapper.clone(),
            infrastructure,
            dependent: vec![Arc::new(exports) as Arc<dyn Informer>, Arc::new(bindings)],
            surface,
            resolver,
            ready: ReadyGate::new(),
            serving: ServingInfo {
                external_address: "shard.example:6443".to_string(),
                cert_path: None,
            },
            home: HomeWorkspaceOptions {
                root_prefix: "root:users".to_string(),
                creator_groups: vec!["system:authenticated".to_string()],
            },
            metrics: metrics.clone(),
        });

        Harness {
            store,
            bootstrapper,
            metrics,
            orchestrator,
        }
    }

    async fn run(h: &Harness) -> PlaneResult<BootstrapOutcome> {
        let token = CancellationToken::new();
        let outcome = tokio::time::timeout(Duration::from_secs(5), h.orchestrator.run(&token))
            .await
            .expect("bootstrap did not finish");
        token.cancel();
        outcome
    }

    #[tokio::test]
    async fn root_shard_runs_every_phase_in_order() {
        let h = harness(ShardRole::Root, FailurePolicy::Halt, false);
        assert_eq!(run(&h).await.unwrap(), BootstrapOutcome::Ready);
        assert!(h.orchestrator.ready().is_ready());

        let log = h.orchestrator.log();
        assert_eq!(log.started(), BootstrapPhase::ALL.to_vec());

        use PhaseEventKind::*;
        let at = |phase, kind| log.position(phase, kind).unwrap();
        assert!(at(BootstrapPhase::PollForMinimalReadiness, Completed) < at(BootstrapPhase::RootPhase0, Started));
        assert!(at(BootstrapPhase::RootPhase0, Completed) < at(BootstrapPhase::SecondCacheSync, Completed));
        assert!(at(BootstrapPhase::SecondCacheSync, Completed) < at(BootstrapPhase::MarkReady, Completed));
        assert!(at(BootstrapPhase::MarkReady, Completed) < at(BootstrapPhase::RootPhase1, Started));

        let inputs = h.bootstrapper.phase1_inputs.lock().clone();
        assert_eq!(inputs.len(), 1);
        assert_eq!(inputs[0].shard_name, "root");
        assert_eq!(inputs[0].client_config.server, "https://shard.example:6443");
        assert_eq!(inputs[0].home_root_prefix, "root:users");
        assert_eq!(h.metrics.phase_completed("RootPhase1"), 1);
    }

    #[tokio::test]
    async fn non_root_shard_skips_root_phases() {
        let h = harness(ShardRole::Other, FailurePolicy::Halt, false);
        seed_exports(&h.store);
        assert_eq!(run(&h).await.unwrap(), BootstrapOutcome::Ready);

        let started = h.orchestrator.log().started();
        assert!(!started.contains(&BootstrapPhase::RootPhase0));
        assert!(!started.contains(&BootstrapPhase::RootPhase1));
        assert!(h.bootstrapper.phase1_inputs.lock().is_empty());
        assert!(h
            .orchestrator
            .log()
            .position(BootstrapPhase::RootPhase0, PhaseEventKind::Skipped)
            .is_some());
    }

    #[tokio::test]
    async fn cancellation_during_cache_sync_stops_the_run() {
        let h = harness(ShardRole::Root, FailurePolicy::Halt, true);
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            canceller.cancel();
        });

        let started = Instant::now();
        let outcome = h.orchestrator.run(&token).await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(
            outcome,
            BootstrapOutcome::Cancelled {
                phase: BootstrapPhase::InfrastructureCacheSync
            }
        );

        let started = h.orchestrator.log().started();
        assert_eq!(started.last(), Some(&BootstrapPhase::InfrastructureCacheSync));
        assert!(!h.orchestrator.ready().is_ready());
        assert_eq!(h.metrics.phase_cancelled("InfrastructureCacheSync"), 1);
        assert_eq!(h.metrics.phase_failed("InfrastructureCacheSync"), 0);
    }

    #[tokio::test]
    async fn policy_failure_is_fatal() {
        let h = harness(ShardRole::Root, FailurePolicy::Retry, false);
        h.bootstrapper.fail(BootstrapPhase::PolicyInstall, 1);
        let err = run(&h).await.unwrap_err();
        assert!(matches!(err, PlaneError::PhaseFailed { ref phase, .. } if phase == "PolicyInstall"));
        assert_eq!(h.orchestrator.log().started(), vec![BootstrapPhase::PolicyInstall]);
    }

    #[tokio::test]
    async fn schema_failure_halts_without_readiness() {
        let h = harness(ShardRole::Root, FailurePolicy::Halt, false);
        h.bootstrapper.fail(BootstrapPhase::SystemSchemaBootstrap, 1);
        let outcome = run(&h).await.unwrap();
        assert!(matches!(
            outcome,
            BootstrapOutcome::Halted {
                phase: BootstrapPhase::SystemSchemaBootstrap,
                ..
            }
        ));
        assert!(!h.orchestrator.ready().is_ready());
        assert_eq!(h.metrics.phase_failed("SystemSchemaBootstrap"), 1);
        assert_eq!(h.metrics.phase_cancelled("SystemSchemaBootstrap"), 0);
    }

    #[tokio::test]
    async fn retry_policy_recovers_from_transient_failures() {
        let h = harness(ShardRole::Root, FailurePolicy::Retry, false);
        h.bootstrapper.fail(BootstrapPhase::ShardWorkspaceBootstrap, 2);
        h.bootstrapper.fail(BootstrapPhase::RootPhase0, 1);
        assert_eq!(run(&h).await.unwrap(), BootstrapOutcome::Ready);
        assert_eq!(h.metrics.retries("ShardWorkspaceBootstrap"), 2);
        assert_eq!(h.metrics.retries("RootPhase0"), 1);
        assert_eq!(h.metrics.phase_failed("ShardWorkspaceBootstrap"), 0);
    }

    #[tokio::test]
    async fn identity_resolution_waits_for_exports() {
        let h = harness(ShardRole::Other, FailurePolicy::Halt, false);
        let store = h.store.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(40)).await;
            seed_exports(&store);
        });
        assert_eq!(run(&h).await.unwrap(), BootstrapOutcome::Ready);
        assert!(h.metrics.retries("IdentityResolution") > 0);
    }

    #[tokio::test]
    async fn serving_cert_is_read_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("serving.crt");
        let info = ServingInfo {
            external_address: "127.0.0.1:6443".to_string(),
            cert_path: Some(path.clone()),
        };
        assert!(info.client_config().await.certificate_authority_data.is_empty());

        std::fs::write(&path, b"first").unwrap();
        assert_eq!(info.client_config().await.certificate_authority_data, b"first");
        std::fs::write(&path, b"second").unwrap();
        assert_eq!(info.client_config().await.certificate_authority_data, b"second");
    }
}
