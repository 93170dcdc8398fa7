//! Control-plane integration tests.
//!
//! These start a full shard on an ephemeral port and drive it over HTTP.

mod common;

use common::{eventually, start, test_config, wait_ready, TestClient};
use http::StatusCode;
use kplane::control::bootstrap::{BootstrapPhase, PhaseEventKind};
use kplane::control::cluster::LogicalCluster;
use kplane::control::identity::{DECLARED_EXPORTS, IDENTITY_FIELD};
use kplane::control::resources::{api_exports, namespaces, secrets};
use kplane::controllers::admin::SHARD_ADMIN_SECRET;
use kplane::controllers::rootca::ROOT_CA_CONFIGMAP;
use kplane::store::ObjectKey;
use serde_json::json;

// ============================================================================
// Bootstrap tests
// ============================================================================

#[tokio::test]
async fn root_shard_bootstraps_and_becomes_ready() {
    let handle = start(test_config("root")).await;
    let runtime = handle.runtime();
    wait_ready(&runtime.ready()).await;

    let client = TestClient::new(handle.local_addr());
    eventually("/readyz to report ready", || {
        let client = client.clone();
        async move { client.status("/readyz").await == StatusCode::OK }
    })
    .await;

    let log = runtime.phase_log();
    assert_eq!(log.started(), BootstrapPhase::ALL.to_vec());
    for pair in BootstrapPhase::ALL.windows(2) {
        let done = log.position(pair[0], PhaseEventKind::Completed).unwrap();
        let next = log.position(pair[1], PhaseEventKind::Started).unwrap();
        assert!(done < next, "{} started before {} completed", pair[1], pair[0]);
    }

    // Identities were generated during the first root phase.
    let store = runtime.store();
    for export in DECLARED_EXPORTS {
        let object = store
            .get(&ObjectKey::cluster_scoped(LogicalCluster::root(), api_exports(), *export))
            .unwrap();
        assert_eq!(object.status_str(IDENTITY_FIELD).unwrap().len(), 64);
    }

    let metrics = runtime.metrics();
    assert_eq!(metrics.phase_completed("MarkReady"), 1);
    assert!(metrics.controllers_installed() > 0);

    handle.stop().await.unwrap();
}

#[tokio::test]
async fn other_shard_waits_for_export_identities() {
    let handle = start(test_config("shard-1")).await;
    let runtime = handle.runtime();
    let client = TestClient::new(handle.local_addr());

    // System schemas make the exports API reachable before readiness.
    let exports = "/clusters/root/apis/apis.kplane.io/v1alpha1/apiexports";
    eventually("exports API to be served", || {
        let client = client.clone();
        async move { client.status(exports).await == StatusCode::OK }
    })
    .await;

    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert!(!runtime.ready().is_ready());
    assert_eq!(client.status("/readyz").await, StatusCode::SERVICE_UNAVAILABLE);

    for (i, export) in DECLARED_EXPORTS.iter().enumerate() {
        let (status, _) = client
            .post(
                exports,
                json!({
                    "metadata": { "name": export },
                    "spec": {},
                    "status": { "identityHash": format!("{:064x}", i + 1) },
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    wait_ready(&runtime.ready()).await;

    let log = runtime.phase_log();
    assert_eq!(
        log.position(BootstrapPhase::RootPhase0, PhaseEventKind::Started),
        None
    );
    assert!(log
        .position(BootstrapPhase::RootPhase0, PhaseEventKind::Skipped)
        .is_some());
    assert!(log
        .position(BootstrapPhase::RootPhase1, PhaseEventKind::Skipped)
        .is_some());

    // Administrative credentials are issued by the root shard only.
    let secret = ObjectKey::new(
        LogicalCluster::system_admin(),
        secrets(),
        Some("default".to_string()),
        SHARD_ADMIN_SECRET,
    );
    assert!(!runtime.store().contains(&secret));

    handle.stop().await.unwrap();
}

#[tokio::test]
async fn shutdown_before_ready_cancels_bootstrap() {
    let handle = start(test_config("shard-2")).await;
    let runtime_log = handle.runtime().phase_log();
    let ready = handle.runtime().ready();

    eventually("identity resolution to start", || {
        let log = runtime_log.clone();
        async move {
            log.position(BootstrapPhase::IdentityResolution, PhaseEventKind::Started)
                .is_some()
        }
    })
    .await;

    handle.stop().await.unwrap();
    assert!(!ready.is_ready());
    assert!(runtime_log
        .position(BootstrapPhase::IdentityResolution, PhaseEventKind::Cancelled)
        .is_some());
    assert_eq!(
        runtime_log.position(BootstrapPhase::MarkReady, PhaseEventKind::Started),
        None
    );
}

// ============================================================================
// Controller tests
// ============================================================================

#[tokio::test]
async fn controllers_run_after_ready() {
    let dir = tempfile::tempdir().unwrap();
    let kubeconfig = dir.path().join("admin").join("admin.kubeconfig");
    let mut config = test_config("root");
    config.admin.kubeconfig_path = Some(kubeconfig.clone());

    let handle = start(config).await;
    let runtime = handle.runtime();
    wait_ready(&runtime.ready()).await;

    let store = runtime.store();
    let default_ns = ObjectKey::cluster_scoped(LogicalCluster::root(), namespaces(), "default");
    eventually("default namespace in root", || {
        let store = store.clone();
        let key = default_ns.clone();
        async move { store.contains(&key) }
    })
    .await;

    let ca = ObjectKey::new(
        LogicalCluster::root(),
        kplane::control::resources::config_maps(),
        Some("default".to_string()),
        ROOT_CA_CONFIGMAP,
    );
    eventually("root CA config map", || {
        let store = store.clone();
        let key = ca.clone();
        async move { store.contains(&key) }
    })
    .await;

    let written: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&kubeconfig).unwrap()).unwrap();
    assert!(written["clusters"].is_array());

    handle.stop().await.unwrap();
}

#[tokio::test]
async fn services_redirect_when_virtual_workspaces_disabled() {
    let mut config = test_config("root");
    config.virtual_workspaces.enabled = false;
    config.virtual_workspaces.external_url = "https://vw.example".to_string();

    let handle = start(config).await;
    let client = TestClient::new(handle.local_addr());
    let (status, _) = client.get("/services/workspaces/clusters/root").await;
    assert_eq!(status, StatusCode::TEMPORARY_REDIRECT);

    handle.stop().await.unwrap();
}

#[tokio::test]
async fn redirect_without_url_fails_startup() {
    let mut config = test_config("root");
    config.virtual_workspaces.enabled = false;

    let runtime = kplane::core::runtime::Runtime::new(config).unwrap();
    assert!(runtime.start().await.is_err());
}
