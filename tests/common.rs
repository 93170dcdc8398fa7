//! Common test utilities.
//!
//! This module contains shared helpers for integration tests.
//! Import with `mod common;` in test files.

#![allow(dead_code)]

use bytes::Bytes;
use http::{Method, Request, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use kplane::control::gate::ReadyGate;
use kplane::core::config::Config;
use kplane::core::runtime::{Runtime, ServerHandle};
use serde_json::Value;
use std::io::Write;
use std::net::SocketAddr;
use std::time::Duration;
use tempfile::NamedTempFile;

/// How long integration tests wait for a shard to become ready.
pub const READY_TIMEOUT: Duration = Duration::from_secs(10);

/// Write `content` to a temporary config file.
pub fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(content.as_bytes())
        .expect("Failed to write config");
    file
}

/// Create a minimal valid configuration file for a shard.
pub fn create_minimal_config(shard: &str) -> NamedTempFile {
    write_config(&format!(
        r#"
[shard]
name = "{}"
"#,
        shard
    ))
}

/// Config for a shard on an ephemeral port with fast polling.
pub fn test_config(shard: &str) -> Config {
    let mut config = Config::for_shard(shard);
    config.shard.bind = "127.0.0.1:0".to_string();
    config.bootstrap.readiness_poll_ms = 10;
    config.bootstrap.identity_poll_ms = 20;
    config.bootstrap.cache_sync_poll_ms = 10;
    config.controllers.resync_ms = 50;
    config
}

/// Build and start a runtime.
pub async fn start(config: Config) -> ServerHandle {
    Runtime::new(config)
        .expect("runtime construction failed")
        .start()
        .await
        .expect("runtime start failed")
}

/// Wait for the ready gate, failing the test on timeout.
pub async fn wait_ready(ready: &ReadyGate) {
    tokio::time::timeout(READY_TIMEOUT, ready.wait())
        .await
        .expect("shard did not become ready");
}

/// Poll `check` until it returns true, failing the test on timeout.
pub async fn eventually<F, Fut>(what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + READY_TIMEOUT;
    while !check().await {
        if tokio::time::Instant::now() >= deadline {
            panic!("timed out waiting for {}", what);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// Minimal JSON client for a running shard.
#[derive(Clone)]
pub struct TestClient {
    addr: SocketAddr,
    client: Client<HttpConnector, Full<Bytes>>,
}

impl TestClient {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            client: Client::builder(TokioExecutor::new()).build_http(),
        }
    }

    /// Send a request and return the status and decoded JSON body
    /// (`Value::Null` for empty or non-JSON bodies).
    pub async fn send(&self, method: Method, path: &str, body: Option<Value>) -> (StatusCode, Value) {
        let body = body
            .map(|value| Bytes::from(serde_json::to_vec(&value).expect("encode body")))
            .unwrap_or_default();
        let request = Request::builder()
            .method(method)
            .uri(format!("http://{}{}", self.addr, path))
            .header("content-type", "application/json")
            .body(Full::new(body))
            .expect("build request");
        let response = self.client.request(request).await.expect("request failed");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("read body")
            .to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    pub async fn get(&self, path: &str) -> (StatusCode, Value) {
        self.send(Method::GET, path, None).await
    }

    pub async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, path, Some(body)).await
    }

    /// Status code of a GET, ignoring the body.
    pub async fn status(&self, path: &str) -> StatusCode {
        self.get(path).await.0
    }
}
