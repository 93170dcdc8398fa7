//! HTTP listener.
//!
//! Accepts TCP connections and serves them with hyper's HTTP/1 connection
//! driver, buffering each request body (up to a size limit) before handing
//! it to the composed handler. Cancellation stops the accept loop and gracefully shuts down
//! in-flight connections.

use super::handler::Handler;
use super::response;
use crate::core::error::PlaneError;
use anyhow::Context;
use bytes::Bytes;
use http::Request;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use parking_lot::RwLock;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Default cap on a buffered request body (3 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 3 * 1024 * 1024;

/// Listener configuration.
#[derive(Debug, Clone)]
pub struct HttpListenerConfig {
    pub bind_addr: SocketAddr,
    /// Disable Nagle's algorithm on accepted sockets.
    pub nodelay: bool,
    /// Larger request bodies are answered with 413.
    pub max_body_bytes: usize,
}

impl Default for HttpListenerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 6443)),
            nodelay: true,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

/// Listener lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Created,
    Listening,
    ShuttingDown,
    Stopped,
}

/// Connection identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub u64);

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Listener counters.
#[derive(Debug, Default)]
pub struct ListenerMetrics {
    pub connections_total: AtomicU64,
    pub connections_active: AtomicU64,
    pub requests_total: AtomicU64,
}

impl ListenerMetrics {
    fn connection_accepted(&self) {
        self.connections_total.fetch_add(1, Ordering::Relaxed);
        self.connections_active.fetch_add(1, Ordering::Relaxed);
    }

    fn connection_closed(&self) {
        self.connections_active.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn active_connections(&self) -> u64 {
        self.connections_active.load(Ordering::Relaxed)
    }
}

/// A bound HTTP listener.
pub struct HttpListener {
    config: HttpListenerConfig,
    listener: TcpListener,
    local_addr: SocketAddr,
    state: RwLock<ListenerState>,
    next_conn_id: AtomicU64,
    metrics: Arc<ListenerMetrics>,
}

impl HttpListener {
    /// Bind the configured address.
    pub async fn bind(config: HttpListenerConfig) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(config.bind_addr)
            .await
            .with_context(|| format!("failed to bind to {}", config.bind_addr))?;
        let local_addr = listener
            .local_addr()
            .context("failed to read listener address")?;
        tracing::info!(addr = %local_addr, "listener bound");
        Ok(Self {
            config,
            listener,
            local_addr,
            state: RwLock::new(ListenerState::Listening),
            next_conn_id: AtomicU64::new(1),
            metrics: Arc::new(ListenerMetrics::default()),
        })
    }

    /// Address actually bound (resolves port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn state(&self) -> ListenerState {
        *self.state.read()
    }

    pub fn metrics(&self) -> Arc<ListenerMetrics> {
        self.metrics.clone()
    }

    /// Serve connections until the token is cancelled.
    ///
    /// Connection tasks are spawned on `tracker` so the caller can wait
    /// for them to drain.
    pub async fn serve(
        self,
        handler: Arc<dyn Handler>,
        token: CancellationToken,
        tracker: TaskTracker,
    ) {
        loop {
            let accepted = tokio::select! {
                _ = token.cancelled() => break,
                accepted = self.listener.accept() => accepted,
            };
            match accepted {
                Ok((stream, remote)) => {
                    if self.config.nodelay {
                        let _ = stream.set_nodelay(true);
                    }
                    let id = ConnectionId(self.next_conn_id.fetch_add(1, Ordering::Relaxed));
                    self.metrics.connection_accepted();
                    tracker.spawn(serve_connection(
                        id,
                        stream,
                        remote,
                        handler.clone(),
                        self.config.max_body_bytes,
                        token.clone(),
                        self.metrics.clone(),
                    ));
                }
                Err(error) => {
                    tracing::warn!(error = %error, "accept failed");
                }
            }
        }

        *self.state.write() = ListenerState::ShuttingDown;
        tracing::info!(addr = %self.local_addr, "listener stopped accepting");
        *self.state.write() = ListenerState::Stopped;
    }
}

async fn serve_connection(
    id: ConnectionId,
    stream: TcpStream,
    remote: SocketAddr,
    handler: Arc<dyn Handler>,
    max_body_bytes: usize,
    token: CancellationToken,
    metrics: Arc<ListenerMetrics>,
) {
    tracing::trace!(conn = %id, remote = %remote, "connection accepted");
    let requests = metrics.clone();
    let service = service_fn(move |request: Request<Incoming>| {
        let handler = handler.clone();
        requests.requests_total.fetch_add(1, Ordering::Relaxed);
        async move {
            let (parts, body) = request.into_parts();
            let response = match Limited::new(body, max_body_bytes).collect().await {
                Ok(collected) => {
                    handler
                        .handle(Request::from_parts(parts, collected.to_bytes()))
                        .await
                }
                Err(error) if error.downcast_ref::<LengthLimitError>().is_some() => {
                    tracing::debug!(conn = %id, limit = max_body_bytes, "request body too large");
                    response::error(&PlaneError::RequestTooLarge {
                        limit: max_body_bytes,
                    })
                }
                Err(error) => response::error(&PlaneError::invalid(format!(
                    "failed to read request body: {}",
                    error
                ))),
            };
            Ok::<_, Infallible>(response.map(Full::<Bytes>::new))
        }
    });

    let connection = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
    tokio::pin!(connection);
    let result = tokio::select! {
        result = connection.as_mut() => result,
        _ = token.cancelled() => {
            connection.as_mut().graceful_shutdown();
            connection.await
        }
    };
    if let Err(error) = result {
        tracing::debug!(conn = %id, error = %error, "connection closed with error");
    }
    metrics.connection_closed();
}
