//! One-shot readiness gate.
//!
//! The gate transitions from closed to open exactly once per process.
//! Firing it again is a harmless no-op that reports `false`, so a
//! double fire can neither panic nor deadlock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

struct GateInner {
    fired: AtomicBool,
    open: watch::Sender<bool>,
}

/// Cloneable handle to the process readiness gate.
#[derive(Clone)]
pub struct ReadyGate {
    inner: Arc<GateInner>,
}

impl ReadyGate {
    /// Create a closed gate.
    pub fn new() -> Self {
        let (open, _) = watch::channel(false);
        Self {
            inner: Arc::new(GateInner {
                fired: AtomicBool::new(false),
                open,
            }),
        }
    }

    /// Open the gate. Returns `true` only for the call that performed the
    /// transition.
    pub fn fire(&self) -> bool {
        if self
            .inner
            .fired
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        self.inner.open.send_replace(true);
        true
    }

    /// Whether the gate has been opened.
    pub fn is_ready(&self) -> bool {
        self.inner.fired.load(Ordering::Acquire)
    }

    /// Wait until the gate opens.
    pub async fn wait(&self) {
        let mut rx = self.inner.open.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|open| *open).await;
    }

    /// Wait until the gate opens or the token is cancelled.
    ///
    /// Returns `true` if the gate opened.
    pub async fn wait_or_cancel(&self, token: &CancellationToken) -> bool {
        tokio::select! {
            biased;
            _ = self.wait() => true,
            _ = token.cancelled() => self.is_ready(),
        }
    }
}

impl Default for ReadyGate {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ReadyGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadyGate")
            .field("ready", &self.is_ready())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[test]
    fn fires_once() {
        let gate = ReadyGate::new();
        assert!(!gate.is_ready());
        assert!(gate.fire());
        assert!(gate.is_ready());
        assert!(!gate.fire());
        assert!(gate.is_ready());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_fire_has_single_transition() {
        let gate = ReadyGate::new();
        let transitions = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let gate = gate.clone();
            let transitions = transitions.clone();
            handles.push(tokio::spawn(async move {
                if gate.fire() {
                    transitions.fetch_add(1, Ordering::SeqCst);
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(transitions.load(Ordering::SeqCst), 1);
        assert!(gate.is_ready());
    }

    #[tokio::test]
    async fn waiters_are_released() {
        let gate = ReadyGate::new();
        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.wait().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());
        gate.fire();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();

        // Waiting on an already-open gate returns immediately.
        tokio::time::timeout(Duration::from_millis(100), gate.wait())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn wait_or_cancel_returns_on_cancellation() {
        let gate = ReadyGate::new();
        let token = CancellationToken::new();
        token.cancel();
        assert!(!gate.wait_or_cancel(&token).await);
    }
}
