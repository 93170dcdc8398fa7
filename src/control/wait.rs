//! Cancellation-aware polling.
//!
//! Every blocking wait during bootstrap is a fixed-interval poll that
//! returns promptly once the governing token is cancelled.

use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Why a poll loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollResult {
    /// The condition became true.
    Satisfied,
    /// The token was cancelled first.
    Cancelled,
}

impl PollResult {
    pub fn is_satisfied(&self) -> bool {
        matches!(self, Self::Satisfied)
    }
}

/// Sleep for `interval` unless the token is cancelled first.
///
/// Returns `false` if cancelled.
pub async fn sleep_or_cancel(token: &CancellationToken, interval: Duration) -> bool {
    tokio::select! {
        _ = token.cancelled() => false,
        _ = tokio::time::sleep(interval) => true,
    }
}

/// Poll `condition` every `interval`, waiting one interval before the
/// first check, with no retry limit.
pub async fn poll_infinite<F>(
    token: &CancellationToken,
    interval: Duration,
    mut condition: F,
) -> PollResult
where
    F: FnMut() -> bool,
{
    loop {
        if !sleep_or_cancel(token, interval).await {
            return PollResult::Cancelled;
        }
        if token.is_cancelled() {
            return PollResult::Cancelled;
        }
        if condition() {
            return PollResult::Satisfied;
        }
    }
}

/// Like [`poll_infinite`], but checks the condition once before sleeping.
pub async fn poll_immediate_infinite<F>(
    token: &CancellationToken,
    interval: Duration,
    mut condition: F,
) -> PollResult
where
    F: FnMut() -> bool,
{
    loop {
        if token.is_cancelled() {
            return PollResult::Cancelled;
        }
        if condition() {
            return PollResult::Satisfied;
        }
        if !sleep_or_cancel(token, interval).await {
            return PollResult::Cancelled;
        }
    }
}
