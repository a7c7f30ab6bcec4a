//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap each attempt with its deadline
//! - Combine the attempt deadline and the caller's cancellation token into
//!   the single token handed to the transport
//! - Make backoff sleeps cancellable by the caller
//!
//! # Design Decisions
//! - Uses Tokio's timer and `tokio_util` cancellation tokens
//! - Timeout is distinct from cancellation: the former is retryable, the
//!   latter ends the call
//! - The attempt token is a child of the caller token and is cancelled and
//!   detached when the scope drops, so no listener outlives the attempt

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::{CancellationToken, DropGuard};

/// Why an attempt stopped before its future completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupted {
    /// The attempt's own deadline elapsed.
    TimedOut(Duration),
    /// The caller cancelled the whole call.
    Cancelled,
}

/// Cancellation scope for a single attempt.
pub struct AttemptScope {
    timeout: Duration,
    caller: Option<CancellationToken>,
    token: CancellationToken,
    _guard: DropGuard,
}

impl AttemptScope {
    pub fn new(timeout: Duration, caller: Option<&CancellationToken>) -> Self {
        let token = match caller {
            Some(parent) => parent.child_token(),
            None => CancellationToken::new(),
        };
        Self {
            timeout,
            caller: caller.cloned(),
            _guard: token.clone().drop_guard(),
            token,
        }
    }

    /// Token that fires on either the deadline or caller cancellation.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    fn caller_cancelled(&self) -> bool {
        self.caller.as_ref().is_some_and(CancellationToken::is_cancelled)
    }

    /// Drive `fut` until it completes, the deadline passes, or the caller cancels.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, Interrupted> {
        if self.caller_cancelled() {
            return Err(Interrupted::Cancelled);
        }

        tokio::select! {
            biased;
            _ = self.token.cancelled() => {
                if self.caller_cancelled() {
                    Err(Interrupted::Cancelled)
                } else {
                    Err(Interrupted::TimedOut(self.timeout))
                }
            }
            output = fut => Ok(output),
            _ = tokio::time::sleep(self.timeout) => {
                self.token.cancel();
                Err(Interrupted::TimedOut(self.timeout))
            }
        }
    }
}

/// Sleep for `delay`, waking early if the caller cancels.
///
/// Returns `false` when the sleep was cut short by cancellation.
pub async fn sleep_cancellable(delay: Duration, cancel: Option<&CancellationToken>) -> bool {
    match cancel {
        Some(token) => tokio::select! {
            _ = token.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        },
        None => {
            tokio::time::sleep(delay).await;
            true
        }
    }
}
