//! Caller-supplied deadline and cancellation for the I/O points of a run.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Why a guarded I/O call did not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupted {
    TimedOut,
    Cancelled,
}

/// Timeout and cancellation propagated from the invocation.
///
/// The timeout applies to each guarded call separately (roster fetch, insert).
#[derive(Debug, Clone, Default)]
pub struct ProcessContext {
    pub timeout: Option<Duration>,
    pub cancellation: CancellationToken,
}

impl ProcessContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Drive `fut` until it completes, times out, or the token is cancelled.
    ///
    /// An already-cancelled token wins over a ready future.
    ///
    /// Interrupting only drops `fut`. Work it already handed off (a blocking
    /// `tokio::fs` call, a spawned task, a request in flight) still runs to
    /// completion, so `Interrupted` means "outcome unknown", not "nothing
    /// happened".
    pub async fn run<F, T>(&self, fut: F) -> Result<T, Interrupted>
    where
        F: Future<Output = T>,
    {
        let guarded = async {
            match self.timeout {
                Some(limit) => tokio::time::timeout(limit, fut)
                    .await
                    .map_err(|_| Interrupted::TimedOut),
                None => Ok(fut.await),
            }
        };

        tokio::select! {
            biased;
            _ = self.cancellation.cancelled() => Err(Interrupted::Cancelled),
            result = guarded => result,
        }
    }
}
