//! Per-operation deadline and cancellation.

use std::future::Future;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::error::{Result, TosError};

/// Deadline and cancellation token carried by every operation.
///
/// When the token fires the in-flight future is dropped, which aborts the
/// HTTP exchange and releases its connection, and the operation returns
/// [`TosError::Canceled`]. When the deadline passes it returns
/// [`TosError::DeadlineExceeded`]. A context without a deadline falls back to
/// the client's request timeout.
#[derive(Debug, Clone, Default)]
pub struct Context {
    deadline: Option<Instant>,
    cancel: CancellationToken,
}

impl Context {
    /// A context with no deadline and a token nobody else holds.
    pub fn background() -> Self {
        Self::default()
    }

    /// A context that expires `timeout` from now. A timeout too large to
    /// represent leaves the context without a deadline.
    pub fn with_timeout(timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => Self::background().deadline_at(deadline),
            None => Self::background(),
        }
    }

    pub fn deadline_at(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Replaces the cancellation token, e.g. with a child of a server-wide token.
    pub fn cancel_with(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Cancels every operation running under this context or its clones.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Drives `operation` until it completes, the token fires, or the
    /// deadline (or `default_timeout` when there is none) passes.
    pub(crate) async fn run<T, F>(&self, default_timeout: Option<Duration>, operation: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let deadline = self
            .deadline
            .or_else(|| default_timeout.and_then(|timeout| Instant::now().checked_add(timeout)));

        let bounded = async {
            match deadline {
                Some(deadline) => {
                    tokio::time::timeout_at(deadline.into(), operation)
                        .await
                        .unwrap_or_else(|_| Err(TosError::DeadlineExceeded))
                }
                None => operation.await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(TosError::Canceled),
            result = bounded => result,
        }
    }
}
