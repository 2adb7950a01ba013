//! Per-query cancellation and deadline
//!
//! A [`QueryContext`] is shared by every task a query spawns. Cancelling it
//! (directly, through [`Querier::close`](super::Querier::close), or by the
//! first failing fan-out task) stops all outstanding store calls.

use super::error::QueryError;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Cancellation token plus optional deadline
#[derive(Debug, Clone, Default)]
pub struct QueryContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl QueryContext {
    /// Context without a deadline
    pub fn new() -> Self {
        Self::default()
    }

    /// Context that times out `timeout` from now
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: Some(Instant::now() + timeout),
        }
    }

    /// Replace the deadline
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Child context: cancelled with the parent, cancellable on its own
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// Cancel this context and every child
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Check whether the context was cancelled
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Check whether the deadline has passed
    pub fn is_timed_out(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Time left before the deadline, `None` when there is no deadline
    pub fn remaining_time(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Return the matching error if work should stop
    pub fn check(&self) -> Result<(), QueryError> {
        if self.is_cancelled() {
            return Err(QueryError::cancelled("query cancelled"));
        }
        if self.is_timed_out() {
            return Err(QueryError::timeout("query deadline exceeded"));
        }
        Ok(())
    }

    /// Drive `fut` until it completes, the context is cancelled, or the
    /// deadline passes
    pub async fn run<F, T>(&self, fut: F) -> Result<T, QueryError>
    where
        F: Future<Output = T>,
    {
        self.check()?;
        let deadline = async {
            match self.deadline {
                Some(d) => tokio::time::sleep_until(d).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(QueryError::cancelled("query cancelled")),
            _ = deadline => Err(QueryError::timeout("query deadline exceeded")),
            out = fut => Ok(out),
        }
    }
}
