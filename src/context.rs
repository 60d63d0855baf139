//! Invocation context: cancellation and deadline for one logical call.
//!
//! A context is created by the caller, cloned into every attempt and limiter
//! wait of that call, and checked before each suspension point.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error_handling::TransportError;

/// Cancellation/deadline handle shared by all attempts of one call.
///
/// Cloning is cheap; clones observe the same cancellation token and deadline.
#[derive(Debug, Clone, Default)]
pub struct InvocationContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl InvocationContext {
    /// A context with no deadline that is only canceled explicitly.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an existing cancellation token (e.g. an application shutdown token).
    pub fn from_token(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            deadline: None,
        }
    }

    /// Returns a copy of this context that also expires at `deadline`.
    ///
    /// An earlier existing deadline is kept.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(existing) if existing <= deadline => existing,
            _ => deadline,
        };
        Self {
            cancel: self.cancel.clone(),
            deadline: Some(deadline),
        }
    }

    /// Returns a copy of this context that expires `timeout` from now.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// A child context: canceling the parent cancels the child, not vice versa.
    pub fn child(&self) -> Self {
        Self {
            cancel: self.cancel.child_token(),
            deadline: self.deadline,
        }
    }

    /// Cancels this context and every child derived from it.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// The underlying cancellation token.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// The deadline, if one was set.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// The error this context is already in, if any.
    ///
    /// Cancellation takes precedence over an expired deadline.
    pub fn err(&self) -> Option<TransportError> {
        if self.cancel.is_cancelled() {
            return Some(TransportError::Canceled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(TransportError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves once the context is canceled or its deadline passes.
    pub async fn done(&self) -> TransportError {
        let expired = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => TransportError::Canceled,
            _ = expired => TransportError::DeadlineExceeded,
        }
    }

    /// Drives `fut` to completion unless the context ends first.
    ///
    /// `fut` is dropped (not polled further) when the context ends, so it must
    /// be cancel-safe for its side effects to be all-or-nothing.
    pub async fn run<F>(&self, fut: F) -> Result<F::Output, TransportError>
    where
        F: Future,
    {
        if let Some(err) = self.err() {
            return Err(err);
        }
        tokio::select! {
            biased;
            err = self.done() => Err(err),
            out = fut => Ok(out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_new_context_is_live() {
        let ctx = InvocationContext::new();
        assert!(ctx.err().is_none());
        assert!(ctx.deadline().is_none());
        let out = ctx.run(async { 7 }).await.expect("live context");
        assert_eq!(out, 7);
    }

    #[tokio::test]
    async fn test_cancel_is_observed_by_clones() {
        let ctx = InvocationContext::new();
        let clone = ctx.clone();
        ctx.cancel();
        assert!(matches!(clone.err(), Some(TransportError::Canceled)));
        let result = clone.run(std::future::pending::<()>()).await;
        assert!(matches!(result, Err(TransportError::Canceled)));
    }

    #[tokio::test]
    async fn test_child_does_not_cancel_parent() {
        let parent = InvocationContext::new();
        let child = parent.child();
        child.cancel();
        assert!(parent.err().is_none());

        let other_child = parent.child();
        parent.cancel();
        assert!(matches!(other_child.err(), Some(TransportError::Canceled)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_expires() {
        let ctx = InvocationContext::new().with_timeout(Duration::from_secs(2));
        let start = Instant::now();
        let result = ctx.run(std::future::pending::<()>()).await;
        assert!(matches!(result, Err(TransportError::DeadlineExceeded)));
        assert!(start.elapsed() >= Duration::from_secs(2));
        assert!(matches!(ctx.err(), Some(TransportError::DeadlineExceeded)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_earlier_deadline_wins() {
        let ctx = InvocationContext::new().with_timeout(Duration::from_secs(1));
        let later = ctx.with_timeout(Duration::from_secs(10));
        assert_eq!(later.deadline(), ctx.deadline());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_wins_over_expired_deadline() {
        let ctx = InvocationContext::new().with_timeout(Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(20)).await;
        ctx.cancel();
        assert!(matches!(ctx.err(), Some(TransportError::Canceled)));
    }
}
