//! Per-request retry pacing.

use std::time::Duration;

use tokio::time::Instant;

use crate::context::InvocationContext;
use crate::error_handling::TransportError;

/// Retry-frequency limiter owned by a single call.
///
/// Behaves like a token bucket with burst 1 refilled once per `interval`: the
/// first attempt goes through immediately and each later attempt waits until
/// `interval` has passed since the previous one. Not shared, so no
/// synchronization is needed.
#[derive(Debug)]
pub struct RetryPacer {
    interval: Duration,
    next_allowed: Option<Instant>,
}

impl RetryPacer {
    /// A pacer allowing one attempt per `interval`.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_allowed: None,
        }
    }

    /// Waits until the next attempt is allowed.
    ///
    /// Fails fast with `DeadlineExceeded` when the context deadline falls
    /// before the next allowed attempt, and with the context's error if it is
    /// canceled while waiting. A failed wait does not use up the permit.
    pub async fn wait(&mut self, ctx: &InvocationContext) -> Result<(), TransportError> {
        if let Some(err) = ctx.err() {
            return Err(err);
        }
        if let Some(next_allowed) = self.next_allowed {
            if let Some(deadline) = ctx.deadline() {
                if deadline < next_allowed {
                    return Err(TransportError::DeadlineExceeded);
                }
            }
            ctx.run(tokio::time::sleep_until(next_allowed)).await?;
        }
        self.next_allowed = Some(Instant::now() + self.interval);
        Ok(())
    }

    /// Minimum spacing between attempts.
    pub fn interval(&self) -> Duration {
        self.interval
    }
}
