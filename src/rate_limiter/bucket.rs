//! Token-bucket rate limiter shared by every call to one host.

use std::sync::Arc;

use tokio::sync::Semaphore as TokioSemaphore;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;

use crate::config::REFILL_TICK;
use crate::context::InvocationContext;
use crate::error_handling::TransportError;

/// Token-bucket rate limiter for controlling request rate to one host.
///
/// Available tokens are the permits of a tokio semaphore. Each request
/// consumes (forgets) a permit; a background task adds permits back at the
/// configured rate without ever exceeding the burst capacity.
///
/// # Behavior
///
/// - Tokens are replenished continuously at the specified rate
/// - Burst capacity allows up to `burst` callers through without waiting
/// - `drain()` removes every available token in one atomic step
/// - The refill task stops when the bucket is dropped or `shutdown()` is called
///
/// # Panics
///
/// `TokenBucket::new` spawns the refill task and must be called from within a
/// Tokio runtime.
pub struct TokenBucket {
    permits: Arc<TokioSemaphore>,
    capacity: usize,
    rate_per_sec: f64,
    shutdown: CancellationToken,
}

impl TokenBucket {
    /// Creates a full bucket refilling at `rate_per_sec` tokens per second.
    ///
    /// A non-finite rate keeps the bucket permanently full.
    pub fn new(rate_per_sec: f64, burst: usize) -> Arc<Self> {
        Self::with_shutdown(rate_per_sec, burst, CancellationToken::new())
    }

    /// Creates a bucket whose refill task also stops when `parent` is canceled.
    pub fn with_shutdown(rate_per_sec: f64, burst: usize, parent: CancellationToken) -> Arc<Self> {
        let capacity = burst;
        let rate = if rate_per_sec.is_finite() {
            rate_per_sec.max(0.0)
        } else {
            capacity as f64 / REFILL_TICK.as_secs_f64()
        };
        let shutdown = parent.child_token();

        let bucket = Arc::new(TokenBucket {
            permits: Arc::new(TokioSemaphore::new(capacity)),
            capacity,
            rate_per_sec: rate,
            shutdown: shutdown.clone(),
        });

        let permits = Arc::clone(&bucket.permits);
        let mut ticker = interval(REFILL_TICK);
        tokio::spawn(async move {
            let mut last_time = tokio::time::Instant::now();
            let mut fractional_permits = 0.0f64;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let now = tokio::time::Instant::now();
                        let elapsed = now.duration_since(last_time);
                        last_time = now;

                        let permits_to_add_f64 = rate * elapsed.as_secs_f64() + fractional_permits;
                        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                        let permits_to_add = permits_to_add_f64 as usize;

                        // This task is the only producer, so free room can only grow
                        // between the read and the add.
                        let room = capacity.saturating_sub(permits.available_permits());
                        if room == 0 {
                            fractional_permits = 0.0;
                            continue;
                        }
                        #[allow(clippy::cast_precision_loss)]
                        {
                            fractional_permits = permits_to_add_f64 - permits_to_add as f64;
                        }
                        let adding = permits_to_add.min(room);
                        if adding > 0 {
                            permits.add_permits(adding);
                        }
                    }
                    _ = shutdown.cancelled() => {
                        log::debug!("Token bucket refill task shutting down");
                        break;
                    }
                }
            }
        });

        bucket
    }

    /// Waits for a token and consumes it.
    ///
    /// Returns `Canceled`/`DeadlineExceeded` if the context ends first, in
    /// which case no token is consumed.
    ///
    /// Unlike `RetryPacer::wait`, this does not fail fast when the deadline
    /// falls before the next refill: it waits until the deadline itself. The
    /// semaphore queue gives no reliable estimate of when this caller's token
    /// will arrive, since drains and other waiters move it.
    pub async fn wait(&self, ctx: &InvocationContext) -> Result<(), TransportError> {
        let permit = ctx
            .run(self.permits.acquire())
            .await?
            .map_err(|_| TransportError::LimiterClosed)?;
        permit.forget();
        Ok(())
    }

    /// Takes a token if one is available right now.
    pub fn try_acquire(&self) -> bool {
        match self.permits.try_acquire() {
            Ok(permit) => {
                permit.forget();
                true
            }
            Err(_) => false,
        }
    }

    /// Atomically removes every available token.
    ///
    /// Callers on every task sharing this bucket have to wait for refill
    /// afterwards. Returns the number of tokens removed.
    pub fn drain(&self) -> usize {
        self.permits.forget_permits(self.capacity)
    }

    /// Currently available tokens.
    pub fn tokens(&self) -> usize {
        self.permits.available_permits()
    }

    /// Maximum number of tokens the bucket can hold.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Refill rate in tokens per second.
    pub fn rate_per_sec(&self) -> f64 {
        self.rate_per_sec
    }

    /// Stops the refill task. Remaining tokens stay usable.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

impl Drop for TokenBucket {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl std::fmt::Debug for TokenBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenBucket")
            .field("capacity", &self.capacity)
            .field("rate_per_sec", &self.rate_per_sec())
            .field("tokens", &self.tokens())
            .finish()
    }
}
