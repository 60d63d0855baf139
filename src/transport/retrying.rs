//! The rate-limited, retrying transport decorator.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::config::{TransportConfig, RETRY_INTERVAL, SERVER_ERROR_BUDGET};
use crate::context::InvocationContext;
use crate::error_handling::{OutcomeType, TransportError, TransportStats};
use crate::http::{Request, RequestExecutor, Response};
use crate::rate_limiter::{HostLimiter, LimiterRegistry};
use crate::retry::{classify, RetryDecision, RetryPacer, ServerErrorBudget};

/// Retry limits applied to each call through the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Minimum spacing between attempts of one call
    pub retry_interval: Duration,
    /// Server-error budget per call (3 = at most 3 attempts when every attempt is a 50x)
    pub server_error_budget: u32,
    /// Optional cap on attempts per call; `None` leaves 429 and transient retries unbounded
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retry_interval: RETRY_INTERVAL,
            server_error_budget: SERVER_ERROR_BUDGET,
            max_attempts: None,
        }
    }
}

impl From<&TransportConfig> for RetryPolicy {
    fn from(config: &TransportConfig) -> Self {
        Self {
            retry_interval: config.retry_interval,
            server_error_budget: config.server_error_budget,
            max_attempts: config.max_attempts,
        }
    }
}

/// A `RequestExecutor` that rate limits and retries the executor it wraps.
///
/// Every call loops through:
/// 1. wait on the call's own retry pacer (one attempt per second)
/// 2. wait on the host limiter shared with every other call to the host
/// 3. execute the attempt
/// 4. classify the outcome and either return it or prepare the next attempt
///
/// A 429 drains the shared host limiter before retrying, so all concurrent
/// callers back off. 50x responses are retried until the server-error budget
/// runs out, after which the last response is returned as-is. Transient
/// transport errors and 429s are retried for as long as the invocation context
/// (and `max_attempts`, when set) allows. Callers must give the context a
/// deadline when they need a bounded call.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use registry_transport::{
///     InvocationContext, LimiterRegistry, RateLimitedRetryingTransport, Request,
///     RequestExecutor, ReqwestExecutor,
/// };
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
/// let registry = Arc::new(LimiterRegistry::with_defaults());
/// let executor = ReqwestExecutor::new(Arc::new(reqwest::Client::new()));
/// let transport = RateLimitedRetryingTransport::for_host(executor, &registry, "docker.io");
///
/// let ctx = InvocationContext::new().with_timeout(Duration::from_secs(60));
/// let url = url::Url::parse("https://registry-1.docker.io/v2/")?;
/// let response = transport.execute(Request::get(url), &ctx).await?;
/// println!("{}", response.status());
/// # Ok(())
/// # }
/// ```
pub struct RateLimitedRetryingTransport<E> {
    inner: E,
    limiter: HostLimiter,
    policy: RetryPolicy,
    stats: Option<Arc<TransportStats>>,
}

impl<E> RateLimitedRetryingTransport<E>
where
    E: RequestExecutor,
{
    /// Wraps `inner` with `limiter` and the default retry policy.
    pub fn new(inner: E, limiter: HostLimiter) -> Self {
        Self {
            inner,
            limiter,
            policy: RetryPolicy::default(),
            stats: None,
        }
    }

    /// Wraps `inner` with the registry's limiter for `host`.
    pub fn for_host(inner: E, registry: &LimiterRegistry, host: &str) -> Self {
        Self::new(inner, registry.limiter_for(host))
    }

    /// Wraps `inner` with the registry's limiter for the host of `url`.
    pub fn for_url(inner: E, registry: &LimiterRegistry, url: &Url) -> Self {
        Self::new(inner, registry.limiter_for_url(url))
    }

    /// Replaces the retry policy.
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Records attempts, retries and outcomes into `stats`.
    pub fn with_stats(mut self, stats: Arc<TransportStats>) -> Self {
        self.stats = Some(stats);
        self
    }

    /// The retry policy in effect.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// The host limiter shared with other transports.
    pub fn limiter(&self) -> &HostLimiter {
        &self.limiter
    }

    /// The wrapped executor.
    pub fn inner(&self) -> &E {
        &self.inner
    }

    fn record<F>(&self, f: F)
    where
        F: FnOnce(&TransportStats),
    {
        if let Some(stats) = &self.stats {
            f(stats);
        }
    }

    fn finish(
        &self,
        outcome: Result<Response, TransportError>,
        exhausted: bool,
    ) -> Result<Response, TransportError> {
        self.record(|stats| {
            let kind = match &outcome {
                _ if exhausted => OutcomeType::AttemptsExhausted,
                Ok(_) => OutcomeType::Response,
                Err(err) => OutcomeType::from_error(err),
            };
            stats.record_outcome(kind);
        });
        outcome
    }

    async fn run(
        &self,
        mut request: Request,
        ctx: &InvocationContext,
        exhausted: &mut bool,
    ) -> Result<Response, TransportError> {
        let mut pacer = RetryPacer::new(self.policy.retry_interval);
        let mut budget = ServerErrorBudget::new(self.policy.server_error_budget);

        request.prime_body().map_err(TransportError::ReplayBody)?;
        let template = request.template();
        let mut attempt: u32 = 0;

        loop {
            pacer.wait(ctx).await?;
            self.limiter.wait(ctx).await?;

            attempt += 1;
            self.record(TransportStats::record_attempt);
            log::trace!("{} {} (attempt {})", request.method(), request.url(), attempt);
            let url = request.url().clone();
            let outcome = self.inner.execute(request, ctx).await;

            let decision = classify(&outcome, &mut budget);
            let Some(reason) = decision.reason() else {
                return outcome;
            };

            // Every caller sharing the host has to back off, even if this one gives up
            if decision == RetryDecision::RateLimited {
                let drained = self.limiter.drain();
                self.record(TransportStats::record_drain);
                log::info!(
                    "Rate limited by {}, drained {} shared tokens",
                    url.host_str().unwrap_or_default(),
                    drained
                );
            }

            if let Some(max_attempts) = self.policy.max_attempts {
                if attempt >= max_attempts {
                    log::warn!(
                        "Giving up on {} after {} attempts ({})",
                        url,
                        attempt,
                        reason
                    );
                    *exhausted = true;
                    return outcome;
                }
            }

            match &outcome {
                Ok(response) => log::debug!(
                    "Retrying {} after status {} (attempt {}, {})",
                    url,
                    response.status(),
                    attempt,
                    reason
                ),
                Err(err) => log::debug!(
                    "Retrying {} after error: {} (attempt {}, {})",
                    url,
                    err,
                    attempt,
                    reason
                ),
            }
            self.record(|stats| stats.record_retry(reason));

            if let Ok(response) = outcome {
                response
                    .into_body()
                    .release()
                    .map_err(TransportError::ReleaseBody)?;
            }
            if template.loses_body() && attempt == 1 {
                log::warn!(
                    "Request body for {} cannot be replayed; retrying without a body",
                    url
                );
            }
            request = template.derive().map_err(TransportError::ReplayBody)?;
        }
    }
}

#[async_trait]
impl<E> RequestExecutor for RateLimitedRetryingTransport<E>
where
    E: RequestExecutor,
{
    async fn execute(
        &self,
        request: Request,
        ctx: &InvocationContext,
    ) -> Result<Response, TransportError> {
        let mut exhausted = false;
        let outcome = self.run(request, ctx, &mut exhausted).await;
        self.finish(outcome, exhausted)
    }
}

impl<E> std::fmt::Debug for RateLimitedRetryingTransport<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitedRetryingTransport")
            .field("limiter", &self.limiter)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
