//! Concurrent fetch of a list of URLs through the transport.
//!
//! Used by the CLI binary; every URL shares one limiter registry, one HTTP
//! client and one set of transport statistics.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use futures::stream::FuturesUnordered;
use futures::StreamExt;
use reqwest::{Method, StatusCode};
use serde::Serialize;
use url::Url;

use crate::config::{Opt, TransportConfig};
use crate::context::InvocationContext;
use crate::error_handling::{log_transport_stats, StatsSnapshot, TransportStats};
use crate::http::{Request, RequestExecutor, ReqwestExecutor};
use crate::initialization::{init_client, init_registry, init_semaphore};
use crate::rate_limiter::LimiterRegistry;
use crate::transport::{RateLimitedRetryingTransport, RetryPolicy};

/// Result of fetching a single URL.
#[derive(Debug, Clone, Serialize)]
pub struct FetchResult {
    /// The URL that was fetched
    pub url: String,
    /// Final status code, when a response was returned
    pub status: Option<u16>,
    /// Response body size in bytes, when the body was read
    pub bytes: Option<usize>,
    /// Error message, when the call failed
    pub error: Option<String>,
    /// Wall time of the whole call, retries included
    pub elapsed_ms: u128,
}

impl FetchResult {
    /// Whether the call ended in an error (a 4xx/5xx response is not an error).
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Summary of a fetch run.
#[derive(Debug, Clone, Serialize)]
pub struct FetchReport {
    /// Per-URL results, in input order
    pub results: Vec<FetchResult>,
    /// Transport counters at the end of the run
    pub stats: StatsSnapshot,
    /// Total elapsed time in seconds
    pub elapsed_seconds: f64,
}

impl FetchReport {
    /// Number of URLs whose fetch ended in an error.
    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| r.is_error()).count()
    }

    /// Number of URLs that got a response.
    pub fn succeeded(&self) -> usize {
        self.results.len() - self.failed()
    }
}

/// Everything a single fetch needs, shared across the run.
struct FetchShared<E> {
    executor: E,
    registry: Arc<LimiterRegistry>,
    policy: RetryPolicy,
    stats: Arc<TransportStats>,
    method: Method,
    deadline: Option<Duration>,
}

/// Fetches every URL in `opt` concurrently through the rate-limited, retrying transport.
///
/// Ctrl-C cancels every in-flight call; each call then ends with a context error.
///
/// # Errors
///
/// Returns an error only if setup fails. Per-URL failures are reported in the
/// returned `FetchReport`.
pub async fn run_fetch(opt: &Opt) -> Result<FetchReport> {
    let start = Instant::now();
    let config = TransportConfig::from(opt);
    let client = init_client(&config).context("Failed to initialize HTTP client")?;
    let registry = init_registry(&config);
    let stats = Arc::new(TransportStats::new());

    let shared = Arc::new(FetchShared {
        executor: ReqwestExecutor::new(client),
        registry: Arc::clone(&registry),
        policy: RetryPolicy::from(&config),
        stats: Arc::clone(&stats),
        method: opt.method.clone(),
        deadline: opt.deadline_seconds.map(Duration::from_secs),
    });

    let root = InvocationContext::new();
    let shutdown = root.clone();
    let signal_task = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Received Ctrl-C, canceling in-flight requests");
            shutdown.cancel();
        }
    });

    let semaphore = init_semaphore(opt.concurrency);
    let mut tasks = FuturesUnordered::new();
    for (index, url) in opt.urls.iter().enumerate() {
        let shared = Arc::clone(&shared);
        let semaphore = Arc::clone(&semaphore);
        let ctx = root.child();
        let url = url.clone();
        tasks.push(async move {
            let _permit = semaphore.acquire().await.ok();
            (index, fetch_one(&shared, url, &ctx).await)
        });
    }

    let mut results: Vec<Option<FetchResult>> = vec![None; opt.urls.len()];
    while let Some((index, result)) = tasks.next().await {
        match (&result.status, &result.error) {
            (_, Some(err)) => log::error!("{}: {}", result.url, err),
            (Some(status), None) => log::info!("{}: {}", result.url, status),
            (None, None) => {}
        }
        results[index] = Some(result);
    }

    signal_task.abort();
    registry.shutdown();
    log_transport_stats(&stats);

    Ok(FetchReport {
        results: results.into_iter().flatten().collect(),
        stats: stats.snapshot(),
        elapsed_seconds: start.elapsed().as_secs_f64(),
    })
}

async fn fetch_one<E>(shared: &FetchShared<E>, url: Url, ctx: &InvocationContext) -> FetchResult
where
    E: RequestExecutor + Clone,
{
    let start = Instant::now();
    let ctx = match shared.deadline {
        Some(deadline) => ctx.with_timeout(deadline),
        None => ctx.clone(),
    };
    let transport =
        RateLimitedRetryingTransport::for_url(shared.executor.clone(), &shared.registry, &url)
            .with_policy(shared.policy)
            .with_stats(Arc::clone(&shared.stats));

    let mut result = FetchResult {
        url: url.to_string(),
        status: None,
        bytes: None,
        error: None,
        elapsed_ms: 0,
    };
    match transport
        .execute(Request::new(shared.method.clone(), url), &ctx)
        .await
    {
        Ok(response) => {
            let status: StatusCode = response.status();
            result.status = Some(status.as_u16());
            match ctx.run(response.bytes()).await {
                Ok(Ok(body)) => result.bytes = Some(body.len()),
                Ok(Err(err)) => result.error = Some(format!("reading body: {}", err)),
                Err(err) => result.error = Some(format!("reading body: {}", err)),
            }
        }
        Err(err) => result.error = Some(err.to_string()),
    }
    result.elapsed_ms = start.elapsed().as_millis();
    result
}
