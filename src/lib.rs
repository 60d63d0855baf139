//! registry_transport library: a rate-limited, retrying HTTP transport
//!
//! This library wraps any HTTP request executor with a decorator that keeps a
//! client within a registry's published rate limits and retries transient
//! failures, without callers seeing either. Docker Hub (`docker.io` and its
//! aliases) is pre-provisioned with 300 requests per minute and a burst of 300.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use registry_transport::initialization::{init_client, init_registry};
//! use registry_transport::{
//!     InvocationContext, RateLimitedRetryingTransport, Request, RequestExecutor,
//!     ReqwestExecutor, RetryPolicy, TransportConfig,
//! };
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//! let config = TransportConfig::default();
//! let registry = init_registry(&config);
//! let executor = ReqwestExecutor::new(init_client(&config)?);
//!
//! let url = url::Url::parse("https://registry-1.docker.io/v2/library/alpine/tags/list")?;
//! let transport = RateLimitedRetryingTransport::for_url(executor, &registry, &url)
//!     .with_policy(RetryPolicy::from(&config));
//!
//! let ctx = InvocationContext::new().with_timeout(Duration::from_secs(60));
//! let response = transport.execute(Request::get(url), &ctx).await?;
//! println!("{}", response.status());
//! # Ok(())
//! # }
//! ```
//!
//! # Requirements
//!
//! This library requires a Tokio runtime: token buckets refill from a
//! background task spawned when the limiter registry is built.

#![warn(missing_docs)]

pub mod config;
pub mod context;
mod error_handling;
pub mod http;
pub mod initialization;
pub mod rate_limiter;
pub mod retry;
mod run;
pub mod transport;

// Re-export public API
pub use config::{HostLimit, LogFormat, LogLevel, Opt, TransportConfig};
pub use context::InvocationContext;
pub use error_handling::{
    log_transport_stats, BoxError, InitializationError, OutcomeType, RetryReason, StatsSnapshot,
    TransientCondition, TransportError, TransportStats,
};
pub use http::{Body, BodyFactory, Request, RequestExecutor, ReqwestExecutor, Response};
pub use rate_limiter::{HostLimiter, LimiterRegistry, TokenBucket};
pub use run::{run_fetch, FetchReport, FetchResult};
pub use transport::{RateLimitedRetryingTransport, RetryPolicy};
