//! Configuration constants.
//!
//! This module defines the defaults used throughout the transport: the
//! pre-provisioned registry rate limit, retry pacing, and HTTP client settings.

use std::time::Duration;

// Registry rate limiting
/// Canonical host identifier for Docker Hub.
///
/// Every Hub endpoint the client talks to resolves to this key in the
/// limiter registry, so all of them share one token bucket.
pub const DOCKER_HUB_CANONICAL: &str = "docker.io";
/// Hostnames that are served by Docker Hub and share its rate limit.
pub const DOCKER_HUB_ALIASES: &[&str] = &["registry-1.docker.io", "index.docker.io"];
/// Permits granted to Docker Hub per window (stick to at most 300/min)
pub const DOCKER_HUB_PERMITS: u32 = 300;
/// Length of the Docker Hub rate-limit window
pub const DOCKER_HUB_WINDOW: Duration = Duration::from_secs(60);
/// Docker Hub burst capacity (allow an immediate burst of 300)
pub const DOCKER_HUB_BURST: usize = 300;

/// How often the token bucket background task refills permits.
/// Fractional permits are carried between ticks, so this only affects granularity.
pub const REFILL_TICK: Duration = Duration::from_millis(100);

// Retry strategy
/// Minimum spacing between two attempts of the same request.
/// Caps request retries at once per second.
pub const RETRY_INTERVAL: Duration = Duration::from_secs(1);
/// Server-error budget per request.
/// Set to 3 = initial attempt + 2 retries when every attempt returns 50x.
pub const SERVER_ERROR_BUDGET: u32 = 3;

// HTTP client defaults
/// Per-attempt HTTP timeout in seconds
pub const HTTP_TIMEOUT_SECS: u64 = 30;
/// Default User-Agent string for HTTP requests.
pub const DEFAULT_USER_AGENT: &str = concat!("registry_transport/", env!("CARGO_PKG_VERSION"));
/// Maximum concurrent fetches issued by the CLI
pub const DEFAULT_CONCURRENCY: usize = 16;

// HTTP status codes (for clarity and consistency)
/// Status code that drains the shared host limiter before retrying.
pub const HTTP_STATUS_TOO_MANY_REQUESTS: u16 = 429;
/// Status codes that are retried against the server-error budget.
pub const HTTP_STATUS_RETRYABLE_SERVER_ERRORS: [u16; 4] = [500, 502, 503, 504];
