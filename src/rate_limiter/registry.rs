//! Limiter registry: one shared token bucket per canonical service host.

use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use url::Url;

use super::bucket::TokenBucket;
use crate::config::{HostLimit, TransportConfig, DOCKER_HUB_ALIASES, DOCKER_HUB_CANONICAL};
use crate::context::InvocationContext;
use crate::error_handling::TransportError;

/// The limiter a transport applies to its requests.
///
/// Hosts without a registered limit get `Unlimited`: requests to them are not
/// rate limited at all (only the invocation context is checked). This is the
/// registry's explicit policy for unknown hosts.
#[derive(Debug, Clone)]
pub enum HostLimiter {
    /// A token bucket shared with every other transport talking to the same host.
    Shared(Arc<TokenBucket>),
    /// No rate limit applies.
    Unlimited,
}

impl HostLimiter {
    /// Waits for a token from the shared bucket, or only checks the context
    /// when unlimited.
    pub async fn wait(&self, ctx: &InvocationContext) -> Result<(), TransportError> {
        match self {
            HostLimiter::Shared(bucket) => bucket.wait(ctx).await,
            HostLimiter::Unlimited => match ctx.err() {
                Some(err) => Err(err),
                None => Ok(()),
            },
        }
    }

    /// Drains the shared bucket. Returns the number of tokens removed.
    pub fn drain(&self) -> usize {
        match self {
            HostLimiter::Shared(bucket) => bucket.drain(),
            HostLimiter::Unlimited => 0,
        }
    }

    /// Whether requests through this limiter are rate limited.
    pub fn is_limited(&self) -> bool {
        matches!(self, HostLimiter::Shared(_))
    }

    /// The shared bucket, when limited.
    pub fn bucket(&self) -> Option<&Arc<TokenBucket>> {
        match self {
            HostLimiter::Shared(bucket) => Some(bucket),
            HostLimiter::Unlimited => None,
        }
    }
}

/// Process-wide mapping from canonical host id to its shared token bucket.
///
/// Built once at startup and handed (behind an `Arc`) to every transport. It
/// is read-only after construction: at most one bucket exists per host.
#[derive(Debug)]
pub struct LimiterRegistry {
    limiters: HashMap<String, Arc<TokenBucket>>,
    aliases: HashMap<String, String>,
    shutdown: CancellationToken,
}

impl LimiterRegistry {
    /// Builds a registry from explicit host limits.
    ///
    /// A later entry for the same host replaces an earlier one.
    ///
    /// # Panics
    ///
    /// Must be called from within a Tokio runtime (each bucket spawns its
    /// refill task).
    pub fn from_limits(limits: &[HostLimit]) -> Self {
        let shutdown = CancellationToken::new();
        let mut limiters = HashMap::new();
        for limit in limits {
            let host = normalize_host(&limit.host);
            log::debug!(
                "Registering rate limit for {}: {} permits per {:?} (burst {})",
                host,
                limit.permits,
                limit.window,
                limit.burst
            );
            let bucket =
                TokenBucket::with_shutdown(limit.rate_per_sec(), limit.burst, shutdown.clone());
            if limiters.insert(host.clone(), bucket).is_some() {
                log::warn!("Duplicate rate limit for {}, keeping the last one", host);
            }
        }
        Self {
            limiters,
            aliases: HashMap::new(),
            shutdown,
        }
    }

    /// The default registry: Docker Hub at 300 requests per minute, burst 300.
    pub fn with_defaults() -> Self {
        let mut registry = Self::from_limits(&[HostLimit::docker_hub()]);
        for alias in DOCKER_HUB_ALIASES {
            registry = registry.with_alias(alias, DOCKER_HUB_CANONICAL);
        }
        registry
    }

    /// Builds a registry from the transport configuration.
    pub fn from_config(config: &TransportConfig) -> Self {
        let mut registry = Self::from_limits(&config.limits);
        for (alias, canonical) in &config.aliases {
            registry = registry.with_alias(alias, canonical);
        }
        registry
    }

    /// Makes `alias` resolve to the limiter registered for `canonical`.
    pub fn with_alias(mut self, alias: &str, canonical: &str) -> Self {
        self.aliases
            .insert(normalize_host(alias), normalize_host(canonical));
        self
    }

    /// Resolves a host name through the alias table.
    pub fn canonical_host(&self, host: &str) -> String {
        let host = normalize_host(host);
        match self.aliases.get(&host) {
            Some(canonical) => canonical.clone(),
            None => host,
        }
    }

    /// Returns the shared limiter for `host`, or `Unlimited` if none is registered.
    pub fn limiter_for(&self, host: &str) -> HostLimiter {
        let canonical = self.canonical_host(host);
        match self.limiters.get(&canonical) {
            Some(bucket) => HostLimiter::Shared(Arc::clone(bucket)),
            None => {
                log::debug!("No rate limit registered for {}, requests are unlimited", canonical);
                HostLimiter::Unlimited
            }
        }
    }

    /// Returns the shared limiter for the host of `url`.
    pub fn limiter_for_url(&self, url: &Url) -> HostLimiter {
        match url.host_str() {
            Some(host) => self.limiter_for(host),
            None => HostLimiter::Unlimited,
        }
    }

    /// Canonical hosts with a registered limit.
    pub fn hosts(&self) -> impl Iterator<Item = &str> {
        self.limiters.keys().map(String::as_str)
    }

    /// Number of registered hosts.
    pub fn len(&self) -> usize {
        self.limiters.len()
    }

    /// Whether no host has a registered limit.
    pub fn is_empty(&self) -> bool {
        self.limiters.is_empty()
    }

    /// Stops every bucket's refill task.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

fn normalize_host(host: &str) -> String {
    host.trim().trim_end_matches('.').to_ascii_lowercase()
}
