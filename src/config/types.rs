//! Configuration types and CLI options.
//!
//! This module defines the library configuration (`TransportConfig`), the
//! per-host rate limit entries it carries, and the `clap` options of the CLI.

use std::time::Duration;

use clap::{Parser, ValueEnum};
use reqwest::Method;
use url::Url;

use crate::config::constants::{
    DEFAULT_CONCURRENCY, DEFAULT_USER_AGENT, DOCKER_HUB_ALIASES, DOCKER_HUB_BURST,
    DOCKER_HUB_CANONICAL, DOCKER_HUB_PERMITS, DOCKER_HUB_WINDOW, HTTP_TIMEOUT_SECS,
    RETRY_INTERVAL, SERVER_ERROR_BUDGET,
};

/// Logging level for the application.
///
/// Controls the verbosity of log output, from most restrictive (Error) to most
/// verbose (Trace).
#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    /// Only error messages
    Error,
    /// Error and warning messages
    Warn,
    /// Error, warning, and informational messages
    Info,
    /// All messages except trace
    Debug,
    /// All messages including trace
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Log output format.
///
/// - `Plain`: Human-readable format with colors (default)
/// - `Json`: Structured JSON format for machine parsing
#[derive(Clone, Debug, ValueEnum)]
pub enum LogFormat {
    /// Human-readable format with colors (default)
    Plain,
    /// Structured JSON format for machine parsing
    Json,
}

/// A token-bucket rate limit for one canonical host.
#[derive(Debug, Clone, PartialEq)]
pub struct HostLimit {
    /// Canonical host identifier (e.g. `docker.io`)
    pub host: String,
    /// Permits granted per `window`
    pub permits: u32,
    /// Window over which `permits` are refilled
    pub window: Duration,
    /// Maximum number of tokens the bucket can hold
    pub burst: usize,
}

impl HostLimit {
    /// The pre-provisioned Docker Hub limit: 300 permits per minute, burst 300.
    pub fn docker_hub() -> Self {
        Self {
            host: DOCKER_HUB_CANONICAL.to_string(),
            permits: DOCKER_HUB_PERMITS,
            window: DOCKER_HUB_WINDOW,
            burst: DOCKER_HUB_BURST,
        }
    }

    /// Refill rate in tokens per second.
    pub fn rate_per_sec(&self) -> f64 {
        let secs = self.window.as_secs_f64();
        if secs <= 0.0 {
            return f64::INFINITY;
        }
        f64::from(self.permits) / secs
    }
}

/// Library configuration (no CLI dependencies).
///
/// # Examples
///
/// ```no_run
/// use registry_transport::TransportConfig;
///
/// let config = TransportConfig {
///     max_attempts: Some(10),
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Host-scoped rate limits, built into the limiter registry at startup
    pub limits: Vec<HostLimit>,

    /// `(alias, canonical)` host pairs resolved before limiter lookup
    pub aliases: Vec<(String, String)>,

    /// Minimum spacing between attempts of one request
    pub retry_interval: Duration,

    /// Server-error (500/502/503/504) budget per request
    pub server_error_budget: u32,

    /// Optional cap on total attempts per request.
    ///
    /// `None` keeps 429 and transient-error retries unbounded; callers must then
    /// bound each call with an `InvocationContext` deadline.
    pub max_attempts: Option<u32>,

    /// Per-attempt HTTP timeout in seconds
    pub timeout_seconds: u64,

    /// HTTP User-Agent header value
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            limits: vec![HostLimit::docker_hub()],
            aliases: DOCKER_HUB_ALIASES
                .iter()
                .map(|alias| (alias.to_string(), DOCKER_HUB_CANONICAL.to_string()))
                .collect(),
            retry_interval: RETRY_INTERVAL,
            server_error_budget: SERVER_ERROR_BUDGET,
            max_attempts: None,
            timeout_seconds: HTTP_TIMEOUT_SECS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Command-line options for the `registry_transport` binary.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "registry_transport",
    about = "Fetch URLs through the rate-limited, retrying registry transport"
)]
pub struct Opt {
    /// URLs to fetch
    #[arg(required = true)]
    pub urls: Vec<Url>,

    /// HTTP method to use for every request
    #[arg(long, default_value = "GET")]
    pub method: Method,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,

    /// Log format
    #[arg(long, value_enum, default_value = "plain")]
    pub log_format: LogFormat,

    /// Per-attempt HTTP timeout in seconds
    #[arg(long, default_value_t = HTTP_TIMEOUT_SECS)]
    pub timeout_seconds: u64,

    /// Overall deadline per URL in seconds, covering every retry
    #[arg(long)]
    pub deadline_seconds: Option<u64>,

    /// Cap on attempts per URL (unbounded when omitted)
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Maximum concurrent fetches
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// HTTP User-Agent header value
    #[arg(long, default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,
}

impl From<&Opt> for TransportConfig {
    fn from(opt: &Opt) -> Self {
        Self {
            max_attempts: opt.max_attempts,
            timeout_seconds: opt.timeout_seconds,
            user_agent: opt.user_agent.clone(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_conversion() {
        assert_eq!(
            log::LevelFilter::from(LogLevel::Error),
            log::LevelFilter::Error
        );
        assert_eq!(
            log::LevelFilter::from(LogLevel::Warn),
            log::LevelFilter::Warn
        );
        assert_eq!(
            log::LevelFilter::from(LogLevel::Info),
            log::LevelFilter::Info
        );
        assert_eq!(
            log::LevelFilter::from(LogLevel::Debug),
            log::LevelFilter::Debug
        );
        assert_eq!(
            log::LevelFilter::from(LogLevel::Trace),
            log::LevelFilter::Trace
        );
    }

    #[test]
    fn test_docker_hub_limit() {
        let limit = HostLimit::docker_hub();
        assert_eq!(limit.host, "docker.io");
        assert_eq!(limit.permits, 300);
        assert_eq!(limit.window, Duration::from_secs(60));
        assert_eq!(limit.burst, 300);
        assert!((limit.rate_per_sec() - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_zero_window_is_unbounded_rate() {
        let limit = HostLimit {
            host: "example.com".to_string(),
            permits: 10,
            window: Duration::ZERO,
            burst: 10,
        };
        assert!(limit.rate_per_sec().is_infinite());
    }

    #[test]
    fn test_config_default() {
        let config = TransportConfig::default();
        assert_eq!(config.limits, vec![HostLimit::docker_hub()]);
        assert_eq!(config.retry_interval, Duration::from_secs(1));
        assert_eq!(config.server_error_budget, 3);
        assert_eq!(config.max_attempts, None);
        assert!(config
            .aliases
            .contains(&("registry-1.docker.io".to_string(), "docker.io".to_string())));
    }

    #[test]
    fn test_opt_parsing() {
        let opt = Opt::try_parse_from([
            "registry_transport",
            "https://registry-1.docker.io/v2/",
            "--max-attempts",
            "5",
            "--deadline-seconds",
            "30",
            "--log-format",
            "json",
        ])
        .expect("valid arguments");
        assert_eq!(opt.urls.len(), 1);
        assert_eq!(opt.method, Method::GET);
        assert_eq!(opt.deadline_seconds, Some(30));
        assert!(matches!(opt.log_format, LogFormat::Json));

        let config = TransportConfig::from(&opt);
        assert_eq!(config.max_attempts, Some(5));
        assert_eq!(config.limits.len(), 1);
    }

    #[test]
    fn test_opt_requires_urls() {
        assert!(Opt::try_parse_from(["registry_transport"]).is_err());
    }
}
