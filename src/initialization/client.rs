//! HTTP client initialization.

use std::sync::Arc;
use std::time::Duration;

use crate::config::TransportConfig;
use reqwest::ClientBuilder;

/// Initializes the HTTP client used by `ReqwestExecutor`.
///
/// Creates a `reqwest::Client` configured with:
/// - User-Agent header from the configuration
/// - Per-attempt timeout from the configuration
/// - reqwest's default redirect policy (up to 10 hops)
///
/// The client keeps no retry logic of its own; retries belong to the
/// transport decorator wrapping it.
///
/// # Errors
///
/// Returns a `reqwest::Error` if client creation fails.
pub fn init_client(config: &TransportConfig) -> Result<Arc<reqwest::Client>, reqwest::Error> {
    let client = ClientBuilder::new()
        .timeout(Duration::from_secs(config.timeout_seconds))
        .user_agent(config.user_agent.clone())
        .build()?;
    Ok(Arc::new(client))
}
