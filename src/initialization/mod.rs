//! Application initialization and resource setup.
//!
//! This module provides functions to initialize all shared resources:
//! - Logger
//! - HTTP client
//! - Host limiter registry
//! - Concurrency semaphore for the CLI

mod client;
mod logger;

use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::config::TransportConfig;
use crate::rate_limiter::LimiterRegistry;

// Re-export public API
pub use client::init_client;
pub use logger::init_logger_with;

/// Builds the process-wide limiter registry from `config`.
///
/// Must be called from within a Tokio runtime: every registered host gets a
/// token bucket with its own refill task. Share the returned registry (and
/// the buckets it hands out) across every transport talking to the same hosts.
pub fn init_registry(config: &TransportConfig) -> Arc<LimiterRegistry> {
    let registry = LimiterRegistry::from_config(config);
    log::info!("Rate limiting {} registry host(s)", registry.len());
    Arc::new(registry)
}

/// Initializes a semaphore bounding concurrent fetches.
pub fn init_semaphore(count: usize) -> Arc<Semaphore> {
    Arc::new(Semaphore::new(count.max(1)))
}
