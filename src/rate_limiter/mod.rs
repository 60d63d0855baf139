//! Host-scoped rate limiting.
//!
//! This module implements the shared side of the transport's rate limiting:
//! - `TokenBucket`: a concurrency-safe token bucket with atomic drain
//! - `LimiterRegistry`: one bucket per canonical host, built once at startup
//! - `HostLimiter`: what a transport holds, either a shared bucket or unlimited
//!
//! A 429 from a host drains its bucket so that every concurrent caller backs
//! off, not just the one that saw the 429.

mod bucket;
mod registry;

pub use bucket::TokenBucket;
pub use registry::{HostLimiter, LimiterRegistry};
