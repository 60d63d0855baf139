//! Request transport decorators.
//!
//! `RateLimitedRetryingTransport` wraps any `RequestExecutor` and enforces the
//! shared host rate limit plus the per-call retry policy, without the caller
//! seeing either.

mod retrying;

pub use retrying::{RateLimitedRetryingTransport, RetryPolicy};
