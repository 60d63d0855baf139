//! Retry policy for a single logical request.
//!
//! Two independent, deliberately asymmetric limits apply to every call:
//! - `RetryPacer`: time-based, at most one attempt per second, no count limit
//! - `ServerErrorBudget`: count-based, caps 50x retries regardless of time
//!
//! 429 and transient transport errors are only bounded by the pacer and the
//! invocation context; 50x responses are also bounded by the budget so a real
//! outage is not amplified by retries.

mod classify;
mod pacer;

pub use classify::{
    classify, classify_error, classify_status, is_transient, RetryDecision, ServerErrorBudget,
};
pub use pacer::RetryPacer;
