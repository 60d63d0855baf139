//! Error handling and transport statistics.
//!
//! This module provides:
//! - The transport error taxonomy and the transient transport conditions
//! - Initialization error types
//! - Retry and outcome statistics shared across calls
//!
//! Errors are categorized into:
//! - **Context errors**: cancellation or deadline expiry, never retried
//! - **Executor errors**: retried only when on the transient allow-list
//! - **Resource errors**: body release/replay failures, always fatal

mod stats;
mod types;

// Re-export public API
pub use stats::{log_transport_stats, StatsSnapshot, TransportStats};
pub use types::{
    BoxError, InitializationError, OutcomeType, RetryReason, TransientCondition, TransportError,
};
