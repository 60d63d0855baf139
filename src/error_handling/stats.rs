//! Transport statistics tracking.
//!
//! This module provides thread-safe counters for attempts, retries, drains and
//! terminal outcomes across every call made through the transport.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Serialize;
use strum::IntoEnumIterator;

use super::types::{OutcomeType, RetryReason};

/// Thread-safe transport statistics tracker.
///
/// Tracks retries and outcomes using atomic counters, allowing concurrent
/// access from multiple tasks. All categories are initialized to zero on
/// creation. Share it across decorators with `Arc`.
pub struct TransportStats {
    attempts: AtomicUsize,
    drains: AtomicUsize,
    retries: HashMap<RetryReason, AtomicUsize>,
    outcomes: HashMap<OutcomeType, AtomicUsize>,
}

/// Point-in-time copy of `TransportStats`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Requests handed to the underlying executor
    pub attempts: usize,
    /// Times a shared host limiter was drained after a 429
    pub drains: usize,
    /// Retries caused by transient transport errors
    pub transient_retries: usize,
    /// Retries caused by 429 responses
    pub rate_limited_retries: usize,
    /// Retries caused by 50x responses
    pub server_error_retries: usize,
    /// Calls that returned a response
    pub responses: usize,
    /// Calls that ended in an error of any kind
    pub errors: usize,
}

impl TransportStats {
    /// Creates a new stats tracker with all counters at zero.
    pub fn new() -> Self {
        let mut retries = HashMap::new();
        for reason in RetryReason::iter() {
            retries.insert(reason, AtomicUsize::new(0));
        }

        let mut outcomes = HashMap::new();
        for outcome in OutcomeType::iter() {
            outcomes.insert(outcome, AtomicUsize::new(0));
        }

        TransportStats {
            attempts: AtomicUsize::new(0),
            drains: AtomicUsize::new(0),
            retries,
            outcomes,
        }
    }

    /// Records one request handed to the executor.
    pub fn record_attempt(&self) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a drain of a shared host limiter.
    pub fn record_drain(&self) {
        self.drains.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment a retry counter.
    pub fn record_retry(&self, reason: RetryReason) {
        if let Some(counter) = self.retries.get(&reason) {
            counter.fetch_add(1, Ordering::Relaxed);
        } else {
            log::error!(
                "Attempted to increment retry counter for {:?} which is not in the map. \
                 This indicates a bug in TransportStats initialization.",
                reason
            );
        }
    }

    /// Increment an outcome counter.
    pub fn record_outcome(&self, outcome: OutcomeType) {
        if let Some(counter) = self.outcomes.get(&outcome) {
            counter.fetch_add(1, Ordering::Relaxed);
        } else {
            log::error!(
                "Attempted to increment outcome counter for {:?} which is not in the map. \
                 This indicates a bug in TransportStats initialization.",
                outcome
            );
        }
    }

    /// Total attempts handed to the inner executor.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::Relaxed)
    }

    /// Number of shared limiter drains after a 429.
    pub fn drains(&self) -> usize {
        self.drains.load(Ordering::Relaxed)
    }

    /// Retries recorded for `reason`.
    pub fn get_retry_count(&self, reason: RetryReason) -> usize {
        self.retries
            .get(&reason)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Calls that ended with `outcome`.
    pub fn get_outcome_count(&self, outcome: OutcomeType) -> usize {
        self.outcomes
            .get(&outcome)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Retries across all reasons.
    pub fn total_retries(&self) -> usize {
        self.retries.values().map(|c| c.load(Ordering::Relaxed)).sum()
    }

    /// Copies the current counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        let errors = OutcomeType::iter()
            .filter(|o| *o != OutcomeType::Response)
            .map(|o| self.get_outcome_count(o))
            .sum();
        StatsSnapshot {
            attempts: self.attempts(),
            drains: self.drains(),
            transient_retries: self.get_retry_count(RetryReason::Transient),
            rate_limited_retries: self.get_retry_count(RetryReason::RateLimited),
            server_error_retries: self.get_retry_count(RetryReason::ServerError),
            responses: self.get_outcome_count(OutcomeType::Response),
            errors,
        }
    }
}

impl Default for TransportStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Logs a summary of the transport statistics.
pub fn log_transport_stats(stats: &TransportStats) {
    log::info!(
        "Transport: {} attempts, {} retries, {} limiter drains",
        stats.attempts(),
        stats.total_retries(),
        stats.drains()
    );
    for reason in RetryReason::iter() {
        let count = stats.get_retry_count(reason);
        if count > 0 {
            log::info!("   {}: {}", reason, count);
        }
    }
    for outcome in OutcomeType::iter() {
        let count = stats.get_outcome_count(outcome);
        if count > 0 {
            log::info!("   outcome {}: {}", outcome.as_str(), count);
        }
    }
}
