//! Retry classification of a single attempt's outcome.

use std::error::Error as StdError;
use std::io;

use reqwest::StatusCode;

use crate::config::{HTTP_STATUS_RETRYABLE_SERVER_ERRORS, HTTP_STATUS_TOO_MANY_REQUESTS};
use crate::error_handling::{RetryReason, TransientCondition, TransportError};
use crate::http::Response;

/// What to do with the outcome of one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Hand the outcome to the caller as-is.
    NoRetry,
    /// Retry after a transient transport error.
    Transient,
    /// Retry after a 429; the shared host limiter must be drained first.
    RateLimited,
    /// Retry after a 50x; one unit of server-error budget was spent.
    ServerError,
}

impl RetryDecision {
    /// Whether the outcome should be retried.
    pub fn is_retry(&self) -> bool {
        !matches!(self, RetryDecision::NoRetry)
    }

    /// The reason recorded for a retry.
    pub fn reason(&self) -> Option<RetryReason> {
        match self {
            RetryDecision::NoRetry => None,
            RetryDecision::Transient => Some(RetryReason::Transient),
            RetryDecision::RateLimited => Some(RetryReason::RateLimited),
            RetryDecision::ServerError => Some(RetryReason::ServerError),
        }
    }
}

/// Per-request budget of server-error retries.
///
/// Starts at the configured budget (3 by default) and is spent by one unit per
/// retried 50x. Once it reaches its floor of 1 the next 50x is returned to the
/// caller, so a budget of 3 allows 3 attempts in total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerErrorBudget {
    remaining: u32,
}

impl ServerErrorBudget {
    /// A fresh budget of `budget` units.
    pub fn new(budget: u32) -> Self {
        Self { remaining: budget }
    }

    /// Units left, including the floor.
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Spends one unit if the budget is still above its floor.
    pub fn try_spend(&mut self) -> bool {
        if self.remaining > 1 {
            self.remaining -= 1;
            true
        } else {
            false
        }
    }
}

/// Classifies a completed attempt.
pub fn classify(
    outcome: &Result<Response, TransportError>,
    budget: &mut ServerErrorBudget,
) -> RetryDecision {
    match outcome {
        Ok(response) => classify_status(response.status(), budget),
        Err(error) => classify_error(error),
    }
}

/// Classifies a response status, spending budget on retried 50x.
pub fn classify_status(status: StatusCode, budget: &mut ServerErrorBudget) -> RetryDecision {
    let code = status.as_u16();
    if code == HTTP_STATUS_TOO_MANY_REQUESTS {
        // Never counted against the budget; bounded only by pacing and the context
        return RetryDecision::RateLimited;
    }
    if HTTP_STATUS_RETRYABLE_SERVER_ERRORS.contains(&code) && budget.try_spend() {
        return RetryDecision::ServerError;
    }
    RetryDecision::NoRetry
}

/// Classifies an executor error.
///
/// Only errors whose source chain contains a transient transport condition are
/// retried; context and resource errors never are.
pub fn classify_error(error: &TransportError) -> RetryDecision {
    match error {
        TransportError::Executor(source) => {
            if is_transient(source.as_ref()) {
                RetryDecision::Transient
            } else {
                RetryDecision::NoRetry
            }
        }
        _ => RetryDecision::NoRetry,
    }
}

/// Whether any error in the chain is on the transient allow-list:
/// premature end-of-stream, closed-pipe write, unexpected end-of-stream, or use
/// of an already-closed connection.
///
/// Besides `TransientCondition` and the matching `io::ErrorKind`s, hyper's
/// "connection closed before message completed" and "connection closed"
/// errors count, since reqwest reports a premature close through them without
/// any `io::Error` in the chain.
pub fn is_transient(error: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(error);
    while let Some(cause) = current {
        if cause.downcast_ref::<TransientCondition>().is_some() {
            return true;
        }
        if let Some(hyper_err) = cause.downcast_ref::<hyper::Error>() {
            if hyper_err.is_incomplete_message() || hyper_err.is_closed() {
                return true;
            }
        }
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            if is_transient_io_kind(io_err.kind()) {
                return true;
            }
            // io::Error::source() skips the wrapped error, so look at it directly
            if let Some(inner) = io_err.get_ref() {
                if is_transient(inner) {
                    return true;
                }
            }
        }
        current = cause.source();
    }
    false
}

fn is_transient_io_kind(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::UnexpectedEof | io::ErrorKind::BrokenPipe | io::ErrorKind::NotConnected
    )
}
