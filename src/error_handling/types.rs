//! Error type definitions.
//!
//! This module defines the transport error taxonomy, the transient transport
//! conditions that are safe to retry, and the categories counted in
//! `TransportStats`.

use log::SetLoggerError;
use reqwest::Error as ReqwestError;
use strum_macros::EnumIter as EnumIterMacro;
use thiserror::Error;

/// Boxed error returned by request executors and body capabilities.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error types for initialization failures.
#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)] // All variants end with "Error" by convention
pub enum InitializationError {
    /// Error initializing the logger.
    #[error("Logger initialization error: {0}")]
    LoggerError(#[from] SetLoggerError),

    /// Error initializing the HTTP client.
    #[error("HTTP client initialization error: {0}")]
    HttpClientError(#[from] ReqwestError),
}

/// Errors surfaced by a `RequestExecutor`.
///
/// Only `Executor` errors are ever considered for retry, and only when their
/// source chain contains a transient transport condition. Everything else is
/// terminal for the call.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The invocation context was canceled.
    #[error("request canceled")]
    Canceled,

    /// The invocation context deadline passed.
    #[error("request deadline exceeded")]
    DeadlineExceeded,

    /// The underlying executor failed to complete the request.
    #[error(transparent)]
    Executor(BoxError),

    /// Closing the body of a response that was about to be retried failed.
    #[error("failed to release response body: {0}")]
    ReleaseBody(#[source] BoxError),

    /// Regenerating the request body for a retry failed.
    #[error("failed to replay request body: {0}")]
    ReplayBody(#[source] BoxError),

    /// The shared host limiter was closed while waiting on it.
    #[error("host rate limiter closed")]
    LimiterClosed,

    /// The request could not be turned into a wire request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl TransportError {
    /// Wraps an arbitrary executor failure.
    pub fn executor<E>(error: E) -> Self
    where
        E: Into<BoxError>,
    {
        TransportError::Executor(error.into())
    }

    /// Whether this error came from the invocation context rather than the network.
    pub fn is_context_error(&self) -> bool {
        matches!(
            self,
            TransportError::Canceled | TransportError::DeadlineExceeded
        )
    }
}

impl From<ReqwestError> for TransportError {
    fn from(error: ReqwestError) -> Self {
        if error.is_builder() {
            TransportError::InvalidRequest(error.to_string())
        } else {
            TransportError::Executor(Box::new(error))
        }
    }
}

/// Transport conditions that indicate a prematurely closed connection.
///
/// Executors can return these (directly or anywhere in an error's source
/// chain) to mark a failure as safe to retry.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro)]
pub enum TransientCondition {
    /// The stream ended before a complete message was read.
    #[error("EOF")]
    Eof,
    /// A write hit a pipe whose reader had gone away.
    #[error("io: read/write on closed pipe")]
    ClosedPipe,
    /// The stream ended in the middle of a frame or body.
    #[error("unexpected EOF")]
    UnexpectedEof,
    /// An operation was attempted on a connection already closed locally.
    #[error("use of closed network connection")]
    ConnectionClosed,
}

/// Why an attempt was retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro)]
pub enum RetryReason {
    /// A transport error on the transient allow-list.
    Transient,
    /// The server answered 429 Too Many Requests.
    RateLimited,
    /// The server answered 500, 502, 503 or 504 and budget remained.
    ServerError,
}

impl RetryReason {
    /// Returns a human-readable string representation of the retry reason.
    pub fn as_str(&self) -> &'static str {
        match self {
            RetryReason::Transient => "transient transport error",
            RetryReason::RateLimited => "rate limited (429)",
            RetryReason::ServerError => "server error (50x)",
        }
    }
}

impl std::fmt::Display for RetryReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a call through the transport ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro)]
pub enum OutcomeType {
    /// A response was returned to the caller (any status).
    Response,
    /// The invocation context was canceled or expired.
    ContextError,
    /// A non-retryable executor error.
    ExecutorError,
    /// Releasing or replaying a body failed.
    ResourceError,
    /// The configured attempt cap stopped a retryable outcome.
    AttemptsExhausted,
}

impl OutcomeType {
    /// Returns a human-readable string representation of the outcome type.
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeType::Response => "response",
            OutcomeType::ContextError => "canceled or deadline exceeded",
            OutcomeType::ExecutorError => "executor error",
            OutcomeType::ResourceError => "body release/replay error",
            OutcomeType::AttemptsExhausted => "attempt cap reached",
        }
    }

    /// Classifies a terminal error.
    pub fn from_error(error: &TransportError) -> Self {
        match error {
            TransportError::Canceled | TransportError::DeadlineExceeded => {
                OutcomeType::ContextError
            }
            TransportError::ReleaseBody(_) | TransportError::ReplayBody(_) => {
                OutcomeType::ResourceError
            }
            TransportError::Executor(_)
            | TransportError::LimiterClosed
            | TransportError::InvalidRequest(_) => OutcomeType::ExecutorError,
        }
    }
}
