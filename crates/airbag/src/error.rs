// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::{Display, Formatter};
use std::time::Duration;

/// The error half of an [`Outcome`][crate::Outcome].
///
/// Every execution of a pipeline ends in exactly one of four ways: a value, the operation's own
/// error ([`Error::Operation`]), a proactive refusal by one of the strategies
/// ([`Error::Rejected`]), or cancellation by the caller ([`Error::Cancelled`]).
///
/// Strategies treat the first two variants as ordinary payloads that predicates may opt into
/// handling. Cancellation is never handled: it always unwinds through every strategy untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error<E> {
    /// The wrapped operation failed with its own error.
    #[error("{0}")]
    Operation(E),

    /// A strategy refused to run the operation.
    #[error(transparent)]
    Rejected(#[from] ExecutionRejected),

    /// The caller's cancellation token fired.
    #[error("the execution was cancelled")]
    Cancelled,
}

impl<E> Error<E> {
    /// Returns `true` if this error represents caller-originated cancellation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns the operation error, if this is one.
    #[must_use]
    pub fn as_operation(&self) -> Option<&E> {
        match self {
            Self::Operation(e) => Some(e),
            _ => None,
        }
    }

    /// Consumes the error and returns the operation error, if this is one.
    #[must_use]
    pub fn into_operation(self) -> Option<E> {
        match self {
            Self::Operation(e) => Some(e),
            _ => None,
        }
    }

    /// Returns the rejection, if a strategy refused to run the operation.
    #[must_use]
    pub fn rejected(&self) -> Option<&ExecutionRejected> {
        match self {
            Self::Rejected(r) => Some(r),
            _ => None,
        }
    }

    /// Returns the timeout rejection, if the execution exceeded its deadline.
    #[must_use]
    pub fn as_timeout(&self) -> Option<&TimeoutRejected> {
        match self {
            Self::Rejected(ExecutionRejected::Timeout(t)) => Some(t),
            _ => None,
        }
    }

    /// Returns the broken circuit rejection, if a circuit breaker short-circuited the execution.
    #[must_use]
    pub fn as_broken_circuit(&self) -> Option<&BrokenCircuit> {
        match self {
            Self::Rejected(ExecutionRejected::BrokenCircuit(b)) => Some(b),
            _ => None,
        }
    }
}

impl<E> From<BrokenCircuit> for Error<E> {
    fn from(value: BrokenCircuit) -> Self {
        Self::Rejected(value.into())
    }
}

impl<E> From<TimeoutRejected> for Error<E> {
    fn from(value: TimeoutRejected) -> Self {
        Self::Rejected(value.into())
    }
}

impl<E> From<RateLimiterRejected> for Error<E> {
    fn from(value: RateLimiterRejected) -> Self {
        Self::Rejected(value.into())
    }
}

/// A strategy proactively refused to run the operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ExecutionRejected {
    /// The circuit breaker is open or isolated.
    #[error(transparent)]
    BrokenCircuit(#[from] BrokenCircuit),

    /// The operation did not complete within its deadline.
    #[error(transparent)]
    Timeout(#[from] TimeoutRejected),

    /// A rate limiter refused to grant a permit.
    #[error(transparent)]
    RateLimiter(#[from] RateLimiterRejected),
}

/// The circuit breaker rejected the execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokenCircuit {
    retry_after: Option<Duration>,
    isolated: bool,
}

impl BrokenCircuit {
    /// Creates a new rejection.
    #[must_use]
    pub fn new(retry_after: Option<Duration>, isolated: bool) -> Self {
        Self { retry_after, isolated }
    }

    /// How long until the circuit is expected to admit executions again, if known.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        self.retry_after
    }

    /// Returns `true` if the circuit was manually isolated.
    #[must_use]
    pub fn is_isolated(&self) -> bool {
        self.isolated
    }
}

impl Display for BrokenCircuit {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.isolated {
            return f.write_str("the circuit is manually held open and is not allowing calls");
        }

        match self.retry_after {
            Some(after) => write!(f, "the circuit is now open and is not allowing calls, retry after {after:?}"),
            None => f.write_str("the circuit is now open and is not allowing calls"),
        }
    }
}

impl std::error::Error for BrokenCircuit {}

/// The operation exceeded its configured timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("the operation didn't complete within the allowed timeout of {timeout:?}")]
pub struct TimeoutRejected {
    timeout: Duration,
}

impl TimeoutRejected {
    /// Creates a new rejection for the given timeout.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// The timeout that was exceeded.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// A rate limiter refused to grant a permit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("the operation was rejected by the rate limiter")]
pub struct RateLimiterRejected {
    retry_after: Option<Duration>,
}

impl RateLimiterRejected {
    /// Creates a new rejection with an optional hint of when to try again.
    #[must_use]
    pub fn new(retry_after: Option<Duration>) -> Self {
        Self { retry_after }
    }

    /// How long to wait before trying again, if known.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        self.retry_after
    }
}
