// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::{Error, ExecutionRejected};

/// The result of one attempted execution.
///
/// `Result` makes exactly one of "value" or "error" present for every outcome, so predicates
/// and handlers written against an `Outcome` cover both "returned a value" and "failed"
/// uniformly.
pub type Outcome<T, E> = Result<T, Error<E>>;

/// A payload-free summary of an [`Outcome`], handed to telemetry listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum OutcomeKind {
    /// The operation returned a value.
    Success,

    /// The operation failed with its own error.
    OperationError,

    /// The circuit breaker rejected the execution.
    BrokenCircuit,

    /// The execution exceeded its timeout.
    Timeout,

    /// A rate limiter rejected the execution.
    RateLimited,

    /// The caller cancelled the execution.
    Cancelled,
}

impl OutcomeKind {
    /// Summarizes the given outcome.
    #[must_use]
    pub fn of<T, E>(outcome: &Outcome<T, E>) -> Self {
        match outcome {
            Ok(_) => Self::Success,
            Err(Error::Operation(_)) => Self::OperationError,
            Err(Error::Rejected(ExecutionRejected::BrokenCircuit(_))) => Self::BrokenCircuit,
            Err(Error::Rejected(ExecutionRejected::Timeout(_))) => Self::Timeout,
            Err(Error::Rejected(ExecutionRejected::RateLimiter(_))) => Self::RateLimited,
            Err(Error::Cancelled) => Self::Cancelled,
        }
    }

    /// Returns a short `snake_case` label suitable for telemetry attributes.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::OperationError => "operation_error",
            Self::BrokenCircuit => "broken_circuit",
            Self::Timeout => "timeout",
            Self::RateLimited => "rate_limited",
            Self::Cancelled => "cancelled",
        }
    }
}
