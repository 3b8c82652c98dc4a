// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

/// Default minimum throughput (number of executions) in the sampling window before the
/// circuit breaker evaluates the failure rate and may break the circuit.
///
/// The defaults taken from Polly V8:
/// <https://www.pollydocs.org/strategies/circuit-breaker.html#defaults>
pub(crate) const DEFAULT_MIN_THROUGHPUT: u32 = 100;

/// Default duration of the sampling window.
///
/// The defaults taken from Polly V8:
/// <https://www.pollydocs.org/strategies/circuit-breaker.html#defaults>
pub(crate) const DEFAULT_SAMPLING_DURATION: Duration = Duration::from_secs(30);

/// Default ratio of failed executions in the sampling window that breaks the circuit.
///
/// The defaults taken from Polly V8:
/// <https://www.pollydocs.org/strategies/circuit-breaker.html#defaults>
pub(crate) const DEFAULT_FAILURE_THRESHOLD: f64 = 0.1;

/// Default duration that the circuit stays open before a trial is admitted.
///
/// The defaults taken from Polly V8:
/// <https://www.pollydocs.org/strategies/circuit-breaker.html#defaults>
pub(crate) const DEFAULT_BREAK_DURATION: Duration = Duration::from_secs(5);

/// Number of sub-windows the rolling health metrics split the sampling duration into.
pub(crate) const NUMBER_OF_WINDOWS: u32 = 10;

/// Shortest sub-window worth tracking; shorter sampling durations use a single window.
pub(crate) const WINDOW_RESOLUTION: Duration = Duration::from_millis(20);

/// Attribute key for the circuit state reported with circuit breaker metrics.
#[cfg(any(feature = "metrics", test))]
pub(crate) const CIRCUIT_STATE: &str = "resilience.circuit_breaker.state";
