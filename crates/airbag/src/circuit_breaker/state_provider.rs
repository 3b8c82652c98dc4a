// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::Display;
use std::sync::{Arc, OnceLock};

use super::engine::CircuitEngine;

/// The state of a circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum CircuitState {
    /// Executions pass through and their outcomes are sampled.
    Closed,

    /// Executions are rejected until the break duration elapses.
    Open,

    /// A single trial execution decides whether the circuit closes or opens again.
    HalfOpen,

    /// The circuit is held open through
    /// [`CircuitBreakerManualControl`][super::CircuitBreakerManualControl].
    Isolated,
}

impl CircuitState {
    /// Returns a short `snake_case` label suitable for telemetry attributes.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
            Self::Isolated => "isolated",
        }
    }
}

impl Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reads the state of a circuit breaker from outside of the pipeline, e.g. for health checks.
///
/// Pass the provider to [`CircuitBreakerLayer::state_provider`][super::CircuitBreakerLayer::state_provider].
/// It binds to the first circuit built from that layer; clones of the provider observe the
/// same circuit.
///
/// ```
/// use airbag::circuit_breaker::{CircuitBreaker, CircuitBreakerStateProvider, CircuitState};
/// use airbag::{Execute, Outcome, PipelineOptions, PredicateBuilder, ResilienceContext, Stack};
/// use tick::Clock;
///
/// # fn example(clock: &Clock) {
/// let options = PipelineOptions::<(), Outcome<(), String>>::new(clock);
/// let provider = CircuitBreakerStateProvider::new();
/// assert_eq!(provider.circuit_state(), None);
///
/// let _pipeline = (
///     CircuitBreaker::layer("breaker", &options)
///         .handle(PredicateBuilder::new().handle_error(|_: &String| true))
///         .state_provider(&provider),
///     Execute::new(|_ctx: &mut ResilienceContext, ()| async { Ok::<(), airbag::Error<String>>(()) }),
/// )
///     .into_pipeline();
///
/// assert_eq!(provider.circuit_state(), Some(CircuitState::Closed));
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct CircuitBreakerStateProvider {
    engine: Arc<OnceLock<Arc<CircuitEngine>>>,
}

impl CircuitBreakerStateProvider {
    /// Creates a provider that is not bound to any circuit yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` once a circuit breaker has been built with this provider.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.engine.get().is_some()
    }

    /// The current state of the circuit, or `None` if no circuit breaker has been built with
    /// this provider yet.
    #[must_use]
    pub fn circuit_state(&self) -> Option<CircuitState> {
        self.engine.get().map(|engine| engine.state())
    }

    pub(crate) fn attach(&self, engine: &Arc<CircuitEngine>) {
        // Only the first circuit is observed.
        let _ = self.engine.set(Arc::clone(engine));
    }
}
