// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Circuit breaker strategy.
//!
//! [`CircuitBreaker`] samples the outcomes of the inner service and stops calling it once the
//! failure rate gets too high, giving the dependency time to recover. [`CircuitBreakerLayer`]
//! configures it and is created by [`CircuitBreaker::layer`].
//!
//! # Quick Start
//!
//! ```rust
//! use std::time::Duration;
//!
//! use airbag::circuit_breaker::CircuitBreaker;
//! use airbag::{Execute, Outcome, PipelineOptions, PredicateBuilder, ResilienceContext, Stack};
//! use tick::Clock;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let options = PipelineOptions::<String, Outcome<String, std::io::Error>>::new(Clock::new_tokio()).name("my_service");
//!
//! let pipeline = (
//!     CircuitBreaker::layer("breaker", &options)
//!         .handle(PredicateBuilder::new().handle_error(|_: &std::io::Error| true))
//!         .failure_threshold(0.2)
//!         .break_duration(Duration::from_secs(30)),
//!     Execute::new(|_ctx: &mut ResilienceContext, input: String| async move { Ok(input) }),
//! )
//!     .into_pipeline();
//!
//! assert_eq!(pipeline.execute("ping".to_string()).await.unwrap(), "ping");
//! # }
//! ```
//!
//! # States
//!
//! - **Closed**: executions pass through. A handled outcome is a failure, everything else is
//!   a success. When a failure is recorded and the sampling window holds at least the minimum
//!   throughput with a failure rate at or above the threshold, the circuit opens.
//! - **Open**: executions are rejected with [`BrokenCircuit`][crate::BrokenCircuit], which
//!   carries the time left until the break duration elapses.
//! - **Half-open**: the first execution after the break duration is a trial. Success closes the
//!   circuit and resets the health metrics, failure opens it again. Other executions are
//!   rejected while the trial runs. A trial that has not finished within the break duration
//!   is presumed lost and replaced.
//! - **Isolated**: the circuit was opened through [`CircuitBreakerManualControl`] and rejects
//!   everything until it is closed through the same control.
//!
//! Cancelled outcomes are never recorded. A cancelled trial leaves the circuit half-open and
//! the next execution becomes the trial.
//!
//! # Health Metrics
//!
//! Sampling durations shorter than 200 ms use a single window that is discarded as a whole once
//! the sampling duration elapses. Longer durations are divided into 10 rolling windows and the
//! oldest one is evicted as soon as it falls out of the sampling duration.
//!
//! # Defaults
//!
//! | Parameter | Default Value | Configured By |
//! |-----------|---------------|---------------|
//! | Failure threshold | `0.1` (10%) | [`failure_threshold`][CircuitBreakerLayer::failure_threshold] |
//! | Minimum throughput | `100` | [`min_throughput`][CircuitBreakerLayer::min_throughput] |
//! | Sampling duration | `30` seconds | [`sampling_duration`][CircuitBreakerLayer::sampling_duration] |
//! | Break duration | `5` seconds | [`break_duration`][CircuitBreakerLayer::break_duration] |
//! | Enable condition | always | [`enable_if`][CircuitBreakerLayer::enable_if], [`disable`][CircuitBreakerLayer::disable] |
//!
//! # Telemetry
//!
//! | Event | Severity | Arguments |
//! |-------|----------|-----------|
//! | `OnCircuitOpened` | `Error` | [`OnCircuitOpenedArgs`] |
//! | `OnCircuitClosed` | `Information` | [`OnCircuitClosedArgs`] |
//! | `OnCircuitHalfOpened` | `Warning` | [`OnCircuitHalfOpenedArgs`] |
//!
//! Manual transitions are not tied to an execution and reach the telemetry listener without a
//! context. Rejections are only logged.
//!
//! - **Log**: `airbag.circuit_breaker.opened`, `.closed`, `.half_opened` and `.rejected` (feature `logs`)
//! - **Metric**: `resilience.event` counter with `resilience.circuit_breaker.state` (feature `metrics`)

mod args;
mod callbacks;
pub(crate) mod constants;
mod engine;
mod health;
mod layer;
mod manual_control;
mod service;
mod state_provider;

pub use args::{OnCircuitClosedArgs, OnCircuitHalfOpenedArgs, OnCircuitOpenedArgs};
pub(crate) use callbacks::{OnClosed, OnHalfOpened, OnOpened, ShouldHandle};
pub use health::HealthInfo;
pub use layer::CircuitBreakerLayer;
pub use manual_control::CircuitBreakerManualControl;
pub use service::CircuitBreaker;
pub(crate) use service::CircuitBreakerShared;
pub use state_provider::{CircuitBreakerStateProvider, CircuitState};
