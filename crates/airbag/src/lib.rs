// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(
    not(all(feature = "retry", feature = "timeout", feature = "circuit-breaker")),
    expect(
        rustdoc::broken_intra_doc_links,
        reason = "too ugly to make 'live links' possible with the combination of features"
    )
)]

//! Composable resilience pipelines for fallible operations.
//!
//! A pipeline wraps an operation in an ordered chain of strategies. Each strategy decides
//! whether, when and how often the next one runs, and the last element of the chain is the
//! operation itself. The pipeline is built once, is immutable and can be executed any number
//! of times, concurrently.
//!
//! # Core Types
//!
//! - [`Outcome`]: the result of an execution, `Ok` with a value or an [`Error`] that is either
//!   the operation's own error, a rejection by a strategy, or cancellation.
//! - [`ResilienceContext`]: per-execution state carrying the cancellation token, typed
//!   properties and the events reported by strategies. Pipelines pool contexts.
//! - [`Service`]: the contract every strategy and every leaf operation implements.
//! - [`PipelineOptions`]: the clock, name and telemetry settings shared by the strategies of
//!   one pipeline. Time comes from a [`tick::Clock`]; tests drive it with `tick::ClockControl`.
//!
//! # Quick Start
//!
//! ```rust
//! # #[cfg(all(feature = "retry", feature = "timeout"))]
//! # {
//! use std::time::Duration;
//!
//! use airbag::retry::Retry;
//! use airbag::timeout::Timeout;
//! use airbag::{Execute, Outcome, PipelineOptions, PredicateBuilder, ResilienceContext, Stack};
//! use tick::Clock;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let options = PipelineOptions::<String, Outcome<String, std::io::Error>>::new(Clock::new_tokio()).name("search");
//!
//! let pipeline = (
//!     // Retries transient I/O errors and timeouts of individual attempts.
//!     Retry::layer("retry", &options)
//!         .clone_input()
//!         .handle(
//!             PredicateBuilder::new()
//!                 .handle_error(|e: &std::io::Error| e.kind() == std::io::ErrorKind::ConnectionReset)
//!                 .handle_timeout(),
//!         ),
//!     // Bounds every attempt.
//!     Timeout::layer("timeout", &options).timeout(Duration::from_secs(2)),
//!     Execute::new(|_ctx: &mut ResilienceContext, query: String| async move { Ok(format!("results for {query}")) }),
//! )
//!     .into_pipeline();
//!
//! let outcome = pipeline.execute("rust".to_string()).await;
//! assert_eq!(outcome.unwrap(), "results for rust");
//! # }
//! # }
//! ```
//!
//! # Built-in Strategies
//!
//! - [`retry`]: re-executes handled outcomes with constant, linear or exponential backoff.
//! - [`timeout`]: cancels executions that take too long.
//! - [`circuit_breaker`]: stops calling an unhealthy dependency for a while.
//!
//! An empty composition, a one-element tuple holding only the leaf, behaves exactly like the
//! leaf.
//!
//! # Synchronous Execution
//!
//! [`Pipeline::execute_blocking`] runs a pipeline on the calling thread. Backoff delays then
//! block the thread and a timeout cancels the token the operation observes instead of
//! abandoning it, so blocking operations should check
//! [`ResilienceContext::is_cancelled`].
//!
//! Timers of a clock created with `Clock::new_tokio` are fired by a task on the tokio runtime.
//! Blocking executions must therefore not run on the only thread of that runtime; use
//! `tokio::task::spawn_blocking` or a thread outside the runtime.
//!
//! # Features
//!
//! - `retry`, `timeout`, `circuit-breaker`: the built-in strategies (enabled by default).
//! - `logs`: emits `tracing` events for resilience events.
//! - `metrics`: counts resilience events on an OpenTelemetry counter.
//! - `serde`: derives `Serialize` and `Deserialize` for the [`config`] records.

mod constants;
mod context;
mod error;
mod options;
mod outcome;
mod pipeline;
mod predicate;

#[cfg(any(feature = "retry", test))]
mod delay;
#[cfg(any(feature = "retry", test))]
mod rnd;

#[cfg(test)]
mod testing;

pub mod config;
pub mod telemetry;

#[cfg(any(feature = "retry", test))]
#[cfg_attr(docsrs, doc(cfg(feature = "retry")))]
pub mod retry;

#[cfg(any(feature = "timeout", test))]
#[cfg_attr(docsrs, doc(cfg(feature = "timeout")))]
pub mod timeout;

#[cfg(any(feature = "circuit-breaker", test))]
#[cfg_attr(docsrs, doc(cfg(feature = "circuit-breaker")))]
pub mod circuit_breaker;

pub use context::{
    PooledContext, ResilienceContext, ResilienceContextPool, ResilienceEvent, ResilienceEventSeverity, ResilienceProperties,
    ResiliencePropertyKey,
};
pub use error::{BrokenCircuit, Error, ExecutionRejected, RateLimiterRejected, TimeoutRejected};
pub(crate) use options::{EnableIf, define_fn_wrapper};
pub use options::{Attempt, Backoff, NotSet, PipelineOptions, Set};
pub use outcome::{Outcome, OutcomeKind};
pub use pipeline::{Execute, ExecuteBlocking, Pipeline, PipelineBuilder, Service, Stack};
pub use predicate::{OutcomePredicate, PredicateBuilder};
#[doc(no_inline)]
pub use tower_layer::Layer;
