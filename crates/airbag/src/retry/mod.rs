// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Retry strategy.
//!
//! [`Retry`] re-executes the inner service while its outcome is handled, waiting between
//! attempts according to a backoff. [`RetryLayer`] configures it and is created by
//! [`Retry::layer`].
//!
//! # Quick Start
//!
//! ```rust
//! use std::time::Duration;
//!
//! use airbag::retry::Retry;
//! use airbag::{Backoff, Execute, Outcome, PipelineOptions, PredicateBuilder, ResilienceContext, Stack};
//! use tick::Clock;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let options = PipelineOptions::<String, Outcome<String, std::io::Error>>::new(Clock::new_tokio()).name("my_service");
//!
//! let pipeline = (
//!     Retry::layer("retry", &options)
//!         .clone_input()
//!         .handle(PredicateBuilder::new().handle_error(|e: &std::io::Error| e.kind() == std::io::ErrorKind::TimedOut))
//!         .backoff(Backoff::Exponential)
//!         .base_delay(Duration::from_millis(200)),
//!     Execute::new(|_ctx: &mut ResilienceContext, input: String| async move { Ok(input) }),
//! )
//!     .into_pipeline();
//!
//! assert_eq!(pipeline.execute("ping".to_string()).await.unwrap(), "ping");
//! # }
//! ```
//!
//! # Configuration
//!
//! [`RetryLayer`] uses a type state to make sure two properties are set before the layer
//! can be used:
//!
//! - [`clone_input`][RetryLayer::clone_input] or [`clone_input_with`][RetryLayer::clone_input_with]:
//!   how to obtain the input for another attempt.
//! - [`handle`][RetryLayer::handle] or [`should_handle`][RetryLayer::should_handle]: which
//!   outcomes are retried. Cancelled outcomes never are.
//!
//! # Retry Delay
//!
//! 1. If a [`delay_generator`][RetryLayer::delay_generator] returns a delay for the outcome,
//!    that delay is used as is.
//! 2. Otherwise the backoff computes it from the base delay, the retry index and jitter, capped
//!    by the optional max delay.
//!
//! # Defaults
//!
//! | Parameter | Default Value | Configured By |
//! |-----------|---------------|---------------|
//! | Max retry attempts | `3` (4 calls in total) | [`max_retry_attempts`][RetryLayer::max_retry_attempts], [`infinite_retry_attempts`][RetryLayer::infinite_retry_attempts] |
//! | Backoff | `Exponential` | [`backoff`][RetryLayer::backoff] |
//! | Base delay | `2` seconds | [`base_delay`][RetryLayer::base_delay] |
//! | Max delay | none | [`max_delay`][RetryLayer::max_delay] |
//! | Jitter | enabled | [`use_jitter`][RetryLayer::use_jitter] |
//! | Enable condition | always | [`enable_if`][RetryLayer::enable_if], [`disable`][RetryLayer::disable] |
//!
//! # Telemetry
//!
//! Every scheduled retry reports the `OnRetry` event (severity `Warning`) with
//! [`OnRetryArgs`]. When the attempts run out on a handled outcome, logs and metrics record
//! the final attempt with `resilience.attempt.is_last` set, but no event is reported.
//!
//! - **Log**: `airbag.retry` at `WARN` (feature `logs`)
//! - **Metric**: `resilience.event` counter with `resilience.event.name = OnRetry` (feature `metrics`)

mod args;
mod backoff;
mod callbacks;
pub(crate) mod constants;
mod layer;
mod service;

pub use args::{CloneArgs, DelayGeneratorArgs, OnRetryArgs, ShouldRetryArgs};
pub(crate) use callbacks::{CloneInput, DelayGenerator, OnRetry, ShouldRetry};
pub use layer::RetryLayer;
pub(crate) use service::RetryShared;
pub use service::Retry;
