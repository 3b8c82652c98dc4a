// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Timeout strategy.
//!
//! [`Timeout`] bounds how long an execution of the inner service may take and reports
//! [`TimeoutRejected`][crate::TimeoutRejected] when the budget runs out. [`TimeoutLayer`]
//! configures it and is created by [`Timeout::layer`].
//!
//! # Cancellation
//!
//! While the inner service runs, the context carries a token derived from the caller's token.
//! Operations should watch [`ResilienceContext::cancellation_token`][crate::ResilienceContext::cancellation_token]:
//! asynchronous operations are dropped at the deadline anyway, but blocking operations can only
//! stop early by observing the token. The caller's token is put back on every exit path, so
//! later executions on the same context are unaffected by an earlier timeout.
//!
//! # Defaults
//!
//! | Parameter | Default Value | Configured By |
//! |-----------|---------------|---------------|
//! | Timeout | `30` seconds | [`timeout`][TimeoutLayer::timeout], [`timeout_generator`][TimeoutLayer::timeout_generator] |
//! | Enable condition | always | [`enable_if`][TimeoutLayer::enable_if], [`disable`][TimeoutLayer::disable] |
//!
//! # Telemetry
//!
//! Every timeout reports the `OnTimeout` event (severity `Error`) with [`OnTimeoutArgs`].
//!
//! - **Log**: `airbag.timeout` at `WARN` with `timeout.ms` (feature `logs`)
//! - **Metric**: `resilience.event` counter with `resilience.event.name = OnTimeout` (feature `metrics`)

mod args;
mod callbacks;
pub(crate) mod constants;
mod layer;
mod service;
mod watchdog;

pub use args::{OnTimeoutArgs, TimeoutGeneratorArgs};
pub(crate) use callbacks::{OnTimeout, TimeoutGenerator};
pub use layer::TimeoutLayer;
pub(crate) use service::TimeoutShared;
pub use service::Timeout;
