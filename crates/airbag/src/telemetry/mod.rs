// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Names and hooks for observing resilience events.
//!
//! Strategies report events at well defined points: a retry is scheduled, a timeout fires, a
//! circuit changes state. Each report is
//!
//! - appended to the execution's [`ResilienceContext`] event list,
//! - handed to the pipeline's [`TelemetryListener`], if one was configured,
//! - counted on the `resilience.event` OpenTelemetry counter (feature `metrics`),
//! - logged as a `tracing` event (feature `logs`).
//!
//! Attribute keys follow the [OpenTelemetry naming guidelines](https://opentelemetry.io/docs/specs/semconv/general/naming/#general-naming-considerations).

use std::any::Any;
use std::fmt::Debug;
use std::sync::Arc;

use crate::{OutcomeKind, ResilienceContext, ResilienceEvent};

mod helper;
#[cfg(any(feature = "metrics", test))]
pub(crate) mod metrics;

pub(crate) use helper::TelemetryHelper;

/// Attribute key for the pipeline name.
pub const PIPELINE_NAME: &str = "resilience.pipeline.name";

/// Attribute key for the strategy name.
pub const STRATEGY_NAME: &str = "resilience.strategy.name";

/// Attribute key for the event name.
pub const EVENT_NAME: &str = "resilience.event.name";

/// Attribute key for the attempt index.
pub const ATTEMPT_INDEX: &str = "resilience.attempt.index";

/// Attribute key telling whether the attempt was the last one.
pub const ATTEMPT_IS_LAST: &str = "resilience.attempt.is_last";

/// Attribute key for the summarized outcome that triggered an event.
pub const OUTCOME_KIND: &str = "resilience.outcome.kind";

/// Reported before the retry strategy waits for the next attempt.
pub const ON_RETRY: &str = "OnRetry";

/// Reported when the timeout strategy cancels an execution.
pub const ON_TIMEOUT: &str = "OnTimeout";

/// Reported when a circuit breaker opens or is manually isolated.
pub const ON_CIRCUIT_OPENED: &str = "OnCircuitOpened";

/// Reported when a circuit breaker closes.
pub const ON_CIRCUIT_CLOSED: &str = "OnCircuitClosed";

/// Reported when a circuit breaker admits its half-open trial.
pub const ON_CIRCUIT_HALF_OPENED: &str = "OnCircuitHalfOpened";

/// Receives every event reported by the strategies of a pipeline.
///
/// Listeners are invoked synchronously at the point where the event occurs, so they should be
/// cheap. Closures taking a [`TelemetryEvent`] implement this trait.
///
/// ```
/// use airbag::telemetry::TelemetryEvent;
/// use airbag::{Outcome, PipelineOptions};
/// use tick::Clock;
///
/// # fn example(clock: &Clock) {
/// let options = PipelineOptions::<String, Outcome<String, String>>::new(clock)
///     .telemetry_listener(|event: &TelemetryEvent<'_>| {
///         println!("{} reported {}", event.strategy_name(), event.event());
///     });
/// # let _ = options;
/// # }
/// ```
pub trait TelemetryListener: Send + Sync + 'static {
    /// Called for every reported event.
    fn write(&self, event: &TelemetryEvent<'_>);
}

impl<F> TelemetryListener for F
where
    F: Fn(&TelemetryEvent<'_>) + Send + Sync + 'static,
{
    fn write(&self, event: &TelemetryEvent<'_>) {
        self(event);
    }
}

/// An event as seen by a [`TelemetryListener`].
#[derive(Debug)]
#[non_exhaustive]
pub struct TelemetryEvent<'a> {
    pub(crate) event: ResilienceEvent,
    pub(crate) pipeline_name: &'a str,
    pub(crate) strategy_name: &'a str,
    pub(crate) context: Option<&'a ResilienceContext>,
    pub(crate) outcome: Option<OutcomeKind>,
    pub(crate) arguments: &'a dyn Any,
}

impl<'a> TelemetryEvent<'a> {
    /// The reported event.
    #[must_use]
    pub fn event(&self) -> ResilienceEvent {
        self.event
    }

    /// The name of the pipeline the strategy belongs to.
    #[must_use]
    pub fn pipeline_name(&self) -> &'a str {
        self.pipeline_name
    }

    /// The name of the reporting strategy.
    #[must_use]
    pub fn strategy_name(&self) -> &'a str {
        self.strategy_name
    }

    /// The context of the execution that triggered the event.
    ///
    /// `None` for events not tied to an execution, such as manually isolating a circuit.
    #[must_use]
    pub fn context(&self) -> Option<&'a ResilienceContext> {
        self.context
    }

    /// A summary of the outcome that triggered the event, if any.
    #[must_use]
    pub fn outcome(&self) -> Option<OutcomeKind> {
        self.outcome
    }

    /// Strategy specific arguments, e.g. [`OnRetryArgs`][crate::retry::OnRetryArgs].
    ///
    /// Use [`TelemetryEvent::arguments_as`] to read them typed.
    #[must_use]
    pub fn arguments(&self) -> &'a dyn Any {
        self.arguments
    }

    /// Returns the strategy arguments if they are of type `T`.
    #[must_use]
    pub fn arguments_as<T: 'static>(&self) -> Option<&'a T> {
        self.arguments.downcast_ref()
    }
}

#[derive(Clone)]
pub(crate) struct SharedListener(Arc<dyn TelemetryListener>);

impl SharedListener {
    pub fn new(listener: impl TelemetryListener) -> Self {
        Self(Arc::new(listener))
    }

    pub fn write(&self, event: &TelemetryEvent<'_>) {
        self.0.write(event);
    }
}

impl Debug for SharedListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SharedListener")
    }
}
