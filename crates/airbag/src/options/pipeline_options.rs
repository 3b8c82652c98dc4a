// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;
use std::marker::PhantomData;

use tick::Clock;

use crate::constants::DEFAULT_PIPELINE_NAME;
use crate::telemetry::{SharedListener, TelemetryHelper, TelemetryListener};

/// Shared configuration handed to every strategy layer of one pipeline.
///
/// The `In` and `Out` type parameters are the input state and the outcome type flowing through
/// the pipeline. All strategies of a pipeline share them, so fixing them once here lets the
/// compiler infer the types of every layer built from these options.
///
/// ```
/// use airbag::{Outcome, PipelineOptions};
/// use tick::Clock;
///
/// # fn example(clock: &Clock) {
/// let options = PipelineOptions::<String, Outcome<String, std::io::Error>>::new(clock)
///     .name("inventory");
/// # let _ = options;
/// # }
/// ```
#[derive(Debug)]
#[non_exhaustive]
pub struct PipelineOptions<In, Out> {
    clock: Clock,
    name: Cow<'static, str>,
    #[cfg(any(feature = "metrics", test))]
    meter: Option<opentelemetry::metrics::Meter>,
    #[cfg(any(feature = "logs", test))]
    logs_enabled: bool,
    listener: Option<SharedListener>,
    _types: PhantomData<fn(In) -> Out>,
}

impl<In, Out> PipelineOptions<In, Out> {
    /// Creates options using the given clock and the pipeline name `default`.
    pub fn new(clock: impl AsRef<Clock>) -> Self {
        Self {
            clock: clock.as_ref().clone(),
            name: Cow::Borrowed(DEFAULT_PIPELINE_NAME),
            #[cfg(any(feature = "metrics", test))]
            meter: None,
            #[cfg(any(feature = "logs", test))]
            logs_enabled: false,
            listener: None,
            _types: PhantomData,
        }
    }

    /// Sets the pipeline name reported with every event.
    #[must_use]
    pub fn name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = name.into();
        self
    }

    /// Counts resilience events on the `resilience.event` counter of the given provider.
    #[must_use]
    #[cfg(any(feature = "metrics", test))]
    #[cfg_attr(docsrs, doc(cfg(feature = "metrics")))]
    pub fn enable_metrics(self, provider: &dyn opentelemetry::metrics::MeterProvider) -> Self {
        Self {
            meter: Some(crate::telemetry::metrics::create_meter(provider)),
            ..self
        }
    }

    /// Emits a `tracing` event for every resilience event.
    #[must_use]
    #[cfg(any(feature = "logs", test))]
    #[cfg_attr(docsrs, doc(cfg(feature = "logs")))]
    pub fn enable_logs(self) -> Self {
        Self {
            logs_enabled: true,
            ..self
        }
    }

    /// Forwards every resilience event to `listener`.
    #[must_use]
    pub fn telemetry_listener(self, listener: impl TelemetryListener) -> Self {
        Self {
            listener: Some(SharedListener::new(listener)),
            ..self
        }
    }

    /// The clock used by all strategies.
    #[must_use]
    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// The pipeline name.
    #[must_use]
    pub fn pipeline_name(&self) -> &str {
        &self.name
    }

    pub(crate) fn create_telemetry(&self, strategy_name: Cow<'static, str>) -> TelemetryHelper {
        TelemetryHelper {
            pipeline_name: self.name.clone(),
            strategy_name,
            #[cfg(any(feature = "metrics", test))]
            event_reporter: self.meter.as_ref().map(crate::telemetry::metrics::create_resilience_event_counter),
            #[cfg(any(feature = "logs", test))]
            logs_enabled: self.logs_enabled,
            listener: self.listener.clone(),
        }
    }
}

impl<In, Out> Clone for PipelineOptions<In, Out> {
    fn clone(&self) -> Self {
        Self {
            clock: self.clock.clone(),
            name: self.name.clone(),
            #[cfg(any(feature = "metrics", test))]
            meter: self.meter.clone(),
            #[cfg(any(feature = "logs", test))]
            logs_enabled: self.logs_enabled,
            listener: self.listener.clone(),
            _types: PhantomData,
        }
    }
}
