// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use tick::Clock;
use tower_layer::Layer;

use super::constants::DEFAULT_TIMEOUT;
use super::{OnTimeout, OnTimeoutArgs, Timeout, TimeoutGenerator, TimeoutGeneratorArgs, TimeoutShared};
use crate::config::TimeoutConfig;
use crate::telemetry::TelemetryHelper;
use crate::{EnableIf, PipelineOptions};

/// Builder for the [`Timeout`] strategy.
///
/// Created by [`Timeout::layer`]. Every property has a default, so the layer can be used right
/// away; see the [timeout module][crate::timeout] for the defaults.
#[derive(Debug)]
pub struct TimeoutLayer<In, Out> {
    clock: Clock,
    timeout: Duration,
    timeout_generator: Option<TimeoutGenerator<In>>,
    on_timeout: Option<OnTimeout<Out>>,
    enable_if: EnableIf<In>,
    telemetry: TelemetryHelper,
    _out: PhantomData<fn() -> Out>,
}

impl<In, Out> TimeoutLayer<In, Out> {
    pub(crate) fn new(name: Cow<'static, str>, options: &PipelineOptions<In, Out>) -> Self {
        Self {
            clock: options.clock().clone(),
            timeout: DEFAULT_TIMEOUT,
            timeout_generator: None,
            on_timeout: None,
            enable_if: EnableIf::always(),
            telemetry: options.create_telemetry(name),
            _out: PhantomData,
        }
    }

    /// Sets the time budget of one execution.
    ///
    /// [`Duration::ZERO`] and [`Duration::MAX`] disable enforcement.
    ///
    /// **Default**: 30 seconds
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Computes the timeout per execution from its input.
    ///
    /// Returning `None` applies the timeout set through [`timeout`][TimeoutLayer::timeout].
    #[must_use]
    pub fn timeout_generator(
        mut self,
        generator: impl Fn(&In, TimeoutGeneratorArgs) -> Option<Duration> + Send + Sync + 'static,
    ) -> Self {
        self.timeout_generator = Some(TimeoutGenerator::new(generator));
        self
    }

    /// Invoked with the rejected outcome whenever an execution times out.
    #[must_use]
    pub fn on_timeout(mut self, on_timeout: impl Fn(&Out, OnTimeoutArgs) + Send + Sync + 'static) -> Self {
        self.on_timeout = Some(OnTimeout::new(on_timeout));
        self
    }

    /// Applies the strategy only to inputs for which `is_enabled` returns `true`.
    #[must_use]
    pub fn enable_if(mut self, is_enabled: impl Fn(&In) -> bool + Send + Sync + 'static) -> Self {
        self.enable_if = EnableIf::new(is_enabled);
        self
    }

    /// Applies the strategy to every input.
    #[must_use]
    pub fn enable_always(mut self) -> Self {
        self.enable_if = EnableIf::always();
        self
    }

    /// Turns the strategy into a pass-through.
    #[must_use]
    pub fn disable(mut self) -> Self {
        self.enable_if = EnableIf::never();
        self
    }

    /// Applies validated configuration.
    #[must_use]
    pub fn config(self, config: &TimeoutConfig) -> Self {
        let layer = self.timeout(config.timeout);

        if config.enabled { layer.enable_always() } else { layer.disable() }
    }
}

impl<In, Out, S> Layer<S> for TimeoutLayer<In, Out> {
    type Service = Timeout<In, Out, S>;

    fn layer(&self, inner: S) -> Self::Service {
        let shared = TimeoutShared {
            clock: self.clock.clone(),
            timeout: self.timeout,
            timeout_generator: self.timeout_generator.clone(),
            on_timeout: self.on_timeout.clone(),
            enable_if: self.enable_if.clone(),
            telemetry: self.telemetry.clone(),
        };

        Timeout {
            shared: Arc::new(shared),
            inner,
        }
    }
}
